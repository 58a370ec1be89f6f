//! GetConfiguration command

use std::time::Duration;

use super::CommandService;
use crate::application::session::CallError;
use crate::domain::messages::{GetConfigurationRequest, GetConfigurationResponse, KeyValue};

/// Configuration reported by a charge point.
#[derive(Debug, Clone)]
pub struct ConfigurationResult {
    /// Known configuration keys with their values
    pub configuration_key: Vec<KeyValue>,
    /// Keys the station does not recognize
    pub unknown_key: Vec<String>,
}

impl ConfigurationResult {
    /// Convenience lookup for a single key's value.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.configuration_key
            .iter()
            .find(|kv| kv.key == key)
            .and_then(|kv| kv.value.as_deref())
    }
}

/// Get configuration from a charge point.
///
/// With `keys == None` the station returns everything it has.
pub async fn get_configuration(
    commands: &CommandService,
    charge_point_id: &str,
    keys: Option<Vec<String>>,
    timeout: Option<Duration>,
) -> Result<ConfigurationResult, CallError> {
    let payload = serde_json::to_value(GetConfigurationRequest { key: keys })
        .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    let response = commands
        .send_raw(charge_point_id, "GetConfiguration", payload, timeout)
        .await?;

    let parsed: GetConfigurationResponse = serde_json::from_value(response)
        .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    Ok(ConfigurationResult {
        configuration_key: parsed.configuration_key.unwrap_or_default(),
        unknown_key: parsed.unknown_key.unwrap_or_default(),
    })
}
