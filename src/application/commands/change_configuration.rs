//! ChangeConfiguration command

use super::{parse_status, CommandService};
use crate::application::session::CallError;
use crate::domain::messages::ChangeConfigurationRequest;

pub async fn change_configuration(
    commands: &CommandService,
    charge_point_id: &str,
    key: &str,
    value: &str,
) -> Result<String, CallError> {
    let payload = serde_json::to_value(ChangeConfigurationRequest {
        key: key.to_string(),
        value: value.to_string(),
    })
    .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    let response = commands
        .send_raw(charge_point_id, "ChangeConfiguration", payload, None)
        .await?;
    parse_status(response)
}
