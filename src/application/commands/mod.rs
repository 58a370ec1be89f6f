//! CS→CP command surface
//!
//! Every command is a plain `send()` through the session's pending-call
//! registry; typed wrappers live in their own modules and only shape the
//! payload and parse the response.

pub mod change_configuration;
pub mod get_configuration;
pub mod remote_start;
pub mod remote_stop;
pub mod reset;
pub mod trigger_message;
pub mod unlock_connector;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::application::coordinator::TransactionCoordinator;
use crate::application::session::{CallError, Session, SharedSessionRegistry};

pub use change_configuration::change_configuration;
pub use get_configuration::{get_configuration, ConfigurationResult};
pub use remote_start::{remote_start_transaction, RemoteStartContext};
pub use remote_stop::remote_stop_transaction;
pub use reset::reset;
pub use trigger_message::trigger_message;
pub use unlock_connector::unlock_connector;

/// Issues OCPP commands to connected charge points.
pub struct CommandService {
    registry: SharedSessionRegistry,
    coordinator: Arc<TransactionCoordinator>,
}

pub type SharedCommandService = Arc<CommandService>;

impl CommandService {
    pub fn new(registry: SharedSessionRegistry, coordinator: Arc<TransactionCoordinator>) -> Self {
        Self {
            registry,
            coordinator,
        }
    }

    pub(crate) fn session(&self, charge_point_id: &str) -> Result<Arc<Session>, CallError> {
        self.registry
            .get(charge_point_id)
            .ok_or_else(|| CallError::NotConnected(charge_point_id.to_string()))
    }

    pub(crate) fn coordinator(&self) -> &Arc<TransactionCoordinator> {
        &self.coordinator
    }

    /// Send an arbitrary action + payload and return the raw response.
    ///
    /// Timeouts and remote CallErrors are returned verbatim to the caller;
    /// there is no retry at this layer.
    pub async fn send_raw(
        &self,
        charge_point_id: &str,
        action: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError> {
        info!(charge_point_id, action, "Sending command");
        self.session(charge_point_id)?
            .call(action, payload, timeout)
            .await
    }
}

pub fn create_command_service(
    registry: SharedSessionRegistry,
    coordinator: Arc<TransactionCoordinator>,
) -> SharedCommandService {
    Arc::new(CommandService::new(registry, coordinator))
}

/// Parse a `{status: "..."}` response payload.
pub(crate) fn parse_status(payload: Value) -> Result<String, CallError> {
    let response: crate::domain::messages::StatusResponse = serde_json::from_value(payload)
        .map_err(|e| CallError::InvalidResponse(e.to_string()))?;
    Ok(response.status)
}
