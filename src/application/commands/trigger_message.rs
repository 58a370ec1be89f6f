//! TriggerMessage command

use std::time::Duration;

use super::{parse_status, CommandService};
use crate::application::session::CallError;
use crate::domain::messages::{MessageTrigger, TriggerMessageRequest};

pub async fn trigger_message(
    commands: &CommandService,
    charge_point_id: &str,
    requested_message: MessageTrigger,
    connector_id: Option<u32>,
    timeout: Option<Duration>,
) -> Result<String, CallError> {
    let payload = serde_json::to_value(TriggerMessageRequest {
        requested_message,
        connector_id,
    })
    .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    let response = commands
        .send_raw(charge_point_id, "TriggerMessage", payload, timeout)
        .await?;
    parse_status(response)
}
