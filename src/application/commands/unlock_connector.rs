//! UnlockConnector command

use super::{parse_status, CommandService};
use crate::application::session::CallError;
use crate::domain::messages::UnlockConnectorRequest;

pub async fn unlock_connector(
    commands: &CommandService,
    charge_point_id: &str,
    connector_id: u32,
) -> Result<String, CallError> {
    let payload = serde_json::to_value(UnlockConnectorRequest { connector_id })
        .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    let response = commands
        .send_raw(charge_point_id, "UnlockConnector", payload, None)
        .await?;
    parse_status(response)
}
