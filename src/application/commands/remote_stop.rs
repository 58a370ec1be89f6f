//! RemoteStopTransaction command

use super::{parse_status, CommandService};
use crate::application::session::CallError;
use crate::domain::messages::RemoteStopTransactionRequest;

pub async fn remote_stop_transaction(
    commands: &CommandService,
    charge_point_id: &str,
    transaction_id: i32,
) -> Result<String, CallError> {
    let payload = serde_json::to_value(RemoteStopTransactionRequest { transaction_id })
        .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    let response = commands
        .send_raw(charge_point_id, "RemoteStopTransaction", payload, None)
        .await?;
    parse_status(response)
}
