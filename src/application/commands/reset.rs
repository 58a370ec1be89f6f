//! Reset command

use super::{parse_status, CommandService};
use crate::application::session::CallError;
use crate::domain::messages::{ResetKind, ResetRequest};

pub async fn reset(
    commands: &CommandService,
    charge_point_id: &str,
    kind: ResetKind,
) -> Result<String, CallError> {
    let payload = serde_json::to_value(ResetRequest { kind })
        .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    let response = commands
        .send_raw(charge_point_id, "Reset", payload, None)
        .await?;
    parse_status(response)
}
