//! RemoteStartTransaction command

use chrono::Utc;
use serde_json::Value;
use tracing::info;

use super::{parse_status, CommandService};
use crate::application::coordinator::PendingChargeSession;
use crate::application::session::CallError;
use crate::domain::messages::RemoteStartTransactionRequest;

/// Operator context to attach to the transaction the station will start.
#[derive(Debug, Clone, Default)]
pub struct RemoteStartContext {
    pub vehicle_id: Option<String>,
    pub fleet_id: Option<String>,
}

/// Ask a charge point to start a transaction.
///
/// When the station accepts, the operator context is parked with the
/// transaction coordinator and picked up by the eventual StartTransaction.
pub async fn remote_start_transaction(
    commands: &CommandService,
    charge_point_id: &str,
    connector_id: Option<u32>,
    id_tag: &str,
    charging_profile: Option<Value>,
    context: Option<RemoteStartContext>,
) -> Result<String, CallError> {
    let request = RemoteStartTransactionRequest {
        connector_id,
        id_tag: id_tag.to_string(),
        charging_profile,
    };
    let payload = serde_json::to_value(&request)
        .map_err(|e| CallError::InvalidResponse(e.to_string()))?;

    let response = commands
        .send_raw(charge_point_id, "RemoteStartTransaction", payload, None)
        .await?;
    let status = parse_status(response)?;

    if status == "Accepted" {
        let connector = connector_id.unwrap_or(1);
        let context = context.unwrap_or_default();
        commands.coordinator().register_pending_session(
            charge_point_id,
            connector,
            PendingChargeSession {
                id_tag: id_tag.to_string(),
                vehicle_id: context.vehicle_id,
                fleet_id: context.fleet_id,
                created_at: Utc::now(),
            },
        );
        info!(
            charge_point_id,
            connector_id = connector,
            id_tag,
            "RemoteStart accepted, context parked"
        );
    }

    Ok(status)
}
