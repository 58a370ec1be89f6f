//! StartTransaction handler

use serde_json::Value;
use tracing::{info, warn};

use super::{HandlerContext, HandlerError, HandlerResult};
use crate::domain::messages::{
    IdTagInfo, StartTransactionRequest, StartTransactionResponse,
};
use crate::domain::{Connector, ConnectorStatus, IdTagStatus, TransactionDraft};

/// Sentinel transaction id for rejected starts.
const REJECTED_TRANSACTION_ID: i32 = -1;

pub(super) async fn handle(ctx: &HandlerContext, payload: &Value) -> HandlerResult {
    let req: StartTransactionRequest = serde_json::from_value(payload.clone())
        .map_err(|e| HandlerError::Formation(format!("Invalid StartTransaction: {}", e)))?;

    if req.connector_id == 0 {
        return Err(HandlerError::PropertyConstraint(
            "StartTransaction requires a positive connectorId".into(),
        ));
    }

    // ── IdTag validation ───────────────────────────────────
    let id_tag_info = ctx.storage.validate_id_tag(&req.id_tag).await?;
    if id_tag_info.status != IdTagStatus::Accepted {
        warn!(
            charge_point_id = ctx.charge_point_id(),
            connector_id = req.connector_id,
            id_tag = req.id_tag.as_str(),
            status = %id_tag_info.status,
            "StartTransaction rejected: idTag not accepted"
        );
        return reject(id_tag_info);
    }

    // ── At most one active transaction per connector ───────
    if let Some(active) = ctx
        .session
        .connectors
        .get(&req.connector_id)
        .and_then(|c| c.current_transaction_id)
    {
        warn!(
            charge_point_id = ctx.charge_point_id(),
            connector_id = req.connector_id,
            active_transaction_id = active,
            "StartTransaction rejected: connector busy"
        );
        return reject(IdTagInfo::with_status(IdTagStatus::ConcurrentTx));
    }

    // Operator context parked by a RemoteStart, if any
    let pending = ctx
        .coordinator
        .take_pending_session(ctx.charge_point_id(), req.connector_id);

    let transaction_id = ctx.coordinator.allocate_transaction_id().await?;

    let draft = TransactionDraft {
        transaction_id,
        charge_point_id: ctx.charge_point_id().to_string(),
        connector_id: req.connector_id,
        id_tag: Some(req.id_tag.clone()),
        vehicle_id: pending.as_ref().and_then(|p| p.vehicle_id.clone()),
        fleet_id: pending.as_ref().and_then(|p| p.fleet_id.clone()),
        meter_start: req.meter_start,
        started_at: req.timestamp,
    };

    // A start that cannot be persisted must not be acknowledged
    let transaction = ctx.storage.create_transaction(draft).await?;

    // Bind the transaction to the connector and mark it charging
    let mut connector = ctx
        .session
        .connectors
        .entry(req.connector_id)
        .or_insert_with(|| Connector::new(req.connector_id));
    connector.status = ConnectorStatus::Charging;
    connector.current_transaction_id = Some(transaction_id);
    connector.last_updated = chrono::Utc::now();
    let snapshot = connector.clone();
    drop(connector);

    ctx.storage
        .upsert_connector(ctx.charge_point_id(), &snapshot)
        .await?;
    ctx.refresh_connector_cache().await;

    info!(
        charge_point_id = ctx.charge_point_id(),
        connector_id = req.connector_id,
        transaction_id,
        id_tag = req.id_tag.as_str(),
        meter_start = %transaction.meter_start,
        vehicle_id = transaction.vehicle_id.as_deref(),
        "Transaction started"
    );

    let response = StartTransactionResponse {
        transaction_id,
        id_tag_info: IdTagInfo {
            status: IdTagStatus::Accepted,
            expiry_date: id_tag_info.expiry_date,
            parent_id_tag: id_tag_info.parent_id_tag,
        },
    };
    serde_json::to_value(response)
        .map_err(|e| HandlerError::Internal(format!("serialize StartTransaction response: {}", e)))
}

fn reject(id_tag_info: IdTagInfo) -> HandlerResult {
    let response = StartTransactionResponse {
        transaction_id: REJECTED_TRANSACTION_ID,
        id_tag_info,
    };
    serde_json::to_value(response)
        .map_err(|e| HandlerError::Internal(format!("serialize StartTransaction response: {}", e)))
}
