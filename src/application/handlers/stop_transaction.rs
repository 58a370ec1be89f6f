//! StopTransaction handler

use serde_json::Value;
use tracing::{info, warn};

use super::meter_values::ingest_meter_values;
use super::{HandlerContext, HandlerError, HandlerResult};
use crate::domain::messages::{IdTagInfo, StopTransactionRequest, StopTransactionResponse};
use crate::domain::{ConnectorStatus, StopReason};

pub(super) async fn handle(ctx: &HandlerContext, payload: &Value) -> HandlerResult {
    let req: StopTransactionRequest = serde_json::from_value(payload.clone())
        .map_err(|e| HandlerError::Formation(format!("Invalid StopTransaction: {}", e)))?;

    let Some(transaction) = ctx.storage.get_transaction(req.transaction_id).await? else {
        // Lenient by design: stations lose transaction ids across reboots,
        // and answering Invalid makes them retry the stop forever.
        warn!(
            charge_point_id = ctx.charge_point_id(),
            transaction_id = req.transaction_id,
            "StopTransaction for unknown transaction, acknowledging anyway"
        );
        return respond_accepted();
    };

    if req.meter_stop < transaction.meter_start {
        return Err(HandlerError::PropertyConstraint(format!(
            "meterStop {} below meterStart {}",
            req.meter_stop, transaction.meter_start
        )));
    }
    if req.timestamp < transaction.started_at {
        return Err(HandlerError::PropertyConstraint(
            "stop timestamp precedes start timestamp".into(),
        ));
    }

    let reason = StopReason::from_wire(req.reason.as_deref());
    let stop_soc = ctx.coordinator.last_soc(req.transaction_id);

    let stopped = ctx
        .storage
        .stop_transaction(req.transaction_id, req.meter_stop, req.timestamp, reason, stop_soc)
        .await?;

    // Trailing samples the station batched into the stop message
    if let Some(ref transaction_data) = req.transaction_data {
        ingest_meter_values(
            ctx,
            stopped.connector_id,
            Some(req.transaction_id),
            transaction_data,
        )
        .await;
    }

    // Free the connector
    if let Some(mut connector) = ctx.session.connectors.get_mut(&stopped.connector_id) {
        connector.status = ConnectorStatus::Available;
        connector.current_transaction_id = None;
        connector.last_updated = chrono::Utc::now();
        let snapshot = connector.clone();
        drop(connector);
        ctx.storage
            .upsert_connector(ctx.charge_point_id(), &snapshot)
            .await?;
        ctx.refresh_connector_cache().await;
    } else {
        ctx.storage
            .set_connector_status(
                ctx.charge_point_id(),
                stopped.connector_id,
                ConnectorStatus::Available,
                None,
                None,
            )
            .await?;
    }

    ctx.coordinator.clear_transaction(req.transaction_id);

    info!(
        charge_point_id = ctx.charge_point_id(),
        transaction_id = req.transaction_id,
        connector_id = stopped.connector_id,
        meter_stop = %req.meter_stop,
        energy_wh = %stopped.energy_consumed().unwrap_or_default(),
        reason = ?reason,
        stop_soc = stop_soc,
        "Transaction stopped"
    );

    respond_accepted()
}

fn respond_accepted() -> HandlerResult {
    let response = StopTransactionResponse {
        id_tag_info: Some(IdTagInfo::accepted()),
    };
    serde_json::to_value(response)
        .map_err(|e| HandlerError::Internal(format!("serialize StopTransaction response: {}", e)))
}
