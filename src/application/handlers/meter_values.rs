//! MeterValues handler
//!
//! Telemetry ingest must never back up the socket: storage and cache
//! failures here are logged and swallowed, and fan-out delivery is
//! non-blocking by construction.

use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{HandlerContext, HandlerError, HandlerResult};
use crate::application::telemetry::MeterSample;
use crate::domain::messages::MeterValuesRequest;
use crate::domain::{Connector, MeterValue, MeterValueBatch};

pub(super) async fn handle(ctx: &HandlerContext, payload: &Value) -> HandlerResult {
    let req: MeterValuesRequest = serde_json::from_value(payload.clone())
        .map_err(|e| HandlerError::Formation(format!("Invalid MeterValues: {}", e)))?;

    // A transactionId of 0 is "no transaction" on some firmwares
    let transaction_id = req.transaction_id.filter(|id| *id > 0);

    debug!(
        charge_point_id = ctx.charge_point_id(),
        connector_id = req.connector_id,
        transaction_id = transaction_id,
        samples = req.meter_value.len(),
        "MeterValues"
    );

    ingest_meter_values(ctx, req.connector_id, transaction_id, &req.meter_value).await;

    Ok(json!({}))
}

/// Shared ingest path for MeterValues and StopTransaction's
/// `transactionData`: persist, track SoC, fold into connector telemetry,
/// and fan out to live subscribers.
pub(super) async fn ingest_meter_values(
    ctx: &HandlerContext,
    connector_id: u32,
    transaction_id: Option<i32>,
    values: &[MeterValue],
) {
    if values.is_empty() {
        return;
    }

    // ── Durable batch ──────────────────────────────────────
    let batch = MeterValueBatch {
        charge_point_id: ctx.charge_point_id().to_string(),
        connector_id,
        transaction_id,
        values: values.to_vec(),
    };
    if let Err(e) = ctx.storage.save_meter_values(batch).await {
        warn!(
            charge_point_id = ctx.charge_point_id(),
            connector_id,
            error = %e,
            "Failed to persist meter values"
        );
    }

    // ── SoC bookkeeping ────────────────────────────────────
    if let Some(tx_id) = transaction_id {
        for meter_value in values {
            for sampled in &meter_value.sampled_value {
                if sampled.is_soc() {
                    if let Some(soc) = sampled.numeric_value() {
                        ctx.coordinator.record_soc(tx_id, soc).await;
                    }
                }
            }
        }
    }

    // ── Connector telemetry ────────────────────────────────
    if connector_id > 0 {
        let mut connector = ctx
            .session
            .connectors
            .entry(connector_id)
            .or_insert_with(|| Connector::new(connector_id));
        let mut touched = false;
        for meter_value in values {
            for sampled in &meter_value.sampled_value {
                touched |= connector.apply_sample(sampled);
            }
        }
        let snapshot = touched.then(|| connector.clone());
        drop(connector);

        if let Some(snapshot) = snapshot {
            if let Err(e) = ctx
                .storage
                .upsert_connector(ctx.charge_point_id(), &snapshot)
                .await
            {
                warn!(
                    charge_point_id = ctx.charge_point_id(),
                    connector_id,
                    error = %e,
                    "Failed to persist connector telemetry"
                );
            }
            ctx.refresh_connector_cache().await;
        }
    }

    // ── Live fan-out ───────────────────────────────────────
    for meter_value in values {
        ctx.publisher.publish(MeterSample {
            charge_point_id: ctx.charge_point_id().to_string(),
            connector_id,
            transaction_id,
            timestamp: meter_value.timestamp,
            sampled_values: meter_value.sampled_value.clone(),
        });
    }
}
