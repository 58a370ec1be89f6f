//! StatusNotification handler

use serde_json::{json, Value};
use tracing::{info, warn};

use super::{HandlerContext, HandlerError, HandlerResult};
use crate::domain::messages::StatusNotificationRequest;
use crate::domain::{AlarmDraft, Connector};
use crate::infrastructure::cache::keys;

pub(super) async fn handle(ctx: &HandlerContext, payload: &Value) -> HandlerResult {
    let req: StatusNotificationRequest = serde_json::from_value(payload.clone())
        .map_err(|e| HandlerError::Formation(format!("Invalid StatusNotification: {}", e)))?;

    info!(
        charge_point_id = ctx.charge_point_id(),
        connector_id = req.connector_id,
        status = %req.status,
        error_code = req.error_code.as_str(),
        "StatusNotification"
    );

    let has_error = req.error_code != "NoError";

    // connectorId 0 addresses the charge point as a whole, not a socket
    if req.connector_id == 0 {
        cache_station_status(ctx, &req).await;
    } else {
        let mut connector = ctx
            .session
            .connectors
            .entry(req.connector_id)
            .or_insert_with(|| Connector::new(req.connector_id));
        connector.set_status(
            req.status,
            has_error.then(|| req.error_code.clone()),
            req.vendor_error_code.clone(),
            req.info.clone(),
        );
        let snapshot = connector.clone();
        drop(connector);

        ctx.storage
            .upsert_connector(ctx.charge_point_id(), &snapshot)
            .await?;

        ctx.refresh_connector_cache().await;
        cache_station_status(ctx, &req).await;
    }

    if has_error {
        let draft = AlarmDraft::from_status_error(
            ctx.charge_point_id(),
            req.connector_id,
            &req.error_code,
            req.vendor_error_code.as_deref(),
            req.info.as_deref(),
        );
        match ctx.storage.create_alarm(draft).await {
            Ok(alarm) => warn!(
                charge_point_id = ctx.charge_point_id(),
                connector_id = req.connector_id,
                alarm_id = alarm.id,
                severity = ?alarm.severity,
                error_code = req.error_code.as_str(),
                "Alarm opened"
            ),
            Err(e) => warn!(
                charge_point_id = ctx.charge_point_id(),
                error = %e,
                "Failed to create alarm"
            ),
        }
    } else if req.connector_id > 0 {
        // Recovered: close out anything still open for this connector
        match ctx
            .storage
            .resolve_alarms_for_connector(ctx.charge_point_id(), req.connector_id, "system")
            .await
        {
            Ok(0) => {}
            Ok(n) => info!(
                charge_point_id = ctx.charge_point_id(),
                connector_id = req.connector_id,
                resolved = n,
                "Alarms auto-resolved"
            ),
            Err(e) => warn!(
                charge_point_id = ctx.charge_point_id(),
                error = %e,
                "Failed to resolve alarms"
            ),
        }
    }

    Ok(json!({}))
}

async fn cache_station_status(ctx: &HandlerContext, req: &StatusNotificationRequest) {
    let key = keys::charge_point_status(ctx.charge_point_id());
    let value = json!({
        "connectorId": req.connector_id,
        "status": req.status,
        "errorCode": req.error_code,
        "updatedAt": chrono::Utc::now(),
    });
    if let Err(e) = ctx.cache.set(&key, value, Some(keys::STATUS_TTL)).await {
        warn!(
            charge_point_id = ctx.charge_point_id(),
            error = %e,
            "Failed to cache status"
        );
    }
}
