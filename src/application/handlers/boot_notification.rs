//! BootNotification handler

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use super::{HandlerContext, HandlerError, HandlerResult};
use crate::domain::messages::{
    BootNotificationRequest, BootNotificationResponse, RegistrationStatus,
};
use crate::domain::BootInfo;
use crate::infrastructure::cache::keys;

pub(super) async fn handle(ctx: &HandlerContext, payload: &Value) -> HandlerResult {
    let req: BootNotificationRequest = serde_json::from_value(payload.clone())
        .map_err(|e| HandlerError::Formation(format!("Invalid BootNotification: {}", e)))?;

    info!(
        charge_point_id = ctx.charge_point_id(),
        vendor = req.charge_point_vendor.as_str(),
        model = req.charge_point_model.as_str(),
        firmware = req.firmware_version.as_deref(),
        "BootNotification"
    );

    let info = BootInfo {
        vendor: req.charge_point_vendor,
        model: req.charge_point_model,
        serial_number: req
            .charge_point_serial_number
            .or(req.charge_box_serial_number),
        firmware_version: req.firmware_version,
        iccid: req.iccid,
        imsi: req.imsi,
        meter_type: req.meter_type,
        meter_serial_number: req.meter_serial_number,
    };

    let charge_point = ctx
        .storage
        .upsert_charge_point(ctx.charge_point_id(), &info)
        .await?;

    ctx.session.mark_boot_notification_sent();
    ctx.session.set_heartbeat_interval(ctx.heartbeat_interval);

    // Cache the boot metadata for the operator API
    match serde_json::to_value(&charge_point) {
        Ok(value) => {
            let key = keys::charge_point_info(ctx.charge_point_id());
            if let Err(e) = ctx.cache.set(&key, value, Some(keys::INFO_TTL)).await {
                warn!(
                    charge_point_id = ctx.charge_point_id(),
                    error = %e,
                    "Failed to cache charge point info"
                );
            }
        }
        Err(e) => warn!(
            charge_point_id = ctx.charge_point_id(),
            error = %e,
            "Failed to serialize charge point info"
        ),
    }

    let response = BootNotificationResponse {
        status: RegistrationStatus::Accepted,
        current_time: Utc::now(),
        interval: ctx.session.heartbeat_interval(),
    };
    serde_json::to_value(response)
        .map_err(|e| HandlerError::Internal(format!("serialize BootNotification response: {}", e)))
}
