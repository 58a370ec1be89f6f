//! Heartbeat handler

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use super::{HandlerContext, HandlerError, HandlerResult};
use crate::domain::messages::HeartbeatResponse;

pub(super) async fn handle(ctx: &HandlerContext, _payload: &Value) -> HandlerResult {
    debug!(charge_point_id = ctx.charge_point_id(), "Heartbeat");

    let now = Utc::now();
    ctx.storage
        .set_charge_point_online(ctx.charge_point_id(), true, now)
        .await?;

    serde_json::to_value(HeartbeatResponse { current_time: now })
        .map_err(|e| HandlerError::Internal(format!("serialize Heartbeat response: {}", e)))
}
