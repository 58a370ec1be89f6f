//! Disconnect side effects
//!
//! Not an OCPP action: runs when a charge point's socket goes away and it
//! is still the registered session. Pending waiters are failed by
//! `Session::close` before this runs.

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::HandlerContext;
use crate::domain::ConnectorStatus;
use crate::infrastructure::cache::keys;

pub async fn handle_disconnect(ctx: &HandlerContext) {
    let now = Utc::now();
    let charge_point_id = ctx.charge_point_id();

    if let Err(e) = ctx
        .storage
        .set_charge_point_online(charge_point_id, false, now)
        .await
    {
        warn!(charge_point_id, error = %e, "Failed to mark charge point offline");
    }

    // Every known connector becomes Unavailable, in memory and durably
    for mut entry in ctx.session.connectors.iter_mut() {
        entry.status = ConnectorStatus::Unavailable;
        entry.last_updated = now;
    }
    let connector_ids = ctx.session.known_connector_ids();
    for connector_id in connector_ids {
        if let Err(e) = ctx
            .storage
            .set_connector_status(
                charge_point_id,
                connector_id,
                ConnectorStatus::Unavailable,
                None,
                None,
            )
            .await
        {
            warn!(
                charge_point_id,
                connector_id,
                error = %e,
                "Failed to mark connector unavailable"
            );
        }
    }

    let status_key = keys::charge_point_status(charge_point_id);
    let record = json!({
        "status": "unavailable",
        "disconnectedAt": now,
    });
    if let Err(e) = ctx.cache.set(&status_key, record, Some(keys::STATUS_TTL)).await {
        warn!(charge_point_id, error = %e, "Failed to cache disconnect status");
    }

    info!(
        charge_point_id,
        connectors = ctx.session.connectors.len(),
        "Disconnect side effects applied"
    );
}
