//! Connector discovery
//!
//! Works out how many connectors a charge point has and what state they
//! are in, combining `GetConfiguration("NumberOfConnectors")`, broadcast
//! and per-id `TriggerMessage(StatusNotification)`, `MeterValues`
//! triggers, and passive inference from traffic the session's reader loop
//! processes while discovery waits.
//!
//! The waits only bound how long the operator-facing call blocks; status
//! reports arriving later are still applied by the normal handler path.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use crate::application::commands::{get_configuration, trigger_message, CommandService};
use crate::application::session::CallError;
use crate::domain::messages::MessageTrigger;
use crate::domain::Connector;
use crate::infrastructure::storage::StorageGateway;

/// Discovery method tags reported in the metadata.
const METHOD_GET_CONFIGURATION: &str = "GetConfiguration";
const METHOD_PROBE_COMMON_IDS: &str = "probe_common_ids";
const METHOD_TRIGGER_BROADCAST: &str = "TriggerMessage";

/// Connector ids probed when a station reveals nothing about itself.
const COMMON_CONNECTOR_IDS: [u32; 4] = [1, 2, 3, 4];

/// Bounded waits between discovery steps.
#[derive(Debug, Clone)]
pub struct DiscoveryTiming {
    pub command_timeout: Duration,
    pub broadcast_wait: Duration,
    pub per_id_wait: Duration,
    pub meter_wait: Duration,
    pub probe_wait: Duration,
}

impl Default for DiscoveryTiming {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(5),
            broadcast_wait: Duration::from_secs(2),
            per_id_wait: Duration::from_secs(3),
            meter_wait: Duration::from_millis(1500),
            probe_wait: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryMetadata {
    pub total_connectors: u32,
    pub discovery_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configured_count: Option<u32>,
    pub discovered_count: u32,
    pub last_updated: chrono::DateTime<Utc>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub success: bool,
    pub connectors: Vec<Connector>,
    pub metadata: DiscoveryMetadata,
}

/// Run connector discovery against a connected charge point.
pub async fn discover_connectors(
    commands: &CommandService,
    storage: &Arc<dyn StorageGateway>,
    charge_point_id: &str,
    timing: &DiscoveryTiming,
) -> Result<DiscoveryReport, CallError> {
    let session = commands.session(charge_point_id)?;
    let mut errors: Vec<String> = Vec::new();
    let mut method = METHOD_TRIGGER_BROADCAST;
    let mut configured_count: Option<u32> = None;

    // ── 1. Ask the station how many connectors it believes it has ──
    match get_configuration(
        commands,
        charge_point_id,
        Some(vec!["NumberOfConnectors".to_string()]),
        Some(timing.command_timeout),
    )
    .await
    {
        Ok(result) => match result.value_of("NumberOfConnectors").map(str::parse::<u32>) {
            Some(Ok(count)) if count > 0 => {
                info!(charge_point_id, count, "NumberOfConnectors reported");
                method = METHOD_GET_CONFIGURATION;
                configured_count = Some(count);
                session.set_number_of_connectors(count);
                for connector_id in 1..=count {
                    let connector = session
                        .connectors
                        .entry(connector_id)
                        .or_insert_with(|| Connector::new(connector_id))
                        .clone();
                    if let Err(e) = storage.upsert_connector(charge_point_id, &connector).await {
                        errors.push(format!("persist connector {}: {}", connector_id, e));
                    }
                }
            }
            Some(Err(_)) | None => {
                errors.push("NumberOfConnectors missing or not a number".to_string());
            }
            Some(Ok(_)) => {
                errors.push("NumberOfConnectors reported as zero".to_string());
            }
        },
        Err(e) => {
            warn!(charge_point_id, error = %e, "GetConfiguration failed during discovery");
            errors.push(format!("GetConfiguration: {}", e));
        }
    }

    // ── 2. Broadcast status trigger ────────────────────────
    if let Err(e) = trigger_message(
        commands,
        charge_point_id,
        MessageTrigger::StatusNotification,
        None,
        Some(timing.command_timeout),
    )
    .await
    {
        errors.push(format!("TriggerMessage broadcast: {}", e));
    }
    tokio::time::sleep(timing.broadcast_wait).await;

    // ── 3. Per-id status triggers when the count is known ──
    if let Some(count) = configured_count {
        let triggers = (1..=count).map(|connector_id| {
            trigger_message(
                commands,
                charge_point_id,
                MessageTrigger::StatusNotification,
                Some(connector_id),
                Some(timing.command_timeout),
            )
        });
        for (connector_id, result) in (1..=count).zip(join_all(triggers).await) {
            if let Err(e) = result {
                errors.push(format!("status trigger connector {}: {}", connector_id, e));
            }
        }
        tokio::time::sleep(timing.per_id_wait).await;
    }

    // ── 4. Meter triggers for whatever is known by now ─────
    let known = session.known_connector_ids();
    if !known.is_empty() {
        let triggers = known.iter().map(|connector_id| {
            trigger_message(
                commands,
                charge_point_id,
                MessageTrigger::MeterValues,
                Some(*connector_id),
                Some(timing.command_timeout),
            )
        });
        for (connector_id, result) in known.iter().zip(join_all(triggers).await) {
            if let Err(e) = result {
                errors.push(format!("meter trigger connector {}: {}", connector_id, e));
            }
        }
        tokio::time::sleep(timing.meter_wait).await;
    }

    // ── 5. Last resort: probe the ids small stations use ───
    if session.connectors.is_empty() {
        info!(charge_point_id, "No connectors discovered yet, probing common ids");
        method = METHOD_PROBE_COMMON_IDS;
        let probes = COMMON_CONNECTOR_IDS.iter().map(|connector_id| {
            trigger_message(
                commands,
                charge_point_id,
                MessageTrigger::StatusNotification,
                Some(*connector_id),
                Some(timing.command_timeout),
            )
        });
        for (connector_id, result) in COMMON_CONNECTOR_IDS.iter().zip(join_all(probes).await) {
            if let Err(e) = result {
                errors.push(format!("probe connector {}: {}", connector_id, e));
            }
        }
        tokio::time::sleep(timing.probe_wait).await;
    }

    // ── 6. Report ──────────────────────────────────────────
    let mut connectors: Vec<Connector> =
        session.connectors.iter().map(|e| e.value().clone()).collect();
    connectors.sort_by_key(|c| c.connector_id);
    let discovered_count = connectors.len() as u32;

    if let Some(configured) = configured_count {
        if configured != discovered_count {
            // Recorded, not fatal: the station may report more sockets
            // than it answers status for (or the reverse)
            errors.push(format!(
                "configured count {} != discovered count {}",
                configured, discovered_count
            ));
        }
    }

    info!(
        charge_point_id,
        method,
        discovered = discovered_count,
        configured = configured_count,
        errors = errors.len(),
        "Connector discovery finished"
    );

    Ok(DiscoveryReport {
        success: discovered_count > 0,
        metadata: DiscoveryMetadata {
            total_connectors: configured_count.unwrap_or(discovered_count).max(discovered_count),
            discovery_method: method.to_string(),
            configured_count,
            discovered_count,
            last_updated: Utc::now(),
            errors,
        },
        connectors,
    })
}
