//! Session registry — process-wide map of active charge point sessions
//!
//! Guarantees at most one live session per charge point id: installing a
//! new session closes any previous one with close code 4000 (superseded).
//! A background sweeper enforces ping/pong liveness.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use super::session::{Session, CLOSE_CODE_NORMAL, CLOSE_CODE_SUPERSEDED};
use crate::support::shutdown::StopToken;

/// Outcome of installing a session for a charge point id.
#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// No previous session existed
    New,
    /// A previous session was closed with code 4000 and replaced
    Superseded,
}

/// Thread-safe registry of active OCPP sessions.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
}

/// Shared, reference-counted session registry
pub type SharedSessionRegistry = Arc<SessionRegistry>;

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Wrap in `Arc` for shared ownership
    pub fn shared() -> SharedSessionRegistry {
        Arc::new(Self::new())
    }

    /// Install a session, superseding any existing one for the same id.
    ///
    /// The old session's pending calls are failed and its socket is asked
    /// to close with code 4000 before the new session becomes visible.
    pub fn register(&self, session: Arc<Session>) -> RegisterOutcome {
        let id = session.charge_point_id.clone();
        let evicted = self.sessions.insert(id.clone(), session);

        metrics::gauge!("ocpp_connected_charge_points").set(self.sessions.len() as f64);

        match evicted {
            Some(old) => {
                warn!(
                    charge_point_id = id.as_str(),
                    connected_since = %old.connected_at,
                    "Superseding existing session, closing old connection"
                );
                old.close(CLOSE_CODE_SUPERSEDED, "superseded");
                RegisterOutcome::Superseded
            }
            None => {
                info!(charge_point_id = id.as_str(), "Registered charge point session");
                RegisterOutcome::New
            }
        }
    }

    /// Remove `session` from the registry, but only if it is still the
    /// registered one. A superseded connection's cleanup must not evict
    /// its replacement.
    pub fn remove_if_current(&self, session: &Arc<Session>) -> bool {
        let removed = self
            .sessions
            .remove_if(&session.charge_point_id, |_, current| {
                Arc::ptr_eq(current, session)
            })
            .is_some();
        if removed {
            metrics::gauge!("ocpp_connected_charge_points").set(self.sessions.len() as f64);
            info!(
                charge_point_id = session.charge_point_id.as_str(),
                "Unregistered charge point session"
            );
        }
        removed
    }

    pub fn get(&self, charge_point_id: &str) -> Option<Arc<Session>> {
        self.sessions.get(charge_point_id).map(|e| e.value().clone())
    }

    pub fn is_connected(&self, charge_point_id: &str) -> bool {
        self.sessions.contains_key(charge_point_id)
    }

    /// All connected charge point ids
    pub fn connected_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of active sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Close every session (server shutdown).
    pub fn close_all(&self, reason: &str) {
        for entry in self.sessions.iter() {
            entry.value().close(CLOSE_CODE_NORMAL, reason);
        }
    }

    /// Start the heartbeat sweeper.
    ///
    /// Each pass clears every session's liveness flag and sends a ping; a
    /// session that failed to flip the flag back (no pong, no traffic)
    /// since the previous pass is terminated. Two missed passes therefore
    /// bound detection at roughly twice the sweep interval.
    pub fn start_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        stop: StopToken,
    ) -> tokio::task::JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Heartbeat sweeper started");
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it so fresh sessions
            // get a full interval before their first probe.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        registry.sweep();
                    }
                    _ = stop.stopped() => {
                        info!("Heartbeat sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    fn sweep(&self) {
        for entry in self.sessions.iter() {
            let session = entry.value();
            if session.begin_liveness_probe() {
                if session.send_ping().is_err() {
                    warn!(
                        charge_point_id = session.charge_point_id.as_str(),
                        "Ping failed, writer gone"
                    );
                }
            } else {
                warn!(
                    charge_point_id = session.charge_point_id.as_str(),
                    last_seen = %session.last_seen(),
                    "No pong since previous sweep, terminating session"
                );
                session.close(CLOSE_CODE_NORMAL, "liveness timeout");
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
