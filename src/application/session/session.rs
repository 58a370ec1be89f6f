//! Per-charge-point session state
//!
//! A `Session` owns everything tied to one WebSocket connection: the
//! outbound sink, liveness flags, the in-memory connector map, and the
//! pending-call registry. Inbound frames for a session are processed
//! serially by its connection task, so connector mutations need no
//! cross-task coordination beyond the maps themselves.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::pending::{CallError, PendingCalls};
use crate::domain::Connector;
use crate::support::ocpp_frame::OcppFrame;

/// WebSocket close code used when a newer connection supersedes this one.
pub const CLOSE_CODE_SUPERSEDED: u16 = 4000;
/// Policy violation (e.g. missing charge point id in the URL path).
pub const CLOSE_CODE_POLICY: u16 = 1008;
/// Normal closure.
pub const CLOSE_CODE_NORMAL: u16 = 1000;
/// Unexpected server-side failure.
pub const CLOSE_CODE_INTERNAL: u16 = 1011;

/// Messages travelling from session logic to the socket writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Ping,
    Close { code: u16, reason: String },
}

/// Live state for one connected charge point.
pub struct Session {
    pub charge_point_id: String,
    sender: mpsc::UnboundedSender<Outbound>,
    pub connected_at: DateTime<Utc>,
    last_seen: RwLock<DateTime<Utc>>,
    is_alive: AtomicBool,
    boot_notification_sent: AtomicBool,
    /// Heartbeat interval handed to the station at boot (seconds)
    heartbeat_interval: AtomicU32,
    /// Reported by GetConfiguration("NumberOfConnectors"); 0 = unknown
    number_of_connectors: AtomicU32,
    /// Connector state held in memory, written through to storage
    pub connectors: DashMap<u32, Connector>,
    pending: PendingCalls,
    call_timeout: Duration,
}

impl Session {
    pub fn new(
        charge_point_id: impl Into<String>,
        sender: mpsc::UnboundedSender<Outbound>,
        heartbeat_interval: u32,
        call_timeout: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            charge_point_id: charge_point_id.into(),
            sender,
            connected_at: now,
            last_seen: RwLock::new(now),
            is_alive: AtomicBool::new(true),
            boot_notification_sent: AtomicBool::new(false),
            heartbeat_interval: AtomicU32::new(heartbeat_interval),
            number_of_connectors: AtomicU32::new(0),
            connectors: DashMap::new(),
            pending: PendingCalls::new(),
            call_timeout,
        }
    }

    // ── Outbound path ──────────────────────────────────────

    fn send_outbound(&self, msg: Outbound) -> Result<(), CallError> {
        self.sender
            .send(msg)
            .map_err(|e| CallError::SendFailed(e.to_string()))
    }

    /// Write a raw text frame to the socket.
    pub fn send_text(&self, text: String) -> Result<(), CallError> {
        self.send_outbound(Outbound::Text(text))
    }

    /// Queue a WebSocket ping (liveness probe).
    pub fn send_ping(&self) -> Result<(), CallError> {
        self.send_outbound(Outbound::Ping)
    }

    /// Emit a CALL and await the matching CALLRESULT / CALLERROR.
    ///
    /// Resolves with the response payload, or fails on CALLERROR, timeout,
    /// or connection teardown. The charge point answering after the timeout
    /// is a no-op: no waiter matches and the response is dropped.
    pub async fn call(
        &self,
        action: &str,
        payload: Value,
        timeout: Option<Duration>,
    ) -> Result<Value, CallError> {
        let message_id = Uuid::new_v4().to_string();
        let rx = self.pending.register(&message_id, action);

        let frame = OcppFrame::Call {
            message_id: message_id.clone(),
            action: action.to_string(),
            payload,
        };

        debug!(
            charge_point_id = self.charge_point_id.as_str(),
            action,
            message_id = message_id.as_str(),
            "Sending command"
        );

        if let Err(e) = self.send_text(frame.serialize()) {
            self.pending.discard(&message_id);
            return Err(e);
        }

        let wait = timeout.unwrap_or(self.call_timeout);
        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Waiter sender dropped without a verdict
                self.pending.discard(&message_id);
                Err(CallError::InvalidResponse("response channel closed".into()))
            }
            Err(_) => {
                self.pending.discard(&message_id);
                metrics::counter!("ocpp_command_timeouts").increment(1);
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    action,
                    message_id = message_id.as_str(),
                    timeout_secs = wait.as_secs(),
                    "Command timed out"
                );
                Err(CallError::Timeout {
                    action: action.to_string(),
                })
            }
        }
    }

    // ── Inbound correlation ────────────────────────────────

    /// Route a CALLRESULT payload to its waiter.
    pub fn resolve_call(&self, message_id: &str, payload: Value) {
        if self.pending.resolve(message_id, payload).is_none() {
            warn!(
                charge_point_id = self.charge_point_id.as_str(),
                message_id, "CallResult for unknown or timed-out call, dropping"
            );
        }
    }

    /// Route a CALLERROR to its waiter.
    pub fn reject_call(&self, message_id: &str, code: &str, description: &str) {
        let error = CallError::Remote {
            code: code.to_string(),
            description: description.to_string(),
        };
        if self.pending.reject(message_id, error).is_none() {
            warn!(
                charge_point_id = self.charge_point_id.as_str(),
                message_id, code, "CallError for unknown or timed-out call, dropping"
            );
        }
    }

    // ── Lifecycle ──────────────────────────────────────────

    /// Fail every pending call and ask the writer to close the socket.
    pub fn close(&self, code: u16, reason: &str) {
        self.pending.fail_all(&self.charge_point_id);
        let _ = self.send_outbound(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }

    /// Record activity from the station.
    pub fn touch(&self) {
        if let Ok(mut seen) = self.last_seen.write() {
            *seen = Utc::now();
        }
        self.is_alive.store(true, Ordering::SeqCst);
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen.read().map(|s| *s).unwrap_or(self.connected_at)
    }

    /// Sweep step: clears the liveness flag and reports whether the session
    /// had shown life since the previous sweep.
    pub fn begin_liveness_probe(&self) -> bool {
        self.is_alive.swap(false, Ordering::SeqCst)
    }

    pub fn pong_received(&self) {
        self.is_alive.store(true, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive.load(Ordering::SeqCst)
    }

    pub fn mark_boot_notification_sent(&self) {
        self.boot_notification_sent.store(true, Ordering::SeqCst);
    }

    pub fn boot_notification_sent(&self) -> bool {
        self.boot_notification_sent.load(Ordering::SeqCst)
    }

    pub fn set_heartbeat_interval(&self, seconds: u32) {
        self.heartbeat_interval.store(seconds, Ordering::SeqCst);
    }

    pub fn heartbeat_interval(&self) -> u32 {
        self.heartbeat_interval.load(Ordering::SeqCst)
    }

    pub fn set_number_of_connectors(&self, count: u32) {
        self.number_of_connectors.store(count, Ordering::SeqCst);
    }

    pub fn number_of_connectors(&self) -> Option<u32> {
        match self.number_of_connectors.load(Ordering::SeqCst) {
            0 => None,
            n => Some(n),
        }
    }

    /// Known connector ids, ascending (excludes the station-level id 0).
    pub fn known_connector_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.connectors.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn session_with_channel() -> (Arc<Session>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session::new(
            "CP001",
            tx,
            300,
            Duration::from_millis(200),
        ));
        (session, rx)
    }

    #[tokio::test]
    async fn call_resolves_on_call_result() {
        let (session, mut rx) = session_with_channel();

        // Echo task: parse the outbound CALL and feed back a CALLRESULT
        let responder = session.clone();
        tokio::spawn(async move {
            if let Some(Outbound::Text(text)) = rx.recv().await {
                let frame = OcppFrame::parse(&text).unwrap();
                responder.resolve_call(frame.message_id(), json!({"status": "Accepted"}));
            }
        });

        let payload = session
            .call("Reset", json!({"type": "Soft"}), None)
            .await
            .unwrap();
        assert_eq!(payload["status"], "Accepted");
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn call_rejects_on_call_error() {
        let (session, mut rx) = session_with_channel();

        let responder = session.clone();
        tokio::spawn(async move {
            if let Some(Outbound::Text(text)) = rx.recv().await {
                let frame = OcppFrame::parse(&text).unwrap();
                responder.reject_call(frame.message_id(), "NotSupported", "no reset here");
            }
        });

        let err = session
            .call("Reset", json!({"type": "Hard"}), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Remote { ref code, .. } if code == "NotSupported"));
    }

    #[tokio::test]
    async fn call_times_out_and_drops_late_response() {
        let (session, mut rx) = session_with_channel();

        let err = session
            .call("Reset", json!({"type": "Soft"}), Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Timeout { .. }));
        assert_eq!(session.pending_count(), 0);

        // A late CALLRESULT no longer matches a waiter
        if let Some(Outbound::Text(text)) = rx.recv().await {
            let frame = OcppFrame::parse(&text).unwrap();
            session.resolve_call(frame.message_id(), json!({}));
        }
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn close_fails_pending_and_sends_close_frame() {
        let (session, mut rx) = session_with_channel();

        let call = {
            let session = session.clone();
            tokio::spawn(async move { session.call("Reset", json!({}), None).await })
        };

        // Wait until the CALL is on the wire, then close
        let _ = rx.recv().await;
        session.close(CLOSE_CODE_SUPERSEDED, "superseded");

        let result = call.await.unwrap();
        assert!(matches!(result, Err(CallError::ConnectionClosed)));

        match rx.recv().await {
            Some(Outbound::Close { code, .. }) => assert_eq!(code, CLOSE_CODE_SUPERSEDED),
            other => panic!("expected close frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn liveness_probe_cycle() {
        let (session, _rx) = session_with_channel();
        assert!(session.begin_liveness_probe()); // was alive
        assert!(!session.is_alive());
        session.pong_received();
        assert!(session.begin_liveness_probe());
        // No pong this round: second probe sees a dead session
        assert!(!session.begin_liveness_probe());
    }

    #[tokio::test]
    async fn number_of_connectors_zero_means_unknown() {
        let (session, _rx) = session_with_channel();
        assert_eq!(session.number_of_connectors(), None);
        session.set_number_of_connectors(2);
        assert_eq!(session.number_of_connectors(), Some(2));
    }
}
