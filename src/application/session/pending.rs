//! Pending-call registry
//!
//! Correlates outbound CALL message ids with their eventual CALLRESULT /
//! CALLERROR. Each waiter resolves exactly once; session teardown rejects
//! everything still outstanding.

use dashmap::DashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::warn;

/// Errors surfaced to the task awaiting a CALL response.
#[derive(Debug, Clone, Error)]
pub enum CallError {
    #[error("Charge point not connected: {0}")]
    NotConnected(String),
    #[error("Failed to send: {0}")]
    SendFailed(String),
    #[error("Response timeout for {action}")]
    Timeout { action: String },
    #[error("CallError {code}: {description}")]
    Remote { code: String, description: String },
    #[error("Connection closed")]
    ConnectionClosed,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

struct Waiter {
    action: String,
    sender: oneshot::Sender<Result<Value, CallError>>,
}

/// Per-session map of in-flight CALLs.
pub struct PendingCalls {
    waiters: DashMap<String, Waiter>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self {
            waiters: DashMap::new(),
        }
    }

    /// Arm a waiter for `message_id`. The returned receiver yields the
    /// response payload or the failure; the caller owns the timeout.
    pub fn register(
        &self,
        message_id: &str,
        action: &str,
    ) -> oneshot::Receiver<Result<Value, CallError>> {
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(
            message_id.to_string(),
            Waiter {
                action: action.to_string(),
                sender: tx,
            },
        );
        rx
    }

    /// Deliver a CALLRESULT payload. Returns the action name when a waiter
    /// matched; a `None` means the response arrived late and is dropped.
    pub fn resolve(&self, message_id: &str, payload: Value) -> Option<String> {
        match self.waiters.remove(message_id) {
            Some((_, waiter)) => {
                let _ = waiter.sender.send(Ok(payload));
                Some(waiter.action)
            }
            None => None,
        }
    }

    /// Deliver a CALLERROR. Returns the action name when a waiter matched.
    pub fn reject(&self, message_id: &str, error: CallError) -> Option<String> {
        match self.waiters.remove(message_id) {
            Some((_, waiter)) => {
                let _ = waiter.sender.send(Err(error));
                Some(waiter.action)
            }
            None => None,
        }
    }

    /// Drop a waiter without delivering anything (send failure, timeout).
    pub fn discard(&self, message_id: &str) {
        self.waiters.remove(message_id);
    }

    /// Reject every outstanding waiter. Called on session teardown.
    pub fn fail_all(&self, charge_point_id: &str) {
        let ids: Vec<String> = self.waiters.iter().map(|e| e.key().clone()).collect();
        if !ids.is_empty() {
            warn!(
                charge_point_id,
                pending = ids.len(),
                "Failing pending calls on session close"
            );
        }
        for id in ids {
            if let Some((_, waiter)) = self.waiters.remove(&id) {
                let _ = waiter.sender.send(Err(CallError::ConnectionClosed));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

impl Default for PendingCalls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn resolve_delivers_payload_once() {
        let pending = PendingCalls::new();
        let rx = pending.register("m1", "Reset");

        assert_eq!(pending.resolve("m1", json!({"status": "Accepted"})).as_deref(), Some("Reset"));
        // Second delivery finds no waiter
        assert_eq!(pending.resolve("m1", json!({})), None);

        let payload = rx.await.unwrap().unwrap();
        assert_eq!(payload["status"], "Accepted");
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn reject_delivers_error() {
        let pending = PendingCalls::new();
        let rx = pending.register("m2", "UnlockConnector");

        pending.reject(
            "m2",
            CallError::Remote {
                code: "NotSupported".into(),
                description: "nope".into(),
            },
        );

        match rx.await.unwrap() {
            Err(CallError::Remote { code, .. }) => assert_eq!(code, "NotSupported"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn fail_all_rejects_every_waiter() {
        let pending = PendingCalls::new();
        let rx1 = pending.register("a", "Reset");
        let rx2 = pending.register("b", "TriggerMessage");

        pending.fail_all("CP001");

        assert!(matches!(rx1.await.unwrap(), Err(CallError::ConnectionClosed)));
        assert!(matches!(rx2.await.unwrap(), Err(CallError::ConnectionClosed)));
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn late_response_is_dropped() {
        let pending = PendingCalls::new();
        let rx = pending.register("m3", "Reset");
        pending.discard("m3");
        drop(rx);

        // The charge point answers after the timeout discarded the waiter
        assert_eq!(pending.resolve("m3", json!({})), None);
    }
}
