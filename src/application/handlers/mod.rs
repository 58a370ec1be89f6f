//! OCPP 1.6 inbound message dispatch
//!
//! Each action has its own handler module. Handlers return plain `Result`
//! values; conversion to wire CALLERROR happens only here, at the
//! dispatcher boundary. A handler failure (or panic) never takes down the
//! session: it is logged with the frame's message id and answered with an
//! `InternalError` CallError.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info, warn};

mod authorize;
mod boot_notification;
mod disconnect;
mod heartbeat;
mod meter_values;
mod start_transaction;
mod status_notification;
mod stop_transaction;

pub use disconnect::handle_disconnect;

use crate::application::coordinator::TransactionCoordinator;
use crate::application::session::Session;
use crate::application::telemetry::MeterPublisher;
use crate::domain::DomainError;
use crate::infrastructure::cache::{keys, CacheGateway};
use crate::infrastructure::storage::StorageGateway;
use crate::support::ocpp_frame::{extract_message_id, OcppFrame};

// ── Handler context ────────────────────────────────────────────

/// Everything a handler may touch, scoped to one charge point session.
pub struct HandlerContext {
    pub session: Arc<Session>,
    pub storage: Arc<dyn StorageGateway>,
    pub cache: Arc<dyn CacheGateway>,
    pub coordinator: Arc<TransactionCoordinator>,
    pub publisher: Arc<dyn MeterPublisher>,
    /// Interval handed to stations at boot (seconds)
    pub heartbeat_interval: u32,
}

impl HandlerContext {
    pub fn charge_point_id(&self) -> &str {
        &self.session.charge_point_id
    }

    /// Refresh the cached connector snapshot from the session's map.
    /// Cache failures are logged and swallowed.
    pub(crate) async fn refresh_connector_cache(&self) {
        let mut connectors: Vec<_> = self
            .session
            .connectors
            .iter()
            .map(|e| e.value().clone())
            .collect();
        connectors.sort_by_key(|c| c.connector_id);

        let key = keys::charge_point_connectors(self.charge_point_id());
        let value = match serde_json::to_value(&connectors) {
            Ok(v) => v,
            Err(e) => {
                warn!(
                    charge_point_id = self.charge_point_id(),
                    error = %e,
                    "Failed to serialize connector snapshot"
                );
                return;
            }
        };
        if let Err(e) = self.cache.set(&key, value, Some(keys::CONNECTORS_TTL)).await {
            warn!(
                charge_point_id = self.charge_point_id(),
                error = %e,
                "Failed to cache connector snapshot"
            );
        }
    }
}

// ── Handler errors ─────────────────────────────────────────────

/// Failures a handler can surface; mapped to wire CallError codes.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Formation(String),
    #[error("{0}")]
    PropertyConstraint(String),
    #[error("Unknown action: {0}")]
    NotSupported(String),
    #[error("{0}")]
    Internal(String),
}

impl HandlerError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Formation(_) => "FormationViolation",
            Self::PropertyConstraint(_) => "PropertyConstraintViolation",
            Self::NotSupported(_) => "NotSupported",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Wire description. Internal details stay in the logs; operators get
    /// a stable message.
    pub fn description(&self) -> String {
        match self {
            Self::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<DomainError> for HandlerError {
    fn from(e: DomainError) -> Self {
        Self::Internal(e.to_string())
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

// ── Dispatcher ─────────────────────────────────────────────────

/// Routes inbound frames for one session: CALLs to action handlers,
/// CALLRESULT / CALLERROR to the pending-call registry.
pub struct OcppDispatcher {
    ctx: HandlerContext,
}

impl OcppDispatcher {
    pub fn new(ctx: HandlerContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &HandlerContext {
        &self.ctx
    }

    /// Handle one inbound text frame. Returns the response frame for a
    /// CALL (exactly one per inbound CALL, same message id); `None` for
    /// correlation frames and for malformed input with no recoverable id.
    pub async fn handle(&self, text: &str) -> Option<String> {
        match OcppFrame::parse(text) {
            Ok(OcppFrame::Call {
                message_id,
                action,
                payload,
            }) => Some(self.handle_call(message_id, action, payload).await),
            Ok(OcppFrame::CallResult { message_id, payload }) => {
                self.ctx.session.resolve_call(&message_id, payload);
                None
            }
            Ok(OcppFrame::CallError {
                message_id,
                error_code,
                error_description,
                ..
            }) => {
                self.ctx
                    .session
                    .reject_call(&message_id, &error_code, &error_description);
                None
            }
            Err(e) => {
                warn!(
                    charge_point_id = self.ctx.charge_point_id(),
                    error = %e,
                    raw = text,
                    "Invalid OCPP frame"
                );
                // Answer with FormationViolation when the message id is
                // recoverable; otherwise drop the frame.
                extract_message_id(text).map(|id| {
                    OcppFrame::error_response(id, "FormationViolation", e.to_string()).serialize()
                })
            }
        }
    }

    async fn handle_call(&self, message_id: String, action: String, payload: Value) -> String {
        info!(
            charge_point_id = self.ctx.charge_point_id(),
            action = action.as_str(),
            message_id = message_id.as_str(),
            "Call received"
        );
        metrics::counter!("ocpp_calls_received", "action" => action.clone()).increment(1);

        let outcome = AssertUnwindSafe(route(&self.ctx, &action, &payload))
            .catch_unwind()
            .await;

        let frame = match outcome {
            Ok(Ok(response)) => OcppFrame::CallResult {
                message_id,
                payload: response,
            },
            Ok(Err(e)) => {
                warn!(
                    charge_point_id = self.ctx.charge_point_id(),
                    action = action.as_str(),
                    message_id = message_id.as_str(),
                    code = e.code(),
                    error = %e,
                    "Call failed"
                );
                OcppFrame::error_response(message_id, e.code(), e.description())
            }
            Err(_) => {
                error!(
                    charge_point_id = self.ctx.charge_point_id(),
                    action = action.as_str(),
                    message_id = message_id.as_str(),
                    "Handler panicked"
                );
                OcppFrame::error_response(message_id, "InternalError", "Internal server error")
            }
        };

        frame.serialize()
    }
}

/// Action-name routing table. Unknown actions are answered with an
/// explicit `NotSupported`; there is deliberately no catch-all handler.
async fn route(ctx: &HandlerContext, action: &str, payload: &Value) -> HandlerResult {
    match action {
        "BootNotification" => boot_notification::handle(ctx, payload).await,
        "Heartbeat" => heartbeat::handle(ctx, payload).await,
        "StatusNotification" => status_notification::handle(ctx, payload).await,
        "Authorize" => authorize::handle(ctx, payload).await,
        "StartTransaction" => start_transaction::handle(ctx, payload).await,
        "StopTransaction" => stop_transaction::handle(ctx, payload).await,
        "MeterValues" => meter_values::handle(ctx, payload).await,
        other => Err(HandlerError::NotSupported(other.to_string())),
    }
}
