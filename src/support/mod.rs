//! Cross-cutting utilities: OCPP-J framing and graceful shutdown.

pub mod ocpp_frame;
pub mod shutdown;

pub use ocpp_frame::{extract_message_id, OcppFrame, OcppFrameError};
pub use shutdown::{DrainGuard, GatewayShutdown, ShutdownHandle, StopToken};
