//! Session engine: per-connection state, pending-call correlation, and the
//! process-wide registry with liveness sweeping.

pub mod pending;
pub mod registry;
pub mod session;

pub use pending::{CallError, PendingCalls};
pub use registry::{RegisterOutcome, SessionRegistry, SharedSessionRegistry};
pub use session::{
    Outbound, Session, CLOSE_CODE_INTERNAL, CLOSE_CODE_NORMAL, CLOSE_CODE_POLICY,
    CLOSE_CODE_SUPERSEDED,
};
