//! Use-case layer: the session engine, inbound dispatch, CS→CP commands,
//! connector discovery, the transaction coordinator, and live telemetry
//! fan-out.

pub mod commands;
pub mod coordinator;
pub mod discovery;
pub mod handlers;
pub mod session;
pub mod telemetry;

pub use commands::{create_command_service, CommandService, SharedCommandService};
pub use coordinator::{PendingChargeSession, TransactionCoordinator};
pub use discovery::{discover_connectors, DiscoveryReport, DiscoveryTiming};
pub use handlers::{handle_disconnect, HandlerContext, OcppDispatcher};
pub use session::{
    CallError, RegisterOutcome, Session, SessionRegistry, SharedSessionRegistry,
};
pub use telemetry::{MeterFilter, MeterPublisher, MeterSample, MeterStreamHub};
