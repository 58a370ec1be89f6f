//! # Gridlink CSMS
//!
//! OCPP 1.6J central system gateway for EV charging stations.
//!
//! ## Architecture
//!
//! - **support**: Cross-cutting utilities (OCPP-J framing, shutdown)
//! - **domain**: Core business entities, wire payload types, errors
//! - **application**: Session engine, action handlers, CS→CP commands,
//!   connector discovery, transaction coordination, meter fan-out
//! - **infrastructure**: Storage and cache gateways with in-memory
//!   reference implementations
//! - **interfaces**: Delivery mechanisms (charge-point WebSocket server,
//!   operator REST/SSE API)
//! - **config**: Application configuration (TOML-based)

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod support;

// Re-export commonly used types at crate root
pub use application::{
    create_command_service, CommandService, MeterStreamHub, OcppDispatcher, SessionRegistry,
    TransactionCoordinator,
};
pub use config::{default_config_path, AppConfig};
pub use infrastructure::{CacheGateway, InMemoryCache, InMemoryStorage, StorageGateway};
pub use interfaces::http::create_api_router;
pub use interfaces::ws::{GatewayCore, OcppServer};
