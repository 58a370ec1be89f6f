//! WebSocket delivery: the charge-point-facing OCPP server.

pub mod server;

pub use server::{GatewayCore, OcppServer};
