//! Delivery mechanisms: charge-point WebSocket server and operator HTTP API.

pub mod http;
pub mod ws;
