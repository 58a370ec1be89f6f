//! Domain errors

use thiserror::Error;

/// Domain-level error types
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Charge point not found: {0}")]
    ChargePointNotFound(String),

    #[error("Connector {connector_id} not found on {charge_point_id}")]
    ConnectorNotFound {
        charge_point_id: String,
        connector_id: u32,
    },

    #[error("Transaction not found: {0}")]
    TransactionNotFound(i32),

    #[error("Connector already has active transaction {0}")]
    ConcurrentTransaction(i32),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(String),
}

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;
