//! Cache gateway contract and key layout
//!
//! The gateway mirrors the subset of Redis the core relies on. Keys and
//! TTLs are centralised in [`keys`] so handlers never build them ad hoc.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::DomainResult;

pub use memory::InMemoryCache;

/// Key/value cache with per-entry TTLs.
#[async_trait]
pub trait CacheGateway: Send + Sync {
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> DomainResult<()>;
    async fn get(&self, key: &str) -> DomainResult<Option<Value>>;
    async fn del(&self, key: &str) -> DomainResult<()>;
    async fn ping(&self) -> DomainResult<()>;
}

/// Cache key builders and TTL policy.
pub mod keys {
    use std::time::Duration;

    pub const INFO_TTL: Duration = Duration::from_secs(24 * 60 * 60);
    pub const CONNECTORS_TTL: Duration = Duration::from_secs(60 * 60);
    pub const STATUS_TTL: Duration = Duration::from_secs(60 * 60);
    pub const SNAPSHOT_TTL: Duration = Duration::from_secs(30);

    pub fn charge_point_info(id: &str) -> String {
        format!("chargepoint:{}:info", id)
    }

    pub fn charge_point_connectors(id: &str) -> String {
        format!("chargepoint:{}:connectors", id)
    }

    pub fn charge_point_status(id: &str) -> String {
        format!("chargepoint:{}:status", id)
    }

    pub fn all_charge_stations() -> &'static str {
        "chargeStations:all"
    }
}
