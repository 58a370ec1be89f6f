//! Storage gateway contract
//!
//! The core never touches a database directly; everything durable goes
//! through this trait. Implementations must be safe for concurrent use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    Alarm, AlarmDraft, BootInfo, ChargePoint, Connector, ConnectorStatus, DomainResult,
    MeterValueBatch, StopReason, Transaction, TransactionDraft,
};
use crate::domain::messages::IdTagInfo;

/// Persistence operations required by the session engine and handlers.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    // ── Charge points ──────────────────────────────────────

    /// Create the charge point if unknown, otherwise merge boot metadata.
    async fn upsert_charge_point(&self, id: &str, info: &BootInfo) -> DomainResult<ChargePoint>;

    async fn set_charge_point_online(
        &self,
        id: &str,
        online: bool,
        at: DateTime<Utc>,
    ) -> DomainResult<()>;

    async fn get_charge_point(&self, id: &str) -> DomainResult<Option<ChargePoint>>;

    async fn list_charge_points(&self) -> DomainResult<Vec<ChargePoint>>;

    // ── Connectors ─────────────────────────────────────────

    async fn upsert_connector(
        &self,
        charge_point_id: &str,
        connector: &Connector,
    ) -> DomainResult<()>;

    async fn set_connector_status(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        status: ConnectorStatus,
        error_code: Option<&str>,
        vendor_error_code: Option<&str>,
    ) -> DomainResult<()>;

    async fn list_connectors(&self, charge_point_id: &str) -> DomainResult<Vec<Connector>>;

    // ── Transactions ───────────────────────────────────────

    async fn create_transaction(&self, draft: TransactionDraft) -> DomainResult<Transaction>;

    async fn stop_transaction(
        &self,
        transaction_id: i32,
        meter_stop: Decimal,
        at: DateTime<Utc>,
        reason: StopReason,
        stop_soc: Option<f64>,
    ) -> DomainResult<Transaction>;

    /// Record the opening state-of-charge. No-op when already set, so a
    /// duplicated MeterValues request cannot overwrite the first reading.
    async fn write_start_soc(&self, transaction_id: i32, soc: f64) -> DomainResult<()>;

    async fn get_transaction(&self, transaction_id: i32) -> DomainResult<Option<Transaction>>;

    async fn list_transactions(&self, charge_point_id: Option<&str>)
        -> DomainResult<Vec<Transaction>>;

    // ── Meter values ───────────────────────────────────────

    async fn save_meter_values(&self, batch: MeterValueBatch) -> DomainResult<()>;

    // ── Authorization ──────────────────────────────────────

    /// Validate an idTag; unknown tags come back as `Invalid`.
    async fn validate_id_tag(&self, id_tag: &str) -> DomainResult<IdTagInfo>;

    // ── Alarms ─────────────────────────────────────────────

    async fn create_alarm(&self, draft: AlarmDraft) -> DomainResult<Alarm>;

    async fn resolve_alarm(&self, alarm_id: i64, resolved_by: &str) -> DomainResult<()>;

    /// Resolve every open alarm for a `(charge point, connector)` pair.
    /// Returns how many were resolved.
    async fn resolve_alarms_for_connector(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        resolved_by: &str,
    ) -> DomainResult<u32>;

    // ── Health ─────────────────────────────────────────────

    async fn ping(&self) -> DomainResult<()>;
}
