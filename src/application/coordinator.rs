//! Transaction coordinator
//!
//! Owns everything that spans a transaction's lifetime but no single
//! handler: OCPP transaction id allocation, the live SoC map feeding
//! `stop_soc` attribution, and the pending charge-session context carried
//! from a RemoteStart to the eventual StartTransaction.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use rand::Rng;
use tracing::{debug, warn};

use crate::domain::{DomainError, DomainResult};
use crate::infrastructure::storage::StorageGateway;

/// Transaction ids are drawn uniformly from this range.
const TX_ID_MIN: i32 = 100_000;
const TX_ID_MAX: i32 = 999_999;

/// How many uniqueness collisions to tolerate before giving up. With a
/// six-digit space this only trips when storage is effectively full.
const TX_ID_MAX_ATTEMPTS: u32 = 32;

/// Operator-supplied context parked between RemoteStart and StartTransaction.
#[derive(Debug, Clone)]
pub struct PendingChargeSession {
    pub id_tag: String,
    pub vehicle_id: Option<String>,
    pub fleet_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct TransactionCoordinator {
    storage: Arc<dyn StorageGateway>,
    /// Latest observed SoC per active transaction
    last_soc: DashMap<i32, f64>,
    /// Keyed `"chargePointId:connectorId"`; entries expire after
    /// [`Self::pending_ttl`] so an unresponsive station cannot leak them.
    pending_sessions: DashMap<String, PendingChargeSession>,
    pending_ttl: Duration,
}

impl TransactionCoordinator {
    pub fn new(storage: Arc<dyn StorageGateway>) -> Self {
        Self {
            storage,
            last_soc: DashMap::new(),
            pending_sessions: DashMap::new(),
            pending_ttl: Duration::minutes(5),
        }
    }

    #[cfg(test)]
    fn with_pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = ttl;
        self
    }

    // ── Transaction id allocation ──────────────────────────

    /// Allocate a transaction id unique across all live and historical
    /// transactions. Drawn from a cryptographic RNG and re-drawn on
    /// collision with an existing row.
    pub async fn allocate_transaction_id(&self) -> DomainResult<i32> {
        for _ in 0..TX_ID_MAX_ATTEMPTS {
            let candidate = OsRng.gen_range(TX_ID_MIN..=TX_ID_MAX);
            if self.storage.get_transaction(candidate).await?.is_none() {
                return Ok(candidate);
            }
            debug!(candidate, "Transaction id collision, redrawing");
        }
        Err(DomainError::Storage(
            "could not allocate a unique transaction id".into(),
        ))
    }

    // ── SoC tracking ───────────────────────────────────────

    /// Record the latest SoC reading for a transaction and write the
    /// opening SoC if the row does not have one yet (write-once; the
    /// gateway re-reads the row before updating).
    pub async fn record_soc(&self, transaction_id: i32, soc: f64) {
        self.last_soc.insert(transaction_id, soc);
        if let Err(e) = self.storage.write_start_soc(transaction_id, soc).await {
            warn!(
                transaction_id,
                error = %e,
                "Failed to record start SoC"
            );
        }
    }

    /// Latest observed SoC, consulted by StopTransaction.
    pub fn last_soc(&self, transaction_id: i32) -> Option<f64> {
        self.last_soc.get(&transaction_id).map(|v| *v)
    }

    /// Forget per-transaction state once the transaction is closed.
    pub fn clear_transaction(&self, transaction_id: i32) {
        self.last_soc.remove(&transaction_id);
    }

    // ── Pending charge-session context ─────────────────────

    fn pending_key(charge_point_id: &str, connector_id: u32) -> String {
        format!("{}:{}", charge_point_id, connector_id)
    }

    /// Park operator context after an accepted RemoteStart.
    pub fn register_pending_session(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        context: PendingChargeSession,
    ) {
        self.prune_expired_pending();
        self.pending_sessions
            .insert(Self::pending_key(charge_point_id, connector_id), context);
    }

    /// Consume parked context when the station's StartTransaction arrives.
    /// Expired entries are treated as absent.
    pub fn take_pending_session(
        &self,
        charge_point_id: &str,
        connector_id: u32,
    ) -> Option<PendingChargeSession> {
        let (_, ctx) = self
            .pending_sessions
            .remove(&Self::pending_key(charge_point_id, connector_id))?;
        if Utc::now().signed_duration_since(ctx.created_at) > self.pending_ttl {
            debug!(
                charge_point_id,
                connector_id, "Pending charge session expired, discarding"
            );
            return None;
        }
        Some(ctx)
    }

    fn prune_expired_pending(&self) {
        let ttl = self.pending_ttl;
        let now = Utc::now();
        self.pending_sessions
            .retain(|_, ctx| now.signed_duration_since(ctx.created_at) <= ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransactionDraft;
    use crate::infrastructure::storage::InMemoryStorage;
    use rust_decimal::Decimal;

    fn coordinator() -> (Arc<InMemoryStorage>, TransactionCoordinator) {
        let storage = Arc::new(InMemoryStorage::new());
        let coordinator = TransactionCoordinator::new(storage.clone());
        (storage, coordinator)
    }

    fn draft(tx_id: i32) -> TransactionDraft {
        TransactionDraft {
            transaction_id: tx_id,
            charge_point_id: "CP001".into(),
            connector_id: 1,
            id_tag: Some("RFID001".into()),
            vehicle_id: None,
            fleet_id: None,
            meter_start: Decimal::from(0),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn allocated_ids_are_in_range_and_unique() {
        let (storage, coordinator) = coordinator();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let id = coordinator.allocate_transaction_id().await.unwrap();
            assert!((TX_ID_MIN..=TX_ID_MAX).contains(&id));
            assert!(seen.insert(id), "id {} allocated twice", id);
            storage.create_transaction(draft(id)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn record_soc_tracks_latest_and_writes_start_once() {
        let (storage, coordinator) = coordinator();
        storage.create_transaction(draft(500_000)).await.unwrap();

        coordinator.record_soc(500_000, 21.0).await;
        coordinator.record_soc(500_000, 48.5).await;

        assert_eq!(coordinator.last_soc(500_000), Some(48.5));
        let tx = storage.get_transaction(500_000).await.unwrap().unwrap();
        assert_eq!(tx.start_soc, Some(21.0));

        coordinator.clear_transaction(500_000);
        assert_eq!(coordinator.last_soc(500_000), None);
    }

    #[tokio::test]
    async fn pending_session_roundtrip() {
        let (_, coordinator) = coordinator();

        coordinator.register_pending_session(
            "CP001",
            1,
            PendingChargeSession {
                id_tag: "RFID001".into(),
                vehicle_id: Some("veh-7".into()),
                fleet_id: None,
                created_at: Utc::now(),
            },
        );

        let ctx = coordinator.take_pending_session("CP001", 1).unwrap();
        assert_eq!(ctx.vehicle_id.as_deref(), Some("veh-7"));

        // Consumed: a second take finds nothing
        assert!(coordinator.take_pending_session("CP001", 1).is_none());
    }

    #[tokio::test]
    async fn expired_pending_session_is_discarded() {
        let storage = Arc::new(InMemoryStorage::new());
        let coordinator =
            TransactionCoordinator::new(storage).with_pending_ttl(Duration::milliseconds(0));

        coordinator.register_pending_session(
            "CP001",
            1,
            PendingChargeSession {
                id_tag: "RFID001".into(),
                vehicle_id: None,
                fleet_id: None,
                created_at: Utc::now() - Duration::seconds(1),
            },
        );

        assert!(coordinator.take_pending_session("CP001", 1).is_none());
    }
}
