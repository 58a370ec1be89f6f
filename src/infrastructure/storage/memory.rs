//! In-memory storage gateway for development and tests

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;

use super::StorageGateway;
use crate::domain::messages::IdTagInfo;
use crate::domain::{
    Alarm, AlarmDraft, BootInfo, ChargePoint, Connector, ConnectorStatus, DomainError,
    DomainResult, IdTag, IdTagStatus, MeterValueBatch, StopReason, Transaction, TransactionDraft,
};

/// In-memory storage backed by `DashMap`s.
pub struct InMemoryStorage {
    charge_points: DashMap<String, ChargePoint>,
    connectors: DashMap<(String, u32), Connector>,
    /// Keyed by the OCPP transaction id (unique by construction)
    transactions: DashMap<i32, Transaction>,
    meter_values: Mutex<Vec<MeterValueBatch>>,
    id_tags: DashMap<String, IdTag>,
    alarms: DashMap<i64, Alarm>,
    row_counter: AtomicI64,
    alarm_counter: AtomicI64,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        let storage = Self {
            charge_points: DashMap::new(),
            connectors: DashMap::new(),
            transactions: DashMap::new(),
            meter_values: Mutex::new(Vec::new()),
            id_tags: DashMap::new(),
            alarms: DashMap::new(),
            row_counter: AtomicI64::new(1),
            alarm_counter: AtomicI64::new(1),
        };

        // Default tags so a fresh instance can authorize test stations
        storage.seed_id_tag(IdTag::new("RFID001"));
        storage.seed_id_tag(IdTag::new("TEST001"));
        storage.seed_id_tag(IdTag::new("TEST002"));
        let mut blocked = IdTag::new("BLOCKED001");
        blocked.status = IdTagStatus::Blocked;
        storage.seed_id_tag(blocked);
        let mut expired = IdTag::new("EXPIRED001");
        expired.expiry_date = Some(Utc::now() - Duration::days(1));
        storage.seed_id_tag(expired);

        storage
    }

    pub fn seed_id_tag(&self, tag: IdTag) {
        self.id_tags.insert(tag.id_tag.clone(), tag);
    }

    /// Number of persisted meter value batches (test helper).
    pub fn meter_batch_count(&self) -> usize {
        self.meter_values.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn open_alarms(&self, charge_point_id: &str) -> Vec<Alarm> {
        self.alarms
            .iter()
            .filter(|a| a.charge_point_id == charge_point_id && !a.resolved)
            .map(|a| a.clone())
            .collect()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageGateway for InMemoryStorage {
    async fn upsert_charge_point(&self, id: &str, info: &BootInfo) -> DomainResult<ChargePoint> {
        let mut entry = self
            .charge_points
            .entry(id.to_string())
            .or_insert_with(|| ChargePoint::new(id));
        entry.apply_boot_info(info);
        Ok(entry.clone())
    }

    async fn set_charge_point_online(
        &self,
        id: &str,
        online: bool,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let mut entry = self
            .charge_points
            .entry(id.to_string())
            .or_insert_with(|| ChargePoint::new(id));
        entry.is_online = online;
        entry.last_seen = at;
        Ok(())
    }

    async fn get_charge_point(&self, id: &str) -> DomainResult<Option<ChargePoint>> {
        Ok(self.charge_points.get(id).map(|cp| cp.clone()))
    }

    async fn list_charge_points(&self) -> DomainResult<Vec<ChargePoint>> {
        Ok(self.charge_points.iter().map(|e| e.value().clone()).collect())
    }

    async fn upsert_connector(
        &self,
        charge_point_id: &str,
        connector: &Connector,
    ) -> DomainResult<()> {
        self.connectors.insert(
            (charge_point_id.to_string(), connector.connector_id),
            connector.clone(),
        );
        Ok(())
    }

    async fn set_connector_status(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        status: ConnectorStatus,
        error_code: Option<&str>,
        vendor_error_code: Option<&str>,
    ) -> DomainResult<()> {
        let mut entry = self
            .connectors
            .entry((charge_point_id.to_string(), connector_id))
            .or_insert_with(|| Connector::new(connector_id));
        let info = entry.info.clone();
        entry.set_status(
            status,
            error_code.map(String::from),
            vendor_error_code.map(String::from),
            info,
        );
        Ok(())
    }

    async fn list_connectors(&self, charge_point_id: &str) -> DomainResult<Vec<Connector>> {
        let mut out: Vec<Connector> = self
            .connectors
            .iter()
            .filter(|e| e.key().0 == charge_point_id)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|c| c.connector_id);
        Ok(out)
    }

    async fn create_transaction(&self, draft: TransactionDraft) -> DomainResult<Transaction> {
        if self.transactions.contains_key(&draft.transaction_id) {
            return Err(DomainError::Storage(format!(
                "transaction id {} already exists",
                draft.transaction_id
            )));
        }

        let tx = Transaction {
            id: self.row_counter.fetch_add(1, Ordering::SeqCst),
            transaction_id: draft.transaction_id,
            charge_point_id: draft.charge_point_id,
            connector_id: draft.connector_id,
            id_tag: draft.id_tag,
            vehicle_id: draft.vehicle_id,
            fleet_id: draft.fleet_id,
            meter_start: draft.meter_start,
            meter_stop: None,
            started_at: draft.started_at,
            stopped_at: None,
            stop_reason: None,
            start_soc: None,
            stop_soc: None,
        };
        self.transactions.insert(tx.transaction_id, tx.clone());
        Ok(tx)
    }

    async fn stop_transaction(
        &self,
        transaction_id: i32,
        meter_stop: Decimal,
        at: DateTime<Utc>,
        reason: StopReason,
        stop_soc: Option<f64>,
    ) -> DomainResult<Transaction> {
        let mut tx = self
            .transactions
            .get_mut(&transaction_id)
            .ok_or(DomainError::TransactionNotFound(transaction_id))?;
        tx.meter_stop = Some(meter_stop);
        tx.stopped_at = Some(at);
        tx.stop_reason = Some(reason);
        if stop_soc.is_some() {
            tx.stop_soc = stop_soc;
        }
        Ok(tx.clone())
    }

    async fn write_start_soc(&self, transaction_id: i32, soc: f64) -> DomainResult<()> {
        let mut tx = self
            .transactions
            .get_mut(&transaction_id)
            .ok_or(DomainError::TransactionNotFound(transaction_id))?;
        // Write-once: the first reading wins
        if tx.start_soc.is_none() {
            tx.start_soc = Some(soc);
        }
        Ok(())
    }

    async fn get_transaction(&self, transaction_id: i32) -> DomainResult<Option<Transaction>> {
        Ok(self.transactions.get(&transaction_id).map(|t| t.clone()))
    }

    async fn list_transactions(
        &self,
        charge_point_id: Option<&str>,
    ) -> DomainResult<Vec<Transaction>> {
        let mut out: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| charge_point_id.map_or(true, |id| t.charge_point_id == id))
            .map(|t| t.clone())
            .collect();
        out.sort_by_key(|t| t.id);
        Ok(out)
    }

    async fn save_meter_values(&self, batch: MeterValueBatch) -> DomainResult<()> {
        self.meter_values
            .lock()
            .map_err(|_| DomainError::Storage("meter value store poisoned".into()))?
            .push(batch);
        Ok(())
    }

    async fn validate_id_tag(&self, id_tag: &str) -> DomainResult<IdTagInfo> {
        match self.id_tags.get(id_tag) {
            Some(tag) => Ok(IdTagInfo {
                status: tag.effective_status(Utc::now()),
                expiry_date: tag.expiry_date,
                parent_id_tag: tag.parent_id_tag.clone(),
            }),
            None => Ok(IdTagInfo::with_status(IdTagStatus::Invalid)),
        }
    }

    async fn create_alarm(&self, draft: AlarmDraft) -> DomainResult<Alarm> {
        let alarm = Alarm {
            id: self.alarm_counter.fetch_add(1, Ordering::SeqCst),
            charge_point_id: draft.charge_point_id,
            connector_id: draft.connector_id,
            alarm_type: draft.alarm_type,
            severity: draft.severity,
            message: draft.message,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
            created_at: Utc::now(),
        };
        self.alarms.insert(alarm.id, alarm.clone());
        Ok(alarm)
    }

    async fn resolve_alarm(&self, alarm_id: i64, resolved_by: &str) -> DomainResult<()> {
        let mut alarm = self
            .alarms
            .get_mut(&alarm_id)
            .ok_or(DomainError::Storage(format!("alarm {} not found", alarm_id)))?;
        alarm.resolved = true;
        alarm.resolved_at = Some(Utc::now());
        alarm.resolved_by = Some(resolved_by.to_string());
        Ok(())
    }

    async fn resolve_alarms_for_connector(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        resolved_by: &str,
    ) -> DomainResult<u32> {
        let mut resolved = 0;
        for mut alarm in self.alarms.iter_mut() {
            if alarm.charge_point_id == charge_point_id
                && alarm.connector_id == Some(connector_id)
                && !alarm.resolved
            {
                alarm.resolved = true;
                alarm.resolved_at = Some(Utc::now());
                alarm.resolved_by = Some(resolved_by.to_string());
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    async fn ping(&self) -> DomainResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_info() -> BootInfo {
        BootInfo {
            vendor: "Vendor".into(),
            model: "Model".into(),
            serial_number: None,
            firmware_version: None,
            iccid: None,
            imsi: None,
            meter_type: None,
            meter_serial_number: None,
        }
    }

    fn draft(tx_id: i32) -> TransactionDraft {
        TransactionDraft {
            transaction_id: tx_id,
            charge_point_id: "CP001".into(),
            connector_id: 1,
            id_tag: Some("RFID001".into()),
            vehicle_id: None,
            fleet_id: None,
            meter_start: Decimal::from(1000),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_charge_point_is_idempotent() {
        let storage = InMemoryStorage::new();
        storage.upsert_charge_point("CP001", &boot_info()).await.unwrap();
        let cp = storage.upsert_charge_point("CP001", &boot_info()).await.unwrap();
        assert!(cp.is_online);
        assert_eq!(storage.list_charge_points().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_transaction_id_rejected() {
        let storage = InMemoryStorage::new();
        storage.create_transaction(draft(111_111)).await.unwrap();
        assert!(storage.create_transaction(draft(111_111)).await.is_err());
    }

    #[tokio::test]
    async fn stop_transaction_sets_fields() {
        let storage = InMemoryStorage::new();
        storage.create_transaction(draft(222_222)).await.unwrap();

        let tx = storage
            .stop_transaction(
                222_222,
                Decimal::from(5000),
                Utc::now(),
                StopReason::Local,
                Some(88.0),
            )
            .await
            .unwrap();

        assert_eq!(tx.meter_stop, Some(Decimal::from(5000)));
        assert_eq!(tx.stop_reason, Some(StopReason::Local));
        assert_eq!(tx.stop_soc, Some(88.0));
        assert_eq!(tx.energy_consumed(), Some(Decimal::from(4000)));
    }

    #[tokio::test]
    async fn start_soc_is_write_once() {
        let storage = InMemoryStorage::new();
        storage.create_transaction(draft(333_333)).await.unwrap();

        storage.write_start_soc(333_333, 20.0).await.unwrap();
        storage.write_start_soc(333_333, 55.0).await.unwrap();

        let tx = storage.get_transaction(333_333).await.unwrap().unwrap();
        assert_eq!(tx.start_soc, Some(20.0));
    }

    #[tokio::test]
    async fn id_tag_statuses() {
        let storage = InMemoryStorage::new();
        assert_eq!(
            storage.validate_id_tag("RFID001").await.unwrap().status,
            IdTagStatus::Accepted
        );
        assert_eq!(
            storage.validate_id_tag("BLOCKED001").await.unwrap().status,
            IdTagStatus::Blocked
        );
        assert_eq!(
            storage.validate_id_tag("EXPIRED001").await.unwrap().status,
            IdTagStatus::Expired
        );
        assert_eq!(
            storage.validate_id_tag("NOPE").await.unwrap().status,
            IdTagStatus::Invalid
        );
    }

    #[tokio::test]
    async fn alarms_resolve_per_connector() {
        let storage = InMemoryStorage::new();
        storage
            .create_alarm(AlarmDraft::from_status_error("CP001", 1, "GroundFailure", None, None))
            .await
            .unwrap();
        storage
            .create_alarm(AlarmDraft::from_status_error("CP001", 2, "ReaderFailure", None, None))
            .await
            .unwrap();

        let resolved = storage
            .resolve_alarms_for_connector("CP001", 1, "system")
            .await
            .unwrap();
        assert_eq!(resolved, 1);

        let remaining = storage.open_alarms("CP001");
        assert_eq!(remaining.len(), 1);

        storage.resolve_alarm(remaining[0].id, "operator").await.unwrap();
        assert!(storage.open_alarms("CP001").is_empty());
    }
}
