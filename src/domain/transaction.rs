//! Transaction domain entity

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a transaction was stopped (closed-set mapping of the wire string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    Local,
    Remote,
    EvDisconnected,
    HardReset,
    SoftReset,
    PowerLoss,
    EmergencyStop,
    DeAuthorized,
    Reboot,
    UnlockCommand,
    Other,
}

impl StopReason {
    /// Map the OCPP `reason` string to the closed-set enum. Unknown or
    /// absent reasons fall back to `Other`.
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("Local") => Self::Local,
            Some("Remote") => Self::Remote,
            Some("EVDisconnected") => Self::EvDisconnected,
            Some("HardReset") => Self::HardReset,
            Some("SoftReset") => Self::SoftReset,
            Some("PowerLoss") => Self::PowerLoss,
            Some("EmergencyStop") => Self::EmergencyStop,
            Some("DeAuthorized") => Self::DeAuthorized,
            Some("Reboot") => Self::Reboot,
            Some("UnlockCommand") => Self::UnlockCommand,
            _ => Self::Other,
        }
    }
}

/// Charging transaction.
///
/// Created by StartTransaction, mutated only by StopTransaction and
/// meter-value updates to `start_soc`; never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Surrogate primary key
    pub id: i64,
    /// OCPP transaction identifier, unique, assigned by the gateway
    pub transaction_id: i32,
    pub charge_point_id: String,
    pub connector_id: u32,
    pub id_tag: Option<String>,
    /// Operator-supplied context carried over from a RemoteStart
    pub vehicle_id: Option<String>,
    pub fleet_id: Option<String>,
    /// Meter reading at start (Wh)
    pub meter_start: Decimal,
    /// Meter reading at stop (Wh)
    pub meter_stop: Option<Decimal>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: Option<DateTime<Utc>>,
    pub stop_reason: Option<StopReason>,
    /// Battery state of charge at start (%), written exactly once
    pub start_soc: Option<f64>,
    /// Battery state of charge at stop (%)
    pub stop_soc: Option<f64>,
}

impl Transaction {
    pub fn is_active(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Energy consumed in Wh, available once stopped.
    pub fn energy_consumed(&self) -> Option<Decimal> {
        self.meter_stop.map(|stop| stop - self.meter_start)
    }
}

/// Fields needed to persist a new transaction.
#[derive(Debug, Clone)]
pub struct TransactionDraft {
    pub transaction_id: i32,
    pub charge_point_id: String,
    pub connector_id: u32,
    pub id_tag: Option<String>,
    pub vehicle_id: Option<String>,
    pub fleet_id: Option<String>,
    pub meter_start: Decimal,
    pub started_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn sample_tx() -> Transaction {
        Transaction {
            id: 1,
            transaction_id: 123_456,
            charge_point_id: "CP001".into(),
            connector_id: 1,
            id_tag: Some("RFID001".into()),
            vehicle_id: None,
            fleet_id: None,
            meter_start: Decimal::from(1000),
            meter_stop: None,
            started_at: Utc::now(),
            stopped_at: None,
            stop_reason: None,
            start_soc: None,
            stop_soc: None,
        }
    }

    #[test]
    fn new_transaction_is_active() {
        let tx = sample_tx();
        assert!(tx.is_active());
        assert_eq!(tx.energy_consumed(), None);
    }

    #[test]
    fn energy_consumed_after_stop() {
        let mut tx = sample_tx();
        tx.meter_stop = Some(Decimal::from(5000));
        tx.stopped_at = Some(Utc::now());
        assert!(!tx.is_active());
        assert_eq!(tx.energy_consumed(), Some(Decimal::from(4000)));
    }

    #[test]
    fn stop_reason_table() {
        assert_eq!(StopReason::from_wire(Some("Local")), StopReason::Local);
        assert_eq!(StopReason::from_wire(Some("Remote")), StopReason::Remote);
        assert_eq!(
            StopReason::from_wire(Some("EVDisconnected")),
            StopReason::EvDisconnected
        );
        assert_eq!(StopReason::from_wire(Some("HardReset")), StopReason::HardReset);
        assert_eq!(StopReason::from_wire(Some("SoftReset")), StopReason::SoftReset);
        assert_eq!(StopReason::from_wire(Some("PowerLoss")), StopReason::PowerLoss);
        assert_eq!(
            StopReason::from_wire(Some("UnlockCommand")),
            StopReason::UnlockCommand
        );
    }

    #[test]
    fn unknown_stop_reason_maps_to_other() {
        assert_eq!(StopReason::from_wire(Some("SolarFlare")), StopReason::Other);
        assert_eq!(StopReason::from_wire(None), StopReason::Other);
    }

    #[test]
    fn stop_reason_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&StopReason::EvDisconnected).unwrap(),
            r#""EV_DISCONNECTED""#
        );
        assert_eq!(
            serde_json::to_string(&StopReason::HardReset).unwrap(),
            r#""HARD_RESET""#
        );
    }
}
