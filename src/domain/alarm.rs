//! Alarms raised from connector error codes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alarm severity, derived from the OCPP `errorCode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlarmSeverity {
    /// Fixed classification table for OCPP 1.6 charge point error codes.
    pub fn from_error_code(error_code: &str) -> Self {
        match error_code {
            "GroundFailure" | "HighTemperature" | "InternalError" => Self::Critical,
            "PowerMeterFailure" | "ReaderFailure" | "ResetFailure" => Self::Error,
            "ConnectorLockFailure" | "EVCommunicationError" | "PowerSwitchFailure" => Self::Warning,
            _ => Self::Info,
        }
    }
}

/// An alarm opened when a StatusNotification carries `errorCode != "NoError"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alarm {
    pub id: i64,
    pub charge_point_id: String,
    pub connector_id: Option<u32>,
    /// The raw error code that raised the alarm
    pub alarm_type: String,
    pub severity: AlarmSeverity,
    pub message: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to open a new alarm.
#[derive(Debug, Clone)]
pub struct AlarmDraft {
    pub charge_point_id: String,
    pub connector_id: Option<u32>,
    pub alarm_type: String,
    pub severity: AlarmSeverity,
    pub message: String,
}

impl AlarmDraft {
    /// Build an alarm draft from a StatusNotification error report.
    pub fn from_status_error(
        charge_point_id: &str,
        connector_id: u32,
        error_code: &str,
        vendor_error_code: Option<&str>,
        info: Option<&str>,
    ) -> Self {
        let mut message = format!("Connector {} reported {}", connector_id, error_code);
        if let Some(vendor) = vendor_error_code {
            message.push_str(&format!(" (vendor: {})", vendor));
        }
        if let Some(info) = info {
            message.push_str(&format!(": {}", info));
        }

        Self {
            charge_point_id: charge_point_id.to_string(),
            connector_id: (connector_id > 0).then_some(connector_id),
            alarm_type: error_code.to_string(),
            severity: AlarmSeverity::from_error_code(error_code),
            message,
        }
    }
}
