//! OCPP 1.6 payload types spoken by this gateway
//!
//! Only the actions the central system actually handles or issues are
//! modeled. Field names follow the OCPP-J wire format (camelCase).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::connector::ConnectorStatus;
use super::id_tag::IdTagStatus;
use super::meter::MeterValue;

// ── Charge point → central system ──────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootNotificationRequest {
    pub charge_point_vendor: String,
    pub charge_point_model: String,
    #[serde(default)]
    pub charge_point_serial_number: Option<String>,
    #[serde(default)]
    pub charge_box_serial_number: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub iccid: Option<String>,
    #[serde(default)]
    pub imsi: Option<String>,
    #[serde(default)]
    pub meter_type: Option<String>,
    #[serde(default)]
    pub meter_serial_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationStatus {
    Accepted,
    Pending,
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootNotificationResponse {
    pub status: RegistrationStatus,
    pub current_time: DateTime<Utc>,
    /// Heartbeat interval in seconds
    pub interval: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatResponse {
    pub current_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusNotificationRequest {
    pub connector_id: u32,
    pub status: ConnectorStatus,
    pub error_code: String,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub vendor_error_code: Option<String>,
}

/// Authorization verdict attached to Authorize / Start / Stop responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdTagInfo {
    pub status: IdTagStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id_tag: Option<String>,
}

impl IdTagInfo {
    pub fn accepted() -> Self {
        Self {
            status: IdTagStatus::Accepted,
            expiry_date: None,
            parent_id_tag: None,
        }
    }

    pub fn with_status(status: IdTagStatus) -> Self {
        Self {
            status,
            expiry_date: None,
            parent_id_tag: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeRequest {
    pub id_tag: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
    pub id_tag_info: IdTagInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionRequest {
    pub connector_id: u32,
    pub id_tag: String,
    /// Meter reading at start (Wh)
    pub meter_start: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub reservation_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionResponse {
    pub transaction_id: i32,
    pub id_tag_info: IdTagInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTransactionRequest {
    pub transaction_id: i32,
    /// Meter reading at stop (Wh)
    pub meter_stop: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub id_tag: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub transaction_data: Option<Vec<MeterValue>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopTransactionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_tag_info: Option<IdTagInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterValuesRequest {
    pub connector_id: u32,
    #[serde(default)]
    pub transaction_id: Option<i32>,
    pub meter_value: Vec<MeterValue>,
}

// ── Central system → charge point ──────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStartTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
    pub id_tag: String,
    /// Smart-charging profile, forwarded opaquely when supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charging_profile: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStopTransactionRequest {
    pub transaction_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResetKind {
    Hard,
    Soft,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    #[serde(rename = "type")]
    pub kind: ResetKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockConnectorRequest {
    pub connector_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeConfigurationRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigurationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValue {
    pub key: String,
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetConfigurationResponse {
    #[serde(default)]
    pub configuration_key: Option<Vec<KeyValue>>,
    #[serde(default)]
    pub unknown_key: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageTrigger {
    BootNotification,
    DiagnosticsStatusNotification,
    FirmwareStatusNotification,
    Heartbeat,
    MeterValues,
    StatusNotification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerMessageRequest {
    pub requested_message: MessageTrigger,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_id: Option<u32>,
}

/// Generic `{status: "..."}` response shared by most CS→CP commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn is_accepted(&self) -> bool {
        self.status == "Accepted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_notification_wire_names() {
        let json = r#"{"chargePointVendor":"V","chargePointModel":"M","firmwareVersion":"1.0"}"#;
        let req: BootNotificationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.charge_point_vendor, "V");
        assert_eq!(req.firmware_version.as_deref(), Some("1.0"));
        assert!(req.iccid.is_none());
    }

    #[test]
    fn boot_response_serializes_interval() {
        let resp = BootNotificationResponse {
            status: RegistrationStatus::Accepted,
            current_time: "2026-01-01T00:00:00Z".parse().unwrap(),
            interval: 300,
        };
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["status"], "Accepted");
        assert_eq!(v["interval"], 300);
        assert!(v["currentTime"].is_string());
    }

    #[test]
    fn status_notification_parses_enum() {
        let json = r#"{"connectorId":1,"status":"Available","errorCode":"NoError"}"#;
        let req: StatusNotificationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.status, ConnectorStatus::Available);
        assert_eq!(req.error_code, "NoError");
    }

    #[test]
    fn start_transaction_meter_start_accepts_number() {
        let json = r#"{"connectorId":1,"idTag":"RFID001","meterStart":1000,"timestamp":"2026-01-01T01:00:00Z"}"#;
        let req: StartTransactionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.meter_start, Decimal::from(1000));
    }

    #[test]
    fn id_tag_info_omits_absent_fields() {
        let v = serde_json::to_value(IdTagInfo::accepted()).unwrap();
        assert_eq!(v["status"], "Accepted");
        assert!(v.get("expiryDate").is_none());
        assert!(v.get("parentIdTag").is_none());
    }

    #[test]
    fn reset_request_uses_type_key() {
        let v = serde_json::to_value(ResetRequest { kind: ResetKind::Soft }).unwrap();
        assert_eq!(v["type"], "Soft");
    }

    #[test]
    fn trigger_message_roundtrip() {
        let req = TriggerMessageRequest {
            requested_message: MessageTrigger::StatusNotification,
            connector_id: Some(2),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["requestedMessage"], "StatusNotification");
        assert_eq!(v["connectorId"], 2);
    }
}
