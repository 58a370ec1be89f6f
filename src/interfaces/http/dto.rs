//! Operator API request/response shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::messages::{MessageTrigger, ResetKind};
use crate::domain::ChargePoint;

/// Uniform response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargePointSummary {
    #[serde(flatten)]
    pub charge_point: ChargePoint,
    /// Whether a live WebSocket session exists right now
    pub connected: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCommandRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStartBody {
    #[serde(default)]
    pub connector_id: Option<u32>,
    pub id_tag: String,
    #[serde(default)]
    pub charging_profile: Option<Value>,
    #[serde(default)]
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub fleet_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStopBody {
    pub transaction_id: i32,
}

#[derive(Debug, Deserialize)]
pub struct ResetBody {
    #[serde(rename = "type")]
    pub kind: ResetKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockBody {
    pub connector_id: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeConfigurationBody {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerBody {
    pub requested_message: MessageTrigger,
    #[serde(default)]
    pub connector_id: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CommandStatus {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfigurationQuery {
    /// Comma-separated key list; absent means "everything"
    #[serde(default)]
    pub keys: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionsQuery {
    #[serde(default)]
    pub charge_point_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterStreamQuery {
    #[serde(default)]
    pub charge_point_id: Option<String>,
    #[serde(default)]
    pub connector_id: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: bool,
    pub cache: bool,
    pub connected_charge_points: usize,
}
