//! Meter value sample types (OCPP 1.6 MeterValues payload fragments)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped group of sampled values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterValue {
    pub timestamp: DateTime<Utc>,
    pub sampled_value: Vec<SampledValue>,
}

/// A single sampled quantity. Measurand/unit/location are kept as wire
/// strings; stations disagree enough that a closed enum loses data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampledValue {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl SampledValue {
    /// Parse the sample value as a number, if it is one.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.trim().parse().ok()
    }

    /// Measurand with the OCPP default applied (absent means the energy register).
    pub fn measurand_or_default(&self) -> &str {
        self.measurand
            .as_deref()
            .unwrap_or("Energy.Active.Import.Register")
    }

    pub fn is_soc(&self) -> bool {
        self.measurand.as_deref() == Some("SoC")
    }
}

/// A batch of meter values persisted together, scoped to one connector
/// and linked to a transaction when the station reported one.
#[derive(Debug, Clone)]
pub struct MeterValueBatch {
    pub charge_point_id: String,
    pub connector_id: u32,
    pub transaction_id: Option<i32>,
    pub values: Vec<MeterValue>,
}
