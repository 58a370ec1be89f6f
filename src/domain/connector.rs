//! Connector domain entity and telemetry state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::meter::SampledValue;

/// Physical connector type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorType {
    #[serde(rename = "CCS")]
    Ccs,
    #[serde(rename = "CHAdeMO")]
    Chademo,
    #[serde(rename = "TYPE1")]
    Type1,
    #[serde(rename = "TYPE2")]
    Type2,
    #[serde(rename = "TESLA")]
    Tesla,
    #[serde(rename = "GBT")]
    Gbt,
}

/// Connector status (OCPP 1.6 ChargePointStatus values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorStatus {
    Available,
    Preparing,
    Charging,
    #[serde(rename = "SuspendedEVSE")]
    SuspendedEvse,
    #[serde(rename = "SuspendedEV")]
    SuspendedEv,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

impl Default for ConnectorStatus {
    fn default() -> Self {
        Self::Available
    }
}

impl std::fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Available => "Available",
            Self::Preparing => "Preparing",
            Self::Charging => "Charging",
            Self::SuspendedEvse => "SuspendedEVSE",
            Self::SuspendedEv => "SuspendedEV",
            Self::Finishing => "Finishing",
            Self::Reserved => "Reserved",
            Self::Unavailable => "Unavailable",
            Self::Faulted => "Faulted",
        };
        write!(f, "{}", s)
    }
}

/// Connector on a charge point, including the latest sampled telemetry.
///
/// `connector_id == 0` refers to the charge point as a whole and never
/// appears as a row of this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub connector_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connector_type: Option<ConnectorType>,
    pub status: ConnectorStatus,
    pub error_code: Option<String>,
    pub vendor_error_code: Option<String>,
    pub info: Option<String>,
    // Latest sampled telemetry
    pub input_voltage: Option<f64>,
    pub output_voltage: Option<f64>,
    pub input_current: Option<f64>,
    pub demand_current: Option<f64>,
    pub charging_energy: Option<f64>,
    pub output_energy: Option<f64>,
    pub gun_temperature: Option<f64>,
    pub state_of_charge: Option<f64>,
    pub charge_time: Option<f64>,
    pub remaining_time: Option<f64>,
    /// Active transaction bound to this connector, if any (unique when present)
    pub current_transaction_id: Option<i32>,
    pub last_updated: DateTime<Utc>,
}

impl Connector {
    pub fn new(connector_id: u32) -> Self {
        Self {
            connector_id,
            connector_type: None,
            status: ConnectorStatus::default(),
            error_code: None,
            vendor_error_code: None,
            info: None,
            input_voltage: None,
            output_voltage: None,
            input_current: None,
            demand_current: None,
            charging_energy: None,
            output_energy: None,
            gun_temperature: None,
            state_of_charge: None,
            charge_time: None,
            remaining_time: None,
            current_transaction_id: None,
            last_updated: Utc::now(),
        }
    }

    pub fn set_status(
        &mut self,
        status: ConnectorStatus,
        error_code: Option<String>,
        vendor_error_code: Option<String>,
        info: Option<String>,
    ) {
        self.status = status;
        self.error_code = error_code;
        self.vendor_error_code = vendor_error_code;
        self.info = info;
        self.last_updated = Utc::now();
    }

    /// Fold a sampled value into the telemetry fields.
    ///
    /// Returns `true` when the measurand was recognized. Energy and power
    /// values reported in kilo-units are normalized to base units.
    pub fn apply_sample(&mut self, sample: &SampledValue) -> bool {
        let Some(raw) = sample.numeric_value() else {
            return false;
        };

        let value = match sample.unit.as_deref() {
            Some("kWh") | Some("kW") | Some("kvarh") | Some("kvar") => raw * 1000.0,
            _ => raw,
        };
        let location = sample.location.as_deref();

        let recognized = match sample.measurand_or_default() {
            "Voltage" => {
                match location {
                    Some("Inlet") => self.input_voltage = Some(value),
                    _ => self.output_voltage = Some(value),
                }
                true
            }
            "Current.Import" => {
                match location {
                    Some("Inlet") => self.input_current = Some(value),
                    _ => self.demand_current = Some(value),
                }
                true
            }
            "Energy.Active.Import.Register" => {
                self.charging_energy = Some(value);
                true
            }
            "Power.Active.Import" => {
                self.output_energy = Some(value);
                true
            }
            "Temperature" => {
                self.gun_temperature = Some(value);
                true
            }
            "SoC" => {
                self.state_of_charge = Some(value);
                true
            }
            _ => false,
        };

        if recognized {
            self.last_updated = Utc::now();
        }
        recognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(measurand: &str, value: &str, location: Option<&str>, unit: Option<&str>) -> SampledValue {
        SampledValue {
            value: value.to_string(),
            context: None,
            format: None,
            measurand: Some(measurand.to_string()),
            phase: None,
            location: location.map(String::from),
            unit: unit.map(String::from),
        }
    }

    #[test]
    fn voltage_routes_by_location() {
        let mut c = Connector::new(1);
        assert!(c.apply_sample(&sample("Voltage", "398.5", Some("Inlet"), None)));
        assert!(c.apply_sample(&sample("Voltage", "402.0", Some("Outlet"), None)));
        assert_eq!(c.input_voltage, Some(398.5));
        assert_eq!(c.output_voltage, Some(402.0));
    }

    #[test]
    fn current_import_routes_by_location() {
        let mut c = Connector::new(1);
        assert!(c.apply_sample(&sample("Current.Import", "16", Some("Inlet"), None)));
        assert!(c.apply_sample(&sample("Current.Import", "32", None, None)));
        assert_eq!(c.input_current, Some(16.0));
        assert_eq!(c.demand_current, Some(32.0));
    }

    #[test]
    fn energy_and_power_mapping() {
        let mut c = Connector::new(1);
        assert!(c.apply_sample(&sample("Energy.Active.Import.Register", "42", None, Some("Wh"))));
        assert!(c.apply_sample(&sample("Power.Active.Import", "7.4", None, Some("kW"))));
        assert_eq!(c.charging_energy, Some(42.0));
        assert_eq!(c.output_energy, Some(7400.0));
    }

    #[test]
    fn kwh_normalized_to_wh() {
        let mut c = Connector::new(1);
        assert!(c.apply_sample(&sample("Energy.Active.Import.Register", "1.5", None, Some("kWh"))));
        assert_eq!(c.charging_energy, Some(1500.0));
    }

    #[test]
    fn temperature_and_soc_mapping() {
        let mut c = Connector::new(1);
        assert!(c.apply_sample(&sample("Temperature", "31.2", None, Some("Celsius"))));
        assert!(c.apply_sample(&sample("SoC", "64", None, Some("Percent"))));
        assert_eq!(c.gun_temperature, Some(31.2));
        assert_eq!(c.state_of_charge, Some(64.0));
    }

    #[test]
    fn unknown_measurand_is_ignored() {
        let mut c = Connector::new(1);
        assert!(!c.apply_sample(&sample("Frequency", "50", None, None)));
        assert!(!c.apply_sample(&sample("SoC", "not-a-number", None, None)));
    }

    #[test]
    fn default_measurand_is_energy_register() {
        let mut c = Connector::new(1);
        let s = SampledValue {
            value: "100".into(),
            context: None,
            format: None,
            measurand: None,
            phase: None,
            location: None,
            unit: None,
        };
        assert!(c.apply_sample(&s));
        assert_eq!(c.charging_energy, Some(100.0));
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ConnectorStatus::SuspendedEvse).unwrap(),
            r#""SuspendedEVSE""#
        );
        let s: ConnectorStatus = serde_json::from_str(r#""SuspendedEV""#).unwrap();
        assert_eq!(s, ConnectorStatus::SuspendedEv);
    }
}
