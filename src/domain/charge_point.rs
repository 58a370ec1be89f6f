//! Charge Point domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Charge Point entity (identity + boot metadata).
///
/// Created or updated on each BootNotification; `is_online` is flipped on
/// connect/disconnect. Never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargePoint {
    /// Unique identifier (final URL path segment at connect)
    pub id: String,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    /// ICCID of the modem
    pub iccid: Option<String>,
    /// IMSI of the modem
    pub imsi: Option<String>,
    pub meter_type: Option<String>,
    pub meter_serial_number: Option<String>,
    pub is_online: bool,
    pub last_seen: DateTime<Utc>,
    pub registered_at: DateTime<Utc>,
}

impl ChargePoint {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            vendor: None,
            model: None,
            serial_number: None,
            firmware_version: None,
            iccid: None,
            imsi: None,
            meter_type: None,
            meter_serial_number: None,
            is_online: false,
            last_seen: now,
            registered_at: now,
        }
    }

    /// Apply boot metadata reported by the station.
    pub fn apply_boot_info(&mut self, info: &BootInfo) {
        self.vendor = Some(info.vendor.clone());
        self.model = Some(info.model.clone());
        if info.serial_number.is_some() {
            self.serial_number = info.serial_number.clone();
        }
        if info.firmware_version.is_some() {
            self.firmware_version = info.firmware_version.clone();
        }
        if info.iccid.is_some() {
            self.iccid = info.iccid.clone();
        }
        if info.imsi.is_some() {
            self.imsi = info.imsi.clone();
        }
        if info.meter_type.is_some() {
            self.meter_type = info.meter_type.clone();
        }
        if info.meter_serial_number.is_some() {
            self.meter_serial_number = info.meter_serial_number.clone();
        }
        self.is_online = true;
        self.last_seen = Utc::now();
    }
}

/// Boot metadata extracted from a BootNotification payload.
#[derive(Debug, Clone)]
pub struct BootInfo {
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub iccid: Option<String>,
    pub imsi: Option<String>,
    pub meter_type: Option<String>,
    pub meter_serial_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_info_upserts_metadata() {
        let mut cp = ChargePoint::new("CP001");
        assert!(!cp.is_online);

        cp.apply_boot_info(&BootInfo {
            vendor: "Vendor".into(),
            model: "Model".into(),
            serial_number: Some("SN-1".into()),
            firmware_version: None,
            iccid: None,
            imsi: None,
            meter_type: Some("AC".into()),
            meter_serial_number: None,
        });

        assert!(cp.is_online);
        assert_eq!(cp.vendor.as_deref(), Some("Vendor"));
        assert_eq!(cp.serial_number.as_deref(), Some("SN-1"));
        assert_eq!(cp.meter_type.as_deref(), Some("AC"));
    }

    #[test]
    fn reboot_keeps_previous_optional_fields() {
        let mut cp = ChargePoint::new("CP001");
        cp.serial_number = Some("SN-1".into());

        cp.apply_boot_info(&BootInfo {
            vendor: "Vendor".into(),
            model: "Model".into(),
            serial_number: None,
            firmware_version: Some("2.0".into()),
            iccid: None,
            imsi: None,
            meter_type: None,
            meter_serial_number: None,
        });

        // A boot that omits the serial must not erase what we know
        assert_eq!(cp.serial_number.as_deref(), Some("SN-1"));
        assert_eq!(cp.firmware_version.as_deref(), Some("2.0"));
    }
}
