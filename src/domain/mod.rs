//! Core business entities, wire payload types, and domain errors.

pub mod alarm;
pub mod charge_point;
pub mod connector;
pub mod error;
pub mod id_tag;
pub mod messages;
pub mod meter;
pub mod transaction;

pub use alarm::{Alarm, AlarmDraft, AlarmSeverity};
pub use charge_point::{BootInfo, ChargePoint};
pub use connector::{Connector, ConnectorStatus, ConnectorType};
pub use error::{DomainError, DomainResult};
pub use id_tag::{IdTag, IdTagStatus};
pub use meter::{MeterValue, MeterValueBatch, SampledValue};
pub use transaction::{StopReason, Transaction, TransactionDraft};
