//! IdTag domain entity (authorization tokens)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// IdTag authorization status (OCPP 1.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdTagStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    ConcurrentTx,
}

impl Default for IdTagStatus {
    fn default() -> Self {
        Self::Accepted
    }
}

impl std::fmt::Display for IdTagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Accepted => "Accepted",
            Self::Blocked => "Blocked",
            Self::Expired => "Expired",
            Self::Invalid => "Invalid",
            Self::ConcurrentTx => "ConcurrentTx",
        };
        write!(f, "{}", s)
    }
}

/// RFID card / app-issued authorization token
#[derive(Debug, Clone)]
pub struct IdTag {
    pub id_tag: String,
    /// Parent ID tag (group authorization)
    pub parent_id_tag: Option<String>,
    pub status: IdTagStatus,
    pub expiry_date: Option<DateTime<Utc>>,
}

impl IdTag {
    pub fn new(id_tag: impl Into<String>) -> Self {
        Self {
            id_tag: id_tag.into(),
            parent_id_tag: None,
            status: IdTagStatus::Accepted,
            expiry_date: None,
        }
    }

    /// The status to report on the wire: a tag past its expiry date is
    /// `Expired` regardless of its stored status.
    pub fn effective_status(&self, now: DateTime<Utc>) -> IdTagStatus {
        if let Some(expiry) = self.expiry_date {
            if expiry < now {
                return IdTagStatus::Expired;
            }
        }
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn accepted_tag_stays_accepted() {
        let tag = IdTag::new("RFID001");
        assert_eq!(tag.effective_status(Utc::now()), IdTagStatus::Accepted);
    }

    #[test]
    fn past_expiry_overrides_status() {
        let mut tag = IdTag::new("RFID001");
        tag.expiry_date = Some(Utc::now() - Duration::hours(1));
        assert_eq!(tag.effective_status(Utc::now()), IdTagStatus::Expired);
    }

    #[test]
    fn future_expiry_keeps_stored_status() {
        let mut tag = IdTag::new("RFID001");
        tag.status = IdTagStatus::Blocked;
        tag.expiry_date = Some(Utc::now() + Duration::hours(1));
        assert_eq!(tag.effective_status(Utc::now()), IdTagStatus::Blocked);
    }
}
