//! OCPP-J message framing
//!
//! Implements the OCPP-J (JSON over WebSocket) transport envelope:
//!
//! - **Call**       `[2, "<messageId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<messageId>", {<payload>}]`
//! - **CallError**  `[4, "<messageId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`
//!
//! Anything that is not an array of exactly 4 / 3 / 5 elements matching the
//! tuples above is rejected. Callers that need to answer a malformed frame
//! can still recover the message id via [`extract_message_id`].

use serde_json::Value;
use thiserror::Error;

// ── Message-type constants ─────────────────────────────────────

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

/// Maximum length of a messageId per OCPP-J (UUID fits in 36).
const MAX_MESSAGE_ID_LEN: usize = 36;

// ── OcppFrame ──────────────────────────────────────────────────

/// A parsed OCPP-J frame (transport envelope, payload left opaque).
#[derive(Debug, Clone)]
pub enum OcppFrame {
    /// `[2, messageId, action, payload]`
    Call {
        message_id: String,
        action: String,
        payload: Value,
    },
    /// `[3, messageId, payload]`
    CallResult {
        message_id: String,
        payload: Value,
    },
    /// `[4, messageId, errorCode, errorDescription, errorDetails]`
    CallError {
        message_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl OcppFrame {
    // ── Parsing ────────────────────────────────────────────

    /// Parse a raw JSON text into an `OcppFrame`.
    pub fn parse(text: &str) -> Result<Self, OcppFrameError> {
        let arr: Vec<Value> =
            serde_json::from_str(text).map_err(|e| OcppFrameError::InvalidJson(e.to_string()))?;

        if arr.is_empty() {
            return Err(OcppFrameError::EmptyArray);
        }

        let msg_type = arr[0].as_u64().ok_or(OcppFrameError::InvalidMessageType)?;

        match msg_type {
            MSG_TYPE_CALL => Self::parse_call(&arr),
            MSG_TYPE_CALL_RESULT => Self::parse_call_result(&arr),
            MSG_TYPE_CALL_ERROR => Self::parse_call_error(&arr),
            _ => Err(OcppFrameError::UnknownMessageType(msg_type)),
        }
    }

    fn parse_message_id(arr: &[Value]) -> Result<String, OcppFrameError> {
        let id = arr[1]
            .as_str()
            .ok_or(OcppFrameError::FieldTypeMismatch("messageId must be a string"))?;
        if id.is_empty() || id.len() > MAX_MESSAGE_ID_LEN {
            return Err(OcppFrameError::FieldTypeMismatch(
                "messageId must be 1..=36 characters",
            ));
        }
        Ok(id.to_string())
    }

    fn parse_call(arr: &[Value]) -> Result<Self, OcppFrameError> {
        if arr.len() != 4 {
            return Err(OcppFrameError::WrongArity {
                expected: 4,
                got: arr.len(),
            });
        }

        let message_id = Self::parse_message_id(arr)?;
        let action = arr[2]
            .as_str()
            .ok_or(OcppFrameError::FieldTypeMismatch("action must be a string"))?
            .to_string();
        let payload = arr[3].clone();

        Ok(Self::Call {
            message_id,
            action,
            payload,
        })
    }

    fn parse_call_result(arr: &[Value]) -> Result<Self, OcppFrameError> {
        if arr.len() != 3 {
            return Err(OcppFrameError::WrongArity {
                expected: 3,
                got: arr.len(),
            });
        }

        let message_id = Self::parse_message_id(arr)?;
        let payload = arr[2].clone();

        Ok(Self::CallResult { message_id, payload })
    }

    fn parse_call_error(arr: &[Value]) -> Result<Self, OcppFrameError> {
        if arr.len() != 5 {
            return Err(OcppFrameError::WrongArity {
                expected: 5,
                got: arr.len(),
            });
        }

        let message_id = Self::parse_message_id(arr)?;
        let error_code = arr[2]
            .as_str()
            .ok_or(OcppFrameError::FieldTypeMismatch("errorCode must be a string"))?
            .to_string();
        let error_description = arr[3].as_str().unwrap_or("").to_string();
        let error_details = arr[4].clone();

        Ok(Self::CallError {
            message_id,
            error_code,
            error_description,
            error_details,
        })
    }

    // ── Serialization ──────────────────────────────────────

    /// Serialize this frame to a JSON string.
    pub fn serialize(&self) -> String {
        let arr: Value = match self {
            Self::Call {
                message_id,
                action,
                payload,
            } => Value::Array(vec![
                Value::Number(MSG_TYPE_CALL.into()),
                Value::String(message_id.clone()),
                Value::String(action.clone()),
                payload.clone(),
            ]),

            Self::CallResult { message_id, payload } => Value::Array(vec![
                Value::Number(MSG_TYPE_CALL_RESULT.into()),
                Value::String(message_id.clone()),
                payload.clone(),
            ]),

            Self::CallError {
                message_id,
                error_code,
                error_description,
                error_details,
            } => Value::Array(vec![
                Value::Number(MSG_TYPE_CALL_ERROR.into()),
                Value::String(message_id.clone()),
                Value::String(error_code.clone()),
                Value::String(error_description.clone()),
                error_details.clone(),
            ]),
        };

        // serde_json::to_string on a Value never fails
        serde_json::to_string(&arr).unwrap()
    }

    // ── Helpers ────────────────────────────────────────────

    /// Get the message ID.
    pub fn message_id(&self) -> &str {
        match self {
            Self::Call { message_id, .. }
            | Self::CallResult { message_id, .. }
            | Self::CallError { message_id, .. } => message_id,
        }
    }

    /// Create a `CallError` response for a given message ID.
    pub fn error_response(
        message_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            message_id: message_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: Value::Object(Default::default()),
        }
    }

    /// Returns `true` if this is a `Call` frame.
    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. })
    }
}

/// Best-effort recovery of the message id from a frame that failed to parse.
///
/// Used to answer malformed frames with a `FormationViolation` CallError;
/// when no id can be recovered the frame is dropped instead.
pub fn extract_message_id(text: &str) -> Option<String> {
    let arr: Vec<Value> = serde_json::from_str(text).ok()?;
    let id = arr.get(1)?.as_str()?;
    if id.is_empty() || id.len() > MAX_MESSAGE_ID_LEN {
        return None;
    }
    Some(id.to_string())
}

// ── Errors ─────────────────────────────────────────────────────

/// Errors that can occur when parsing an OCPP-J frame.
#[derive(Debug, Error)]
pub enum OcppFrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Empty OCPP message array")]
    EmptyArray,
    #[error("Message type is not a number")]
    InvalidMessageType,
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),
    #[error("Expected array of {expected} elements, got {got}")]
    WrongArity { expected: usize, got: usize },
    #[error("Field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_call() {
        let text = r#"[2,"abc123","BootNotification",{"chargePointVendor":"Vendor","chargePointModel":"Model"}]"#;
        let frame = OcppFrame::parse(text).unwrap();
        match frame {
            OcppFrame::Call {
                message_id,
                action,
                payload,
            } => {
                assert_eq!(message_id, "abc123");
                assert_eq!(action, "BootNotification");
                assert_eq!(payload["chargePointVendor"], "Vendor");
            }
            _ => panic!("Expected Call frame"),
        }
    }

    #[test]
    fn parse_call_result() {
        let text = r#"[3,"abc123",{"status":"Accepted","currentTime":"2026-01-01T00:00:00Z","interval":300}]"#;
        let frame = OcppFrame::parse(text).unwrap();
        match frame {
            OcppFrame::CallResult { message_id, payload } => {
                assert_eq!(message_id, "abc123");
                assert_eq!(payload["status"], "Accepted");
            }
            _ => panic!("Expected CallResult frame"),
        }
    }

    #[test]
    fn parse_call_error() {
        let text = r#"[4,"abc123","NotSupported","Action not supported",{}]"#;
        let frame = OcppFrame::parse(text).unwrap();
        match frame {
            OcppFrame::CallError {
                message_id,
                error_code,
                error_description,
                ..
            } => {
                assert_eq!(message_id, "abc123");
                assert_eq!(error_code, "NotSupported");
                assert_eq!(error_description, "Action not supported");
            }
            _ => panic!("Expected CallError frame"),
        }
    }

    #[test]
    fn reject_wrong_arity() {
        // CALL with a missing payload element
        assert!(matches!(
            OcppFrame::parse(r#"[2,"id1","Heartbeat"]"#),
            Err(OcppFrameError::WrongArity { expected: 4, got: 3 })
        ));
        // CALLRESULT with a trailing element
        assert!(matches!(
            OcppFrame::parse(r#"[3,"id1",{},{}]"#),
            Err(OcppFrameError::WrongArity { expected: 3, got: 4 })
        ));
        // Truncated CALLERROR
        assert!(matches!(
            OcppFrame::parse(r#"[4,"id1","NotSupported"]"#),
            Err(OcppFrameError::WrongArity { expected: 5, got: 3 })
        ));
    }

    #[test]
    fn reject_unknown_message_type() {
        assert!(matches!(
            OcppFrame::parse(r#"[5,"id1",{}]"#),
            Err(OcppFrameError::UnknownMessageType(5))
        ));
    }

    #[test]
    fn reject_non_array_and_bad_ids() {
        assert!(matches!(
            OcppFrame::parse(r#"{"not":"an array"}"#),
            Err(OcppFrameError::InvalidJson(_))
        ));
        assert!(OcppFrame::parse(r#"[2,42,"Heartbeat",{}]"#).is_err());
        // 37-char message id
        let long = format!(r#"[2,"{}","Heartbeat",{{}}]"#, "x".repeat(37));
        assert!(OcppFrame::parse(&long).is_err());
    }

    #[test]
    fn roundtrip_call() {
        let frame = OcppFrame::Call {
            message_id: "id1".into(),
            action: "Heartbeat".into(),
            payload: serde_json::json!({}),
        };
        let json = frame.serialize();
        let parsed = OcppFrame::parse(&json).unwrap();
        assert!(parsed.is_call());
        assert_eq!(parsed.message_id(), "id1");
    }

    #[test]
    fn roundtrip_call_error() {
        let frame = OcppFrame::error_response("id3", "InternalError", "Something went wrong");
        let json = frame.serialize();
        let parsed = OcppFrame::parse(&json).unwrap();
        assert_eq!(parsed.message_id(), "id3");
    }

    #[test]
    fn recover_message_id_from_malformed_frame() {
        assert_eq!(
            extract_message_id(r#"[2,"id9","Heartbeat"]"#).as_deref(),
            Some("id9")
        );
        assert_eq!(extract_message_id(r#"[2,17,"Heartbeat",{}]"#), None);
        assert_eq!(extract_message_id("not json"), None);
    }
}
