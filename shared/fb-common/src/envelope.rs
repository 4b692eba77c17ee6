//! Task Result Envelope
//!
//! Wire form of an asynchronous admission outcome:
//!
//! - `["success", "<entity-tag>", <entity-id>]`
//! - `["failure", "<reason>"]`
//! - `["failure", "<reason>", <extra>]`

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};

use crate::ErrorKind;

/// Outcome of a finished admission task.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEnvelope {
    /// The entity was created.
    Success {
        /// Entity tag, e.g. `topic` or `post`.
        tag: String,
        /// Primary key of the created entity.
        id: i64,
    },
    /// The submission was rejected.
    Failure {
        /// Rejection reason.
        reason: ErrorKind,
        /// Reason-specific extra data (e.g. the status for `status_rejected`).
        extra: Option<Value>,
    },
}

/// Errors decoding an envelope from its wire form.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("envelope must be a JSON array")]
    NotAnArray,
    #[error("unknown envelope status: {0}")]
    UnknownStatus(String),
    #[error("malformed {0} envelope")]
    Malformed(&'static str),
}

impl TaskEnvelope {
    /// Builds a success envelope.
    pub fn success(tag: impl Into<String>, id: i64) -> Self {
        Self::Success {
            tag: tag.into(),
            id,
        }
    }

    /// Builds a failure envelope without extra data.
    pub const fn failure(reason: ErrorKind) -> Self {
        Self::Failure {
            reason,
            extra: None,
        }
    }

    /// Builds a failure envelope carrying extra data.
    pub fn failure_with(reason: ErrorKind, extra: impl Into<Value>) -> Self {
        Self::Failure {
            reason,
            extra: Some(extra.into()),
        }
    }

    /// Whether this is a success envelope.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Status label: `success` or `failure`.
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failure { .. } => "failure",
        }
    }

    /// Encodes into the tagged-array wire form.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Success { tag, id } => json!(["success", tag, id]),
            Self::Failure {
                reason,
                extra: None,
            } => json!(["failure", reason.as_str()]),
            Self::Failure {
                reason,
                extra: Some(extra),
            } => json!(["failure", reason.as_str(), extra]),
        }
    }

    /// Decodes from the tagged-array wire form.
    pub fn from_value(value: &Value) -> Result<Self, EnvelopeError> {
        let items = value.as_array().ok_or(EnvelopeError::NotAnArray)?;
        let status = items
            .first()
            .and_then(Value::as_str)
            .ok_or(EnvelopeError::NotAnArray)?;

        match status {
            "success" => {
                let tag = items
                    .get(1)
                    .and_then(Value::as_str)
                    .ok_or(EnvelopeError::Malformed("success"))?;
                let id = items
                    .get(2)
                    .and_then(Value::as_i64)
                    .ok_or(EnvelopeError::Malformed("success"))?;
                Ok(Self::success(tag, id))
            }
            "failure" => {
                let reason = items
                    .get(1)
                    .and_then(Value::as_str)
                    .and_then(ErrorKind::from_label)
                    .ok_or(EnvelopeError::Malformed("failure"))?;
                Ok(Self::Failure {
                    reason,
                    extra: items.get(2).cloned(),
                })
            }
            other => Err(EnvelopeError::UnknownStatus(other.to_string())),
        }
    }
}

impl Serialize for TaskEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TaskEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_wire_form() {
        let env = TaskEnvelope::success("topic", 42);
        assert_eq!(env.to_value(), json!(["success", "topic", 42]));
        assert_eq!(env.status(), "success");
    }

    #[test]
    fn test_failure_wire_forms() {
        assert_eq!(
            TaskEnvelope::failure(ErrorKind::BanRejected).to_value(),
            json!(["failure", "ban_rejected"])
        );
        assert_eq!(
            TaskEnvelope::failure_with(ErrorKind::StatusRejected, "locked").to_value(),
            json!(["failure", "status_rejected", "locked"])
        );
    }

    #[test]
    fn test_decode_status_rejected_with_extra() {
        let env: TaskEnvelope =
            serde_json::from_str(r#"["failure","status_rejected","archived"]"#).unwrap();
        assert_eq!(
            env,
            TaskEnvelope::Failure {
                reason: ErrorKind::StatusRejected,
                extra: Some(json!("archived")),
            }
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(
            TaskEnvelope::from_value(&json!({"status": "success"})),
            Err(EnvelopeError::NotAnArray)
        );
        assert_eq!(
            TaskEnvelope::from_value(&json!(["maybe"])),
            Err(EnvelopeError::UnknownStatus("maybe".into()))
        );
        assert_eq!(
            TaskEnvelope::from_value(&json!(["success", "post"])),
            Err(EnvelopeError::Malformed("success"))
        );
        assert_eq!(
            TaskEnvelope::from_value(&json!(["failure", "not_a_reason"])),
            Err(EnvelopeError::Malformed("failure"))
        );
    }
}
