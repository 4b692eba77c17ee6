//! Application Error Types
//!
//! `AppError` is shared by the submission pipeline, the task worker and the
//! HTTP layer. Every variant carries exactly one [`ErrorKind`] label, so the
//! same value can be written into a task envelope by the worker and re-raised
//! by the handler that reads the envelope back.

use std::collections::BTreeMap;

use axum::http::header::HeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fb_common::{ErrorKind, TaskEnvelope};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::error;

/// Field name to list of human-readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Application error.
#[derive(Debug, Error)]
pub enum AppError {
    /// Request parameters failed validation.
    #[error("Invalid parameters")]
    ParamsInvalid(FieldErrors),

    /// Board, topic, post or page does not exist.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Client address matches an active ban.
    #[error("You have been banned")]
    BanRejected { description: Option<String> },

    /// Client is inside a rate-limit window.
    #[error("Please wait {time_left} seconds before posting again")]
    RateLimited { time_left: i64 },

    /// Board or topic does not accept the write in its current status.
    #[error("Cannot post while {status}")]
    StatusRejected { status: String },

    /// Rejected by one of the admission filters.
    #[error("Rejected by the {} filter", filter_name(.0))]
    FilterRejected(ErrorKind),

    /// Admin write without a valid CSRF token.
    #[error("Missing or invalid CSRF token")]
    BadCsrf,

    /// Admin lacks the required permission.
    #[error("Permission denied")]
    Forbidden,

    /// Admin session missing, revoked or expired.
    #[error("Authentication required")]
    Unauthorized,

    /// A backing service is unavailable.
    #[error("Service busy: {0}")]
    ServiceBusy(String),

    /// Database error.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    /// Redis error.
    #[error("Redis error")]
    Redis(#[from] fred::error::Error),

    /// Anything else.
    #[error("Internal server error")]
    Internal(String),
}

fn filter_name(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::AkismetRejected => "akismet",
        ErrorKind::DnsblRejected => "dnsbl",
        ErrorKind::ProxyRejected => "proxy_detect",
        ErrorKind::BanwordRejected => "banword",
        _ => "unknown",
    }
}

impl AppError {
    /// Single-field validation error.
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(field.to_string(), vec![message.into()]);
        Self::ParamsInvalid(errors)
    }

    /// Taxonomic label.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ParamsInvalid(_) => ErrorKind::ParamsInvalid,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BanRejected { .. } => ErrorKind::BanRejected,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::StatusRejected { .. } => ErrorKind::StatusRejected,
            Self::FilterRejected(kind) => *kind,
            Self::BadCsrf => ErrorKind::BadCsrf,
            Self::Forbidden => ErrorKind::Forbidden,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::ServiceBusy(_) | Self::Redis(_) => ErrorKind::ServiceBusy,
            Self::Database(sqlx::Error::RowNotFound) => ErrorKind::NotFound,
            Self::Database(sqlx::Error::PoolTimedOut) => ErrorKind::ServiceBusy,
            Self::Database(_) | Self::Internal(_) => ErrorKind::Unknown,
        }
    }

    /// HTTP status for this error.
    pub const fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::ParamsInvalid
            | ErrorKind::StatusRejected
            | ErrorKind::AkismetRejected
            | ErrorKind::DnsblRejected
            | ErrorKind::ProxyRejected
            | ErrorKind::BanwordRejected
            | ErrorKind::BadCsrf => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BanRejected | ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::ServiceBusy => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Encodes the error as a failure envelope.
    ///
    /// Infrastructure errors collapse to `unknown`/`service_busy` without
    /// their internal message.
    pub fn to_envelope(&self) -> TaskEnvelope {
        match self {
            Self::StatusRejected { status } => {
                TaskEnvelope::failure_with(ErrorKind::StatusRejected, status.clone())
            }
            Self::RateLimited { time_left } => {
                TaskEnvelope::failure_with(ErrorKind::RateLimited, *time_left)
            }
            Self::BanRejected {
                description: Some(description),
            } => TaskEnvelope::failure_with(ErrorKind::BanRejected, description.clone()),
            Self::NotFound(what) => TaskEnvelope::failure_with(ErrorKind::NotFound, *what),
            other => TaskEnvelope::failure(other.kind()),
        }
    }

    /// Rebuilds the typed error from a failure envelope.
    pub fn from_failure(reason: ErrorKind, extra: Option<&Value>) -> Self {
        let extra_str = || extra.and_then(Value::as_str).map(str::to_string);
        match reason {
            ErrorKind::ParamsInvalid => Self::ParamsInvalid(FieldErrors::new()),
            ErrorKind::NotFound => Self::NotFound(match extra.and_then(Value::as_str) {
                Some("board") => "board",
                Some("topic") => "topic",
                Some("post") => "post",
                Some("page") => "page",
                _ => "resource",
            }),
            ErrorKind::BanRejected => Self::BanRejected {
                description: extra_str(),
            },
            ErrorKind::RateLimited => Self::RateLimited {
                time_left: extra.and_then(Value::as_i64).unwrap_or(0),
            },
            ErrorKind::StatusRejected => Self::StatusRejected {
                status: extra_str().unwrap_or_default(),
            },
            ErrorKind::AkismetRejected
            | ErrorKind::DnsblRejected
            | ErrorKind::ProxyRejected
            | ErrorKind::BanwordRejected => Self::FilterRejected(reason),
            ErrorKind::BadCsrf => Self::BadCsrf,
            ErrorKind::Forbidden => Self::Forbidden,
            ErrorKind::Unauthorized => Self::Unauthorized,
            ErrorKind::ServiceBusy => Self::ServiceBusy("task backend".into()),
            ErrorKind::Unknown => Self::Internal("task failed".into()),
        }
    }

    fn extra_fields(&self) -> Map<String, Value> {
        let mut extra = Map::new();
        match self {
            Self::ParamsInvalid(errors) => {
                extra.insert("errors".into(), json!(errors));
            }
            Self::BanRejected { description } => {
                extra.insert("description".into(), json!(description));
            }
            Self::RateLimited { time_left } => {
                extra.insert("time_left".into(), json!(time_left));
            }
            Self::StatusRejected { status } => {
                extra.insert("current".into(), json!(status));
            }
            Self::FilterRejected(kind) => {
                extra.insert("filter".into(), json!(filter_name(kind)));
            }
            _ => {}
        }
        extra
    }

    /// JSON error body.
    pub fn body(&self) -> Value {
        let message = match self {
            Self::Database(_) | Self::Redis(_) | Self::Internal(_) => {
                "The server encountered an internal error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = Map::new();
        body.insert("type".into(), json!("error"));
        body.insert("status".into(), json!(self.kind().as_str()));
        body.insert("message".into(), json!(message));
        body.extend(self.extra_fields());
        Value::Object(body)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "Field is invalid.".to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self::ParamsInvalid(fields)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Database(e) => error!(error = %e, "Database error"),
            Self::Redis(e) => error!(error = %e, "Redis error"),
            Self::Internal(msg) => error!(error = %msg, "Internal error"),
            _ => {}
        }

        let mut response = (self.status_code(), Json(self.body())).into_response();
        if let Self::RateLimited { time_left } = &self {
            if let Ok(v) = HeaderValue::from_str(&time_left.to_string()) {
                response.headers_mut().insert("Retry-After", v);
            }
        }
        response
    }
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::invalid("body", "x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("topic").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::BanRejected { description: None }.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::RateLimited { time_left: 5 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::StatusRejected {
                status: "locked".into()
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::FilterRejected(ErrorKind::DnsblRejected).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::BadCsrf.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::ServiceBusy("redis".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_body_shape() {
        let body = AppError::RateLimited { time_left: 7 }.body();
        assert_eq!(body["type"], "error");
        assert_eq!(body["status"], "rate_limited");
        assert_eq!(body["time_left"], 7);

        let body = AppError::invalid("body", "Field must be between 5 and 4000 characters long.")
            .body();
        assert_eq!(body["status"], "params_invalid");
        assert_eq!(
            body["errors"]["body"][0],
            "Field must be between 5 and 4000 characters long."
        );
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let body = AppError::Internal("secret detail".into()).body();
        assert_eq!(body["status"], "unknown");
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }

    #[test]
    fn test_envelope_round_trip_keeps_status_extra() {
        let err = AppError::StatusRejected {
            status: "archived".into(),
        };
        let env = err.to_envelope();
        let TaskEnvelope::Failure { reason, extra } = env else {
            panic!("expected failure envelope");
        };
        let back = AppError::from_failure(reason, extra.as_ref());
        assert!(matches!(back, AppError::StatusRejected { ref status } if status == "archived"));
    }

    #[test]
    fn test_filter_rejection_envelope() {
        let env = AppError::FilterRejected(ErrorKind::AkismetRejected).to_envelope();
        assert_eq!(env.to_value(), json!(["failure", "akismet_rejected"]));
    }

    #[tokio::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited { time_left: 9 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "9");
    }
}
