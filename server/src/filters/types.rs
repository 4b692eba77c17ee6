//! Filter plug-in types.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fb_common::ErrorKind;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::AppError;
use crate::moderation::BanwordCache;

/// Submission payload evaluated by the filter chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub ip_address: String,
    pub body: String,
    pub board: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl Submission {
    /// Parsed client address, `None` if the stored text is not an IP.
    pub fn ip(&self) -> Option<IpAddr> {
        self.ip_address.parse().ok()
    }

    /// Scope strings this submission is evaluated under.
    pub fn scopes(&self) -> Vec<String> {
        self.board
            .as_deref()
            .map(crate::moderation::board_scope)
            .into_iter()
            .collect()
    }
}

/// Errors raised while building or running a filter.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("Filter requires unavailable service {0:?}")]
    MissingService(ServiceKind),

    #[error("Invalid filter settings: {0}")]
    Settings(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Database(e) => Self::Database(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// A single admission predicate.
#[async_trait]
pub trait Filter: Send + Sync {
    /// Label used in the failure envelope when this filter rejects.
    fn reject_kind(&self) -> ErrorKind;

    /// Whether the submission should be refused.
    ///
    /// External-service failures are resolved inside the filter according
    /// to its fail-open/fail-closed setting; only local faults are returned
    /// as errors.
    async fn should_reject(&self, payload: &Submission) -> Result<bool, FilterError>;
}

/// Services a filter may declare as dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Outbound HTTP client.
    Http,
    /// DNS resolution.
    Dns,
    /// Database pool and compiled banword cache.
    Banwords,
}

/// Services available to filter constructors.
#[derive(Clone, Default)]
pub struct FilterServices {
    pub http: Option<reqwest::Client>,
    pub dns_timeout: Option<Duration>,
    pub banwords: Option<(PgPool, Arc<BanwordCache>)>,
    /// Public base URL, reported to Akismet.
    pub server_url: String,
}

impl FilterServices {
    /// Whether `kind` is available.
    pub const fn provides(&self, kind: ServiceKind) -> bool {
        match kind {
            ServiceKind::Http => self.http.is_some(),
            ServiceKind::Dns => self.dns_timeout.is_some(),
            ServiceKind::Banwords => self.banwords.is_some(),
        }
    }

    /// Fail unless every service in `required` is available.
    pub fn check(&self, required: &[ServiceKind]) -> Result<(), FilterError> {
        match required.iter().find(|kind| !self.provides(**kind)) {
            Some(kind) => Err(FilterError::MissingService(*kind)),
            None => Ok(()),
        }
    }

    pub fn http(&self) -> Result<reqwest::Client, FilterError> {
        self.http
            .clone()
            .ok_or(FilterError::MissingService(ServiceKind::Http))
    }
}
