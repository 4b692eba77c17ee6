//! Error Kind Taxonomy
//!
//! Every rejection the admission pipeline can produce has exactly one
//! label. The same label is used in task envelopes and in HTTP error bodies.

use serde::{Deserialize, Serialize};

/// Taxonomic label for a failed request or admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Shape validation or length bounds failed.
    ParamsInvalid,
    /// Missing board, topic, post or page.
    NotFound,
    /// The client address matches an active ban rule.
    BanRejected,
    /// The client is inside a rate-limit window.
    RateLimited,
    /// The board or topic does not accept posts in its current status.
    StatusRejected,
    /// Rejected by the Akismet spam check.
    AkismetRejected,
    /// Rejected by a DNS blacklist.
    DnsblRejected,
    /// Rejected by proxy detection.
    ProxyRejected,
    /// Rejected by a banned word expression.
    BanwordRejected,
    /// Admin write without a valid CSRF token.
    BadCsrf,
    /// Admin lacks the permission for this action.
    Forbidden,
    /// Admin session missing, revoked or idle too long.
    Unauthorized,
    /// A backing service (Redis, database pool) is unavailable.
    ServiceBusy,
    /// Anything else, including task timeouts without a rate-limit mark.
    Unknown,
}

impl ErrorKind {
    /// Wire label for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ParamsInvalid => "params_invalid",
            Self::NotFound => "not_found",
            Self::BanRejected => "ban_rejected",
            Self::RateLimited => "rate_limited",
            Self::StatusRejected => "status_rejected",
            Self::AkismetRejected => "akismet_rejected",
            Self::DnsblRejected => "dnsbl_rejected",
            Self::ProxyRejected => "proxy_rejected",
            Self::BanwordRejected => "banword_rejected",
            Self::BadCsrf => "bad_csrf",
            Self::Forbidden => "forbidden",
            Self::Unauthorized => "unauthorized",
            Self::ServiceBusy => "service_busy",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a wire label back into a kind.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.as_str() == label)
    }

    /// All kinds, in declaration order.
    pub const fn all() -> &'static [Self] {
        &[
            Self::ParamsInvalid,
            Self::NotFound,
            Self::BanRejected,
            Self::RateLimited,
            Self::StatusRejected,
            Self::AkismetRejected,
            Self::DnsblRejected,
            Self::ProxyRejected,
            Self::BanwordRejected,
            Self::BadCsrf,
            Self::Forbidden,
            Self::Unauthorized,
            Self::ServiceBusy,
            Self::Unknown,
        ]
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
