//! Moderation Types

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

// ============================================================================
// Database Models
// ============================================================================

/// CIDR-scoped ban rule.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Ban {
    pub id: i64,
    pub ip_address: String,
    pub description: Option<String>,
    pub active_until: Option<DateTime<Utc>>,
    pub scope: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ban {
    /// Ban length in whole days, `None` for permanent bans.
    pub fn duration_days(&self) -> Option<i64> {
        self.active_until
            .map(|until| (until - self.created_at).num_days())
    }

    /// Parsed network, `None` if the stored text is not a valid CIDR.
    pub fn network(&self) -> Option<IpNet> {
        parse_network(&self.ip_address).ok()
    }

    /// Whether the ban is active at `now`.
    pub fn is_in_effect(&self, now: DateTime<Utc>) -> bool {
        self.active && self.active_until.is_none_or(|until| until > now)
    }

    /// Whether the ban applies to `ip` in any of `scopes` at `now`.
    pub fn matches(&self, ip: IpAddr, scopes: &[String], now: DateTime<Utc>) -> bool {
        self.is_in_effect(now)
            && scope_applies(self.scope.as_deref(), scopes)
            && self.network().is_some_and(|net| net.contains(&ip))
    }
}

/// Regex-scoped banned word rule.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Banword {
    pub id: i64,
    pub expr: String,
    pub description: Option<String>,
    pub scope: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A global rule (no scope) applies everywhere; a scoped rule applies only
/// when its scope is among the current contexts.
pub fn scope_applies(rule_scope: Option<&str>, scopes: &[String]) -> bool {
    rule_scope.is_none_or(|scope| scopes.iter().any(|s| s == scope))
}

/// Scope string for a board context.
pub fn board_scope(slug: &str) -> String {
    format!("board:{slug}")
}

/// Parse a CIDR block or a bare address (treated as a host route).
pub fn parse_network(raw: &str) -> Result<IpNet, AppError> {
    let raw = raw.trim();
    raw.parse::<IpNet>()
        .or_else(|_| raw.parse::<IpAddr>().map(IpNet::from))
        .map(|net| net.trunc())
        .map_err(|_| AppError::invalid("ip_address", "Must be an IP address or CIDR block."))
}

/// `active_until` for a ban of `days` starting at `from`; zero means permanent.
pub fn active_until_from(from: DateTime<Utc>, days: Option<i64>) -> Option<DateTime<Utc>> {
    days.filter(|d| *d > 0).map(|d| from + Duration::days(d))
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBanRequest {
    #[validate(length(min = 1, max = 64, message = "This field is required."))]
    pub ip_address: String,
    #[validate(length(max = 4000, message = "Field cannot be longer than 4000 characters."))]
    pub description: Option<String>,
    /// Days; absent or zero for a permanent ban.
    #[validate(range(min = 0, message = "Duration cannot be negative."))]
    pub duration: Option<i64>,
    #[validate(length(max = 255, message = "Field cannot be longer than 255 characters."))]
    pub scope: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBanRequest {
    #[validate(length(min = 1, max = 64, message = "This field is required."))]
    pub ip_address: Option<String>,
    #[validate(length(max = 4000, message = "Field cannot be longer than 4000 characters."))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Duration cannot be negative."))]
    pub duration: Option<i64>,
    #[validate(length(max = 255, message = "Field cannot be longer than 255 characters."))]
    pub scope: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBanwordRequest {
    #[validate(length(min = 1, max = 1000, message = "This field is required."))]
    pub expr: String,
    #[validate(length(max = 4000, message = "Field cannot be longer than 4000 characters."))]
    pub description: Option<String>,
    #[validate(length(max = 255, message = "Field cannot be longer than 255 characters."))]
    pub scope: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBanwordRequest {
    #[validate(length(min = 1, max = 1000, message = "This field is required."))]
    pub expr: Option<String>,
    #[validate(length(max = 4000, message = "Field cannot be longer than 4000 characters."))]
    pub description: Option<String>,
    #[validate(length(max = 255, message = "Field cannot be longer than 255 characters."))]
    pub scope: Option<String>,
    pub active: Option<bool>,
}

const fn default_true() -> bool {
    true
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BanResponse {
    #[serde(flatten)]
    pub ban: Ban,
    pub duration: Option<i64>,
}

impl From<Ban> for BanResponse {
    fn from(ban: Ban) -> Self {
        let duration = ban.duration_days();
        Self { ban, duration }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ban(cidr: &str, scope: Option<&str>) -> Ban {
        let now = Utc::now();
        Ban {
            id: 1,
            ip_address: cidr.to_string(),
            description: None,
            active_until: None,
            scope: scope.map(str::to_string),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_cidr_containment() {
        let rule = ban("127.0.0.0/24", None);
        let now = Utc::now();
        assert!(rule.matches(ip("127.0.0.1"), &[], now));
        assert!(rule.matches(ip("127.0.0.255"), &[], now));
        assert!(!rule.matches(ip("127.0.1.1"), &[], now));
        assert!(!rule.matches(ip("::1"), &[], now));
    }

    #[test]
    fn test_ipv6_containment() {
        let rule = ban("2001:db8::/32", None);
        let now = Utc::now();
        assert!(rule.matches(ip("2001:db8:1::5"), &[], now));
        assert!(!rule.matches(ip("2001:db9::1"), &[], now));
    }

    #[test]
    fn test_scope_filtering() {
        let now = Utc::now();
        let scoped = ban("10.0.0.0/8", Some("board:foo"));
        assert!(scoped.matches(ip("10.1.2.3"), &[board_scope("foo")], now));
        assert!(!scoped.matches(ip("10.1.2.3"), &[board_scope("bar")], now));
        assert!(!scoped.matches(ip("10.1.2.3"), &[], now));

        let global = ban("10.0.0.0/8", None);
        assert!(global.matches(ip("10.1.2.3"), &[board_scope("bar")], now));
    }

    #[test]
    fn test_inactive_and_expired_rules_do_not_match() {
        let now = Utc::now();
        let mut rule = ban("10.0.0.1", None);
        rule.active = false;
        assert!(!rule.matches(ip("10.0.0.1"), &[], now));

        rule.active = true;
        rule.active_until = Some(now - Duration::seconds(1));
        assert!(!rule.matches(ip("10.0.0.1"), &[], now));

        rule.active_until = Some(now + Duration::days(1));
        assert!(rule.matches(ip("10.0.0.1"), &[], now));
    }

    #[test]
    fn test_parse_network_normalises() {
        assert_eq!(
            parse_network("127.0.0.9/24").unwrap().to_string(),
            "127.0.0.0/24"
        );
        assert_eq!(parse_network("10.0.0.1").unwrap().to_string(), "10.0.0.1/32");
        assert_eq!(parse_network("::1").unwrap().to_string(), "::1/128");
        assert!(parse_network("nope").is_err());
    }

    #[test]
    fn test_duration_is_derived_from_active_until() {
        let mut rule = ban("10.0.0.1", None);
        assert_eq!(rule.duration_days(), None);

        rule.active_until = active_until_from(rule.created_at, Some(7));
        assert_eq!(rule.duration_days(), Some(7));
        assert_eq!(active_until_from(rule.created_at, Some(0)), None);
    }
}
