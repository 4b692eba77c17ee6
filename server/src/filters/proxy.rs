//! Proxy detection.
//!
//! Settings (`ext.filters.proxy_detect`):
//!
//! ```json
//! {
//!   "blackbox":   {"enabled": true, "url": "https://blackbox.ipinfo.app/lookup/"},
//!   "getipintel": {"enabled": true, "url": "https://check.getipintel.net/check.php",
//!                  "email": "admin@example.com", "flags": "m"},
//!   "fail_closed": false
//! }
//! ```
//!
//! BlackBox answers `Y` for proxies. GetIPIntel answers a probability; 0.99
//! or higher counts as a proxy and negative values are errors.

use async_trait::async_trait;
use fb_common::ErrorKind;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::types::{Filter, FilterError, FilterServices, Submission};

/// GetIPIntel probability at or above which an address is a proxy.
pub const GETIPINTEL_THRESHOLD: f64 = 0.99;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlackboxSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_blackbox_url")]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GetIpIntelSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_getipintel_url")]
    pub url: String,
    pub email: Option<String>,
    pub flags: Option<String>,
}

/// Parsed settings block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProxySettings {
    #[serde(default)]
    pub blackbox: BlackboxSettings,
    #[serde(default)]
    pub getipintel: GetIpIntelSettings,
    #[serde(default)]
    pub fail_closed: bool,
}

fn default_blackbox_url() -> String {
    "https://blackbox.ipinfo.app/lookup/".into()
}

fn default_getipintel_url() -> String {
    "https://check.getipintel.net/check.php".into()
}

impl ProxySettings {
    pub fn from_value(value: &Value) -> Result<Self, FilterError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value.clone())
            .map_err(|e| FilterError::Settings(format!("proxy_detect: {e}")))
    }
}

/// Parse a GetIPIntel response body.
pub fn parse_getipintel(body: &str) -> Result<bool, String> {
    let score: f64 = body
        .trim()
        .parse()
        .map_err(|_| format!("unexpected response {body:?}"))?;
    if score < 0.0 {
        return Err(format!("error code {score}"));
    }
    Ok(score >= GETIPINTEL_THRESHOLD)
}

/// Proxy detection filter.
pub struct ProxyDetect {
    settings: ProxySettings,
    http: reqwest::Client,
}

impl ProxyDetect {
    pub fn build(value: &Value, services: &FilterServices) -> Result<Box<dyn Filter>, FilterError> {
        Ok(Box::new(Self {
            settings: ProxySettings::from_value(value)?,
            http: services.http()?,
        }))
    }

    async fn blackbox(&self, ip: &str) -> Result<bool, String> {
        let url = format!("{}{ip}", self.settings.blackbox.url);
        let body = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?
            .text()
            .await
            .map_err(|e| e.to_string())?;
        Ok(body.trim() == "Y")
    }

    async fn getipintel(&self, ip: &str) -> Result<bool, String> {
        let settings = &self.settings.getipintel;
        let Some(email) = settings.email.as_deref() else {
            return Err("contact email not configured".into());
        };

        let mut query = vec![("ip", ip), ("contact", email)];
        if let Some(flags) = settings.flags.as_deref() {
            query.push(("flags", flags));
        }

        let body = self
            .http
            .get(&settings.url)
            .query(&query)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| e.to_string())?
            .text()
            .await
            .map_err(|e| e.to_string())?;
        parse_getipintel(&body)
    }

    fn resolve(&self, service: &str, result: Result<bool, String>) -> bool {
        match result {
            Ok(proxy) => proxy,
            Err(e) => {
                warn!(service, error = %e, fail_closed = self.settings.fail_closed, "Proxy check failed");
                self.settings.fail_closed
            }
        }
    }
}

#[async_trait]
impl Filter for ProxyDetect {
    fn reject_kind(&self) -> ErrorKind {
        ErrorKind::ProxyRejected
    }

    async fn should_reject(&self, payload: &Submission) -> Result<bool, FilterError> {
        let ip = payload.ip_address.as_str();

        if self.settings.blackbox.enabled {
            let result = self.blackbox(ip).await;
            if self.resolve("blackbox", result) {
                return Ok(true);
            }
        }

        if self.settings.getipintel.enabled {
            let result = self.getipintel(ip).await;
            if self.resolve("getipintel", result) {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::settings::default_for;

    #[test]
    fn test_default_settings_block_parses_disabled() {
        let value = default_for("ext.filters.proxy_detect").unwrap();
        let settings = ProxySettings::from_value(&value).unwrap();
        assert!(!settings.blackbox.enabled);
        assert!(!settings.getipintel.enabled);
        assert_eq!(settings.getipintel.url, "https://check.getipintel.net/check.php");
    }

    #[test]
    fn test_partial_settings() {
        let settings = ProxySettings::from_value(&json!({
            "getipintel": {"enabled": true, "email": "a@example.com"},
            "fail_closed": true
        }))
        .unwrap();
        assert!(settings.getipintel.enabled);
        assert_eq!(settings.getipintel.email.as_deref(), Some("a@example.com"));
        assert_eq!(settings.blackbox.url, "https://blackbox.ipinfo.app/lookup/");
        assert!(settings.fail_closed);
    }

    #[test]
    fn test_parse_getipintel() {
        assert_eq!(parse_getipintel("0.995"), Ok(true));
        assert_eq!(parse_getipintel("0.5\n"), Ok(false));
        assert!(parse_getipintel("-3").is_err());
        assert!(parse_getipintel("<html>").is_err());
    }

    #[tokio::test]
    async fn test_disabled_services_pass() {
        let services = FilterServices {
            http: Some(reqwest::Client::new()),
            ..Default::default()
        };
        let filter = ProxyDetect::build(&Value::Null, &services).unwrap();
        let payload = Submission {
            ip_address: "127.0.0.1".into(),
            body: "hello".into(),
            board: None,
            user_agent: None,
            referrer: None,
        };
        assert!(!filter.should_reject(&payload).await.unwrap());
    }
}
