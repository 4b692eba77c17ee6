//! DNS blacklist lookups.
//!
//! Settings (`ext.filters.dnsbl`): `null` or an empty list disables the
//! filter; a list of provider zones, or `{providers, fail_closed?}`.
//!
//! An address is listed when `<reversed-octets>.<provider>` resolves. Only
//! IPv4 clients are checked. Providers are queried concurrently.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use fb_common::ErrorKind;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::types::{Filter, FilterError, FilterServices, ServiceKind, Submission};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSettings {
    Providers(Vec<String>),
    Full {
        providers: Vec<String>,
        #[serde(default)]
        fail_closed: bool,
    },
}

/// Parsed settings block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DnsblSettings {
    pub providers: Vec<String>,
    pub fail_closed: bool,
}

impl DnsblSettings {
    pub fn from_value(value: &Value) -> Result<Self, FilterError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let raw: RawSettings = serde_json::from_value(value.clone())
            .map_err(|e| FilterError::Settings(format!("dnsbl: {e}")))?;
        Ok(match raw {
            RawSettings::Providers(providers) => Self {
                providers,
                fail_closed: false,
            },
            RawSettings::Full {
                providers,
                fail_closed,
            } => Self {
                providers,
                fail_closed,
            },
        })
    }
}

/// Query name for `ip` under `provider`.
pub fn query_name(ip: Ipv4Addr, provider: &str) -> String {
    let [a, b, c, d] = ip.octets();
    format!("{d}.{c}.{b}.{a}.{}", provider.trim_end_matches('.'))
}

/// DNSBL filter.
pub struct Dnsbl {
    settings: DnsblSettings,
    timeout: Duration,
}

impl Dnsbl {
    pub fn build(value: &Value, services: &FilterServices) -> Result<Box<dyn Filter>, FilterError> {
        let timeout = services
            .dns_timeout
            .ok_or(FilterError::MissingService(ServiceKind::Dns))?;
        Ok(Box::new(Self {
            settings: DnsblSettings::from_value(value)?,
            timeout,
        }))
    }

    /// `Some(listed)` on an answer, `None` on timeout.
    async fn lookup(&self, name: &str) -> Option<bool> {
        match tokio::time::timeout(self.timeout, tokio::net::lookup_host((name, 0))).await {
            Ok(Ok(mut addrs)) => Some(addrs.next().is_some()),
            // NXDOMAIN and friends mean "not listed".
            Ok(Err(_)) => Some(false),
            Err(_) => None,
        }
    }
}

#[async_trait]
impl Filter for Dnsbl {
    fn reject_kind(&self) -> ErrorKind {
        ErrorKind::DnsblRejected
    }

    async fn should_reject(&self, payload: &Submission) -> Result<bool, FilterError> {
        let Some(IpAddr::V4(ip)) = payload.ip() else {
            return Ok(false);
        };

        let lookups = self
            .settings
            .providers
            .iter()
            .map(|provider| async move { (provider, self.lookup(&query_name(ip, provider)).await) });

        let mut timed_out = false;
        for (provider, answer) in join_all(lookups).await {
            match answer {
                Some(true) => {
                    debug!(provider = %provider, "Address listed in DNSBL");
                    return Ok(true);
                }
                Some(false) => {}
                None => {
                    warn!(provider = %provider, "DNSBL lookup timed out");
                    timed_out = true;
                }
            }
        }
        if timed_out && self.settings.fail_closed {
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_query_name_reverses_octets() {
        let ip = Ipv4Addr::new(127, 0, 0, 2);
        assert_eq!(query_name(ip, "xbl.spamhaus.org"), "2.0.0.127.xbl.spamhaus.org");
        assert_eq!(
            query_name(Ipv4Addr::new(1, 2, 3, 4), "zen.example."),
            "4.3.2.1.zen.example"
        );
    }

    #[test]
    fn test_settings_forms() {
        assert_eq!(
            DnsblSettings::from_value(&Value::Null).unwrap(),
            DnsblSettings::default()
        );
        assert_eq!(
            DnsblSettings::from_value(&json!(["a.example"])).unwrap().providers,
            vec!["a.example".to_string()]
        );
        let full = DnsblSettings::from_value(&json!({"providers": [], "fail_closed": true}))
            .unwrap();
        assert!(full.fail_closed);
        assert!(DnsblSettings::from_value(&json!("nope")).is_err());
    }

    #[tokio::test]
    async fn test_ipv6_and_empty_providers_pass() {
        let services = FilterServices {
            dns_timeout: Some(Duration::from_secs(1)),
            ..Default::default()
        };
        let filter = Dnsbl::build(&json!([]), &services).unwrap();
        let mut payload = Submission {
            ip_address: "127.0.0.2".into(),
            body: "hello".into(),
            board: None,
            user_agent: None,
            referrer: None,
        };
        assert!(!filter.should_reject(&payload).await.unwrap());

        let filter = Dnsbl::build(&json!(["xbl.spamhaus.org"]), &services).unwrap();
        payload.ip_address = "::1".into();
        assert!(!filter.should_reject(&payload).await.unwrap());
    }
}
