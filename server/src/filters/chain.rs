//! Filter registry and chain.
//!
//! The registry holds named constructors in evaluation order. The chain reads
//! each filter's `ext.filters.<name>` settings block, builds the filter and
//! stops at the first rejection. Submissions from an address seen recently
//! skip the chain entirely, so retried HTTP requests are not re-checked
//! against slow external services.

use std::sync::Arc;

use async_trait::async_trait;
use fb_common::ErrorKind;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use super::types::{Filter, FilterError, FilterServices, ServiceKind, Submission};
use crate::error::{AppError, AppResult};
use crate::settings::SettingStore;

/// Constructor signature for a filter.
pub type FilterCtor =
    Arc<dyn Fn(&Value, &FilterServices) -> Result<Box<dyn Filter>, FilterError> + Send + Sync>;

/// Named filter constructor with its service requirements.
#[derive(Clone)]
pub struct FilterFactory {
    pub name: &'static str,
    pub requires: &'static [ServiceKind],
    ctor: FilterCtor,
}

impl FilterFactory {
    pub fn new<F>(name: &'static str, requires: &'static [ServiceKind], ctor: F) -> Self
    where
        F: Fn(&Value, &FilterServices) -> Result<Box<dyn Filter>, FilterError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name,
            requires,
            ctor: Arc::new(ctor),
        }
    }

    /// Build the filter after checking its declared services.
    pub fn instantiate(
        &self,
        settings: &Value,
        services: &FilterServices,
    ) -> Result<Box<dyn Filter>, FilterError> {
        services.check(self.requires)?;
        (self.ctor)(settings, services)
    }
}

/// Ordered collection of filter constructors.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    factories: Vec<FilterFactory>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constructor. Evaluation follows registration order.
    #[must_use]
    pub fn register(mut self, factory: FilterFactory) -> Self {
        self.factories.push(factory);
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterFactory> {
        self.factories.iter()
    }
}

/// Lookup for the recently-seen short circuit.
#[async_trait]
pub trait SeenLookup: Send + Sync {
    async fn was_recently_seen(&self, ip_address: &str) -> sqlx::Result<bool>;
}

/// Result of running the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    /// Name of the rejecting filter, if any.
    pub rejected_by: Option<&'static str>,
    /// Reason label of the rejecting filter.
    #[serde(skip)]
    pub reject_kind: Option<ErrorKind>,
    /// Filters evaluated, in order, up to and including the rejecting one.
    pub filters: Vec<&'static str>,
}

impl FilterOutcome {
    /// Outcome of a skipped chain.
    pub const fn skipped() -> Self {
        Self {
            rejected_by: None,
            reject_kind: None,
            filters: Vec::new(),
        }
    }

    /// The rejection as an application error.
    pub fn rejection(&self) -> Option<AppError> {
        self.reject_kind.map(AppError::FilterRejected)
    }
}

/// Ordered filter evaluation.
#[derive(Clone)]
pub struct FilterChain {
    registry: FilterRegistry,
    services: FilterServices,
    settings: SettingStore,
    seen: Arc<dyn SeenLookup>,
}

impl FilterChain {
    pub fn new(
        registry: FilterRegistry,
        services: FilterServices,
        settings: SettingStore,
        seen: Arc<dyn SeenLookup>,
    ) -> Self {
        Self {
            registry,
            services,
            settings,
            seen,
        }
    }

    /// Run every filter in order; the first rejection wins.
    #[tracing::instrument(skip(self, payload), fields(ip = %payload.ip_address))]
    pub async fn evaluate(&self, payload: &Submission) -> AppResult<FilterOutcome> {
        if self.seen.was_recently_seen(&payload.ip_address).await? {
            debug!("Recently seen, skipping filters");
            return Ok(FilterOutcome::skipped());
        }

        let mut trail = Vec::new();
        for factory in self.registry.iter() {
            let key = format!("ext.filters.{}", factory.name);
            let settings = self.settings.get(&key).await?;
            let filter = factory.instantiate(&settings, &self.services)?;
            trail.push(factory.name);

            if filter.should_reject(payload).await? {
                info!(filter = factory.name, filters = ?trail, "Submission rejected by filter");
                return Ok(FilterOutcome {
                    rejected_by: Some(factory.name),
                    reject_kind: Some(filter.reject_kind()),
                    filters: trail,
                });
            }
        }

        Ok(FilterOutcome {
            rejected_by: None,
            reject_kind: None,
            filters: trail,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use sqlx::PgPool;

    use super::*;

    struct Seen(bool);

    #[async_trait]
    impl SeenLookup for Seen {
        async fn was_recently_seen(&self, _ip_address: &str) -> sqlx::Result<bool> {
            Ok(self.0)
        }
    }

    struct Fixed {
        reject: bool,
        kind: ErrorKind,
    }

    #[async_trait]
    impl Filter for Fixed {
        fn reject_kind(&self) -> ErrorKind {
            self.kind
        }

        async fn should_reject(&self, _payload: &Submission) -> Result<bool, FilterError> {
            Ok(self.reject)
        }
    }

    fn fixed(
        name: &'static str,
        reject: bool,
        kind: ErrorKind,
        built: Arc<AtomicUsize>,
    ) -> FilterFactory {
        FilterFactory::new(
            name,
            &[],
            move |_, _| {
                built.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(Fixed { reject, kind }) as Box<dyn Filter>)
            },
        )
    }

    fn payload() -> Submission {
        Submission {
            ip_address: "127.0.0.1".into(),
            body: "hello world".into(),
            board: Some("foo".into()),
            user_agent: None,
            referrer: None,
        }
    }

    fn chain(pool: PgPool, registry: FilterRegistry, seen: bool) -> FilterChain {
        FilterChain::new(
            registry,
            FilterServices::default(),
            SettingStore::new(pool, Duration::from_secs(60)),
            Arc::new(Seen(seen)),
        )
    }

    #[sqlx::test]
    async fn test_first_rejection_wins(pool: PgPool) {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = FilterRegistry::new()
            .register(fixed("akismet", false, ErrorKind::AkismetRejected, built.clone()))
            .register(fixed("dnsbl", true, ErrorKind::DnsblRejected, built.clone()))
            .register(fixed("proxy_detect", true, ErrorKind::ProxyRejected, built.clone()));

        let outcome = chain(pool, registry, false).evaluate(&payload()).await.unwrap();
        assert_eq!(outcome.rejected_by, Some("dnsbl"));
        assert_eq!(outcome.filters, vec!["akismet", "dnsbl"]);
        assert!(matches!(
            outcome.rejection(),
            Some(AppError::FilterRejected(ErrorKind::DnsblRejected))
        ));
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[sqlx::test]
    async fn test_all_pass(pool: PgPool) {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = FilterRegistry::new()
            .register(fixed("akismet", false, ErrorKind::AkismetRejected, built.clone()))
            .register(fixed("dnsbl", false, ErrorKind::DnsblRejected, built.clone()));

        let outcome = chain(pool, registry, false).evaluate(&payload()).await.unwrap();
        assert_eq!(outcome.rejected_by, None);
        assert_eq!(outcome.filters, vec!["akismet", "dnsbl"]);
        assert!(outcome.rejection().is_none());
    }

    #[sqlx::test]
    async fn test_recently_seen_builds_nothing(pool: PgPool) {
        let built = Arc::new(AtomicUsize::new(0));
        let registry = FilterRegistry::new()
            .register(fixed("dnsbl", true, ErrorKind::DnsblRejected, built.clone()));

        let outcome = chain(pool, registry, true).evaluate(&payload()).await.unwrap();
        assert_eq!(outcome, FilterOutcome::skipped());
        assert_eq!(built.load(Ordering::SeqCst), 0);
    }

    #[sqlx::test]
    async fn test_settings_block_is_passed_to_constructor(pool: PgPool) {
        let store = SettingStore::new(pool.clone(), Duration::from_secs(60));
        store
            .update("ext.filters.akismet", json!({"key": "abc"}))
            .await
            .unwrap();

        let registry = FilterRegistry::new().register(FilterFactory::new(
            "akismet",
            &[],
            |settings, _| {
                assert_eq!(settings["key"], "abc");
                Ok(Box::new(Fixed {
                    reject: false,
                    kind: ErrorKind::AkismetRejected,
                }) as Box<dyn Filter>)
            },
        ));

        let outcome = chain(pool, registry, false).evaluate(&payload()).await.unwrap();
        assert_eq!(outcome.filters, vec!["akismet"]);
    }

    #[sqlx::test]
    async fn test_missing_service_fails_the_chain(pool: PgPool) {
        let registry = FilterRegistry::new().register(FilterFactory::new(
            "akismet",
            &[ServiceKind::Http],
            |_, _| unreachable!("constructor must not run"),
        ));

        let result = chain(pool, registry, false).evaluate(&payload()).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
