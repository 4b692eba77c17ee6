//! Admission Filters
//!
//! Pluggable predicates evaluated in order over each submission before it is
//! written. Each filter reads its own `ext.filters.<name>` settings block.

pub mod akismet;
pub mod banword;
pub mod chain;
pub mod dnsbl;
pub mod proxy;
pub mod types;

pub use chain::{FilterChain, FilterFactory, FilterOutcome, FilterRegistry, SeenLookup};
pub use types::{Filter, FilterError, FilterServices, ServiceKind, Submission};

/// The built-in filters in evaluation order.
pub fn default_registry() -> FilterRegistry {
    FilterRegistry::new()
        .register(FilterFactory::new(
            "banword",
            &[ServiceKind::Banwords],
            banword::BanwordFilter::build,
        ))
        .register(FilterFactory::new(
            "akismet",
            &[ServiceKind::Http],
            akismet::Akismet::build,
        ))
        .register(FilterFactory::new(
            "dnsbl",
            &[ServiceKind::Dns],
            dnsbl::Dnsbl::build,
        ))
        .register(FilterFactory::new(
            "proxy_detect",
            &[ServiceKind::Http],
            proxy::ProxyDetect::build,
        ))
}
