//! Built-in setting defaults.
//!
//! Only keys listed here are readable through safe lookups and writable
//! through the admin API.

use serde_json::{json, Value};

/// Every known setting key, in display order.
pub const DEFAULT_KEYS: &[&str] = &[
    "app.time_zone",
    "app.ident_size",
    "app.max_posts",
    "app.post_delay",
    "ext.filters.akismet",
    "ext.filters.banword",
    "ext.filters.dnsbl",
    "ext.filters.proxy_detect",
    "setup.version",
];

/// Built-in value for `key`, if the key is known.
pub fn default_for(key: &str) -> Option<Value> {
    let value = match key {
        "app.time_zone" => json!("UTC"),
        "app.ident_size" => json!(10),
        "app.max_posts" => json!(1000),
        "app.post_delay" => json!(10),
        "ext.filters.akismet" => Value::Null,
        "ext.filters.banword" => json!(true),
        "ext.filters.dnsbl" => json!(["proxies.dnsbl.sorbs.net", "xbl.spamhaus.org"]),
        "ext.filters.proxy_detect" => json!({
            "blackbox": {
                "enabled": false,
                "url": "https://blackbox.ipinfo.app/lookup/"
            },
            "getipintel": {
                "enabled": false,
                "url": "https://check.getipintel.net/check.php",
                "email": null,
                "flags": null
            }
        }),
        "setup.version" => Value::Null,
        _ => return None,
    };
    Some(value)
}

/// Whether `key` appears in the defaults table.
pub fn is_known(key: &str) -> bool {
    DEFAULT_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_listed_key_has_a_default() {
        for key in DEFAULT_KEYS {
            assert!(default_for(key).is_some(), "missing default for {key}");
        }
    }

    #[test]
    fn test_unknown_key() {
        assert!(default_for("app.nope").is_none());
        assert!(!is_known("app.nope"));
    }

    #[test]
    fn test_core_values() {
        assert_eq!(default_for("app.ident_size"), Some(json!(10)));
        assert_eq!(default_for("app.max_posts"), Some(json!(1000)));
        assert_eq!(default_for("app.post_delay"), Some(json!(10)));
        assert_eq!(default_for("setup.version"), Some(Value::Null));
    }
}
