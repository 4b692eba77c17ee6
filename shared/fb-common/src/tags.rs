//! Canonical Tagged Keys
//!
//! Rate-limit and identity state is addressed by a free-form set of tags.
//! The key is the namespace followed by the sorted `k=v` pairs joined with
//! commas, e.g. `services.rate_limiter:board=foo,ip_address=127.0.0.1`.
//! The format is shared with existing stores and must not change.

/// Builder for a canonical key over a set of tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagKey {
    namespace: String,
    tags: Vec<(String, String)>,
}

impl TagKey {
    /// Starts a key in the given namespace (e.g. `services.identity`).
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            tags: Vec::new(),
        }
    }

    /// Adds a tag. A repeated name replaces the earlier value.
    #[must_use]
    pub fn tag(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        if let Some(slot) = self.tags.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.tags.push((name, value));
        }
        self
    }

    /// Adds every tag from an iterator of pairs.
    #[must_use]
    pub fn tags<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        pairs.into_iter().fold(self, |key, (k, v)| key.tag(k, v))
    }

    /// Whether no tags were added.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Renders the canonical key string.
    pub fn encode(&self) -> String {
        let mut pairs: Vec<String> = self
            .tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        pairs.sort();
        format!("{}:{}", self.namespace, pairs.join(","))
    }
}

impl std::fmt::Display for TagKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}
