//! Identity Service
//!
//! Derives a short pseudonym from a set of tags (for posters: IP address and
//! board). The first caller for a tag tuple picks a random string and every
//! caller within the next 24 hours reads the same one back. Identities are
//! cosmetic; collisions are not detected.

use fb_common::TagKey;
use fred::prelude::*;
use fred::types::{Expiration, SetOptions};
use rand::Rng;

/// Key namespace for identity state.
pub const IDENTITY_NAMESPACE: &str = "services.identity";

/// Lifetime of an identity in seconds.
pub const IDENTITY_TTL_SECS: i64 = 86400;

/// The 64-symbol alphabet identities are drawn from.
pub const IDENT_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/.";

/// Random identity of `size` symbols.
pub fn random_ident(size: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..size)
        .map(|_| IDENT_ALPHABET[rng.gen_range(0..IDENT_ALPHABET.len())] as char)
        .collect()
}

/// Builds a key in the identity namespace.
pub fn identity_key<I, K, V>(tags: I) -> TagKey
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    TagKey::new(IDENTITY_NAMESPACE).tags(tags)
}

/// Redis-backed identity service.
#[derive(Clone)]
pub struct IdentityService {
    redis: Client,
}

impl IdentityService {
    pub const fn new(redis: Client) -> Self {
        Self { redis }
    }

    /// Stable identity for `key`, creating one of `size` symbols if absent.
    ///
    /// Concurrent first callers race on a create-if-absent write; all of
    /// them return whichever value won.
    #[tracing::instrument(skip(self), fields(key = %key))]
    pub async fn identity_for(&self, key: &TagKey, size: usize) -> Result<String, Error> {
        let encoded = key.encode();

        let existing: Option<String> = self.redis.get(&encoded).await?;
        if let Some(ident) = existing {
            return Ok(ident);
        }

        let candidate = random_ident(size);
        let created: Option<String> = self
            .redis
            .set(
                &encoded,
                candidate.as_str(),
                Some(Expiration::EX(IDENTITY_TTL_SECS)),
                Some(SetOptions::NX),
                false,
            )
            .await?;
        if created.is_some() {
            return Ok(candidate);
        }

        let winner: Option<String> = self.redis.get(&encoded).await?;
        Ok(winner.unwrap_or(candidate))
    }
}
