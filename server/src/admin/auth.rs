//! Admin credentials, session tokens and CSRF tokens.
//!
//! - Passwords are stored as Argon2id PHC strings.
//! - Session tokens are 32 random bytes, hex encoded. Only their SHA-256
//!   digest is stored.
//! - The CSRF token of a session is `HMAC-SHA256(secret_key, session_token)`,
//!   so it can be recomputed without storing it.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::error::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Hash a password for storage.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Check `password` against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// New random session token.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Digest stored in place of a session token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// CSRF token bound to a session token.
pub fn csrf_token(secret_key: &str, session_token: &str) -> String {
    // HMAC accepts keys of any length
    let Ok(mut mac) = HmacSha256::new_from_slice(secret_key.as_bytes()) else {
        return String::new();
    };
    mac.update(session_token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a presented CSRF token.
pub fn verify_csrf(secret_key: &str, session_token: &str, presented: &str) -> bool {
    let expected = csrf_token(secret_key, session_token);
    !expected.is_empty()
        && expected.len() == presented.len()
        && expected
            .as_bytes()
            .iter()
            .zip(presented.as_bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}
