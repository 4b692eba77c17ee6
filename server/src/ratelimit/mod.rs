//! Rate limiting for anonymous submissions.
//!
//! Cooldowns are keyed by tagged client attributes (typically IP address
//! and board) and live in Redis so every server process sees them.

pub mod ip;
pub mod limiter;

pub use ip::{extract_client_ip, ClientIp};
pub use limiter::{
    rate_key, scaled_ttl, submission_key, Limit, RateLimiter, RATE_LIMITER_NAMESPACE,
};
