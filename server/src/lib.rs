//! Fanboard Server
//!
//! Anonymous imageboard backend. Submissions are checked synchronously for
//! bans and cooldowns, then admitted asynchronously through a filter chain
//! before the topic or post is written.

pub mod admin;
pub mod api;
pub mod boards;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod identity;
pub mod moderation;
pub mod pages;
pub mod posts;
pub mod ratelimit;
pub mod settings;
pub mod tasks;
pub mod topics;
