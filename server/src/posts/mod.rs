//! Posts
//!
//! Replies within a topic, numbered densely from 1.

pub mod handlers;
pub mod queries;
pub mod types;
pub mod writer;

pub use queries::PostQuery;
pub use types::{CreatePostRequest, IdentType, NewPost, Post, PostAuthor};
pub use writer::{Attribution, PostWriter};
