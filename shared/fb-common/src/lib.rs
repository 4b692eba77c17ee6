//! Fanboard Common Library
//!
//! Storage-free types shared by the server and its tests: the error-kind
//! taxonomy, the task result envelope, canonical tagged keys for the
//! in-memory store, and the post range expression language.

pub mod envelope;
pub mod error;
pub mod range;
pub mod tags;

pub use envelope::{EnvelopeError, TaskEnvelope};
pub use error::ErrorKind;
pub use range::{PostRange, RangeParseError, Selection};
pub use tags::TagKey;
