//! Constants for pages.

use super::types::PageFormatter;

/// Maximum body size in bytes (100KB).
pub const MAX_BODY_SIZE: usize = 102_400;

/// Maximum title length in characters.
pub const MAX_TITLE_LENGTH: usize = 255;

/// Maximum slug length in characters.
pub const MAX_SLUG_LENGTH: usize = 64;

/// Internal pages that may exist, with the formatter each one is rendered
/// with. Internal slugs outside this table are never read or written.
pub const INTERNAL_PAGES: &[(&str, PageFormatter)] = &[
    ("global/css", PageFormatter::None),
    ("global/appendix", PageFormatter::Markdown),
    ("global/footer", PageFormatter::Html),
    ("global/api", PageFormatter::Markdown),
];

/// Public slugs that would shadow API routes.
pub const RESERVED_SLUGS: &[&str] = &["admin", "api", "new", "edit", "delete", "internal"];

/// Formatter for a whitelisted internal slug.
pub fn internal_formatter(slug: &str) -> Option<PageFormatter> {
    INTERNAL_PAGES
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, formatter)| *formatter)
}
