//! Types for pages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::format::render;

/// Which routes a page is reachable from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "page_namespace", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PageNamespace {
    Public,
    Internal,
}

impl PageNamespace {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for PageNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a page body is turned into HTML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "page_formatter", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PageFormatter {
    #[default]
    Markdown,
    Html,
    None,
}

/// Stored page.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Page {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub namespace: PageNamespace,
    pub formatter: PageFormatter,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Body rendered with the page's formatter.
    pub fn body_formatted(&self) -> String {
        render(self.formatter, &self.body)
    }
}

/// Page metadata for listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PageListItem {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub namespace: PageNamespace,
    pub updated_at: DateTime<Utc>,
}

/// Page with its rendered body.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    #[serde(flatten)]
    pub page: Page,
    pub body_formatted: String,
}

impl From<Page> for PageResponse {
    fn from(page: Page) -> Self {
        let body_formatted = page.body_formatted();
        Self {
            page,
            body_formatted,
        }
    }
}

/// Request body for creating a public page.
#[derive(Debug, Deserialize)]
pub struct CreatePageRequest {
    pub title: String,
    /// Derived from the title when absent.
    pub slug: Option<String>,
    pub body: String,
    #[serde(default)]
    pub formatter: PageFormatter,
}

/// Request body for updating a public page.
#[derive(Debug, Deserialize)]
pub struct UpdatePageRequest {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub body: Option<String>,
    pub formatter: Option<PageFormatter>,
}

/// Request body for writing an internal page. The formatter is fixed by
/// the whitelist.
#[derive(Debug, Deserialize)]
pub struct InternalPageRequest {
    pub title: String,
    pub body: String,
}
