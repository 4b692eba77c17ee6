//! Board Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use validator::Validate;

use crate::error::AppError;

/// Board visibility and write permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "board_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BoardStatus {
    Open,
    Restricted,
    Locked,
    Archived,
}

impl BoardStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Restricted => "restricted",
            Self::Locked => "locked",
            Self::Archived => "archived",
        }
    }

    /// Only open boards accept new topics.
    pub const fn accepts_topics(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Restricted boards still accept replies to existing topics.
    pub const fn accepts_posts(&self) -> bool {
        matches!(self, Self::Open | Self::Restricted)
    }

    /// Shown in public board listings.
    pub const fn is_listed(&self) -> bool {
        !matches!(self, Self::Archived)
    }

    pub fn rejection(&self) -> AppError {
        AppError::StatusRejected {
            status: self.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for BoardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-board configuration merged over built-in defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSettings {
    /// Posts per topic before it auto-locks.
    pub max_posts: i32,
    /// Topics kept in the active window; older ones are archived.
    pub max_topics: i64,
    /// Base cooldown between submissions, in seconds.
    pub post_delay: u64,
    /// Offenses before the cooldown reaches its ceiling (0 = fixed cooldown).
    pub post_delay_threshold: u32,
    /// Cooldown scale reference in seconds (0 = fixed cooldown).
    pub post_delay_period: u64,
    /// Whether posts carry a derived identity.
    pub use_ident: bool,
    /// Default poster name.
    pub name: String,
    /// Days without a post after which an open topic expires (0 = never).
    pub expire_duration: i64,
}

impl Default for BoardSettings {
    fn default() -> Self {
        Self {
            max_posts: 1000,
            max_topics: 100,
            post_delay: 10,
            post_delay_threshold: 0,
            post_delay_period: 0,
            use_ident: true,
            name: "Nameless Fanboi".into(),
            expire_duration: 0,
        }
    }
}

impl BoardSettings {
    /// Overlay a stored mapping on the built-in defaults.
    pub fn from_value(value: &Value) -> Self {
        Self::from_value_over(value, Self::default())
    }

    /// Overlay a stored mapping on `base`, key by key. Keys whose value has
    /// the wrong type keep the base value.
    pub fn from_value_over(value: &Value, base: Self) -> Self {
        let Some(stored) = value.as_object() else {
            return base;
        };

        let mut merged = match serde_json::to_value(&base) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        for (key, stored_value) in stored {
            let Some(default_value) = merged.get(key).cloned() else {
                continue;
            };
            merged.insert(key.clone(), stored_value.clone());
            if serde_json::from_value::<Self>(Value::Object(merged.clone())).is_err() {
                warn!(key = %key, "Ignoring board setting with unexpected type");
                merged.insert(key.clone(), default_value);
            }
        }

        serde_json::from_value(Value::Object(merged)).unwrap_or(base)
    }
}

/// Board model.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Board {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub agreements: Option<String>,
    pub status: BoardStatus,
    #[serde(skip)]
    pub settings: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    /// Stored settings merged over the built-in defaults.
    pub fn settings(&self) -> BoardSettings {
        BoardSettings::from_value(&self.settings)
    }

    /// Stored settings merged over `base`, usually the site-wide defaults.
    pub fn settings_over(&self, base: BoardSettings) -> BoardSettings {
        BoardSettings::from_value_over(&self.settings, base)
    }
}

/// Board as returned by the API, with merged settings.
#[derive(Debug, Serialize)]
pub struct BoardResponse {
    #[serde(flatten)]
    pub board: Board,
    pub settings: BoardSettings,
}

impl BoardResponse {
    pub fn new(board: Board, base: &BoardSettings) -> Self {
        let settings = board.settings_over(base.clone());
        Self { board, settings }
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBoardRequest {
    #[validate(
        length(min = 1, max = 64, message = "Field must be between 1 and 64 characters long."),
        custom(function = "validate_slug")
    )]
    pub slug: String,
    #[validate(length(min = 1, max = 255, message = "Field must be between 1 and 255 characters long."))]
    pub title: String,
    pub description: Option<String>,
    pub agreements: Option<String>,
    #[serde(default = "default_status")]
    pub status: BoardStatus,
    #[serde(default)]
    pub settings: Map<String, Value>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBoardRequest {
    #[validate(length(min = 1, max = 255, message = "Field must be between 1 and 255 characters long."))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub agreements: Option<String>,
    pub status: Option<BoardStatus>,
    /// Replaces the stored mapping.
    pub settings: Option<Map<String, Value>>,
}

const fn default_status() -> BoardStatus {
    BoardStatus::Open
}

/// Slugs are lowercase URL-safe identifiers.
pub fn validate_slug(slug: &str) -> Result<(), validator::ValidationError> {
    let valid = slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_');
    if valid {
        Ok(())
    } else {
        let mut err = validator::ValidationError::new("slug");
        err.message = Some("Field may only contain a-z, 0-9, - and _.".into());
        Err(err)
    }
}
