//! Topic Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;

/// Topic lifecycle. Moves only forward:
/// `open -> locked -> archived` or `open -> archived` or `open -> expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "topic_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TopicStatus {
    Open,
    Locked,
    Archived,
    Expired,
}

impl TopicStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Locked => "locked",
            Self::Archived => "archived",
            Self::Expired => "expired",
        }
    }

    pub const fn accepts_posts(&self) -> bool {
        matches!(self, Self::Open)
    }

    pub fn rejection(&self) -> AppError {
        AppError::StatusRejected {
            status: self.as_str().to_string(),
        }
    }
}

/// Topic joined with its counters.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Topic {
    pub id: i64,
    pub board_id: i64,
    pub title: String,
    pub status: TopicStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub post_count: i32,
    pub posted_at: DateTime<Utc>,
    pub bumped_at: DateTime<Utc>,
}

/// Anonymous topic submission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 5, max = 200, message = "Field must be between 5 and 200 characters long."))]
    pub title: String,
    #[validate(length(min = 5, max = 4000, message = "Field must be between 5 and 4000 characters long."))]
    pub body: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTopicRequest {
    pub status: TopicStatus,
}
