//! Task Types

use chrono::{DateTime, Utc};
use fb_common::TaskEnvelope;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::filters::Submission;

/// What a queued submission should create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    CreateTopic {
        board: String,
        title: String,
        body: String,
    },
    CreatePost {
        board: String,
        topic_id: i64,
        body: String,
        bumped: bool,
    },
}

impl TaskKind {
    /// Board slug the submission targets.
    pub fn board(&self) -> &str {
        match self {
            Self::CreateTopic { board, .. } | Self::CreatePost { board, .. } => board,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            Self::CreateTopic { body, .. } | Self::CreatePost { body, .. } => body,
        }
    }
}

/// A queued anonymous submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub uid: String,
    #[serde(flatten)]
    pub kind: TaskKind,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        kind: TaskKind,
        ip_address: String,
        user_agent: Option<String>,
        referrer: Option<String>,
    ) -> Self {
        Self {
            uid: Uuid::now_v7().simple().to_string(),
            kind,
            ip_address,
            user_agent,
            referrer,
            enqueued_at: Utc::now(),
        }
    }

    /// Payload handed to the filter chain.
    pub fn submission(&self) -> Submission {
        Submission {
            ip_address: self.ip_address.clone(),
            body: self.kind.body().to_string(),
            board: Some(self.kind.board().to_string()),
            user_agent: self.user_agent.clone(),
            referrer: self.referrer.clone(),
        }
    }
}

/// State of a task as seen by pollers.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskResult {
    /// Queued or running.
    Pending,
    Done(TaskEnvelope),
}

/// Response to an accepted submission.
#[derive(Debug, Serialize)]
pub struct TaskHandle {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
}

impl TaskHandle {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            kind: "task",
            id: uid.into(),
        }
    }
}
