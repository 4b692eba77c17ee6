//! Task Dispatcher
//!
//! Redis-backed queue for anonymous submissions.
//!
//! - New tasks go into [`TASK_QUEUE_KEY`] (list, LPUSH/BRPOP).
//! - A worker claims a task uid with SET NX before processing it, so a task
//!   pushed twice is only admitted once.
//! - Results are stored under a per-uid key with a TTL; pollers read them
//!   with [`TaskDispatcher::result_from_uid`].

use fb_common::TaskEnvelope;
use fred::prelude::*;
use fred::types::{Expiration, SetOptions};
use tracing::warn;

use super::types::{Task, TaskResult};

/// Redis key for the submission queue.
pub const TASK_QUEUE_KEY: &str = "fanboard:tasks:queue";

fn result_key(uid: &str) -> String {
    format!("fanboard:tasks:result:{uid}")
}

fn claim_key(uid: &str) -> String {
    format!("fanboard:tasks:claim:{uid}")
}

/// Task uids are 32 lowercase hex digits.
pub fn is_valid_uid(uid: &str) -> bool {
    uid.len() == 32 && uid.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[derive(Clone)]
pub struct TaskDispatcher {
    redis: Client,
    result_ttl_secs: i64,
}

impl TaskDispatcher {
    pub const fn new(redis: Client, result_ttl_secs: i64) -> Self {
        Self {
            redis,
            result_ttl_secs,
        }
    }

    /// Queue `task` for the worker.
    #[tracing::instrument(skip(self, task), fields(uid = %task.uid))]
    pub async fn enqueue(&self, task: &Task) -> Result<(), Error> {
        let payload = serde_json::to_string(task)
            .map_err(|e| Error::new(ErrorKind::Parse, format!("JSON serialize error: {e}")))?;
        self.redis.lpush::<(), _, _>(TASK_QUEUE_KEY, payload).await?;
        Ok(())
    }

    /// Block up to `timeout_secs` for the next raw task payload.
    pub async fn next_payload(&self, timeout_secs: f64) -> Result<Option<String>, Error> {
        let popped: Option<(String, String)> =
            self.redis.brpop(TASK_QUEUE_KEY, timeout_secs).await?;
        Ok(popped.map(|(_key, value)| value))
    }

    /// Claim `uid` for processing. Returns `false` if another worker already
    /// owns it.
    pub async fn claim(&self, uid: &str) -> Result<bool, Error> {
        let claimed: Option<String> = self
            .redis
            .set(
                claim_key(uid),
                "1",
                Some(Expiration::EX(self.result_ttl_secs)),
                Some(SetOptions::NX),
                false,
            )
            .await?;
        Ok(claimed.is_some())
    }

    /// Record the terminal outcome of `uid`.
    pub async fn store_result(&self, uid: &str, envelope: &TaskEnvelope) -> Result<(), Error> {
        self.redis
            .set::<(), _, _>(
                result_key(uid),
                envelope.to_value().to_string(),
                Some(Expiration::EX(self.result_ttl_secs)),
                None,
                false,
            )
            .await
    }

    /// Current state of `uid`. Unknown and expired uids read as pending.
    pub async fn result_from_uid(&self, uid: &str) -> Result<TaskResult, Error> {
        let stored: Option<String> = self.redis.get(result_key(uid)).await?;
        let Some(stored) = stored else {
            return Ok(TaskResult::Pending);
        };

        let envelope = serde_json::from_str(&stored)
            .map_err(|e| e.to_string())
            .and_then(|value| TaskEnvelope::from_value(&value).map_err(|e| e.to_string()));
        match envelope {
            Ok(envelope) => Ok(TaskResult::Done(envelope)),
            Err(e) => {
                warn!(uid, error = %e, "Stored task result is malformed");
                Ok(TaskResult::Done(TaskEnvelope::failure(
                    fb_common::ErrorKind::Unknown,
                )))
            }
        }
    }
}
