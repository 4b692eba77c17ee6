//! Task Worker
//!
//! Background worker that drains the submission queue. Each task runs the
//! filter chain, re-checks bans, then creates the topic or post. Every task
//! ends with exactly one stored envelope, including on timeout.

use std::sync::Arc;
use std::time::Duration;

use fb_common::{ErrorKind, TaskEnvelope};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::dispatcher::TaskDispatcher;
use super::types::{Task, TaskKind};
use crate::error::{AppError, AppResult};
use crate::filters::FilterChain;
use crate::moderation::BanEngine;
use crate::posts::{NewPost, PostWriter};
use crate::ratelimit::{submission_key, RateLimiter};
use crate::topics::TopicWriter;

/// How long one BRPOP waits before looping.
const POLL_TIMEOUT_SECS: f64 = 2.0;

#[derive(Clone)]
pub struct TaskWorker {
    dispatcher: TaskDispatcher,
    chain: FilterChain,
    bans: BanEngine,
    rate_limiter: RateLimiter,
    topics: TopicWriter,
    posts: PostWriter,
    timeout: Duration,
}

impl TaskWorker {
    pub const fn new(
        dispatcher: TaskDispatcher,
        chain: FilterChain,
        bans: BanEngine,
        rate_limiter: RateLimiter,
        topics: TopicWriter,
        posts: PostWriter,
        timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            chain,
            bans,
            rate_limiter,
            topics,
            posts,
            timeout,
        }
    }

    /// Drain the queue forever with at most `concurrency` tasks in flight.
    pub async fn run(self, concurrency: usize) {
        info!(concurrency, "Task worker started");
        let permits = Arc::new(Semaphore::new(concurrency.max(1)));
        let mut consecutive_errors: u32 = 0;

        loop {
            let payload = match self.dispatcher.next_payload(POLL_TIMEOUT_SECS).await {
                Ok(Some(payload)) => {
                    consecutive_errors = 0;
                    payload
                }
                Ok(None) => {
                    consecutive_errors = 0;
                    continue;
                }
                Err(e) => {
                    consecutive_errors += 1;
                    let backoff_secs = 1u64 << consecutive_errors.min(5);
                    error!(consecutive_errors, backoff_secs, error = %e, "Failed to pop task queue");
                    tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                    continue;
                }
            };

            let task: Task = match serde_json::from_str(&payload) {
                Ok(task) => task,
                Err(e) => {
                    let truncated: String = payload.chars().take(500).collect();
                    error!(error = %e, payload_preview = %truncated, "Failed to deserialize task");
                    continue;
                }
            };

            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                error!("Task worker semaphore closed");
                return;
            };
            let worker = self.clone();
            tokio::spawn(async move {
                let dispatcher = worker.dispatcher.clone();
                let uid = task.uid.clone();
                supervise(&dispatcher, &uid, async move { worker.process(task).await }).await;
                drop(permit);
            });
        }
    }

    /// Admit one task and store its outcome.
    #[tracing::instrument(skip(self, task), fields(uid = %task.uid, board = %task.kind.board()))]
    pub async fn process(&self, task: Task) {
        match self.dispatcher.claim(&task.uid).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Task already claimed");
                return;
            }
            Err(e) => {
                error!(error = %e, "Failed to claim task");
                return;
            }
        }

        let envelope = match tokio::time::timeout(self.timeout, self.admit(&task)).await {
            Ok(Ok(envelope)) => {
                info!(status = envelope.status(), "Submission admitted");
                envelope
            }
            Ok(Err(e)) => {
                let envelope = e.to_envelope();
                match e.kind() {
                    ErrorKind::Unknown | ErrorKind::ServiceBusy => {
                        error!(error = %e, "Submission failed");
                    }
                    kind => warn!(reason = kind.as_str(), "Submission rejected"),
                }
                envelope
            }
            Err(_) => {
                let key = submission_key(&task.ip_address, task.kind.board());
                let limited = self.rate_limiter.is_limited(&key).await.unwrap_or(false);
                warn!(limited, "Submission timed out");
                if limited {
                    TaskEnvelope::failure(ErrorKind::RateLimited)
                } else {
                    TaskEnvelope::failure(ErrorKind::Unknown)
                }
            }
        };

        if let Err(e) = self.dispatcher.store_result(&task.uid, &envelope).await {
            error!(error = %e, "Failed to store task result");
        }
    }

    async fn admit(&self, task: &Task) -> AppResult<TaskEnvelope> {
        let submission = task.submission();

        let outcome = self.chain.evaluate(&submission).await?;
        if let Some(rejection) = outcome.rejection() {
            return Err(rejection);
        }

        let ip = submission
            .ip()
            .ok_or_else(|| AppError::invalid("ip_address", "Invalid client address."))?;
        if let Some(ban) = self.bans.matching_ban(ip, &submission.scopes()).await? {
            return Err(AppError::BanRejected {
                description: ban.description,
            });
        }

        match &task.kind {
            TaskKind::CreateTopic { board, title, body } => {
                let new = NewPost {
                    body: body.clone(),
                    bumped: true,
                    ip_address: task.ip_address.clone(),
                    author: None,
                };
                let topic = self.topics.create(board, title, new).await?;
                Ok(TaskEnvelope::success("topic", topic.id))
            }
            TaskKind::CreatePost {
                topic_id,
                body,
                bumped,
                ..
            } => {
                let new = NewPost {
                    body: body.clone(),
                    bumped: *bumped,
                    ip_address: task.ip_address.clone(),
                    author: None,
                };
                let post = self.posts.create(*topic_id, new).await?;
                Ok(TaskEnvelope::success("post", post.id))
            }
        }
    }
}

/// Run `job` for task `uid` in its own tokio task. If it panics, record an
/// `unknown` failure so pollers stop seeing `pending`.
pub async fn supervise<F>(dispatcher: &TaskDispatcher, uid: &str, job: F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let Err(e) = tokio::spawn(job).await else {
        return;
    };
    error!(uid = %uid, "Task panicked: {}", e);

    let envelope = TaskEnvelope::failure(ErrorKind::Unknown);
    if let Err(e) = dispatcher.store_result(uid, &envelope).await {
        error!(uid = %uid, error = %e, "Failed to store result for panicked task");
    }
}
