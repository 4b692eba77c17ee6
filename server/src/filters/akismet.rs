//! Akismet spam check.
//!
//! Settings (`ext.filters.akismet`): `null` disables the filter; a string is
//! the API key; an object is `{key, fail_closed?}`.

use async_trait::async_trait;
use fb_common::ErrorKind;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use super::types::{Filter, FilterError, FilterServices, Submission};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum RawSettings {
    Key(String),
    Full {
        key: String,
        #[serde(default)]
        fail_closed: bool,
    },
}

/// Parsed settings block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AkismetSettings {
    pub key: String,
    pub fail_closed: bool,
}

impl AkismetSettings {
    /// `None` when the filter is disabled.
    pub fn from_value(value: &Value) -> Result<Option<Self>, FilterError> {
        if value.is_null() {
            return Ok(None);
        }
        let raw: RawSettings = serde_json::from_value(value.clone())
            .map_err(|e| FilterError::Settings(format!("akismet: {e}")))?;
        let settings = match raw {
            RawSettings::Key(key) => Self {
                key,
                fail_closed: false,
            },
            RawSettings::Full { key, fail_closed } => Self { key, fail_closed },
        };
        Ok((!settings.key.is_empty()).then_some(settings))
    }
}

/// Akismet `comment-check` filter.
pub struct Akismet {
    settings: Option<AkismetSettings>,
    http: reqwest::Client,
    blog: String,
}

impl Akismet {
    pub fn build(value: &Value, services: &FilterServices) -> Result<Box<dyn Filter>, FilterError> {
        Ok(Box::new(Self {
            settings: AkismetSettings::from_value(value)?,
            http: services.http()?,
            blog: services.server_url.clone(),
        }))
    }

    async fn check(&self, settings: &AkismetSettings, payload: &Submission) -> reqwest::Result<bool> {
        let url = format!("https://{}.rest.akismet.com/1.1/comment-check", settings.key);
        let form = [
            ("blog", self.blog.as_str()),
            ("user_ip", payload.ip_address.as_str()),
            ("user_agent", payload.user_agent.as_deref().unwrap_or_default()),
            ("referrer", payload.referrer.as_deref().unwrap_or_default()),
            ("comment_type", "comment"),
            ("comment_content", payload.body.as_str()),
        ];

        let body = self
            .http
            .post(url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body.trim() == "true")
    }
}

#[async_trait]
impl Filter for Akismet {
    fn reject_kind(&self) -> ErrorKind {
        ErrorKind::AkismetRejected
    }

    async fn should_reject(&self, payload: &Submission) -> Result<bool, FilterError> {
        let Some(settings) = &self.settings else {
            return Ok(false);
        };

        match self.check(settings, payload).await {
            Ok(spam) => Ok(spam),
            Err(e) => {
                warn!(error = %e, fail_closed = settings.fail_closed, "Akismet check failed");
                Ok(settings.fail_closed)
            }
        }
    }
}
