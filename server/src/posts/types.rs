//! Post Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Longest poster name accepted as an override.
pub const MAX_NAME_LENGTH: usize = 35;

/// How the identity shown next to a post was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ident_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IdentType {
    None,
    Ident,
    IdentAdmin,
}

/// Post model.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Post {
    pub id: i64,
    pub topic_id: i64,
    /// Position within the topic, dense from 1.
    pub number: i32,
    pub name: String,
    pub body: String,
    #[serde(skip_serializing)]
    pub ip_address: String,
    pub ident: Option<String>,
    pub ident_type: IdentType,
    pub bumped: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Anonymous reply submission.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 5, max = 4000, message = "Field must be between 5 and 4000 characters long."))]
    pub body: String,
    #[serde(default = "default_bumped")]
    pub bumped: bool,
}

const fn default_bumped() -> bool {
    true
}

/// Everything the writer needs to append a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub body: String,
    pub bumped: bool,
    pub ip_address: String,
    /// Set for staff posts; replaces the derived identity.
    pub author: Option<PostAuthor>,
}

/// Staff attribution for a post.
#[derive(Debug, Clone)]
pub struct PostAuthor {
    pub name: String,
    pub ident: String,
}

/// Clamp a name override to [`MAX_NAME_LENGTH`] characters.
pub fn clamp_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bumped_defaults_true() {
        let req: CreatePostRequest = serde_json::from_str(r#"{"body": "Hello"}"#).unwrap();
        assert!(req.bumped);
        let req: CreatePostRequest =
            serde_json::from_str(r#"{"body": "Hello", "bumped": false}"#).unwrap();
        assert!(!req.bumped);
    }

    #[test]
    fn test_body_length_message() {
        let req = CreatePostRequest {
            body: "Hi".into(),
            bumped: true,
        };
        let errors = req.validate().unwrap_err();
        let field = &errors.field_errors()["body"][0];
        assert_eq!(
            field.message.as_deref(),
            Some("Field must be between 5 and 4000 characters long.")
        );
    }

    #[test]
    fn test_clamp_name() {
        assert_eq!(clamp_name("  Mod  "), "Mod");
        assert_eq!(clamp_name(&"x".repeat(50)).chars().count(), MAX_NAME_LENGTH);
    }

    #[test]
    fn test_ip_address_is_not_serialized() {
        let post = Post {
            id: 1,
            topic_id: 1,
            number: 1,
            name: "Nameless Fanboi".into(),
            body: "Hello".into(),
            ip_address: "10.0.0.1".into(),
            ident: None,
            ident_type: IdentType::None,
            bumped: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let value = serde_json::to_value(&post).unwrap();
        assert!(value.get("ip_address").is_none());
        assert_eq!(value["ident_type"], "none");
    }
}
