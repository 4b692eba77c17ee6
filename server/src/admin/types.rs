//! Admin module types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use super::permissions::AdminPermissions;
use crate::error::AppError;

/// Authenticated admin, inserted into request extensions by
/// [`super::middleware::require_admin`].
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub username: String,
    pub display_name: String,
    pub permissions: AdminPermissions,
}

impl AdminUser {
    /// Fail with `forbidden` unless every bit of `required` is held.
    pub fn require(&self, required: AdminPermissions) -> Result<(), AppError> {
        if self.permissions.has(required) {
            Ok(())
        } else {
            tracing::warn!(
                username = %self.username,
                required = ?required,
                "Admin permission denied"
            );
            Err(AppError::Forbidden)
        }
    }
}

// Request types

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "This field is required."))]
    pub username: String,
    #[validate(length(min = 1, max = 1024, message = "This field is required."))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminTopicRequest {
    #[validate(length(min = 5, max = 200, message = "Field must be between 5 and 200 characters long."))]
    pub title: String,
    #[validate(length(min = 5, max = 4000, message = "Field must be between 5 and 4000 characters long."))]
    pub body: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdminPostRequest {
    #[validate(length(min = 5, max = 4000, message = "Field must be between 5 and 4000 characters long."))]
    pub body: String,
    #[serde(default = "default_bumped")]
    pub bumped: bool,
}

const fn default_bumped() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub value: Value,
}

// Response types

#[derive(Debug, Serialize)]
pub struct AdminProfile {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub permissions: AdminPermissions,
}

impl From<&AdminUser> for AdminProfile {
    fn from(admin: &AdminUser) -> Self {
        Self {
            id: admin.user_id,
            username: admin.username.clone(),
            display_name: admin.display_name.clone(),
            permissions: admin.permissions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub csrf_token: String,
    /// Idle seconds before the session lapses.
    pub expires_in: i64,
    pub user: AdminProfile,
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin(permissions: AdminPermissions) -> AdminUser {
        AdminUser {
            user_id: Uuid::nil(),
            session_id: Uuid::nil(),
            username: "mod".into(),
            display_name: "Moderator".into(),
            permissions,
        }
    }

    #[test]
    fn test_require_checks_every_bit() {
        let user = admin(AdminPermissions::MANAGE_BANS);
        assert!(user.require(AdminPermissions::MANAGE_BANS).is_ok());
        assert!(matches!(
            user.require(AdminPermissions::MANAGE_BANS | AdminPermissions::MANAGE_PAGES),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn test_admin_post_defaults_to_bump() {
        let req: AdminPostRequest = serde_json::from_str(r#"{"body":"hello"}"#).unwrap();
        assert!(req.bumped);
    }
}
