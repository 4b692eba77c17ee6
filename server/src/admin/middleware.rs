//! Admin authentication middleware.

use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;

use super::auth::{hash_token, verify_csrf};
use super::permissions::AdminPermissions;
use super::queries;
use super::types::AdminUser;
use crate::api::AppState;
use crate::error::AppError;

/// Header carrying the CSRF token on admin writes.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Bearer token from the `Authorization` header.
pub fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn is_safe_method(method: &Method) -> bool {
    method == Method::GET || method == Method::HEAD || method == Method::OPTIONS
}

/// Middleware that requires a live admin session.
///
/// Writes additionally require the session's CSRF token in `X-CSRF-Token`.
#[tracing::instrument(skip(state, request, next), fields(method = %request.method()))]
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(&request)
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let session = queries::touch_session(
        &state.db,
        &hash_token(&token),
        state.config.session_idle_secs,
    )
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !is_safe_method(request.method()) {
        let presented = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_csrf(&state.config.secret_key, &token, presented) {
            tracing::warn!(username = %session.username, "Admin write with bad CSRF token");
            return Err(AppError::BadCsrf);
        }
    }

    request.extensions_mut().insert(AdminUser {
        user_id: session.user_id,
        session_id: session.session_id,
        username: session.username,
        display_name: session.display_name,
        permissions: AdminPermissions::from_db(session.permissions),
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_bearer_token_parsing() {
        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), Some("abc123"));

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Basic abc123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);

        let request = Request::builder()
            .header(header::AUTHORIZATION, "Bearer ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);
    }

    #[test]
    fn test_safe_methods_skip_csrf() {
        assert!(is_safe_method(&Method::GET));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::DELETE));
    }
}
