//! Request extractors.

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::{Form, Json};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Request body accepted as either `application/json` or
/// `application/x-www-form-urlencoded`.
#[derive(Debug, Clone)]
pub struct JsonOrForm<T>(pub T);

impl<T, S> FromRequest<S> for JsonOrForm<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::invalid("request", e.body_text()))?;
            Ok(Self(value))
        } else if content_type.starts_with("application/json") {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::invalid("request", e.body_text()))?;
            Ok(Self(value))
        } else {
            Err(AppError::invalid(
                "request",
                "Expected a JSON or form-encoded body.",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        body: String,
        #[serde(default)]
        bumped: bool,
    }

    async fn extract(content_type: &str, body: &'static str) -> Result<Reply, AppError> {
        let req = Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        JsonOrForm::<Reply>::from_request(req, &()).await.map(|j| j.0)
    }

    #[tokio::test]
    async fn test_json_and_form_are_equivalent() {
        let json = extract("application/json", r#"{"body":"hello","bumped":true}"#)
            .await
            .unwrap();
        let form = extract(
            "application/x-www-form-urlencoded",
            "body=hello&bumped=true",
        )
        .await
        .unwrap();
        assert_eq!(json, form);
    }

    #[tokio::test]
    async fn test_unknown_content_type_is_invalid() {
        let err = extract("text/plain", "body=hello").await.unwrap_err();
        assert!(matches!(err, AppError::ParamsInvalid(_)));
    }

    #[tokio::test]
    async fn test_malformed_json_is_invalid() {
        let err = extract("application/json", "{").await.unwrap_err();
        assert!(matches!(err, AppError::ParamsInvalid(_)));
    }
}
