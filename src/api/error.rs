// src/api/error.rs
// Maps core errors to HTTP responses. The only place status codes live.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::error::LumenError;

/// HTTP-facing error: stable code, user message, actionable suggestion.
/// Internal detail is attached only outside production.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error_code: &'static str,
    pub message: String,
    pub suggestion: &'static str,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn from_core(err: LumenError, include_detail: bool) -> Self {
        let status = match &err {
            LumenError::Auth(_) => StatusCode::UNAUTHORIZED,
            LumenError::Forbidden(_) => StatusCode::FORBIDDEN,
            LumenError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            LumenError::NotFound(_) => StatusCode::NOT_FOUND,
            LumenError::Conflict(_) => StatusCode::CONFLICT,
            LumenError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LumenError::Upstream(_) => StatusCode::BAD_GATEWAY,
            LumenError::Store(_) | LumenError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LumenError::Embedding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {err}");
        }

        let detail = include_detail.then(|| err.to_string());

        Self {
            status,
            error_code: err.code(),
            message: user_message(&err),
            suggestion: err.suggestion(),
            detail,
        }
    }
}

/// User-facing message. Server-side families get a generic message so
/// internals never leak through the envelope.
fn user_message(err: &LumenError) -> String {
    match err {
        LumenError::Store(_) | LumenError::Internal(_) | LumenError::Embedding(_) => {
            "An internal error occurred".to_string()
        }
        other => other.to_string(),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error_code": self.error_code,
            "message": self.message,
            "details": { "suggestion": self.suggestion },
        });

        if let Some(detail) = self.detail {
            body["details"]["internal"] = json!(detail);
        }

        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_taxonomy() {
        let err = ApiError::from_core(LumenError::auth("bad token"), false);
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = ApiError::from_core(LumenError::RateLimited("slow down".into()), false);
        assert_eq!(err.status, StatusCode::TOO_MANY_REQUESTS);

        let err = ApiError::from_core(LumenError::Upstream("down".into()), false);
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_detail_is_gated() {
        let err = ApiError::from_core(LumenError::internal("secret stack trace"), false);
        assert!(err.detail.is_none());
        assert_eq!(err.message, "An internal error occurred");

        let err = ApiError::from_core(LumenError::internal("secret stack trace"), true);
        assert!(err.detail.unwrap().contains("secret stack trace"));
    }
}
