// src/error.rs
// Typed error taxonomy for the core services

use thiserror::Error;

/// Core error type. One variant family per subsystem; the HTTP adapter maps
/// these to status codes, nothing else in the core does.
#[derive(Debug, Error)]
pub enum LumenError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream inference error: {0}")]
    Upstream(String),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("embedding backend error: {0}")]
    Embedding(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl LumenError {
    /// Stable machine-readable code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            LumenError::Auth(_) => "AUTH_FAILED",
            LumenError::Forbidden(_) => "FORBIDDEN",
            LumenError::RateLimited(_) => "RATE_LIMITED",
            LumenError::NotFound(_) => "NOT_FOUND",
            LumenError::Conflict(_) => "CONFLICT",
            LumenError::Validation(_) => "VALIDATION_ERROR",
            LumenError::Upstream(_) => "UPSTREAM_ERROR",
            LumenError::Store(_) => "STORE_ERROR",
            LumenError::Embedding(_) => "EMBEDDING_ERROR",
            LumenError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Actionable hint surfaced next to the user-facing message.
    pub fn suggestion(&self) -> &'static str {
        match self {
            LumenError::Auth(_) => "Check your credentials or refresh your token",
            LumenError::Forbidden(_) => "Ask a team admin to grant you access",
            LumenError::RateLimited(_) => "Wait a moment before retrying",
            LumenError::NotFound(_) => "Verify the identifier and try again",
            LumenError::Conflict(_) => "Refresh and retry with the current state",
            LumenError::Validation(_) => "Correct the highlighted fields",
            LumenError::Upstream(_) => "Check that the local inference server is running",
            LumenError::Store(_) => "Retry; if the problem persists check the data directory",
            LumenError::Embedding(_) => "The hash fallback will be used automatically",
            LumenError::Internal(_) => "Retry; report if the problem persists",
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        LumenError::Auth(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        LumenError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        LumenError::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        LumenError::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        LumenError::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        LumenError::Internal(msg.into())
    }
}

pub type LumenResult<T> = Result<T, LumenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(LumenError::auth("x").code(), "AUTH_FAILED");
        assert_eq!(LumenError::not_found("x").code(), "NOT_FOUND");
        assert_eq!(LumenError::Upstream("x".into()).code(), "UPSTREAM_ERROR");
    }

    #[test]
    fn display_includes_detail() {
        let err = LumenError::validation("title must not be empty");
        assert!(err.to_string().contains("title must not be empty"));
    }
}
