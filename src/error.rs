//! Error taxonomy for the kiosk server.
//!
//! Mirrors the error kinds the orchestrator/executor contract recognizes:
//! malformed input, unavailable providers, mid-stream failures, persistence
//! failures, and internal invariant violations. The reducer itself never
//! returns this type — it folds invariant violations to `(state, [])`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("stream failure: {0}")]
    StreamFailure(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl KioskError {
    pub fn kind(&self) -> &'static str {
        match self {
            KioskError::InvalidInput(_) => "invalid_input",
            KioskError::ProviderUnavailable(_) => "provider_unavailable",
            KioskError::StreamFailure(_) => "stream_failure",
            KioskError::PersistenceFailure(_) => "persistence_failure",
            KioskError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            KioskError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            KioskError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            KioskError::StreamFailure(_) => StatusCode::BAD_GATEWAY,
            KioskError::PersistenceFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            KioskError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for KioskError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

impl From<rusqlite::Error> for KioskError {
    fn from(e: rusqlite::Error) -> Self {
        KioskError::PersistenceFailure(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_error_variant() {
        assert_eq!(KioskError::InvalidInput("x".into()).kind(), "invalid_input");
        assert_eq!(KioskError::ProviderUnavailable("x".into()).kind(), "provider_unavailable");
        assert_eq!(KioskError::StreamFailure("x".into()).kind(), "stream_failure");
        assert_eq!(KioskError::PersistenceFailure("x".into()).kind(), "persistence_failure");
        assert_eq!(KioskError::Internal("x".into()).kind(), "internal");
    }
}
