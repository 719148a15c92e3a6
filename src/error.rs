//! Error taxonomy for the HTTP surface.
//!
//! Every handler returns `Result<_, AppError>`; failures render as a non-2xx
//! status with a `{ "error": ..., "kind": ... }` JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Caller sent something unusable (blank query, bad URL, missing upload field)
    #[error("{0}")]
    InvalidRequest(String),

    /// Filesystem failure while resetting or removing a workspace
    #[error("workspace error: {0:#}")]
    Workspace(anyhow::Error),

    /// The git clone itself failed
    #[error("clone failed: {0:#}")]
    Clone(anyhow::Error),

    /// A source file could not be read and skipping is disabled
    #[error("load failed: {0:#}")]
    Load(anyhow::Error),

    /// Upload exceeds the configured size limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// No analysed workspace matches the request
    #[error("{0}")]
    WorkspaceNotFound(String),

    /// Embedding or similarity search failed
    #[error("retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),

    /// The hosted chat model call failed
    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),

    /// Uploaded tabular data is malformed
    #[error("could not parse CSV: {0}")]
    Parse(String),

    /// A bounded operation ran out of time
    #[error("{0}")]
    Timeout(String),

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidRequest(_) => "invalid_request",
            AppError::Workspace(_) => "workspace",
            AppError::Clone(_) => "clone",
            AppError::Load(_) => "load",
            AppError::PayloadTooLarge(_) => "payload_too_large",
            AppError::WorkspaceNotFound(_) => "workspace_not_found",
            AppError::Retrieval(_) => "retrieval",
            AppError::Generation(_) => "generation",
            AppError::Parse(_) => "parse",
            AppError::Timeout(_) => "timeout",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::Parse(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::WorkspaceNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Retrieval(_) | AppError::Generation(_) => StatusCode::BAD_GATEWAY,
            AppError::Workspace(_)
            | AppError::Clone(_)
            | AppError::Load(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(anyhow::anyhow!("background task failed: {err}"))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{message}");
        } else {
            tracing::warn!(kind = self.kind(), "{message}");
        }
        (
            status,
            Json(ErrorBody {
                error: message,
                kind: self.kind(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_4xx() {
        assert_eq!(
            AppError::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::Parse("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::WorkspaceNotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::PayloadTooLarge("x".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_upstream_errors_map_to_bad_gateway() {
        let err = AppError::Generation(anyhow::anyhow!("model down"));
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "generation");
        assert_eq!(err.to_string(), "generation failed: model down");
    }

    #[test]
    fn test_context_chain_is_rendered() {
        let inner = anyhow::anyhow!("permission denied").context("removing temp_clones");
        let err = AppError::Workspace(inner);
        assert_eq!(
            err.to_string(),
            "workspace error: removing temp_clones: permission denied"
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
