//! # Error Handling
//!
//! Error taxonomy for the activity sync core plus the problem+json
//! [`ApiError`] used by the HTTP surface.
//!
//! * [`FetchError`] covers every way the upstream data source can fail
//!   (the "upstream query failure" family). Nothing is mutated when one is
//!   raised.
//! * [`StoreError`] wraps persistence failures from the watermark store or
//!   the activity sink.
//! * [`SyncError`] is what a sync call returns. It tells the caller which
//!   stage failed and whether the watermark was left untouched.

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::telemetry;

/// Failures reported by the upstream data source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("repository {owner}/{name} could not be resolved")]
    RepositoryNotFound { owner: String, name: String },

    #[error("query returned errors: {}", messages.join("; "))]
    GraphQl { messages: Vec<String> },

    #[error("query failed with HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("query timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("invalid data source endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
}

impl FetchError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::RepositoryNotFound { .. } => "not_found",
            FetchError::GraphQl { .. } => "graphql",
            FetchError::Http { .. } => "http",
            FetchError::Network(_) => "network",
            FetchError::Decode(_) => "decode",
            FetchError::Timeout { .. } => "timeout",
            FetchError::Endpoint(_) => "endpoint",
        }
    }
}

/// Persistence failures from the watermark store or the activity sink.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("batch task failed: {0}")]
    Task(String),
}

/// Stage of a sync at which a [`SyncError::Failure`] occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    ReadWatermark,
    Persist,
}

impl std::fmt::Display for SyncStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStage::ReadWatermark => write!(f, "read watermark"),
            SyncStage::Persist => write!(f, "persist activity"),
        }
    }
}

/// Error returned by a sync call for a single (username, repository) pair.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The data source reported an application-level error or the
    /// repository does not resolve. No state was mutated.
    #[error("upstream query failed: {0}")]
    UpstreamQuery(#[from] FetchError),

    /// Any other failure before the watermark write. The watermark did not
    /// advance; raw items may be partially persisted.
    #[error("sync failed during {stage}: {message}")]
    Failure { stage: SyncStage, message: String },

    /// Raw items were persisted but the watermark could not be written.
    /// The next sync re-fetches a slightly larger window.
    #[error("watermark write failed: {0}")]
    WatermarkWrite(#[source] StoreError),

    #[error("invalid repository '{0}', expected owner/name")]
    InvalidRepository(String),
}

impl SyncError {
    pub(crate) fn failure(stage: SyncStage, err: impl std::fmt::Display) -> Self {
        SyncError::Failure {
            stage,
            message: err.to_string(),
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::UpstreamQuery(_) => "upstream",
            SyncError::Failure { .. } => "sync",
            SyncError::WatermarkWrite(_) => "watermark_write",
            SyncError::InvalidRepository(_) => "invalid_repository",
        }
    }
}

/// Unified API error response structure
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ApiError {
    /// HTTP status code for the response
    #[serde(skip_serializing)]
    pub status: StatusCode,
    /// Error code for programmatic handling
    pub code: Box<str>,
    /// Human-readable error message
    pub message: Box<str>,
    /// Correlation trace ID for debugging (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Box<str>>,
}

impl ApiError {
    /// Create a new API error with the given status code and message
    pub fn new<S: Into<String>>(status: StatusCode, code: S, message: S) -> Self {
        Self {
            status,
            code: code.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
            trace_id: Self::current_trace_id(),
        }
    }

    /// Extract current trace ID from the active task scope (falls back to generated correlation ID)
    fn current_trace_id() -> Option<Box<str>> {
        telemetry::current_trace_id()
            .map(|trace_id| trace_id.into_boxed_str())
            .or_else(|| {
                Some(format!("corr-{}", &uuid::Uuid::new_v4().to_string()[..8]).into_boxed_str())
            })
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(
            "content-type",
            HeaderValue::from_static("application/problem+json"),
        );

        (self.status, headers, axum::Json(self)).into_response()
    }
}

impl From<SyncError> for ApiError {
    fn from(error: SyncError) -> Self {
        match &error {
            SyncError::InvalidRepository(_) => Self::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED".to_string(),
                error.to_string(),
            ),
            SyncError::UpstreamQuery(FetchError::RepositoryNotFound { .. }) => Self::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND".to_string(),
                error.to_string(),
            ),
            SyncError::UpstreamQuery(_) => Self::new(
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR".to_string(),
                error.to_string(),
            ),
            SyncError::Failure { .. } | SyncError::WatermarkWrite(_) => {
                tracing::error!(error = %error, "Sync failed");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_SERVER_ERROR",
                    "Sync could not be completed",
                )
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        tracing::error!("Store error: {:?}", error);
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_SERVER_ERROR",
            "Database error occurred",
        )
    }
}

/// Create an unauthorized error (401)
pub fn unauthorized(message: Option<&str>) -> ApiError {
    let msg = message.unwrap_or("Authentication required");
    ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_basic() {
        let error = ApiError::new(StatusCode::BAD_REQUEST, "VALIDATION_FAILED", "Bad input");

        assert_eq!(error.code, Box::from("VALIDATION_FAILED"));
        assert_eq!(error.message, Box::from("Bad input"));
        assert!(error.trace_id.is_some());
    }

    #[test]
    fn test_content_type_header() {
        let response = unauthorized(None).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn test_repository_not_found_maps_to_404() {
        let error = SyncError::UpstreamQuery(FetchError::RepositoryNotFound {
            owner: "octo".to_string(),
            name: "missing".to_string(),
        });
        let api_error: ApiError = error.into();

        assert_eq!(api_error.status, StatusCode::NOT_FOUND);
        assert!(api_error.message.contains("octo/missing"));
    }

    #[test]
    fn test_upstream_errors_map_to_bad_gateway() {
        let error = SyncError::UpstreamQuery(FetchError::GraphQl {
            messages: vec!["Something broke".to_string(), "Again".to_string()],
        });
        let api_error: ApiError = error.into();

        assert_eq!(api_error.status, StatusCode::BAD_GATEWAY);
        assert_eq!(api_error.code, Box::from("PROVIDER_ERROR"));
        assert!(api_error.message.contains("Something broke; Again"));
    }

    #[test]
    fn test_store_failures_hide_details() {
        let error = SyncError::WatermarkWrite(StoreError::Task("join error".to_string()));
        let api_error: ApiError = error.into();

        assert_eq!(api_error.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!api_error.message.contains("join error"));
    }

    #[test]
    fn test_invalid_repository_maps_to_validation_error() {
        let api_error: ApiError = SyncError::InvalidRepository("nope".to_string()).into();

        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert_eq!(api_error.code, Box::from("VALIDATION_FAILED"));
    }

    #[test]
    fn test_sync_error_kinds() {
        assert_eq!(
            SyncError::failure(SyncStage::Persist, "boom").kind(),
            "sync"
        );
        assert_eq!(
            FetchError::Timeout { seconds: 30 }.kind(),
            "timeout"
        );
    }
}
