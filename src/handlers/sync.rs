//! # Sync API Handlers
//!
//! Trigger a sync for one (username, repository) pair, inspect its stored
//! watermark, or reset it so the next call performs a full sync.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::config::AppConfig;
use crate::error::{ApiError, unauthorized};
use crate::repositories::Watermark;
use crate::server::AppState;
use crate::sync::{ActivityTotals, SyncOutcome};
use crate::telemetry::{TraceContext, with_trace_context};

/// Path parameters identifying a (username, repository) pair
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Path)]
pub struct SyncPath {
    /// Platform login whose activity is counted
    pub username: String,
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl SyncPath {
    fn repository(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Stored sync state for a pair
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WatermarkResponse {
    #[schema(example = "octocat")]
    pub username: String,
    #[schema(example = "octo/demo")]
    pub repository: String,
    /// Instant of the last completed sync (RFC 3339)
    #[schema(example = "2026-10-18T09:00:00Z")]
    pub last_sync_at: String,
    pub last_commit_sha: Option<String>,
    pub last_pr_number: Option<i64>,
    pub last_issue_number: Option<i64>,
    pub totals: ActivityTotals,
}

impl From<Watermark> for WatermarkResponse {
    fn from(watermark: Watermark) -> Self {
        Self {
            username: watermark.username,
            repository: watermark.repository,
            last_sync_at: watermark.last_sync_at.to_rfc3339(),
            last_commit_sha: watermark.markers.commit_sha,
            last_pr_number: watermark.markers.pr_number,
            last_issue_number: watermark.markers.issue_number,
            totals: watermark.totals,
        }
    }
}

/// Data source credential for this request: a bearer token if one was sent,
/// otherwise the configured token.
fn resolve_credential(headers: &HeaderMap, config: &AppConfig) -> Result<String, ApiError> {
    match headers.get(AUTHORIZATION) {
        Some(value) => {
            let header = value
                .to_str()
                .map_err(|_| unauthorized(Some("Invalid Authorization header")))?;
            header
                .strip_prefix("Bearer ")
                .filter(|token| !token.trim().is_empty())
                .map(|token| token.trim().to_string())
                .ok_or_else(|| unauthorized(Some("Authorization header must use Bearer scheme")))
        }
        None => config
            .github_token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or_else(|| unauthorized(Some("No data source credential available"))),
    }
}

fn not_found(path: &SyncPath) -> ApiError {
    ApiError::new(
        StatusCode::NOT_FOUND,
        "NOT_FOUND".to_string(),
        format!(
            "no watermark for {} on {}",
            path.username,
            path.repository()
        ),
    )
}

/// Sync activity for a user in a repository
#[utoipa::path(
    post,
    path = "/users/{username}/repos/{owner}/{name}/sync",
    params(SyncPath),
    responses(
        (status = 200, description = "Current totals for the pair", body = SyncOutcome, example = json!({
            "commits": 3,
            "pullRequests": 1,
            "issues": 0,
            "prComments": 2,
            "issueComments": 0,
            "isIncremental": false,
            "itemsFetched": 4,
            "mode": "full"
        })),
        (status = 400, description = "Invalid repository", body = ApiError),
        (status = 401, description = "No usable credential", body = ApiError),
        (status = 404, description = "Repository does not resolve upstream", body = ApiError),
        (status = 502, description = "Data source query failed", body = ApiError),
        (status = 500, description = "Persistence failure", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn sync_activity(
    State(state): State<AppState>,
    Path(path): Path<SyncPath>,
    headers: HeaderMap,
) -> Result<Json<SyncOutcome>, ApiError> {
    let credential = resolve_credential(&headers, &state.config)?;
    let repository = path.repository();

    let outcome = with_trace_context(TraceContext::generate("sync"), async {
        state
            .engine
            .sync_user_repo_activity(&path.username, &repository, &credential)
            .await
            .map_err(ApiError::from)
    })
    .await?;

    Ok(Json(outcome))
}

/// Read the stored watermark without contacting the data source
#[utoipa::path(
    get,
    path = "/users/{username}/repos/{owner}/{name}/watermark",
    params(SyncPath),
    responses(
        (status = 200, description = "Stored watermark", body = WatermarkResponse),
        (status = 400, description = "Invalid repository", body = ApiError),
        (status = 404, description = "Pair has never been synced", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn get_watermark(
    State(state): State<AppState>,
    Path(path): Path<SyncPath>,
) -> Result<Json<WatermarkResponse>, ApiError> {
    let watermark = state
        .engine
        .watermark(&path.username, &path.repository())
        .await?
        .ok_or_else(|| not_found(&path))?;

    Ok(Json(watermark.into()))
}

/// Drop the watermark so the next sync recomputes the full window
#[utoipa::path(
    delete,
    path = "/users/{username}/repos/{owner}/{name}/sync",
    params(SyncPath),
    responses(
        (status = 204, description = "Watermark removed"),
        (status = 400, description = "Invalid repository", body = ApiError),
        (status = 404, description = "Pair has never been synced", body = ApiError)
    ),
    tag = "sync"
)]
pub async fn reset_watermark(
    State(state): State<AppState>,
    Path(path): Path<SyncPath>,
) -> Result<StatusCode, ApiError> {
    if state
        .engine
        .reset(&path.username, &path.repository())
        .await?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token(token: Option<&str>) -> AppConfig {
        AppConfig {
            github_token: token.map(str::to_string),
            ..AppConfig::default()
        }
    }

    #[test]
    fn bearer_header_wins_over_configured_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Bearer from-header".parse().unwrap());

        let credential = resolve_credential(&headers, &config_with_token(Some("configured")));
        assert_eq!(credential.unwrap(), "from-header");
    }

    #[test]
    fn falls_back_to_configured_token() {
        let credential =
            resolve_credential(&HeaderMap::new(), &config_with_token(Some("configured")));
        assert_eq!(credential.unwrap(), "configured");
    }

    #[test]
    fn missing_credential_is_unauthorized() {
        let err = resolve_credential(&HeaderMap::new(), &config_with_token(None)).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn non_bearer_scheme_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());

        let err = resolve_credential(&headers, &config_with_token(Some("configured"))).unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }
}
