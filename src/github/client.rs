//! GraphQL data source over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use url::Url;

use super::ActivitySource;
use super::query::build_request;
use super::types::{
    FetchLimits, GraphQlResponse, RepoRef, RepositoryData, RepositorySnapshot,
};
use crate::error::FetchError;

const USER_AGENT: &str = concat!("activity-sync/", env!("CARGO_PKG_VERSION"));
const MAX_BODY_SNIPPET: usize = 200;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the GitHub GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    endpoint: Url,
    http: reqwest::Client,
    timeout: Duration,
}

impl GraphQlClient {
    pub fn new(endpoint: &str) -> Result<Self, FetchError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Every request, connect included, is abandoned after `timeout`.
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, FetchError> {
        let endpoint = Url::parse(endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()?;

        Ok(Self {
            endpoint,
            http,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ActivitySource for GraphQlClient {
    async fn fetch_window(
        &self,
        repo: &RepoRef,
        since: DateTime<Utc>,
        limits: FetchLimits,
        credential: &str,
    ) -> Result<RepositorySnapshot, FetchError> {
        debug!(repository = %repo, %since, ?limits, "Querying repository activity");

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(credential)
            .header("User-Agent", USER_AGENT)
            .json(&build_request(repo, since, limits))
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(repository = %repo, status = status.as_u16(), "Data source rejected query");
            return Err(FetchError::Http {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let payload: GraphQlResponse<RepositoryData> = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        if !payload.errors.is_empty() {
            if payload
                .errors
                .iter()
                .any(|e| e.kind.as_deref() == Some("NOT_FOUND"))
            {
                return Err(FetchError::RepositoryNotFound {
                    owner: repo.owner.clone(),
                    name: repo.name.clone(),
                });
            }
            return Err(FetchError::GraphQl {
                messages: payload.errors.into_iter().map(|e| e.message).collect(),
            });
        }

        let data = payload
            .data
            .ok_or_else(|| FetchError::Decode("response carried neither data nor errors".into()))?;

        let node = data.repository.ok_or_else(|| FetchError::RepositoryNotFound {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
        })?;

        Ok(node.into())
    }
}

impl GraphQlClient {
    fn classify(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            FetchError::Network(error)
        }
    }
}

fn snippet(body: &str) -> String {
    if body.chars().count() > MAX_BODY_SNIPPET {
        let truncated: String = body.chars().take(MAX_BODY_SNIPPET).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}
