//! GitHub data source
//!
//! Defines the [`ActivitySource`] seam used by the sync engine and its
//! GraphQL implementation.

pub mod client;
pub mod query;
pub mod types;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::FetchError;

pub use client::GraphQlClient;
pub use types::{
    FetchLimits, RawComment, RawCommit, RawIssue, RawPullRequest, RepoRef, RepositorySnapshot,
};

/// Upstream source of repository activity.
///
/// One call issues exactly one query. A repository that does not resolve is
/// reported as [`FetchError::RepositoryNotFound`], never as an empty snapshot.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    async fn fetch_window(
        &self,
        repo: &RepoRef,
        since: DateTime<Utc>,
        limits: FetchLimits,
        credential: &str,
    ) -> Result<RepositorySnapshot, FetchError>;
}
