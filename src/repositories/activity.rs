//! # Activity Repository
//!
//! Idempotent storage of the raw commits, pull requests and issues a sync
//! counted. Rows are keyed by natural identity within a repository, so
//! re-persisting the same item updates it in place.

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, OnConflict};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::error::StoreError;
use crate::github::{RawCommit, RawIssue, RawPullRequest};
use crate::models::{commit, issue, pull_request};

/// Sink for raw activity items.
///
/// Each call writes one batch; the return value is the number of items in it.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn upsert_commits(
        &self,
        repository: &str,
        commits: Vec<RawCommit>,
    ) -> Result<u64, StoreError>;

    async fn upsert_pull_requests(
        &self,
        repository: &str,
        pull_requests: Vec<RawPullRequest>,
    ) -> Result<u64, StoreError>;

    async fn upsert_issues(&self, repository: &str, issues: Vec<RawIssue>)
    -> Result<u64, StoreError>;
}

/// Stored item counts for one author in one repository
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoredCounts {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
}

/// SeaORM-backed [`ActivitySink`]
pub struct ActivityRepository {
    db: DatabaseConnection,
}

impl ActivityRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Counts stored items attributed to `author_login` in `repository`.
    pub async fn stored_counts(
        &self,
        repository: &str,
        author_login: &str,
    ) -> Result<StoredCounts, StoreError> {
        let repository = repository.to_ascii_lowercase();
        let login = author_login.to_ascii_lowercase();

        let commits = commit::Entity::find()
            .filter(commit::Column::Repository.eq(repository.as_str()))
            .filter(
                Expr::expr(Func::lower(Expr::col(commit::Column::AuthorLogin))).eq(login.as_str()),
            )
            .count(&self.db)
            .await?;
        let pull_requests = pull_request::Entity::find()
            .filter(pull_request::Column::Repository.eq(repository.as_str()))
            .filter(
                Expr::expr(Func::lower(Expr::col(pull_request::Column::AuthorLogin)))
                    .eq(login.as_str()),
            )
            .count(&self.db)
            .await?;
        let issues = issue::Entity::find()
            .filter(issue::Column::Repository.eq(repository.as_str()))
            .filter(
                Expr::expr(Func::lower(Expr::col(issue::Column::AuthorLogin))).eq(login.as_str()),
            )
            .count(&self.db)
            .await?;

        Ok(StoredCounts {
            commits,
            pull_requests,
            issues,
        })
    }
}

fn comment_count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

#[async_trait]
impl ActivitySink for ActivityRepository {
    async fn upsert_commits(
        &self,
        repository: &str,
        commits: Vec<RawCommit>,
    ) -> Result<u64, StoreError> {
        if commits.is_empty() {
            return Ok(0);
        }
        let count = commits.len() as u64;
        let now = Utc::now().fixed_offset();

        let rows = commits.into_iter().map(|c| commit::ActiveModel {
            id: Set(Uuid::new_v4()),
            repository: Set(repository.to_string()),
            sha: Set(c.sha),
            author_login: Set(c.author_login),
            message: Set(c.message),
            committed_at: Set(c.committed_at.fixed_offset()),
            synced_at: Set(now),
        });

        commit::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([commit::Column::Repository, commit::Column::Sha])
                    .update_columns([
                        commit::Column::AuthorLogin,
                        commit::Column::Message,
                        commit::Column::CommittedAt,
                        commit::Column::SyncedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                tracing::error!(repository, "Failed to upsert commit batch: {}", e);
                StoreError::from(e)
            })?;

        Ok(count)
    }

    async fn upsert_pull_requests(
        &self,
        repository: &str,
        pull_requests: Vec<RawPullRequest>,
    ) -> Result<u64, StoreError> {
        if pull_requests.is_empty() {
            return Ok(0);
        }
        let count = pull_requests.len() as u64;
        let now = Utc::now().fixed_offset();

        let rows = pull_requests.into_iter().map(|pr| pull_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            repository: Set(repository.to_string()),
            number: Set(pr.number),
            author_login: Set(pr.author_login),
            title: Set(pr.title),
            state: Set(pr.state),
            created_at: Set(pr.created_at.fixed_offset()),
            comment_count: Set(comment_count(pr.comments.len())),
            synced_at: Set(now),
        });

        pull_request::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([
                    pull_request::Column::Repository,
                    pull_request::Column::Number,
                ])
                .update_columns([
                    pull_request::Column::AuthorLogin,
                    pull_request::Column::Title,
                    pull_request::Column::State,
                    pull_request::Column::CommentCount,
                    pull_request::Column::SyncedAt,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                tracing::error!(repository, "Failed to upsert pull request batch: {}", e);
                StoreError::from(e)
            })?;

        Ok(count)
    }

    async fn upsert_issues(
        &self,
        repository: &str,
        issues: Vec<RawIssue>,
    ) -> Result<u64, StoreError> {
        if issues.is_empty() {
            return Ok(0);
        }
        let count = issues.len() as u64;
        let now = Utc::now().fixed_offset();

        let rows = issues.into_iter().map(|item| issue::ActiveModel {
            id: Set(Uuid::new_v4()),
            repository: Set(repository.to_string()),
            number: Set(item.number),
            author_login: Set(item.author_login),
            title: Set(item.title),
            state: Set(item.state),
            created_at: Set(item.created_at.fixed_offset()),
            comment_count: Set(comment_count(item.comments.len())),
            synced_at: Set(now),
        });

        issue::Entity::insert_many(rows)
            .on_conflict(
                OnConflict::columns([issue::Column::Repository, issue::Column::Number])
                    .update_columns([
                        issue::Column::AuthorLogin,
                        issue::Column::Title,
                        issue::Column::State,
                        issue::Column::CommentCount,
                        issue::Column::SyncedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                tracing::error!(repository, "Failed to upsert issue batch: {}", e);
                StoreError::from(e)
            })?;

        Ok(count)
    }
}
