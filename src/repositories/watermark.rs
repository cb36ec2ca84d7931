//! # Watermark Repository
//!
//! Durable per-(username, repository) sync state on the `sync_watermarks`
//! table. [`WatermarkStore`] is the seam the sync engine depends on;
//! [`WatermarkRepository`] implements it over SeaORM.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::sync_watermark::{ActiveModel, Column, Entity, Model};
use crate::sync::{ActivityTotals, Markers};

/// Stored sync state for one (username, repository) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub username: String,
    pub repository: String,
    pub last_sync_at: DateTime<Utc>,
    pub markers: Markers,
    pub totals: ActivityTotals,
    pub fetched_at: DateTime<Utc>,
}

impl From<Model> for Watermark {
    fn from(model: Model) -> Self {
        Self {
            username: model.username,
            repository: model.repository,
            last_sync_at: model.last_sync_at.with_timezone(&Utc),
            markers: Markers {
                commit_sha: model.last_commit_sha,
                pr_number: model.last_pr_number,
                issue_number: model.last_issue_number,
            },
            totals: ActivityTotals {
                commits: to_count(model.total_commits),
                pull_requests: to_count(model.total_pull_requests),
                issues: to_count(model.total_issues),
                pr_comments: to_count(model.total_pr_comments),
                issue_comments: to_count(model.total_issue_comments),
            },
            fetched_at: model.fetched_at.with_timezone(&Utc),
        }
    }
}

fn to_count(value: i64) -> u64 {
    value.max(0) as u64
}

fn to_column(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Partial watermark write. Fields left `None` keep their stored value, or
/// take the column default when the row is created.
#[derive(Debug, Clone, Default)]
pub struct WatermarkUpdate {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_commit_sha: Option<Option<String>>,
    pub last_pr_number: Option<Option<i64>>,
    pub last_issue_number: Option<Option<i64>>,
    pub totals: Option<ActivityTotals>,
}

impl WatermarkUpdate {
    /// Full replacement of markers, totals and sync instant.
    pub fn complete(last_sync_at: DateTime<Utc>, markers: Markers, totals: ActivityTotals) -> Self {
        Self {
            last_sync_at: Some(last_sync_at),
            last_commit_sha: Some(markers.commit_sha),
            last_pr_number: Some(markers.pr_number),
            last_issue_number: Some(markers.issue_number),
            totals: Some(totals),
        }
    }
}

/// Watermark persistence used by the sync engine.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn find(&self, username: &str, repository: &str)
    -> Result<Option<Watermark>, StoreError>;

    /// Inserts or updates the record for the pair, returning the stored state.
    async fn upsert(
        &self,
        username: &str,
        repository: &str,
        update: WatermarkUpdate,
    ) -> Result<Watermark, StoreError>;

    /// Whether the pair has a record with `last_sync_at >= since`.
    async fn exists_synced_since(
        &self,
        username: &str,
        repository: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Adds `delta` to the stored totals and moves `last_sync_at`.
    /// Returns `false` when no record exists.
    async fn increment_totals(
        &self,
        username: &str,
        repository: &str,
        delta: ActivityTotals,
        synced_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// [`increment_totals`](Self::increment_totals) plus marker replacement in
    /// a single statement. Returns `false` when no record exists.
    async fn advance(
        &self,
        username: &str,
        repository: &str,
        delta: ActivityTotals,
        markers: &Markers,
        synced_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, username: &str, repository: &str) -> Result<bool, StoreError>;

    /// Removes records whose last sync is older than `threshold`.
    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// SeaORM-backed [`WatermarkStore`]
pub struct WatermarkRepository {
    db: DatabaseConnection,
}

impl WatermarkRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// All records, most recently synced first
    pub async fn list(&self) -> Result<Vec<Watermark>, StoreError> {
        let rows = Entity::find()
            .order_by_desc(Column::LastSyncAt)
            .all(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to list watermarks: {}", e);
                StoreError::from(e)
            })?;
        Ok(rows.into_iter().map(Watermark::from).collect())
    }

    fn increment_query(
        delta: ActivityTotals,
        synced_at: DateTime<Utc>,
    ) -> sea_orm::UpdateMany<Entity> {
        Entity::update_many()
            .col_expr(
                Column::TotalCommits,
                Expr::col(Column::TotalCommits).add(to_column(delta.commits)),
            )
            .col_expr(
                Column::TotalPullRequests,
                Expr::col(Column::TotalPullRequests).add(to_column(delta.pull_requests)),
            )
            .col_expr(
                Column::TotalIssues,
                Expr::col(Column::TotalIssues).add(to_column(delta.issues)),
            )
            .col_expr(
                Column::TotalPrComments,
                Expr::col(Column::TotalPrComments).add(to_column(delta.pr_comments)),
            )
            .col_expr(
                Column::TotalIssueComments,
                Expr::col(Column::TotalIssueComments).add(to_column(delta.issue_comments)),
            )
            .col_expr(Column::LastSyncAt, Expr::value(synced_at.fixed_offset()))
            .col_expr(Column::FetchedAt, Expr::value(Utc::now().fixed_offset()))
    }
}

#[async_trait]
impl WatermarkStore for WatermarkRepository {
    async fn find(
        &self,
        username: &str,
        repository: &str,
    ) -> Result<Option<Watermark>, StoreError> {
        let row = Entity::find()
            .filter(Column::Username.eq(username))
            .filter(Column::Repository.eq(repository))
            .one(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to load watermark: {}", e);
                StoreError::from(e)
            })?;

        Ok(row.map(Watermark::from))
    }

    async fn upsert(
        &self,
        username: &str,
        repository: &str,
        update: WatermarkUpdate,
    ) -> Result<Watermark, StoreError> {
        let now = Utc::now().fixed_offset();
        let totals = update.totals.unwrap_or_default();

        let mut update_columns = vec![Column::FetchedAt];
        if update.last_sync_at.is_some() {
            update_columns.push(Column::LastSyncAt);
        }
        if update.last_commit_sha.is_some() {
            update_columns.push(Column::LastCommitSha);
        }
        if update.last_pr_number.is_some() {
            update_columns.push(Column::LastPrNumber);
        }
        if update.last_issue_number.is_some() {
            update_columns.push(Column::LastIssueNumber);
        }
        if update.totals.is_some() {
            update_columns.extend([
                Column::TotalCommits,
                Column::TotalPullRequests,
                Column::TotalIssues,
                Column::TotalPrComments,
                Column::TotalIssueComments,
            ]);
        }

        let row = ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username.to_string()),
            repository: Set(repository.to_string()),
            last_sync_at: Set(update.last_sync_at.map_or(now, |at| at.fixed_offset())),
            last_commit_sha: Set(update.last_commit_sha.flatten()),
            last_pr_number: Set(update.last_pr_number.flatten()),
            last_issue_number: Set(update.last_issue_number.flatten()),
            total_commits: Set(to_column(totals.commits)),
            total_pull_requests: Set(to_column(totals.pull_requests)),
            total_issues: Set(to_column(totals.issues)),
            total_pr_comments: Set(to_column(totals.pr_comments)),
            total_issue_comments: Set(to_column(totals.issue_comments)),
            fetched_at: Set(now),
        };

        Entity::insert(row)
            .on_conflict(
                OnConflict::columns([Column::Username, Column::Repository])
                    .update_columns(update_columns)
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to upsert watermark: {}", e);
                StoreError::from(e)
            })?;

        self.find(username, repository).await?.ok_or_else(|| {
            StoreError::Database(sea_orm::DbErr::RecordNotFound(format!(
                "watermark for {username} on {repository}"
            )))
        })
    }

    async fn exists_synced_since(
        &self,
        username: &str,
        repository: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let count = Entity::find()
            .filter(Column::Username.eq(username))
            .filter(Column::Repository.eq(repository))
            .filter(Column::LastSyncAt.gte(since.fixed_offset()))
            .count(&self.db)
            .await?;
        Ok(count > 0)
    }

    async fn increment_totals(
        &self,
        username: &str,
        repository: &str,
        delta: ActivityTotals,
        synced_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = Self::increment_query(delta, synced_at)
            .filter(Column::Username.eq(username))
            .filter(Column::Repository.eq(repository))
            .exec(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to increment watermark totals: {}", e);
                StoreError::from(e)
            })?;
        Ok(result.rows_affected > 0)
    }

    async fn advance(
        &self,
        username: &str,
        repository: &str,
        delta: ActivityTotals,
        markers: &Markers,
        synced_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = Self::increment_query(delta, synced_at)
            .col_expr(Column::LastCommitSha, Expr::value(markers.commit_sha.clone()))
            .col_expr(Column::LastPrNumber, Expr::value(markers.pr_number))
            .col_expr(Column::LastIssueNumber, Expr::value(markers.issue_number))
            .filter(Column::Username.eq(username))
            .filter(Column::Repository.eq(repository))
            .exec(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to advance watermark: {}", e);
                StoreError::from(e)
            })?;
        Ok(result.rows_affected > 0)
    }

    async fn delete(&self, username: &str, repository: &str) -> Result<bool, StoreError> {
        let result = Entity::delete_many()
            .filter(Column::Username.eq(username))
            .filter(Column::Repository.eq(repository))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_older_than(&self, threshold: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = Entity::delete_many()
            .filter(Column::LastSyncAt.lt(threshold.fixed_offset()))
            .exec(&self.db)
            .await
            .map_err(|e| {
                tracing::error!("Failed to delete stale watermarks: {}", e);
                StoreError::from(e)
            })?;

        if result.rows_affected > 0 {
            tracing::info!(
                deleted = result.rows_affected,
                %threshold,
                "Deleted stale watermarks"
            );
        }
        Ok(result.rows_affected)
    }
}
