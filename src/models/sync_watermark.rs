//! SyncWatermark entity model
//!
//! One row per (username, repository) pair recording when the pair was last
//! synchronized, the highest markers seen and the running activity totals.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_watermarks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Platform login whose activity is tracked
    pub username: String,

    /// Repository in `owner/name` form
    pub repository: String,

    /// Instant of the last completed sync
    pub last_sync_at: DateTimeWithTimeZone,

    /// Most recent commit counted for this pair, if any
    pub last_commit_sha: Option<String>,

    /// Highest pull request number counted, `None` when none seen
    pub last_pr_number: Option<i64>,

    /// Highest issue number counted, `None` when none seen
    pub last_issue_number: Option<i64>,

    pub total_commits: i64,
    pub total_pull_requests: i64,
    pub total_issues: i64,
    pub total_pr_comments: i64,
    pub total_issue_comments: i64,

    /// Last write instant (informational)
    pub fetched_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
