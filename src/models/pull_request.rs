//! PullRequest entity model
//!
//! Pull requests keyed by `(repository, number)`, with the number of
//! comments inlined by the last fetch that saw them.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pull_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub repository: String,

    /// Pull request number (natural key within the repository)
    pub number: i64,

    pub author_login: Option<String>,

    pub title: String,

    /// Upstream state (OPEN, CLOSED, MERGED)
    pub state: String,

    pub created_at: DateTimeWithTimeZone,

    pub comment_count: i32,

    pub synced_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
