//! Commit entity model
//!
//! Default-branch commits keyed by `(repository, sha)`.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "commits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Repository in `owner/name` form
    pub repository: String,

    /// Commit object id (natural key within the repository)
    pub sha: String,

    /// Login of the linked platform user, absent for unlinked authors
    pub author_login: Option<String>,

    pub message: String,

    pub committed_at: DateTimeWithTimeZone,

    /// Last time this row was written by a sync
    pub synced_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
