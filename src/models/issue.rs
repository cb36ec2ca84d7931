//! Issue entity model

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

/// Issues keyed by `(repository, number)`
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "issues")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub repository: String,

    pub number: i64,

    pub author_login: Option<String>,

    pub title: String,

    /// Upstream state (OPEN, CLOSED)
    pub state: String,

    pub created_at: DateTimeWithTimeZone,

    pub comment_count: i32,

    pub synced_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
