//! Migration to create the sync_watermarks table.
//!
//! One row per (username, repository) pair holding the last sync instant,
//! the last-seen markers and the running activity totals.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SyncWatermarks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SyncWatermarks::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SyncWatermarks::Username).text().not_null())
                    .col(ColumnDef::new(SyncWatermarks::Repository).text().not_null())
                    .col(
                        ColumnDef::new(SyncWatermarks::LastSyncAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SyncWatermarks::LastCommitSha).text().null())
                    .col(
                        ColumnDef::new(SyncWatermarks::LastPrNumber)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncWatermarks::LastIssueNumber)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(SyncWatermarks::TotalCommits)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncWatermarks::TotalPullRequests)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncWatermarks::TotalIssues)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncWatermarks::TotalPrComments)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncWatermarks::TotalIssueComments)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(SyncWatermarks::FetchedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Natural key: one watermark per (username, repository)
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_watermarks_username_repository")
                    .table(SyncWatermarks::Table)
                    .col(SyncWatermarks::Username)
                    .col(SyncWatermarks::Repository)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Retention cleanup scans by last sync instant
        manager
            .create_index(
                Index::create()
                    .name("idx_sync_watermarks_last_sync_at")
                    .table(SyncWatermarks::Table)
                    .col(SyncWatermarks::LastSyncAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_sync_watermarks_last_sync_at")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_index(
                Index::drop()
                    .name("idx_sync_watermarks_username_repository")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(SyncWatermarks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SyncWatermarks {
    Table,
    Id,
    Username,
    Repository,
    LastSyncAt,
    LastCommitSha,
    LastPrNumber,
    LastIssueNumber,
    TotalCommits,
    TotalPullRequests,
    TotalIssues,
    TotalPrComments,
    TotalIssueComments,
    FetchedAt,
}
