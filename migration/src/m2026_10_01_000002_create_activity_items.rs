//! Migration to create the raw activity item tables.
//!
//! Commits, pull requests and issues are stored per repository and keyed by
//! their natural identifier so re-submitting an item updates it in place.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Commits::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Commits::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Commits::Repository).text().not_null())
                    .col(ColumnDef::new(Commits::Sha).text().not_null())
                    .col(ColumnDef::new(Commits::AuthorLogin).text().null())
                    .col(ColumnDef::new(Commits::Message).text().not_null())
                    .col(
                        ColumnDef::new(Commits::CommittedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Commits::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_commits_repository_sha")
                    .table(Commits::Table)
                    .col(Commits::Repository)
                    .col(Commits::Sha)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PullRequests::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PullRequests::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PullRequests::Repository).text().not_null())
                    .col(ColumnDef::new(PullRequests::Number).big_integer().not_null())
                    .col(ColumnDef::new(PullRequests::AuthorLogin).text().null())
                    .col(ColumnDef::new(PullRequests::Title).text().not_null())
                    .col(ColumnDef::new(PullRequests::State).text().not_null())
                    .col(
                        ColumnDef::new(PullRequests::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PullRequests::CommentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PullRequests::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_pull_requests_repository_number")
                    .table(PullRequests::Table)
                    .col(PullRequests::Repository)
                    .col(PullRequests::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Issues::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Issues::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Issues::Repository).text().not_null())
                    .col(ColumnDef::new(Issues::Number).big_integer().not_null())
                    .col(ColumnDef::new(Issues::AuthorLogin).text().null())
                    .col(ColumnDef::new(Issues::Title).text().not_null())
                    .col(ColumnDef::new(Issues::State).text().not_null())
                    .col(
                        ColumnDef::new(Issues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Issues::CommentCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Issues::SyncedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issues_repository_number")
                    .table(Issues::Table)
                    .col(Issues::Repository)
                    .col(Issues::Number)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Issues::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PullRequests::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Commits::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Commits {
    Table,
    Id,
    Repository,
    Sha,
    AuthorLogin,
    Message,
    CommittedAt,
    SyncedAt,
}

#[derive(DeriveIden)]
enum PullRequests {
    Table,
    Id,
    Repository,
    Number,
    AuthorLogin,
    Title,
    State,
    CreatedAt,
    CommentCount,
    SyncedAt,
}

#[derive(DeriveIden)]
enum Issues {
    Table,
    Id,
    Repository,
    Number,
    AuthorLogin,
    Title,
    State,
    CreatedAt,
    CommentCount,
    SyncedAt,
}
