//! Database migrations for the activity sync service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_10_01_000001_create_sync_watermarks;
mod m2026_10_01_000002_create_activity_items;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_10_01_000001_create_sync_watermarks::Migration),
            Box::new(m2026_10_01_000002_create_activity_items::Migration),
        ]
    }
}
