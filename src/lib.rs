//! # Activity Sync Library
//!
//! Incremental synchronization of per-user GitHub repository activity:
//! watermark persistence, the GraphQL data source, the activity filter and
//! the sync decision engine, plus the HTTP surface that exposes them.

pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod server;
pub mod sync;
pub mod telemetry;
pub use migration;
