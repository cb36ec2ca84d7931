//! # Data Models
//!
//! This module contains the SeaORM entities persisted by the activity sync
//! service and the small response types shared by the HTTP surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod commit;
pub mod issue;
pub mod pull_request;
pub mod sync_watermark;

pub use commit::Entity as Commit;
pub use issue::Entity as Issue;
pub use pull_request::Entity as PullRequest;
pub use sync_watermark::Entity as SyncWatermark;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "activity-sync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
