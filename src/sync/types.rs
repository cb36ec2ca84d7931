//! Shared value types for the sync core.

use std::ops::Add;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::github::RepoRef;

/// Natural key of a watermark: one per (username, repository).
///
/// Logins and repository coordinates are case-insensitive upstream, so both
/// halves are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SyncKey {
    pub username: String,
    pub repository: String,
}

impl SyncKey {
    pub fn new(username: &str, repo: &RepoRef) -> Self {
        Self {
            username: username.trim().to_ascii_lowercase(),
            repository: repo.to_string().to_ascii_lowercase(),
        }
    }
}

/// The five running counters kept per watermark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityTotals {
    pub commits: u64,
    pub pull_requests: u64,
    pub issues: u64,
    pub pr_comments: u64,
    pub issue_comments: u64,
}

impl ActivityTotals {
    /// Commits, pull requests and issues; comments are not items.
    pub fn item_count(&self) -> u64 {
        self.commits + self.pull_requests + self.issues
    }

    /// Counter-wise maximum. Used when a resync recomputes a window that may
    /// no longer contain items counted earlier.
    pub fn max_merge(self, other: Self) -> Self {
        Self {
            commits: self.commits.max(other.commits),
            pull_requests: self.pull_requests.max(other.pull_requests),
            issues: self.issues.max(other.issues),
            pr_comments: self.pr_comments.max(other.pr_comments),
            issue_comments: self.issue_comments.max(other.issue_comments),
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for ActivityTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            commits: self.commits + rhs.commits,
            pull_requests: self.pull_requests + rhs.pull_requests,
            issues: self.issues + rhs.issues,
            pr_comments: self.pr_comments + rhs.pr_comments,
            issue_comments: self.issue_comments + rhs.issue_comments,
        }
    }
}

/// Highest markers seen for a key. `None` means "none seen".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markers {
    pub commit_sha: Option<String>,
    pub pr_number: Option<i64>,
    pub issue_number: Option<i64>,
}

/// Which branch a sync call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// First sync for the key, or a forced full-window resync
    Full,
    /// Delta since the last watermark merged into stored totals
    Incremental,
    /// Served from the stored watermark without touching upstream
    Cached,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
            SyncMode::Cached => "cached",
        }
    }
}

/// Result of one sync call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    #[serde(flatten)]
    pub totals: ActivityTotals,
    pub is_incremental: bool,
    /// Genuinely new commits, pull requests and issues processed by this call
    pub items_fetched: u64,
    pub mode: SyncMode,
}

impl SyncOutcome {
    pub fn cached(totals: ActivityTotals) -> Self {
        Self {
            totals,
            is_incremental: false,
            items_fetched: 0,
            mode: SyncMode::Cached,
        }
    }
}
