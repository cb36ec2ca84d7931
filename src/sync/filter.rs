//! Activity filter
//!
//! Pure selection of the items a username authored inside a time bound,
//! plus the watermark comparison applied on top for incremental syncs.

use chrono::{DateTime, Utc};

use super::types::{ActivityTotals, Markers};
use crate::github::{RawComment, RawCommit, RawIssue, RawPullRequest, RepositorySnapshot};

/// Lower time bound applied to every item and comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// `>=`: full syncs include items exactly at the analysis horizon
    Inclusive(DateTime<Utc>),
    /// `>`: incremental syncs exclude items already counted at the last sync instant
    Exclusive(DateTime<Utc>),
}

impl Bound {
    pub fn admits(&self, at: DateTime<Utc>) -> bool {
        match self {
            Bound::Inclusive(bound) => at >= *bound,
            Bound::Exclusive(bound) => at > *bound,
        }
    }
}

/// Items and comment counts attributed to one username.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredActivity {
    /// Newest first, in upstream order
    pub commits: Vec<RawCommit>,
    pub pull_requests: Vec<RawPullRequest>,
    pub issues: Vec<RawIssue>,
    pub pr_comments: u64,
    pub issue_comments: u64,
    newest_at: Option<DateTime<Utc>>,
}

impl FilteredActivity {
    pub fn totals(&self) -> ActivityTotals {
        ActivityTotals {
            commits: self.commits.len() as u64,
            pull_requests: self.pull_requests.len() as u64,
            issues: self.issues.len() as u64,
            pr_comments: self.pr_comments,
            issue_comments: self.issue_comments,
        }
    }

    /// Timestamp of the newest counted item or comment.
    pub fn newest_at(&self) -> Option<DateTime<Utc>> {
        self.newest_at
    }

    /// Markers after counting this activity. Kinds with no items keep the
    /// previous marker; numbers never move backwards.
    pub fn advance_markers(&self, previous: &Markers) -> Markers {
        let max_number = |seen: Option<i64>, prev: Option<i64>| match (seen, prev) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        Markers {
            commit_sha: self
                .commits
                .first()
                .map(|c| c.sha.clone())
                .or_else(|| previous.commit_sha.clone()),
            pr_number: max_number(
                self.pull_requests.iter().map(|pr| pr.number).max(),
                previous.pr_number,
            ),
            issue_number: max_number(
                self.issues.iter().map(|issue| issue.number).max(),
                previous.issue_number,
            ),
        }
    }
}

fn authored_by(login: Option<&str>, username: &str) -> bool {
    login.is_some_and(|login| login.eq_ignore_ascii_case(username))
}

fn count_comments<'a>(
    comments: impl Iterator<Item = &'a RawComment>,
    username: &str,
    bound: Bound,
    newest: &mut Option<DateTime<Utc>>,
) -> u64 {
    let mut count = 0;
    for comment in comments {
        if authored_by(comment.author_login.as_deref(), username) && bound.admits(comment.created_at)
        {
            count += 1;
            bump(newest, comment.created_at);
        }
    }
    count
}

fn bump(newest: &mut Option<DateTime<Utc>>, at: DateTime<Utc>) {
    if newest.is_none_or(|current| at > current) {
        *newest = Some(at);
    }
}

/// Selects the items `username` authored within `bound`.
///
/// Comments are counted across every pull request and issue in the
/// snapshot, including ones opened by other users.
pub fn filter_activity(
    snapshot: &RepositorySnapshot,
    username: &str,
    bound: Bound,
) -> FilteredActivity {
    let mut newest = None;

    let commits: Vec<RawCommit> = snapshot
        .commits
        .iter()
        .filter(|c| authored_by(c.author_login.as_deref(), username) && bound.admits(c.committed_at))
        .cloned()
        .collect();

    let pull_requests: Vec<RawPullRequest> = snapshot
        .pull_requests
        .iter()
        .filter(|pr| authored_by(pr.author_login.as_deref(), username) && bound.admits(pr.created_at))
        .cloned()
        .collect();

    let issues: Vec<RawIssue> = snapshot
        .issues
        .iter()
        .filter(|issue| {
            authored_by(issue.author_login.as_deref(), username) && bound.admits(issue.created_at)
        })
        .cloned()
        .collect();

    for at in commits
        .iter()
        .map(|c| c.committed_at)
        .chain(pull_requests.iter().map(|pr| pr.created_at))
        .chain(issues.iter().map(|issue| issue.created_at))
    {
        bump(&mut newest, at);
    }

    let pr_comments = count_comments(
        snapshot.pull_requests.iter().flat_map(|pr| pr.comments.iter()),
        username,
        bound,
        &mut newest,
    );
    let issue_comments = count_comments(
        snapshot.issues.iter().flat_map(|issue| issue.comments.iter()),
        username,
        bound,
        &mut newest,
    );

    FilteredActivity {
        commits,
        pull_requests,
        issues,
        pr_comments,
        issue_comments,
        newest_at: newest,
    }
}

/// Drops items already covered by the stored markers.
///
/// A commit is new when its sha differs from the last counted commit; a pull
/// request or issue is new when its number exceeds the stored number. The
/// time bound has already been applied by [`filter_activity`]; both checks
/// are kept because neither is reliable alone.
pub fn retain_unseen(mut activity: FilteredActivity, markers: &Markers) -> FilteredActivity {
    if let Some(last_sha) = markers.commit_sha.as_deref() {
        activity.commits.retain(|c| c.sha != last_sha);
    }
    if let Some(last) = markers.pr_number {
        activity.pull_requests.retain(|pr| pr.number > last);
    }
    if let Some(last) = markers.issue_number {
        activity.issues.retain(|issue| issue.number > last);
    }
    activity
}
