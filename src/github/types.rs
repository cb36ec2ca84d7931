//! Raw activity nodes returned by the data source.
//!
//! The wire structs mirror only the fields the activity filter consumes;
//! anything else in the GraphQL payload is ignored during deserialization.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::SyncError;

/// Repository coordinates in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }
}

impl FromStr for RepoRef {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        match trimmed.split_once('/') {
            Some((owner, name))
                if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
            {
                Ok(Self::new(owner, name))
            }
            _ => Err(SyncError::InvalidRepository(value.to_string())),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Per-entity `first:` arguments for one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub commits: u32,
    pub pull_requests: u32,
    pub issues: u32,
}

impl FetchLimits {
    pub fn uniform(limit: u32) -> Self {
        Self {
            commits: limit,
            pull_requests: limit,
            issues: limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawCommit {
    pub sha: String,
    pub message: String,
    pub committed_at: DateTime<Utc>,
    /// Login of the platform account linked to the commit author, if any
    pub author_login: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawComment {
    pub author_login: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPullRequest {
    pub number: i64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub author_login: Option<String>,
    pub comments: Vec<RawComment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawIssue {
    pub number: i64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub author_login: Option<String>,
    pub comments: Vec<RawComment>,
}

/// Everything one `repository` query returned.
///
/// Commits are newest-first; pull requests and issues are newest-created-first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositorySnapshot {
    pub commits: Vec<RawCommit>,
    pub pull_requests: Vec<RawPullRequest>,
    pub issues: Vec<RawIssue>,
}

// ---- GraphQL wire format ----

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlError {
    pub message: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RepositoryData {
    pub repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepositoryNode {
    pub default_branch_ref: Option<BranchRef>,
    pub pull_requests: NodeList<PullRequestNode>,
    pub issues: NodeList<IssueNode>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BranchRef {
    pub target: Option<CommitTarget>,
}

// `target` is a union; only the Commit arm carries `history`.
#[derive(Debug, Deserialize)]
pub(crate) struct CommitTarget {
    pub history: Option<NodeList<CommitNode>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NodeList<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<Option<T>>,
}

impl<T> NodeList<T> {
    fn into_nodes(self) -> impl Iterator<Item = T> {
        self.nodes.into_iter().flatten()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct Actor {
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GitActor {
    pub user: Option<Actor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommitNode {
    pub oid: String,
    #[serde(default)]
    pub message: String,
    pub committed_date: DateTime<Utc>,
    pub author: Option<GitActor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommentNode {
    pub created_at: DateTime<Utc>,
    pub author: Option<Actor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PullRequestNode {
    pub number: i64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub author: Option<Actor>,
    pub comments: NodeList<CommentNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IssueNode {
    pub number: i64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub author: Option<Actor>,
    pub comments: NodeList<CommentNode>,
}

fn comments(list: NodeList<CommentNode>) -> Vec<RawComment> {
    list.into_nodes()
        .map(|c| RawComment {
            author_login: c.author.map(|a| a.login),
            created_at: c.created_at,
        })
        .collect()
}

impl From<RepositoryNode> for RepositorySnapshot {
    fn from(node: RepositoryNode) -> Self {
        // Empty repositories have no default branch; treat as no commits.
        let commits = node
            .default_branch_ref
            .and_then(|r| r.target)
            .and_then(|t| t.history)
            .map(|history| {
                history
                    .into_nodes()
                    .map(|c| RawCommit {
                        sha: c.oid,
                        message: c.message,
                        committed_at: c.committed_date,
                        author_login: c.author.and_then(|a| a.user).map(|u| u.login),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let pull_requests = node
            .pull_requests
            .into_nodes()
            .map(|pr| RawPullRequest {
                number: pr.number,
                title: pr.title,
                state: pr.state,
                created_at: pr.created_at,
                author_login: pr.author.map(|a| a.login),
                comments: comments(pr.comments),
            })
            .collect();

        let issues = node
            .issues
            .into_nodes()
            .map(|issue| RawIssue {
                number: issue.number,
                title: issue.title,
                state: issue.state,
                created_at: issue.created_at,
                author_login: issue.author.map(|a| a.login),
                comments: comments(issue.comments),
            })
            .collect();

        Self {
            commits,
            pull_requests,
            issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_owner_and_name() {
        let repo: RepoRef = "octo/demo".parse().unwrap();
        assert_eq!(repo, RepoRef::new("octo", "demo"));
        assert_eq!(repo.to_string(), "octo/demo");
    }

    #[test]
    fn rejects_malformed_repository() {
        for bad in ["octo", "/demo", "octo/", "a/b/c", ""] {
            assert!(
                matches!(bad.parse::<RepoRef>(), Err(SyncError::InvalidRepository(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn converts_repository_payload_and_skips_null_nodes() {
        let payload = json!({
            "defaultBranchRef": {
                "target": {
                    "history": {
                        "nodes": [
                            {
                                "oid": "abc123",
                                "message": "Fix parser",
                                "committedDate": "2026-09-01T10:00:00Z",
                                "author": { "user": { "login": "octocat" } },
                                "additions": 12
                            },
                            null,
                            {
                                "oid": "def456",
                                "message": "Unlinked author",
                                "committedDate": "2026-08-30T10:00:00Z",
                                "author": { "user": null }
                            }
                        ]
                    }
                }
            },
            "pullRequests": {
                "nodes": [{
                    "number": 7,
                    "title": "Add feature",
                    "state": "OPEN",
                    "createdAt": "2026-09-02T10:00:00Z",
                    "author": { "login": "octocat" },
                    "comments": { "nodes": [
                        { "createdAt": "2026-09-03T10:00:00Z", "author": { "login": "hubot" } },
                        { "createdAt": "2026-09-03T11:00:00Z", "author": null }
                    ]}
                }]
            },
            "issues": { "nodes": [] }
        });

        let node: RepositoryNode = serde_json::from_value(payload).unwrap();
        let snapshot = RepositorySnapshot::from(node);

        assert_eq!(snapshot.commits.len(), 2);
        assert_eq!(snapshot.commits[0].author_login.as_deref(), Some("octocat"));
        assert_eq!(snapshot.commits[1].author_login, None);
        assert_eq!(snapshot.pull_requests[0].number, 7);
        assert_eq!(snapshot.pull_requests[0].comments.len(), 2);
        assert_eq!(snapshot.pull_requests[0].comments[1].author_login, None);
        assert!(snapshot.issues.is_empty());
    }

    #[test]
    fn empty_repository_without_default_branch_has_no_commits() {
        let payload = json!({
            "defaultBranchRef": null,
            "pullRequests": { "nodes": [] },
            "issues": { "nodes": [] }
        });

        let node: RepositoryNode = serde_json::from_value(payload).unwrap();
        assert_eq!(RepositorySnapshot::from(node), RepositorySnapshot::default());
    }
}
