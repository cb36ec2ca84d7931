//! GraphQL query construction for the activity window fetch.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value as JsonValue, json};

use super::types::{FetchLimits, RepoRef};
use crate::config::MAX_PAGE_SIZE;

/// Comments inlined per pull request / issue.
pub const COMMENTS_PER_ITEM: u32 = 100;

/// Single query returning default-branch history since `$since`, the newest
/// pull requests and the newest issues, each with inline comments.
pub const REPOSITORY_ACTIVITY_QUERY: &str = r#"
query RepositoryActivity(
  $owner: String!
  $name: String!
  $since: GitTimestamp!
  $commitLimit: Int!
  $prLimit: Int!
  $issueLimit: Int!
) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(first: $commitLimit, since: $since) {
            nodes {
              oid
              message
              committedDate
              author { user { login } }
            }
          }
        }
      }
    }
    pullRequests(first: $prLimit, orderBy: { field: CREATED_AT, direction: DESC }) {
      nodes {
        number
        title
        state
        createdAt
        author { login }
        comments(first: 100) {
          nodes { createdAt author { login } }
        }
      }
    }
    issues(first: $issueLimit, orderBy: { field: CREATED_AT, direction: DESC }) {
      nodes {
        number
        title
        state
        createdAt
        author { login }
        comments(first: 100) {
          nodes { createdAt author { login } }
        }
      }
    }
  }
}
"#;

/// Builds the JSON request body for one window fetch.
///
/// `since` is truncated to whole seconds, which can only widen the window;
/// the activity filter applies the exact bound afterwards.
pub fn build_request(repo: &RepoRef, since: DateTime<Utc>, limits: FetchLimits) -> JsonValue {
    json!({
        "query": REPOSITORY_ACTIVITY_QUERY,
        "variables": {
            "owner": repo.owner,
            "name": repo.name,
            "since": since.to_rfc3339_opts(SecondsFormat::Secs, true),
            "commitLimit": clamp(limits.commits),
            "prLimit": clamp(limits.pull_requests),
            "issueLimit": clamp(limits.issues),
        }
    })
}

fn clamp(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}
