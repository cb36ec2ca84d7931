//! Watermark store and activity sink against an in-memory database.

mod test_utils;

use activity_sync::repositories::{
    ActivityRepository, ActivitySink, WatermarkRepository, WatermarkStore, WatermarkUpdate,
};
use activity_sync::sync::{ActivityTotals, Markers};
use chrono::Duration;
use test_utils::{commit, issue, pull_request, setup_test_db, t0};

fn totals(commits: u64, pull_requests: u64) -> ActivityTotals {
    ActivityTotals {
        commits,
        pull_requests,
        ..Default::default()
    }
}

#[tokio::test]
async fn upsert_creates_then_updates_only_given_fields() {
    let db = setup_test_db().await.unwrap();
    let repo = WatermarkRepository::new(db);

    let created = repo
        .upsert(
            "octocat",
            "octo/demo",
            WatermarkUpdate::complete(
                t0(),
                Markers {
                    commit_sha: Some("abc".to_string()),
                    pr_number: Some(4),
                    issue_number: None,
                },
                totals(3, 1),
            ),
        )
        .await
        .unwrap();
    assert_eq!(created.last_sync_at, t0());
    assert_eq!(created.totals, totals(3, 1));

    let updated = repo
        .upsert(
            "octocat",
            "octo/demo",
            WatermarkUpdate {
                last_issue_number: Some(Some(12)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.last_sync_at, t0());
    assert_eq!(updated.markers.commit_sha.as_deref(), Some("abc"));
    assert_eq!(updated.markers.pr_number, Some(4));
    assert_eq!(updated.markers.issue_number, Some(12));
    assert_eq!(updated.totals, totals(3, 1));
    assert_eq!(repo.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn find_misses_unknown_pair() {
    let db = setup_test_db().await.unwrap();
    let repo = WatermarkRepository::new(db);

    assert!(repo.find("octocat", "octo/demo").await.unwrap().is_none());
}

#[tokio::test]
async fn exists_synced_since_compares_last_sync_instant() {
    let db = setup_test_db().await.unwrap();
    let repo = WatermarkRepository::new(db);
    repo.upsert(
        "octocat",
        "octo/demo",
        WatermarkUpdate {
            last_sync_at: Some(t0()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert!(
        repo.exists_synced_since("octocat", "octo/demo", t0() - Duration::hours(1))
            .await
            .unwrap()
    );
    assert!(
        repo.exists_synced_since("octocat", "octo/demo", t0())
            .await
            .unwrap()
    );
    assert!(
        !repo
            .exists_synced_since("octocat", "octo/demo", t0() + Duration::seconds(1))
            .await
            .unwrap()
    );
    assert!(
        !repo
            .exists_synced_since("hubot", "octo/demo", t0() - Duration::days(1))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn increment_and_advance_add_to_stored_totals() {
    let db = setup_test_db().await.unwrap();
    let repo = WatermarkRepository::new(db);
    repo.upsert(
        "octocat",
        "octo/demo",
        WatermarkUpdate::complete(t0(), Markers::default(), totals(3, 1)),
    )
    .await
    .unwrap();

    let later = t0() + Duration::hours(5);
    assert!(
        repo.increment_totals("octocat", "octo/demo", totals(1, 0), later)
            .await
            .unwrap()
    );

    let markers = Markers {
        commit_sha: Some("def".to_string()),
        pr_number: Some(9),
        issue_number: Some(2),
    };
    let latest = later + Duration::hours(5);
    assert!(
        repo.advance(
            "octocat",
            "octo/demo",
            ActivityTotals {
                pr_comments: 4,
                ..totals(2, 1)
            },
            &markers,
            latest,
        )
        .await
        .unwrap()
    );

    let stored = repo.find("octocat", "octo/demo").await.unwrap().unwrap();
    assert_eq!(stored.totals.commits, 6);
    assert_eq!(stored.totals.pull_requests, 2);
    assert_eq!(stored.totals.pr_comments, 4);
    assert_eq!(stored.markers, markers);
    assert_eq!(stored.last_sync_at, latest);
}

#[tokio::test]
async fn increment_on_missing_record_reports_false() {
    let db = setup_test_db().await.unwrap();
    let repo = WatermarkRepository::new(db);

    assert!(
        !repo
            .increment_totals("octocat", "octo/demo", totals(1, 0), t0())
            .await
            .unwrap()
    );
    assert!(repo.find("octocat", "octo/demo").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_and_delete_older_than() {
    let db = setup_test_db().await.unwrap();
    let repo = WatermarkRepository::new(db);
    for (user, at) in [
        ("old", t0() - Duration::days(100)),
        ("recent", t0() - Duration::days(10)),
        ("gone", t0()),
    ] {
        repo.upsert(
            user,
            "octo/demo",
            WatermarkUpdate {
                last_sync_at: Some(at),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }

    assert!(repo.delete("gone", "octo/demo").await.unwrap());
    assert!(!repo.delete("gone", "octo/demo").await.unwrap());

    let deleted = repo
        .delete_older_than(t0() - Duration::days(90))
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let remaining: Vec<_> = repo
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.username)
        .collect();
    assert_eq!(remaining, vec!["recent".to_string()]);
}

#[tokio::test]
async fn activity_upserts_are_idempotent_per_natural_key() {
    let db = setup_test_db().await.unwrap();
    let sink = ActivityRepository::new(db);

    let commits = vec![
        commit("a1", "octocat", t0()),
        commit("a2", "octocat", t0() - Duration::hours(1)),
    ];
    assert_eq!(sink.upsert_commits("octo/demo", commits.clone()).await.unwrap(), 2);
    assert_eq!(sink.upsert_commits("octo/demo", commits).await.unwrap(), 2);
    // same sha in another repository is a different row
    sink.upsert_commits("octo/other", vec![commit("a1", "octocat", t0())])
        .await
        .unwrap();

    let mut pr = pull_request(5, "octocat", t0(), Vec::new());
    sink.upsert_pull_requests("octo/demo", vec![pr.clone()])
        .await
        .unwrap();
    pr.title = "Renamed".to_string();
    pr.state = "MERGED".to_string();
    sink.upsert_pull_requests("octo/demo", vec![pr]).await.unwrap();

    sink.upsert_issues("octo/demo", vec![issue(2, "octocat", t0(), Vec::new())])
        .await
        .unwrap();
    assert_eq!(sink.upsert_issues("octo/demo", Vec::new()).await.unwrap(), 0);

    let counts = sink.stored_counts("octo/demo", "octocat").await.unwrap();
    assert_eq!(counts.commits, 2);
    assert_eq!(counts.pull_requests, 1);
    assert_eq!(counts.issues, 1);

    let other = sink.stored_counts("octo/other", "octocat").await.unwrap();
    assert_eq!(other.commits, 1);
}

#[tokio::test]
async fn stored_counts_ignore_login_case() {
    let db = setup_test_db().await.unwrap();
    let sink = ActivityRepository::new(db);

    sink.upsert_commits(
        "octo/demo",
        vec![
            commit("a1", "OctoCat", t0()),
            commit("a2", "octocat", t0() - Duration::hours(1)),
            commit("a3", "hubot", t0()),
        ],
    )
    .await
    .unwrap();
    sink.upsert_issues("octo/demo", vec![issue(4, "OCTOCAT", t0(), Vec::new())])
        .await
        .unwrap();

    let counts = sink.stored_counts("Octo/Demo", "octocat").await.unwrap();
    assert_eq!(counts.commits, 2);
    assert_eq!(counts.pull_requests, 0);
    assert_eq!(counts.issues, 1);
}
