//! Test utilities for sync and database testing.
//!
//! Provides an in-memory SQLite database with migrations applied, a scripted
//! data source that records every query, a controllable clock and a sink
//! wrapper that can be told to fail.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use activity_sync::config::SyncConfig;
use activity_sync::error::{FetchError, StoreError};
use activity_sync::github::{
    ActivitySource, FetchLimits, RawComment, RawCommit, RawIssue, RawPullRequest, RepoRef,
    RepositorySnapshot,
};
use activity_sync::repositories::{
    ActivityRepository, ActivitySink, WatermarkRepository, WatermarkStore,
};
use activity_sync::sync::{Clock, SyncEngine};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection};

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

/// Fixed reference instant used across tests
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// One query the engine issued against [`ScriptedSource`].
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub repository: String,
    pub since: DateTime<Utc>,
    pub limits: FetchLimits,
    pub credential: String,
}

/// Data source that replays queued responses and records each query.
///
/// When the queue is empty the last successful snapshot is repeated.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<RepositorySnapshot, String>>>,
    fallback: Mutex<RepositorySnapshot>,
    queries: Mutex<Vec<RecordedQuery>>,
    delay: Mutex<Option<StdDuration>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, snapshot: RepositorySnapshot) {
        self.responses.lock().unwrap().push_back(Ok(snapshot));
    }

    /// Queue an application-level query error
    pub fn push_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn set_delay(&self, delay: StdDuration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> Vec<RecordedQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> RecordedQuery {
        self.queries.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ActivitySource for ScriptedSource {
    async fn fetch_window(
        &self,
        repo: &RepoRef,
        since: DateTime<Utc>,
        limits: FetchLimits,
        credential: &str,
    ) -> Result<RepositorySnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().unwrap().push(RecordedQuery {
            repository: repo.to_string(),
            since,
            limits,
            credential: credential.to_string(),
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.fallback.lock().unwrap() = snapshot.clone();
                Ok(snapshot)
            }
            Some(Err(message)) => Err(FetchError::GraphQl {
                messages: vec![message],
            }),
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

/// Sink wrapper that fails pull request batches while the switch is on.
pub struct FlakySink {
    inner: ActivityRepository,
    fail_pull_requests: AtomicBool,
    batches: AtomicUsize,
}

impl FlakySink {
    pub fn new(db: DatabaseConnection) -> Arc<Self> {
        Arc::new(Self {
            inner: ActivityRepository::new(db),
            fail_pull_requests: AtomicBool::new(false),
            batches: AtomicUsize::new(0),
        })
    }

    pub fn fail_pull_requests(&self, fail: bool) {
        self.fail_pull_requests.store(fail, Ordering::SeqCst);
    }

    /// Batches handed to this sink so far, including failed ones
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActivitySink for FlakySink {
    async fn upsert_commits(
        &self,
        repository: &str,
        commits: Vec<RawCommit>,
    ) -> Result<u64, StoreError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_commits(repository, commits).await
    }

    async fn upsert_pull_requests(
        &self,
        repository: &str,
        pull_requests: Vec<RawPullRequest>,
    ) -> Result<u64, StoreError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_pull_requests.load(Ordering::SeqCst) {
            return Err(StoreError::Task("pull request batch rejected".to_string()));
        }
        self.inner.upsert_pull_requests(repository, pull_requests).await
    }

    async fn upsert_issues(
        &self,
        repository: &str,
        issues: Vec<RawIssue>,
    ) -> Result<u64, StoreError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_issues(repository, issues).await
    }
}

/// Everything a sync test needs, wired against one in-memory database.
pub struct Harness {
    pub db: DatabaseConnection,
    pub source: Arc<ScriptedSource>,
    pub sink: Arc<FlakySink>,
    pub store: Arc<WatermarkRepository>,
    pub clock: Arc<FixedClock>,
    pub engine: Arc<SyncEngine>,
}

impl Harness {
    pub async fn new() -> Result<Self> {
        Self::with_config(SyncConfig::default()).await
    }

    pub async fn with_config(config: SyncConfig) -> Result<Self> {
        let db = setup_test_db().await?;
        let source = ScriptedSource::new();
        let sink = FlakySink::new(db.clone());
        let store = Arc::new(WatermarkRepository::new(db.clone()));
        let clock = FixedClock::new(t0());

        let engine = SyncEngine::new(
            source.clone(),
            store.clone() as Arc<dyn WatermarkStore>,
            sink.clone(),
            config,
        )
        .with_clock(clock.clone());

        Ok(Self {
            db,
            source,
            sink,
            store,
            clock,
            engine: Arc::new(engine),
        })
    }
}

pub fn commit(sha: &str, login: &str, at: DateTime<Utc>) -> RawCommit {
    RawCommit {
        sha: sha.to_string(),
        message: format!("Change {sha}"),
        committed_at: at,
        author_login: Some(login.to_string()),
    }
}

pub fn comment(login: &str, at: DateTime<Utc>) -> RawComment {
    RawComment {
        author_login: Some(login.to_string()),
        created_at: at,
    }
}

pub fn pull_request(
    number: i64,
    login: &str,
    at: DateTime<Utc>,
    comments: Vec<RawComment>,
) -> RawPullRequest {
    RawPullRequest {
        number,
        title: format!("PR #{number}"),
        state: "OPEN".to_string(),
        created_at: at,
        author_login: Some(login.to_string()),
        comments,
    }
}

pub fn issue(number: i64, login: &str, at: DateTime<Utc>, comments: Vec<RawComment>) -> RawIssue {
    RawIssue {
        number,
        title: format!("Issue #{number}"),
        state: "OPEN".to_string(),
        created_at: at,
        author_login: Some(login.to_string()),
        comments,
    }
}
