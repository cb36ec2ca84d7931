//! Sync Decision Engine
//!
//! Chooses between a cached result, an incremental delta and a full-window
//! sync for one (username, repository) pair, then drives fetch, filter,
//! persistence and the watermark write in that order. The watermark is only
//! written after every sink batch has succeeded.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use metrics::{counter, histogram};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::filter::{Bound, FilteredActivity, filter_activity, retain_unseen};
use super::locks::KeyedLocks;
use super::types::{Markers, SyncKey, SyncMode, SyncOutcome};
use crate::config::SyncConfig;
use crate::error::{FetchError, StoreError, SyncError, SyncStage};
use crate::github::{ActivitySource, FetchLimits, RepoRef, RepositorySnapshot};
use crate::repositories::{ActivitySink, Watermark, WatermarkStore, WatermarkUpdate};

/// Branch chosen for a sync call, carrying the stored watermark when one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// No record yet
    Full,
    /// Record exists but must be recomputed over the full window
    Resync(Watermark),
    Cached(Watermark),
    Incremental(Watermark),
}

pub struct SyncEngine {
    source: Arc<dyn ActivitySource>,
    store: Arc<dyn WatermarkStore>,
    sink: Arc<dyn ActivitySink>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn ActivitySource>,
        store: Arc<dyn WatermarkStore>,
        sink: Arc<dyn ActivitySink>,
        config: SyncConfig,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            clock: Arc::new(SystemClock),
            locks: KeyedLocks::new(),
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Start of the full-sync window relative to `now`.
    pub fn analysis_horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let months = self.config.analysis_window_months;
        now.checked_sub_months(Months::new(months))
            .unwrap_or_else(|| now - chrono::Duration::days(30 * i64::from(months)))
    }

    pub fn plan(&self, existing: Option<Watermark>, now: DateTime<Utc>) -> SyncPlan {
        let Some(watermark) = existing else {
            return SyncPlan::Full;
        };

        if !self.config.incremental_enabled {
            return SyncPlan::Resync(watermark);
        }

        let age = now - watermark.last_sync_at;
        if age < self.config.incremental_interval() {
            SyncPlan::Cached(watermark)
        } else if age >= self.config.full_interval() {
            SyncPlan::Resync(watermark)
        } else {
            SyncPlan::Incremental(watermark)
        }
    }

    /// Brings the stored totals for `username` in `repository` (`owner/name`)
    /// up to date and returns them.
    #[instrument(skip(self, credential), fields(username = %username, repository = %repository))]
    pub async fn sync_user_repo_activity(
        &self,
        username: &str,
        repository: &str,
        credential: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let repo: RepoRef = repository.parse()?;
        let key = SyncKey::new(username, &repo);
        let _guard = self.locks.acquire(&key).await;

        let result = self.sync_locked(&key, &repo, credential).await;
        match &result {
            Ok(outcome) => {
                let mode = outcome.mode.as_str();
                counter!("activity_sync_total", "mode" => mode).increment(1);
                histogram!("activity_sync_items_fetched", "mode" => mode)
                    .record(outcome.items_fetched as f64);
                info!(
                    mode,
                    items_fetched = outcome.items_fetched,
                    commits = outcome.totals.commits,
                    "Sync completed"
                );
            }
            Err(e) => {
                counter!("activity_sync_failures_total", "kind" => e.kind()).increment(1);
                warn!(error = %e, "Sync failed");
            }
        }
        result
    }

    async fn sync_locked(
        &self,
        key: &SyncKey,
        repo: &RepoRef,
        credential: &str,
    ) -> Result<SyncOutcome, SyncError> {
        let now = self.clock.now();
        let existing = self
            .store
            .find(&key.username, &key.repository)
            .await
            .map_err(|e| SyncError::failure(SyncStage::ReadWatermark, e))?;

        match self.plan(existing, now) {
            SyncPlan::Full => self.full_sync(key, repo, credential, None, now).await,
            SyncPlan::Resync(watermark) => {
                debug!(last_sync_at = %watermark.last_sync_at, "Recomputing full window");
                self.full_sync(key, repo, credential, Some(watermark), now)
                    .await
            }
            SyncPlan::Cached(watermark) => {
                debug!(last_sync_at = %watermark.last_sync_at, "Serving stored totals");
                Ok(SyncOutcome::cached(watermark.totals))
            }
            SyncPlan::Incremental(watermark) => {
                self.incremental_sync(key, repo, credential, watermark, now)
                    .await
            }
        }
    }

    async fn full_sync(
        &self,
        key: &SyncKey,
        repo: &RepoRef,
        credential: &str,
        previous: Option<Watermark>,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let horizon = self.analysis_horizon(now);
        let limits = FetchLimits {
            commits: self.config.max_commits,
            pull_requests: self.config.max_pull_requests,
            issues: self.config.max_issues,
        };

        let snapshot = self.fetch(repo, horizon, limits, credential).await?;
        let activity = filter_activity(&snapshot, &key.username, Bound::Inclusive(horizon));
        self.persist(&key.repository, &activity).await?;

        let recomputed = activity.totals();
        let (totals, markers, synced_at) = match &previous {
            Some(stored) => (
                stored.totals.max_merge(recomputed),
                activity.advance_markers(&stored.markers),
                sync_instant(now.max(stored.last_sync_at), &activity),
            ),
            None => (
                recomputed,
                activity.advance_markers(&Markers::default()),
                sync_instant(now, &activity),
            ),
        };

        self.store
            .upsert(
                &key.username,
                &key.repository,
                WatermarkUpdate::complete(synced_at, markers, totals),
            )
            .await
            .map_err(SyncError::WatermarkWrite)?;

        // Only growth over stored totals is new on a resync
        let items_fetched = match &previous {
            Some(stored) => totals
                .item_count()
                .saturating_sub(stored.totals.item_count()),
            None => recomputed.item_count(),
        };

        Ok(SyncOutcome {
            totals,
            is_incremental: false,
            items_fetched,
            mode: SyncMode::Full,
        })
    }

    async fn incremental_sync(
        &self,
        key: &SyncKey,
        repo: &RepoRef,
        credential: &str,
        previous: Watermark,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, SyncError> {
        let since = previous.last_sync_at;
        let limits = FetchLimits::uniform(self.config.max_incremental_items);

        let snapshot = self.fetch(repo, since, limits, credential).await?;
        let fresh = retain_unseen(
            filter_activity(&snapshot, &key.username, Bound::Exclusive(since)),
            &previous.markers,
        );
        self.persist(&key.repository, &fresh).await?;

        let delta = fresh.totals();
        let markers = fresh.advance_markers(&previous.markers);
        let synced_at = sync_instant(now, &fresh);
        let totals = previous.totals + delta;

        let advanced = self
            .store
            .advance(&key.username, &key.repository, delta, &markers, synced_at)
            .await
            .map_err(SyncError::WatermarkWrite)?;

        if !advanced {
            // Removed between read and write by cleanup or reset
            warn!("Watermark disappeared during sync, recreating it");
            self.store
                .upsert(
                    &key.username,
                    &key.repository,
                    WatermarkUpdate::complete(synced_at, markers, totals),
                )
                .await
                .map_err(SyncError::WatermarkWrite)?;
        }

        Ok(SyncOutcome {
            totals,
            is_incremental: true,
            items_fetched: delta.item_count(),
            mode: SyncMode::Incremental,
        })
    }

    async fn fetch(
        &self,
        repo: &RepoRef,
        since: DateTime<Utc>,
        limits: FetchLimits,
        credential: &str,
    ) -> Result<RepositorySnapshot, SyncError> {
        let timeout = self.config.fetch_timeout();
        let query = self.source.fetch_window(repo, since, limits, credential);

        match tokio::time::timeout(timeout, query).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(FetchError::Timeout {
                seconds: timeout.as_secs(),
            }
            .into()),
        }
    }

    /// Writes every counted item in `batch_size` chunks. All batches run to
    /// completion; any failure fails the sync before the watermark write.
    async fn persist(&self, repository: &str, activity: &FilteredActivity) -> Result<(), SyncError> {
        let batch_size = self.config.batch_size.max(1);
        let mut batches = JoinSet::new();

        for chunk in activity.commits.chunks(batch_size) {
            let sink = Arc::clone(&self.sink);
            let repository = repository.to_string();
            let items = chunk.to_vec();
            batches.spawn(async move { sink.upsert_commits(&repository, items).await });
        }
        for chunk in activity.pull_requests.chunks(batch_size) {
            let sink = Arc::clone(&self.sink);
            let repository = repository.to_string();
            let items = chunk.to_vec();
            batches.spawn(async move { sink.upsert_pull_requests(&repository, items).await });
        }
        for chunk in activity.issues.chunks(batch_size) {
            let sink = Arc::clone(&self.sink);
            let repository = repository.to_string();
            let items = chunk.to_vec();
            batches.spawn(async move { sink.upsert_issues(&repository, items).await });
        }

        let total = batches.len();
        let mut written = 0;
        let mut failures = Vec::new();

        while let Some(joined) = batches.join_next().await {
            match joined {
                Ok(Ok(count)) => written += count,
                Ok(Err(e)) => failures.push(e),
                Err(e) => failures.push(StoreError::Task(e.to_string())),
            }
        }

        if !failures.is_empty() {
            let detail = failures
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(SyncError::failure(
                SyncStage::Persist,
                format!("{} of {} batches failed: {}", failures.len(), total, detail),
            ));
        }

        debug!(written, batches = total, "Persisted activity");
        Ok(())
    }

    /// Stored state for the pair, if any. Never contacts the data source.
    pub async fn watermark(
        &self,
        username: &str,
        repository: &str,
    ) -> Result<Option<Watermark>, SyncError> {
        let repo: RepoRef = repository.parse()?;
        let key = SyncKey::new(username, &repo);
        self.store
            .find(&key.username, &key.repository)
            .await
            .map_err(|e| SyncError::failure(SyncStage::ReadWatermark, e))
    }

    /// Drops the watermark so the next call performs a full sync.
    #[instrument(skip(self))]
    pub async fn reset(&self, username: &str, repository: &str) -> Result<bool, SyncError> {
        let repo: RepoRef = repository.parse()?;
        let key = SyncKey::new(username, &repo);
        let _guard = self.locks.acquire(&key).await;

        let removed = self
            .store
            .delete(&key.username, &key.repository)
            .await
            .map_err(SyncError::WatermarkWrite)?;
        if removed {
            info!("Watermark reset");
        }
        Ok(removed)
    }

    /// Removes watermarks not synced within the retention period.
    #[instrument(skip(self), fields(retention_days = self.config.retention_days))]
    pub async fn cleanup(&self) -> Result<u64, StoreError> {
        let threshold = self.clock.now() - self.config.retention();
        let deleted = self.store.delete_older_than(threshold).await?;
        counter!("activity_sync_watermarks_deleted_total").increment(deleted);
        info!(deleted, %threshold, "Watermark cleanup finished");
        Ok(deleted)
    }
}

/// Never earlier than the newest counted timestamp, so nothing counted now
/// passes the strict bound of the next incremental sync.
fn sync_instant(now: DateTime<Utc>, activity: &FilteredActivity) -> DateTime<Utc> {
    activity.newest_at().map_or(now, |newest| newest.max(now))
}
