//! Source fetching with retry and a TTL over the published snapshot.
//!
//! [`DataManager`] pulls a raw batch from a [`DataSource`], retrying transient
//! failures, and hands it to the shared [`SnapshotOrchestrator`]. Reads through
//! [`DataManager::get_or_refresh`] reuse the published snapshot while it is
//! younger than the configured TTL.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use booking_core::error::{AnalyticsError, RefreshError, Result};
use booking_core::snapshot::AnalyticsSnapshot;
use booking_data::reader::load_raw_batch;
use serde_json::Value;

use crate::orchestrator::SnapshotOrchestrator;

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Default snapshot TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Fetch attempts before a refresh is reported as failed.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Back-off grows linearly by this step: 0 ms, 100 ms, 200 ms.
const DEFAULT_BACKOFF_STEP: Duration = Duration::from_millis(100);

// ── DataSource ────────────────────────────────────────────────────────────────

/// Supplies one raw batch of event records per call.
pub trait DataSource {
    fn fetch(&mut self) -> Result<Value>;

    /// Short label used in log lines.
    fn describe(&self) -> String;
}

/// Reads every `.json` / `.jsonl` file under a path.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataSource for FileSource {
    fn fetch(&mut self) -> Result<Value> {
        load_raw_batch(&self.path)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// An in-memory batch, returned unchanged on every fetch.
#[derive(Debug, Clone)]
pub struct StaticSource {
    batch: Value,
}

impl StaticSource {
    pub fn new(batch: Value) -> Self {
        Self { batch }
    }

    pub fn set_batch(&mut self, batch: Value) {
        self.batch = batch;
    }
}

impl DataSource for StaticSource {
    fn fetch(&mut self) -> Result<Value> {
        Ok(self.batch.clone())
    }

    fn describe(&self) -> String {
        "in-memory batch".to_string()
    }
}

// ── DataManager ───────────────────────────────────────────────────────────────

/// Drives refreshes of a shared orchestrator from one data source.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use booking_runtime::data_manager::{DataManager, FileSource};
/// use booking_runtime::orchestrator::SnapshotOrchestrator;
///
/// let orchestrator = Arc::new(SnapshotOrchestrator::default());
/// let mut mgr = DataManager::new(FileSource::new("data"), orchestrator, 30);
/// if let Ok(snapshot) = mgr.get_or_refresh() {
///     println!("total events: {}", snapshot.summary.total_events);
/// }
/// ```
pub struct DataManager<S> {
    source: S,
    orchestrator: Arc<SnapshotOrchestrator>,
    /// Maximum age of the published snapshot before a read triggers a refresh.
    cache_ttl: Duration,
    backoff_step: Duration,
    /// When this manager last published a snapshot.
    last_refresh: Option<Instant>,
    last_error: Option<String>,
}

impl<S: DataSource> DataManager<S> {
    pub fn new(source: S, orchestrator: Arc<SnapshotOrchestrator>, cache_ttl_secs: u64) -> Self {
        Self {
            source,
            orchestrator,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            backoff_step: DEFAULT_BACKOFF_STEP,
            last_refresh: None,
            last_error: None,
        }
    }

    /// Override the retry back-off step.
    pub fn with_backoff_step(mut self, step: Duration) -> Self {
        self.backoff_step = step;
        self
    }

    // ── Public API ────────────────────────────────────────────────────────

    /// Fetch a fresh batch and publish a new snapshot.
    ///
    /// The fetch is retried up to three times; analysis errors are not
    /// retried. The published snapshot is untouched on failure.
    pub fn refresh(&mut self) -> std::result::Result<Arc<AnalyticsSnapshot>, RefreshError> {
        let outcome = self
            .fetch_with_retry()
            .map_err(RefreshError::from)
            .and_then(|raw| self.orchestrator.refresh(&raw));

        match &outcome {
            Ok(_) => {
                self.last_refresh = Some(Instant::now());
                self.last_error = None;
            }
            Err(e) => self.last_error = Some(e.to_string()),
        }
        outcome
    }

    /// Return the published snapshot while it is within the TTL, refreshing
    /// first otherwise.
    ///
    /// A failed refresh is returned as-is; the previously published snapshot
    /// stays available through [`orchestrator`](Self::orchestrator).
    pub fn get_or_refresh(&mut self) -> std::result::Result<Arc<AnalyticsSnapshot>, RefreshError> {
        if self.is_cache_valid() {
            if let Ok(snapshot) = self.orchestrator.current() {
                tracing::debug!(age = ?self.cache_age(), "returning cached snapshot");
                return Ok(snapshot);
            }
        }
        self.refresh()
    }

    /// Age of the snapshot this manager last published.
    pub fn cache_age(&self) -> Option<Duration> {
        self.last_refresh.map(|ts| ts.elapsed())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn orchestrator(&self) -> &Arc<SnapshotOrchestrator> {
        &self.orchestrator
    }

    // ── Private helpers ───────────────────────────────────────────────────

    fn is_cache_valid(&self) -> bool {
        self.last_refresh
            .is_some_and(|ts| ts.elapsed() < self.cache_ttl)
    }

    fn fetch_with_retry(&mut self) -> Result<Value> {
        let mut last_err = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let delay = self.backoff_step * attempt;
                tracing::debug!(attempt, ?delay, "retrying fetch after back-off");
                thread::sleep(delay);
            }

            match self.source.fetch() {
                Ok(raw) => return Ok(raw),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        source = %self.source.describe(),
                        error = %e,
                        "fetch attempt failed"
                    );
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            AnalyticsError::Config("no fetch attempts were made".to_string())
        }))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
