//! Snapshot publish/refresh lifecycle.
//!
//! [`SnapshotOrchestrator`] owns the single "current" [`AnalyticsSnapshot`].
//! A refresh builds the next snapshot off to the side and installs it with one
//! `Arc` swap, so readers calling [`SnapshotOrchestrator::current`] see either
//! the previous snapshot or the new one, never anything in between.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use booking_core::error::{NotYetAvailable, RefreshError};
use booking_core::snapshot::AnalyticsSnapshot;
use booking_data::analysis::{analyze_batch, AnalysisOptions};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};

// ── Public types ──────────────────────────────────────────────────────────────

/// Lifecycle state of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

// ── SnapshotOrchestrator ──────────────────────────────────────────────────────

/// Holds the published snapshot and serialises refreshes.
///
/// Shared between tasks behind an `Arc`; every method takes `&self`.
#[derive(Debug, Default)]
pub struct SnapshotOrchestrator {
    options: AnalysisOptions,
    published: RwLock<Option<Arc<AnalyticsSnapshot>>>,
    refreshing: AtomicBool,
}

impl SnapshotOrchestrator {
    pub fn new(options: AnalysisOptions) -> Self {
        Self {
            options,
            published: RwLock::new(None),
            refreshing: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Rebuild the snapshot from `raw` and publish it, stamped with the
    /// current time.
    pub fn refresh(&self, raw: &Value) -> Result<Arc<AnalyticsSnapshot>, RefreshError> {
        self.refresh_at(raw, Utc::now())
    }

    /// Like [`refresh`](Self::refresh) with an explicit generation timestamp.
    ///
    /// Rejected with [`RefreshError::Busy`] while another refresh is running.
    /// On any error the previously published snapshot stays in place.
    pub fn refresh_at(
        &self,
        raw: &Value,
        generated_at: DateTime<Utc>,
    ) -> Result<Arc<AnalyticsSnapshot>, RefreshError> {
        let _guard = match RefreshGuard::acquire(&self.refreshing) {
            Some(guard) => guard,
            None => {
                warn!("refresh rejected: another refresh is in progress");
                return Err(RefreshError::Busy);
            }
        };

        let snapshot = match analyze_batch(raw, &self.options, generated_at) {
            Ok(snapshot) => Arc::new(snapshot),
            Err(e) => {
                warn!(error = %e, "refresh failed; keeping previous snapshot");
                return Err(e);
            }
        };

        self.publish(Arc::clone(&snapshot));
        info!(
            total_events = snapshot.summary.total_events,
            dropped = snapshot.summary.dropped_count,
            "snapshot published"
        );
        Ok(snapshot)
    }

    /// The last successfully published snapshot.
    pub fn current(&self) -> Result<Arc<AnalyticsSnapshot>, NotYetAvailable> {
        self.published
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(NotYetAvailable)
    }

    pub fn state(&self) -> RefreshState {
        if self.refreshing.load(Ordering::Acquire) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    fn publish(&self, snapshot: Arc<AnalyticsSnapshot>) {
        // Write guard is held only for the swap.
        *self
            .published
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

// ── RefreshGuard ──────────────────────────────────────────────────────────────

/// Clears the in-flight flag when dropped, including on early return.
struct RefreshGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    fn batch() -> Value {
        json!([
            {"id": "1", "status": "completed", "start_time": "2024-01-02T10:00:00Z",
             "created_at": "2024-01-01T10:00:00Z", "internal_note": "Sales"},
            {"id": "2", "status": "canceled", "start_time": "2024-01-02T11:00:00Z",
             "created_at": "2024-01-01T10:00:00Z", "internal_note": "Sales"},
            {"id": "3", "status": "completed", "start_time": "2024-01-03T10:00:00Z",
             "created_at": "2024-01-01T10:00:00Z"},
        ])
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    // ── current ───────────────────────────────────────────────────────────

    #[test]
    fn test_current_before_first_refresh() {
        let orch = SnapshotOrchestrator::default();
        assert_eq!(orch.current().unwrap_err(), NotYetAvailable);
        assert_eq!(orch.state(), RefreshState::Idle);
    }

    #[test]
    fn test_refresh_publishes_snapshot() {
        let orch = SnapshotOrchestrator::default();
        let published = orch.refresh(&batch()).unwrap();
        let current = orch.current().unwrap();
        assert!(Arc::ptr_eq(&published, &current));
        assert_eq!(current.summary.total_events, 3);
        assert_eq!(orch.state(), RefreshState::Idle);
    }

    #[test]
    fn test_empty_refresh_succeeds() {
        let orch = SnapshotOrchestrator::default();
        let snapshot = orch.refresh(&json!([])).unwrap();
        assert_eq!(snapshot.summary.total_events, 0);
        assert_eq!(snapshot.summary.completion_rate, 0.0);
        assert!(snapshot.internal_notes_analysis.is_empty());
    }

    // ── failure handling ──────────────────────────────────────────────────

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let orch = SnapshotOrchestrator::default();
        let first = orch.refresh(&batch()).unwrap();

        let err = orch.refresh(&json!("not a batch")).unwrap_err();
        assert!(matches!(err, RefreshError::InvalidBatch(_)));

        let current = orch.current().unwrap();
        assert!(Arc::ptr_eq(&first, &current));
        assert_eq!(orch.state(), RefreshState::Idle);
    }

    #[test]
    fn test_failed_first_refresh_leaves_nothing_published() {
        let orch = SnapshotOrchestrator::default();
        assert!(orch.refresh(&json!(42)).is_err());
        assert!(orch.current().is_err());
    }

    #[test]
    fn test_refresh_while_busy_is_rejected() {
        let orch = SnapshotOrchestrator::default();
        let guard = RefreshGuard::acquire(&orch.refreshing).unwrap();
        assert_eq!(orch.state(), RefreshState::Refreshing);

        let err = orch.refresh(&batch()).unwrap_err();
        assert!(matches!(err, RefreshError::Busy));
        assert!(orch.current().is_err());

        drop(guard);
        assert_eq!(orch.state(), RefreshState::Idle);
        assert!(orch.refresh(&batch()).is_ok());
    }

    // ── determinism ───────────────────────────────────────────────────────

    #[test]
    fn test_same_batch_same_timestamp_same_snapshot() {
        let orch = SnapshotOrchestrator::default();
        let when = at("2024-03-01T00:00:00Z");
        let first = orch.refresh_at(&batch(), when).unwrap();
        let second = orch.refresh_at(&batch(), when).unwrap();
        assert_eq!(
            serde_json::to_string(&*first).unwrap(),
            serde_json::to_string(&*second).unwrap()
        );
        assert_eq!(second.generated_at, when);
    }

    // ── concurrency ───────────────────────────────────────────────────────

    #[test]
    fn test_concurrent_reads_during_refreshes() {
        let orch = Arc::new(SnapshotOrchestrator::default());
        orch.refresh(&batch()).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let orch = Arc::clone(&orch);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let snapshot = orch.current().unwrap();
                        assert_eq!(snapshot.summary.total_events, 3);
                        assert!(snapshot.validate().is_empty());
                    }
                })
            })
            .collect();

        for _ in 0..10 {
            orch.refresh(&batch()).unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_overlapping_refreshes_never_both_run() {
        let orch = Arc::new(SnapshotOrchestrator::default());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let orch = Arc::clone(&orch);
                thread::spawn(move || orch.refresh(&batch()))
            })
            .collect();

        let outcomes: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert!(outcomes.iter().any(Result::is_ok));
        assert!(outcomes
            .iter()
            .all(|o| o.is_ok() || matches!(o, Err(RefreshError::Busy))));
        assert_eq!(orch.state(), RefreshState::Idle);
        assert_eq!(orch.current().unwrap().summary.total_events, 3);
    }
}
