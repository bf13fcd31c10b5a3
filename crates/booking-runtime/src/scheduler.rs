//! Periodic refresh loop.
//!
//! Calls [`DataManager::get_or_refresh`] on a fixed interval and forwards
//! every outcome through an `mpsc` channel, so a consumer (the CLI watch loop)
//! can print results without sharing mutable state. File reads and analysis
//! run on tokio's blocking pool.

use std::sync::Arc;
use std::time::Duration;

use booking_core::error::RefreshError;
use booking_core::snapshot::AnalyticsSnapshot;
use tokio::sync::mpsc;
use tokio::{task, time};

use crate::data_manager::{DataManager, DataSource};

/// Result of one scheduled refresh.
pub type RefreshOutcome = Result<Arc<AnalyticsSnapshot>, RefreshError>;

// ── RefreshScheduler ──────────────────────────────────────────────────────────

pub struct RefreshScheduler<S> {
    manager: DataManager<S>,
    interval: Duration,
}

impl<S> RefreshScheduler<S>
where
    S: DataSource + Send + 'static,
{
    pub fn new(manager: DataManager<S>, interval_secs: u64) -> Self {
        Self {
            manager,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Like [`new`](Self::new) with a sub-second interval.
    pub fn with_interval(manager: DataManager<S>, interval: Duration) -> Self {
        Self { manager, interval }
    }

    /// Spawn the refresh loop.
    ///
    /// The first refresh runs immediately; later ones follow the interval.
    /// The loop exits once the receiver is dropped.
    pub fn start(self) -> (mpsc::Receiver<RefreshOutcome>, SchedulerHandle) {
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.refresh_loop(tx).await;
        });

        (rx, SchedulerHandle { handle })
    }

    async fn refresh_loop(self, tx: mpsc::Sender<RefreshOutcome>) {
        let Self {
            mut manager,
            interval: period,
        } = self;
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately.
            interval.tick().await;

            if tx.is_closed() {
                tracing::debug!("refresh channel closed; exiting loop");
                break;
            }

            // The manager moves onto the blocking pool and back each tick.
            let joined = task::spawn_blocking(move || {
                let outcome = manager.get_or_refresh();
                (manager, outcome)
            })
            .await;
            let outcome = match joined {
                Ok((returned, outcome)) => {
                    manager = returned;
                    outcome
                }
                Err(e) => {
                    tracing::error!(error = %e, "refresh task failed; stopping loop");
                    break;
                }
            };

            if let Err(e) = &outcome {
                tracing::warn!(error = %e, "scheduled refresh failed");
            }

            if tx.send(outcome).await.is_err() {
                tracing::debug!("refresh receiver dropped; exiting loop");
                break;
            }
        }
    }
}

// ── SchedulerHandle ───────────────────────────────────────────────────────────

/// Handle to the background refresh task.
pub struct SchedulerHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_manager::{FileSource, StaticSource};
    use crate::orchestrator::SnapshotOrchestrator;
    use serde_json::json;

    fn static_manager(batch: serde_json::Value) -> DataManager<StaticSource> {
        static_manager_with_ttl(batch, 30)
    }

    fn static_manager_with_ttl(
        batch: serde_json::Value,
        ttl_secs: u64,
    ) -> DataManager<StaticSource> {
        DataManager::new(
            StaticSource::new(batch),
            Arc::new(SnapshotOrchestrator::default()),
            ttl_secs,
        )
        .with_backoff_step(Duration::ZERO)
    }

    async fn next(rx: &mut mpsc::Receiver<RefreshOutcome>) -> RefreshOutcome {
        time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for refresh outcome")
            .expect("channel closed before an outcome arrived")
    }

    #[tokio::test]
    async fn test_initial_refresh_is_sent_immediately() {
        let manager = static_manager(json!([]));
        let orchestrator = Arc::clone(manager.orchestrator());
        let (mut rx, handle) = RefreshScheduler::new(manager, 60).start();

        let snapshot = next(&mut rx).await.unwrap();
        assert_eq!(snapshot.summary.total_events, 0);
        assert!(Arc::ptr_eq(&snapshot, &orchestrator.current().unwrap()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_refreshes_repeat_on_interval() {
        let manager = static_manager(json!([]));
        let (mut rx, handle) =
            RefreshScheduler::with_interval(manager, Duration::from_millis(10)).start();

        for _ in 0..3 {
            assert!(next(&mut rx).await.is_ok());
        }
        handle.abort();
    }

    #[tokio::test]
    async fn test_ticks_within_ttl_reuse_snapshot() {
        let manager = static_manager_with_ttl(json!([]), 60);
        let (mut rx, handle) =
            RefreshScheduler::with_interval(manager, Duration::from_millis(10)).start();

        let first = next(&mut rx).await.unwrap();
        let second = next(&mut rx).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        handle.abort();
    }

    #[tokio::test]
    async fn test_ticks_after_ttl_publish_new_snapshot() {
        let manager = static_manager_with_ttl(json!([]), 0);
        let (mut rx, handle) =
            RefreshScheduler::with_interval(manager, Duration::from_millis(10)).start();

        let first = next(&mut rx).await.unwrap();
        let second = next(&mut rx).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        handle.abort();
    }

    #[tokio::test]
    async fn test_failures_are_forwarded() {
        let manager = DataManager::new(
            FileSource::new("/tmp/booking-analytics-scheduler-missing-xyz"),
            Arc::new(SnapshotOrchestrator::default()),
            30,
        )
        .with_backoff_step(Duration::ZERO);
        let (mut rx, handle) = RefreshScheduler::new(manager, 60).start();

        let err = next(&mut rx).await.unwrap_err();
        assert!(matches!(err, RefreshError::Source(_)));
        handle.abort();
    }

    #[tokio::test]
    async fn test_loop_exits_when_receiver_dropped() {
        let manager = static_manager(json!([]));
        let (rx, handle) =
            RefreshScheduler::with_interval(manager, Duration::from_millis(5)).start();
        drop(rx);

        time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("scheduler did not stop after receiver was dropped");
    }
}
