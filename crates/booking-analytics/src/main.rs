mod bootstrap;
mod report;

use std::sync::Arc;

use anyhow::{Context, Result};
use booking_core::settings::Settings;
use booking_core::snapshot::AnalyticsSnapshot;
use booking_data::analysis::AnalysisOptions;
use booking_runtime::data_manager::{DataManager, FileSource};
use booking_runtime::orchestrator::SnapshotOrchestrator;
use booking_runtime::scheduler::RefreshScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used().unwrap_or_else(|e| e.exit());

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    let data_path = settings.effective_data_path();
    tracing::info!("Booking Analytics v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Data: {}, Timezone: {}, Output: {}",
        data_path.display(),
        settings.timezone,
        settings.output
    );

    let orchestrator = Arc::new(SnapshotOrchestrator::new(AnalysisOptions::with_timezone(
        &settings.timezone,
    )));
    let mut manager = DataManager::new(FileSource::new(data_path), orchestrator, settings.cache_ttl);

    if !settings.watch {
        let snapshot = manager
            .get_or_refresh()
            .context("failed to build analytics snapshot")?;
        return print_snapshot(&snapshot, &settings.output);
    }

    tracing::info!(
        "Watching for changes every {}s, cache TTL {}s (Ctrl+C to stop)",
        settings.refresh_interval,
        settings.cache_ttl
    );
    let (mut rx, handle) = RefreshScheduler::new(manager, settings.refresh_interval).start();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut last_printed: Option<Arc<AnalyticsSnapshot>> = None;

    loop {
        tokio::select! {
            outcome = rx.recv() => match outcome {
                // Ticks inside the cache TTL hand back the snapshot already shown.
                Some(Ok(snapshot)) if last_printed.as_ref().is_some_and(|p| Arc::ptr_eq(p, &snapshot)) => {}
                Some(Ok(snapshot)) => {
                    print_snapshot(&snapshot, &settings.output)?;
                    last_printed = Some(snapshot);
                }
                // Already logged by the scheduler; the previous output stays valid.
                Some(Err(_)) => {}
                None => break,
            },
            _ = &mut shutdown => {
                tracing::info!("Ctrl+C received; stopping refresh loop");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

fn print_snapshot(snapshot: &AnalyticsSnapshot, output: &str) -> Result<()> {
    let rendered = match output {
        "json" => serde_json::to_string(snapshot)?,
        "summary" => report::render_summary(snapshot),
        _ => serde_json::to_string_pretty(snapshot)?,
    };
    println!("{rendered}");
    Ok(())
}
