//! Snapshot assembly pipeline.
//!
//! Normalises a raw batch, runs the five analyzers over the same canonical
//! records, and checks the assembled [`AnalyticsSnapshot`] before handing it
//! back.

use std::path::Path;

use booking_core::error::RefreshError;
use booking_core::snapshot::AnalyticsSnapshot;
use booking_core::time_utils::TimezoneHandler;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::aggregator::SummaryAggregator;
use crate::conversion::ConversionAnalyzer;
use crate::normalizer::{normalize_batch, NormalizedBatch};
use crate::notes::InternalNoteAnalyzer;
use crate::questions::QuestionAnalyzer;
use crate::reader::load_raw_batch;
use crate::temporal::TemporalAnalyzer;

// ── Public types ──────────────────────────────────────────────────────────────

/// Immutable inputs shared by every analyzer in one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisOptions {
    /// Zone used for hour, weekday, month and calendar-day buckets.
    pub timezone: TimezoneHandler,
}

impl AnalysisOptions {
    /// Options for the named IANA zone (`"auto"` for the system zone).
    pub fn with_timezone(name: &str) -> Self {
        Self {
            timezone: TimezoneHandler::new(name),
        }
    }
}

// ── Public functions ──────────────────────────────────────────────────────────

/// Run every analyzer over an already normalised batch.
///
/// Pure: the same batch, options and `generated_at` always give the same
/// snapshot.
pub fn build_snapshot(
    batch: &NormalizedBatch,
    options: &AnalysisOptions,
    generated_at: DateTime<Utc>,
) -> AnalyticsSnapshot {
    let tz = &options.timezone;
    let records = &batch.records;

    AnalyticsSnapshot {
        generated_at,
        summary: SummaryAggregator::aggregate(batch, tz),
        internal_notes_analysis: InternalNoteAnalyzer::analyze(records, tz),
        temporal_analysis: TemporalAnalyzer::analyze(records, tz),
        conversion_analysis: ConversionAnalyzer::analyze(records),
        question_analysis: QuestionAnalyzer::analyze(records),
    }
}

/// Normalise `raw`, build the snapshot and verify its invariants.
///
/// Nothing partial is ever returned: the caller gets a complete, consistent
/// snapshot or an error.
pub fn analyze_batch(
    raw: &Value,
    options: &AnalysisOptions,
    generated_at: DateTime<Utc>,
) -> Result<AnalyticsSnapshot, RefreshError> {
    let started = std::time::Instant::now();
    let batch = normalize_batch(raw)?;
    let snapshot = build_snapshot(&batch, options, generated_at);

    let violations = snapshot.validate();
    if !violations.is_empty() {
        return Err(RefreshError::Inconsistent(violations));
    }

    debug!(
        "Analysed {} records ({} dropped) in {:.3}s",
        batch.len(),
        batch.dropped_count,
        started.elapsed().as_secs_f64()
    );
    Ok(snapshot)
}

/// Load the data files under `data_path` and analyse them as one batch.
pub fn analyze_path(
    data_path: &Path,
    options: &AnalysisOptions,
    generated_at: DateTime<Utc>,
) -> Result<AnalyticsSnapshot, RefreshError> {
    let raw = load_raw_batch(data_path)?;
    analyze_batch(&raw, options, generated_at)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ts;
    use booking_core::models::EventStatus;
    use serde_json::json;
    use std::io::Write;
    use tempfile::TempDir;

    fn raw_event(id: &str, status: &str, start: &str, note: Option<&str>) -> Value {
        let mut value = json!({
            "id": id,
            "status": status,
            "created_at": "2024-01-01T08:00:00Z",
            "start_time": start,
        });
        if let Some(n) = note {
            value["internal_note"] = json!(n);
        }
        value
    }

    fn four_record_batch() -> Value {
        json!([
            raw_event("1", "completed", "2024-01-02T10:00:00Z", Some("Sales")),
            raw_event("2", "canceled", "2024-01-02T11:00:00Z", Some("Sales")),
            raw_event("3", "completed", "2024-01-03T10:00:00Z", None),
            raw_event("4", "completed", "2024-01-03T14:00:00Z", Some("")),
        ])
    }

    fn now() -> DateTime<Utc> {
        ts("2024-02-01T00:00:00Z")
    }

    // ── analyze_batch ─────────────────────────────────────────────────────────

    #[test]
    fn test_four_record_scenario() {
        let snapshot =
            analyze_batch(&four_record_batch(), &AnalysisOptions::default(), now()).unwrap();

        let notes = &snapshot.summary.internal_note_distribution;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes["Sales"], 2);
        assert_eq!(notes["Uncategorized"], 2);

        let conversion = &snapshot.conversion_analysis;
        assert_eq!(conversion.conversion_by_internal_note["Sales"], 50.0);
        assert_eq!(conversion.conversion_by_internal_note["Uncategorized"], 100.0);
        assert_eq!(conversion.overall_conversion_rate, 75.0);
        assert_eq!(snapshot.summary.completion_rate, 75.0);

        for (note, analysis) in &snapshot.internal_notes_analysis {
            assert_eq!(analysis.total_events, notes[note]);
        }
    }

    #[test]
    fn test_empty_batch_gives_zero_filled_snapshot() {
        let snapshot = analyze_batch(&json!([]), &AnalysisOptions::default(), now()).unwrap();

        assert_eq!(snapshot.summary.total_events, 0);
        assert_eq!(snapshot.summary.completion_rate, 0.0);
        assert_eq!(snapshot.summary.avg_events_per_day, 0.0);
        assert!(snapshot.internal_notes_analysis.is_empty());

        let json = serde_json::to_value(&snapshot).unwrap();
        let hourly = json["temporal_analysis"]["hourly_distribution"]
            .as_object()
            .unwrap();
        let daily = json["temporal_analysis"]["daily_distribution"]
            .as_object()
            .unwrap();
        assert_eq!(hourly.len(), 24);
        assert_eq!(daily.len(), 7);
        assert!(hourly.values().all(|v| v == 0));
    }

    #[test]
    fn test_snapshot_top_level_keys() {
        let snapshot =
            analyze_batch(&four_record_batch(), &AnalysisOptions::default(), now()).unwrap();
        let json = serde_json::to_value(&snapshot).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec![
                "conversion_analysis",
                "generated_at",
                "internal_notes_analysis",
                "question_analysis",
                "summary",
                "temporal_analysis",
            ]
        );
    }

    #[test]
    fn test_malformed_records_are_excluded_from_distributions() {
        let raw = json!([
            raw_event("1", "active", "2024-01-02T10:00:00Z", None),
            {"id": "2", "status": "active"},
            "not an object",
        ]);
        let snapshot = analyze_batch(&raw, &AnalysisOptions::default(), now()).unwrap();
        assert_eq!(snapshot.summary.total_events, 1);
        assert_eq!(snapshot.summary.dropped_count, 2);
        assert_eq!(
            snapshot.summary.status_distribution[&EventStatus::Active],
            1
        );
    }

    #[test]
    fn test_millisecond_epochs_land_in_the_right_month() {
        let mut millis = raw_event("1", "active", "2024-01-02T10:00:00Z", None);
        millis["start_time"] = json!(1_704_189_600_000_i64);
        let raw = json!([millis, raw_event("2", "active", "2024-01-03T10:00:00Z", None)]);

        let snapshot = analyze_batch(&raw, &AnalysisOptions::default(), now()).unwrap();
        let months: Vec<&str> = snapshot
            .temporal_analysis
            .monthly_distribution
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(months, vec!["2024-01"]);
        assert_eq!(snapshot.summary.dropped_count, 0);
    }

    #[test]
    fn test_out_of_range_epoch_is_dropped() {
        let mut far = raw_event("1", "active", "2024-01-02T10:00:00Z", None);
        far["start_time"] = json!(50_000_000_000_i64);
        let raw = json!([far, raw_event("2", "active", "2024-01-03T10:00:00Z", None)]);

        let snapshot = analyze_batch(&raw, &AnalysisOptions::default(), now()).unwrap();
        assert_eq!(snapshot.summary.total_events, 1);
        assert_eq!(snapshot.summary.dropped_count, 1);
        assert!(snapshot.temporal_analysis.high_activity_days.is_empty());
    }

    #[test]
    fn test_event_type_notes_are_joined_by_uri() {
        let mut event = raw_event("1", "completed", "2024-01-02T10:00:00Z", None);
        event["event_type"] = json!("https://api/event_types/ET1");
        let raw = json!([
            event,
            {"uri": "https://api/event_types/ET1", "internal_note": "Sales"},
        ]);

        let snapshot = analyze_batch(&raw, &AnalysisOptions::default(), now()).unwrap();
        let notes = &snapshot.summary.internal_note_distribution;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes["Sales"], 1);
        assert_eq!(snapshot.summary.dropped_count, 0);
    }

    #[test]
    fn test_invalid_batch_is_rejected() {
        let err = analyze_batch(&json!({"id": "1"}), &AnalysisOptions::default(), now())
            .unwrap_err();
        assert!(matches!(err, RefreshError::InvalidBatch(_)));
    }

    #[test]
    fn test_identical_batches_give_identical_snapshots() {
        let options = AnalysisOptions::with_timezone("Europe/London");
        let first = analyze_batch(&four_record_batch(), &options, now()).unwrap();
        let second = analyze_batch(&four_record_batch(), &options, now()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_built_snapshot_passes_validation() {
        let batch = normalize_batch(&four_record_batch()).unwrap();
        let snapshot = build_snapshot(&batch, &AnalysisOptions::default(), now());
        assert!(snapshot.validate().is_empty());
    }

    // ── analyze_path ──────────────────────────────────────────────────────────

    #[test]
    fn test_analyze_path_reads_files() {
        let dir = TempDir::new().unwrap();
        let mut file = std::fs::File::create(dir.path().join("events.jsonl")).unwrap();
        for event in four_record_batch().as_array().unwrap() {
            writeln!(file, "{}", event).unwrap();
        }

        let snapshot = analyze_path(dir.path(), &AnalysisOptions::default(), now()).unwrap();
        assert_eq!(snapshot.summary.total_events, 4);
    }

    #[test]
    fn test_analyze_path_missing_directory_is_source_error() {
        let err = analyze_path(
            Path::new("/tmp/does-not-exist-booking-analysis-xyz"),
            &AnalysisOptions::default(),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, RefreshError::Source(_)));
    }
}
