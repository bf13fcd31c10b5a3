//! Batch-level counting and the summary section.
//!
//! The grouping helpers here are shared with the other analyzers so every
//! distribution in a snapshot is counted the same way.

use std::collections::{BTreeMap, HashSet};

use booking_core::calculations::rate;
use booking_core::models::{EventRecord, EventStatus};
use booking_core::snapshot::{DateRange, SummaryMetrics};
use booking_core::time_utils::TimezoneHandler;

use crate::normalizer::NormalizedBatch;

// ── Grouping helpers ──────────────────────────────────────────────────────────

/// Count records per period key.
///
/// `key_fn` maps a record to its period key, e.g. `"2024-01"`. Keys come
/// back sorted, and only periods with at least one record are present.
pub fn count_by_period<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
    key_fn: impl Fn(&EventRecord) -> String,
) -> BTreeMap<String, u64> {
    let mut map: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        *map.entry(key_fn(record)).or_default() += 1;
    }
    map
}

/// Status → count over `records`. Only observed statuses appear.
pub fn status_distribution<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
) -> BTreeMap<EventStatus, u64> {
    let mut map = BTreeMap::new();
    for record in records {
        *map.entry(record.status).or_default() += 1;
    }
    map
}

/// Note bucket → count, with blank notes folded into `Uncategorized`.
pub fn note_distribution<'a>(
    records: impl IntoIterator<Item = &'a EventRecord>,
) -> BTreeMap<String, u64> {
    count_by_period(records, |r| r.note_bucket().to_string())
}

/// Split `records` by note bucket, keeping input order inside each bucket.
pub fn group_by_note(records: &[EventRecord]) -> BTreeMap<&str, Vec<&EventRecord>> {
    let mut groups: BTreeMap<&str, Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        groups.entry(record.note_bucket()).or_default().push(record);
    }
    groups
}

/// Number of distinct non-empty invitee e-mails.
pub fn distinct_invitees<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> u64 {
    records
        .into_iter()
        .filter_map(|r| r.invitee_email.as_deref())
        .filter(|email| !email.is_empty())
        .collect::<HashSet<_>>()
        .len() as u64
}

/// Number of records counted as converted.
pub fn converted_count<'a>(records: impl IntoIterator<Item = &'a EventRecord>) -> u64 {
    records
        .into_iter()
        .filter(|r| r.status.is_converted())
        .count() as u64
}

// ── SummaryAggregator ─────────────────────────────────────────────────────────

/// Stateless builder for the `summary` section.
pub struct SummaryAggregator;

impl SummaryAggregator {
    pub fn aggregate(batch: &NormalizedBatch, tz: &TimezoneHandler) -> SummaryMetrics {
        let records = &batch.records;
        let total_events = records.len() as u64;

        SummaryMetrics {
            total_events,
            total_invitees: distinct_invitees(records),
            dropped_count: batch.dropped_count,
            status_distribution: status_distribution(records),
            internal_note_distribution: note_distribution(records),
            completion_rate: rate(converted_count(records), total_events),
            avg_events_per_day: Self::avg_events_per_day(records, tz),
            date_range: Self::date_range(records),
        }
    }

    /// Events divided by the local calendar days between the first and last
    /// start date (at least one day). Quiet days inside the span count.
    pub fn avg_events_per_day(records: &[EventRecord], tz: &TimezoneHandler) -> f64 {
        let dates = records.iter().map(|r| tz.local_date(r.start_time));
        let (Some(first), Some(last)) = (dates.clone().min(), dates.max()) else {
            return 0.0;
        };
        records.len() as f64 / (last - first).num_days().max(1) as f64
    }

    /// Earliest and latest start time, and the whole days between them.
    pub fn date_range(records: &[EventRecord]) -> DateRange {
        let start = records.iter().map(|r| r.start_time).min();
        let end = records.iter().map(|r| r.start_time).max();
        let days_span = match (start, end) {
            (Some(s), Some(e)) => (e - s).num_days().max(0) as u64,
            _ => 0,
        };
        DateRange {
            start,
            end,
            days_span,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
