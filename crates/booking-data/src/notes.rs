//! Per-internal-note performance metrics.

use std::collections::BTreeMap;

use booking_core::calculations::{rate, summarize, top_hours, FrequencyCounter};
use booking_core::models::EventRecord;
use booking_core::snapshot::{
    HourlyDistribution, InternalNoteAnalysis, PEAK_HOURS_LIMIT, TOP_ANSWERS_LIMIT,
};
use booking_core::time_utils::TimezoneHandler;
use chrono::Timelike;

use crate::aggregator::{converted_count, distinct_invitees, group_by_note, status_distribution};

pub struct InternalNoteAnalyzer;

impl InternalNoteAnalyzer {
    /// One entry per note bucket present in `records`; empty for an empty batch.
    pub fn analyze(
        records: &[EventRecord],
        tz: &TimezoneHandler,
    ) -> BTreeMap<String, InternalNoteAnalysis> {
        group_by_note(records)
            .into_iter()
            .map(|(note, group)| (note.to_string(), Self::analyze_bucket(note, &group, tz)))
            .collect()
    }

    /// Metrics for the records of a single bucket, given in batch order.
    pub fn analyze_bucket(
        note: &str,
        group: &[&EventRecord],
        tz: &TimezoneHandler,
    ) -> InternalNoteAnalysis {
        let total_events = group.len() as u64;

        let mut hourly = HourlyDistribution::default();
        for record in group {
            hourly.record(tz.localize(record.start_time).hour());
        }

        let response_times: Vec<f64> =
            group.iter().filter_map(|r| r.response_time_hours).collect();
        let services: FrequencyCounter =
            group.iter().filter_map(|r| r.service_interest()).collect();
        let channels: FrequencyCounter =
            group.iter().filter_map(|r| r.discovery_channel()).collect();

        InternalNoteAnalysis {
            internal_note: note.to_string(),
            total_events,
            total_invitees: distinct_invitees(group.iter().copied()),
            status_distribution: status_distribution(group.iter().copied()),
            conversion_rate: rate(converted_count(group.iter().copied()), total_events),
            peak_hours: top_hours(&hourly, PEAK_HOURS_LIMIT),
            response_time_stats: summarize(&response_times),
            popular_services: services.top(TOP_ANSWERS_LIMIT),
            discovery_channels: channels.top(TOP_ANSWERS_LIMIT),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
