//! The immutable analytics snapshot and its nested sections.
//!
//! Field names and nesting are the wire contract with presentation layers;
//! every section is always present, and optional values serialise as `null`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc, Weekday};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::models::EventStatus;

/// Maximum entries in the per-note `popular_services` / `discovery_channels`
/// lists and in the question-level top lists.
pub const TOP_ANSWERS_LIMIT: usize = 5;

/// Number of hours reported in `peak_hours`.
pub const PEAK_HOURS_LIMIT: usize = 3;

/// Maximum entries in `conversion_by_service` / `conversion_by_channel`.
pub const TOP_CONVERTED_LIMIT: usize = 10;

/// Day labels in reporting order.
pub const DAY_LABELS: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

// ── Snapshot ──────────────────────────────────────────────────────────────────

/// Complete output of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub generated_at: DateTime<Utc>,
    pub summary: SummaryMetrics,
    pub internal_notes_analysis: BTreeMap<String, InternalNoteAnalysis>,
    pub temporal_analysis: TemporalAnalysis,
    pub conversion_analysis: ConversionAnalysis,
    pub question_analysis: QuestionAnalysis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_events: u64,
    /// Distinct invitee e-mail addresses in the batch.
    pub total_invitees: u64,
    /// Raw records rejected by the normaliser.
    pub dropped_count: u64,
    pub status_distribution: BTreeMap<EventStatus, u64>,
    pub internal_note_distribution: BTreeMap<String, u64>,
    pub completion_rate: f64,
    pub avg_events_per_day: f64,
    pub date_range: DateRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub days_span: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InternalNoteAnalysis {
    pub internal_note: String,
    pub total_events: u64,
    pub total_invitees: u64,
    pub status_distribution: BTreeMap<EventStatus, u64>,
    pub conversion_rate: f64,
    pub peak_hours: Vec<u32>,
    pub response_time_stats: ResponseTimeStats,
    pub popular_services: Vec<RankedAnswer>,
    pub discovery_channels: Vec<RankedAnswer>,
}

/// Summary statistics in hours. All fields are `None` when the scope had
/// no samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResponseTimeStats {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// An answer value together with how often it occurred in its scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedAnswer {
    pub value: String,
    pub count: u64,
}

// ── Temporal ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemporalAnalysis {
    pub hourly_distribution: HourlyDistribution,
    pub daily_distribution: DailyDistribution,
    /// `YYYY-MM` → count, only non-empty months.
    pub monthly_distribution: BTreeMap<String, u64>,
    pub weekday_vs_weekend: WeekdayWeekend,
    pub seasonal_trend: SeasonalTrend,
    /// `YYYY-MM-DD` → count for days whose volume is a statistical outlier.
    pub high_activity_days: BTreeMap<String, u64>,
}

/// Event counts for each hour of the day, always 24 buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HourlyDistribution([u64; 24]);

impl HourlyDistribution {
    pub fn record(&mut self, hour: u32) {
        if let Some(slot) = self.0.get_mut(hour as usize) {
            *slot += 1;
        }
    }

    pub fn get(&self, hour: u32) -> u64 {
        self.0.get(hour as usize).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn counts(&self) -> &[u64; 24] {
        &self.0
    }
}

impl Serialize for HourlyDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (hour, count) in self.0.iter().enumerate() {
            map.serialize_entry(&hour.to_string(), count)?;
        }
        map.end()
    }
}

/// Event counts per day of week, always seven buckets Monday first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyDistribution([u64; 7]);

impl DailyDistribution {
    pub fn record(&mut self, day: Weekday) {
        self.0[day.num_days_from_monday() as usize] += 1;
    }

    pub fn get(&self, day: Weekday) -> u64 {
        self.0[day.num_days_from_monday() as usize]
    }

    /// Count for a label such as `"Monday"`.
    pub fn get_label(&self, label: &str) -> Option<u64> {
        DAY_LABELS
            .iter()
            .position(|l| *l == label)
            .map(|idx| self.0[idx])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

impl Serialize for DailyDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, count) in DAY_LABELS.iter().zip(self.0.iter()) {
            map.serialize_entry(label, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WeekdayWeekend {
    pub weekday: u64,
    pub weekend: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    InsufficientData,
    Increasing,
    Declining,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeasonalTrend {
    pub trend: TrendDirection,
    /// Percentage change from the first to the last non-empty month.
    pub growth_rate: f64,
}

impl Default for SeasonalTrend {
    fn default() -> Self {
        Self {
            trend: TrendDirection::InsufficientData,
            growth_rate: 0.0,
        }
    }
}

// ── Conversion ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionAnalysis {
    pub overall_conversion_rate: f64,
    pub conversion_by_internal_note: BTreeMap<String, f64>,
    /// Most frequent service answers among completed events.
    pub conversion_by_service: Vec<RankedAnswer>,
    /// Most frequent discovery channels among completed events.
    pub conversion_by_channel: Vec<RankedAnswer>,
}

// ── Questions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuestionAnalysis {
    pub service_interests: ServiceInterests,
    pub discovery_channels: DiscoveryChannels,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceInterests {
    pub distribution: BTreeMap<String, u64>,
    pub top_services: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryChannels {
    pub distribution: BTreeMap<String, u64>,
    pub top_channels: Vec<String>,
}

// ── Validation ────────────────────────────────────────────────────────────────

fn rate_in_range(rate: f64) -> bool {
    (0.0..=100.0).contains(&rate)
}

fn check_ranked(errors: &mut Vec<String>, scope: &str, list: &[RankedAnswer]) {
    if list.len() > TOP_ANSWERS_LIMIT {
        errors.push(format!(
            "{scope}: {} entries exceeds limit {TOP_ANSWERS_LIMIT}",
            list.len()
        ));
    }
    if list.iter().any(|a| a.count == 0) {
        errors.push(format!("{scope}: contains a zero-count answer"));
    }
}

impl AnalyticsSnapshot {
    /// Check the cross-section invariants of a freshly built snapshot.
    ///
    /// Returns the list of violations; an empty list means the snapshot is
    /// safe to publish.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let summary = &self.summary;
        let total = summary.total_events;

        let status_sum: u64 = summary.status_distribution.values().sum();
        if status_sum != total {
            errors.push(format!(
                "status_distribution sums to {status_sum}, expected {total}"
            ));
        }
        let note_sum: u64 = summary.internal_note_distribution.values().sum();
        if note_sum != total {
            errors.push(format!(
                "internal_note_distribution sums to {note_sum}, expected {total}"
            ));
        }

        let temporal = &self.temporal_analysis;
        if temporal.hourly_distribution.total() != total {
            errors.push("hourly_distribution does not cover every event".to_string());
        }
        if temporal.daily_distribution.total() != total {
            errors.push("daily_distribution does not cover every event".to_string());
        }

        if !rate_in_range(summary.completion_rate) {
            errors.push(format!(
                "completion_rate {} out of range",
                summary.completion_rate
            ));
        }
        let conversion = &self.conversion_analysis;
        if !rate_in_range(conversion.overall_conversion_rate) {
            errors.push(format!(
                "overall_conversion_rate {} out of range",
                conversion.overall_conversion_rate
            ));
        }
        for (note, rate) in &conversion.conversion_by_internal_note {
            if !rate_in_range(*rate) {
                errors.push(format!("conversion rate for '{note}' out of range"));
            }
        }

        if !conversion
            .conversion_by_internal_note
            .keys()
            .eq(summary.internal_note_distribution.keys())
        {
            errors.push(
                "conversion_by_internal_note keys differ from note distribution".to_string(),
            );
        }
        if !self
            .internal_notes_analysis
            .keys()
            .eq(summary.internal_note_distribution.keys())
        {
            errors.push(
                "internal_notes_analysis keys differ from note distribution".to_string(),
            );
        }

        for (note, analysis) in &self.internal_notes_analysis {
            let expected = summary.internal_note_distribution.get(note).copied();
            if expected != Some(analysis.total_events) {
                errors.push(format!(
                    "'{note}': total_events {} does not match distribution",
                    analysis.total_events
                ));
            }
            if !rate_in_range(analysis.conversion_rate) {
                errors.push(format!("'{note}': conversion_rate out of range"));
            }
            if analysis.peak_hours.len() > PEAK_HOURS_LIMIT {
                errors.push(format!("'{note}': too many peak hours"));
            }
            check_ranked(
                &mut errors,
                &format!("'{note}' popular_services"),
                &analysis.popular_services,
            );
            check_ranked(
                &mut errors,
                &format!("'{note}' discovery_channels"),
                &analysis.discovery_channels,
            );
        }

        errors
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
