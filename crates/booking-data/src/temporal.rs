//! Hour / weekday / month distributions over event start times.

use std::collections::BTreeMap;

use booking_core::calculations::{growth_rate, mean_std_with_zeros};
use booking_core::models::EventRecord;
use booking_core::snapshot::{
    DailyDistribution, HourlyDistribution, SeasonalTrend, TemporalAnalysis, TrendDirection,
    WeekdayWeekend,
};
use booking_core::time_utils::TimezoneHandler;
use chrono::{Datelike, NaiveDate, Timelike, Weekday};

use crate::aggregator::count_by_period;

/// Absolute z-score above which a day counts as high activity.
const OUTLIER_Z: f64 = 2.0;

/// Minimum length of the daily series before outliers are looked for.
const MIN_OUTLIER_DAYS: u64 = 3;

pub struct TemporalAnalyzer;

impl TemporalAnalyzer {
    /// Bucket every record by the local hour, weekday and month of its start.
    pub fn analyze(records: &[EventRecord], tz: &TimezoneHandler) -> TemporalAnalysis {
        let mut hourly = HourlyDistribution::default();
        let mut daily = DailyDistribution::default();
        let mut weekday_vs_weekend = WeekdayWeekend::default();

        for record in records {
            let local = tz.localize(record.start_time);
            hourly.record(local.hour());
            daily.record(local.weekday());
            if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
                weekday_vs_weekend.weekend += 1;
            } else {
                weekday_vs_weekend.weekday += 1;
            }
        }

        let monthly_distribution = count_by_period(records, |r| {
            tz.localize(r.start_time).format("%Y-%m").to_string()
        });

        TemporalAnalysis {
            hourly_distribution: hourly,
            daily_distribution: daily,
            seasonal_trend: Self::seasonal_trend(&monthly_distribution),
            monthly_distribution,
            weekday_vs_weekend,
            high_activity_days: Self::high_activity_days(records, tz),
        }
    }

    /// Compare the first and last non-empty month.
    pub fn seasonal_trend(monthly: &BTreeMap<String, u64>) -> SeasonalTrend {
        if monthly.len() < 2 {
            return SeasonalTrend::default();
        }
        let (Some(&first), Some(&last)) = (monthly.values().next(), monthly.values().next_back())
        else {
            return SeasonalTrend::default();
        };

        let trend = match last.cmp(&first) {
            std::cmp::Ordering::Greater => TrendDirection::Increasing,
            std::cmp::Ordering::Less => TrendDirection::Declining,
            std::cmp::Ordering::Equal => TrendDirection::Stable,
        };
        SeasonalTrend {
            trend,
            growth_rate: growth_rate(first, last),
        }
    }

    /// Days whose volume is an outlier in the zero-filled daily series that
    /// runs from the first to the last event day.
    ///
    /// Empty days take part in the statistics without being materialised.
    pub fn high_activity_days(
        records: &[EventRecord],
        tz: &TimezoneHandler,
    ) -> BTreeMap<String, u64> {
        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for record in records {
            *per_day.entry(tz.local_date(record.start_time)).or_default() += 1;
        }

        let (Some(&first), Some(&last)) = (per_day.keys().next(), per_day.keys().next_back())
        else {
            return BTreeMap::new();
        };

        let span_days = (last - first).num_days().max(0) as u64 + 1;
        if span_days < MIN_OUTLIER_DAYS {
            return BTreeMap::new();
        }
        let empty_days = span_days - per_day.len() as u64;

        let counts: Vec<f64> = per_day.values().map(|count| *count as f64).collect();
        let Some((mean, std_dev)) = mean_std_with_zeros(&counts, empty_days) else {
            return BTreeMap::new();
        };
        if std_dev == 0.0 {
            return BTreeMap::new();
        }
        let is_outlier = |count: u64| ((count as f64 - mean) / std_dev).abs() > OUTLIER_Z;

        let mut outliers: BTreeMap<String, u64> = per_day
            .iter()
            .filter(|(_, count)| is_outlier(**count))
            .map(|(day, count)| (day.format("%Y-%m-%d").to_string(), *count))
            .collect();

        // Fewer than a quarter of the days can sit beyond two standard
        // deviations, so this walk is bounded by the number of event days.
        if empty_days > 0 && is_outlier(0) {
            for day in first.iter_days().take_while(|day| *day <= last) {
                if !per_day.contains_key(&day) {
                    outliers.insert(day.format("%Y-%m-%d").to_string(), 0);
                }
            }
        }
        outliers
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
