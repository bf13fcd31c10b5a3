//! Numeric helpers shared by the analyzers.
//!
//! Every helper here is total: empty inputs produce zeros or `None`, never a
//! division by zero.

use std::collections::{BTreeMap, HashMap};

use crate::snapshot::{HourlyDistribution, RankedAnswer, ResponseTimeStats};

// ── Rates ─────────────────────────────────────────────────────────────────────

/// `100 * part / whole`, or `0.0` when `whole` is zero.
///
/// # Examples
///
/// ```
/// use booking_core::calculations::rate;
///
/// assert_eq!(rate(3, 4), 75.0);
/// assert_eq!(rate(0, 0), 0.0);
/// ```
pub fn rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64) * 100.0
}

/// Percentage change from `first` to `last`, with `first` floored at 1.
pub fn growth_rate(first: u64, last: u64) -> f64 {
    (last as f64 - first as f64) / first.max(1) as f64 * 100.0
}

// ── Percentile & sample statistics ────────────────────────────────────────────

/// Compute the `p`-th percentile of a **sorted** slice using linear
/// interpolation between closest ranks.
///
/// Returns `0.0` for an empty slice.
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    let len = sorted_data.len();
    if len == 1 {
        return sorted_data[0];
    }
    let rank = (p / 100.0) * (len as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted_data[lo];
    }
    let frac = rank - lo as f64;
    sorted_data[lo] + frac * (sorted_data[hi] - sorted_data[lo])
}

/// Mean, median, min and max over `samples`.
///
/// All fields are `None` for an empty slice; absence is never read as zero.
pub fn summarize(samples: &[f64]) -> ResponseTimeStats {
    if samples.is_empty() {
        return ResponseTimeStats::default();
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;
    ResponseTimeStats {
        mean: Some(mean),
        median: Some(percentile(&sorted, 50.0)),
        min: sorted.first().copied(),
        max: sorted.last().copied(),
    }
}

/// Population mean and standard deviation (`ddof = 0`) of `values` followed
/// by `zeros` implicit zero entries.
///
/// The zeros are never materialised, so a long sparse series costs only as
/// much as its non-zero entries. Returns `None` for an empty series.
///
/// ```
/// use booking_core::calculations::mean_std_with_zeros;
///
/// assert_eq!(mean_std_with_zeros(&[2.0], 1), Some((1.0, 1.0)));
/// assert_eq!(mean_std_with_zeros(&[], 0), None);
/// ```
pub fn mean_std_with_zeros(values: &[f64], zeros: u64) -> Option<(f64, f64)> {
    let n = values.len() as f64 + zeros as f64;
    if n == 0.0 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n;
    let squared: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        + zeros as f64 * mean.powi(2);
    Some((mean, (squared / n).sqrt()))
}

// ── Ranking ───────────────────────────────────────────────────────────────────

/// Top `limit` hours by count. Ties go to the earlier hour; empty hours are
/// never reported.
pub fn top_hours(hourly: &HourlyDistribution, limit: usize) -> Vec<u32> {
    let mut hours: Vec<(u32, u64)> = hourly
        .counts()
        .iter()
        .enumerate()
        .filter(|(_, count)| **count > 0)
        .map(|(hour, &count)| (hour as u32, count))
        .collect();
    hours.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    hours.into_iter().take(limit).map(|(hour, _)| hour).collect()
}

/// Counts string values while remembering the order they were first seen.
///
/// Ranking is by count, descending; equal counts keep first-seen order.
#[derive(Debug, Clone, Default)]
pub struct FrequencyCounter {
    entries: Vec<(String, u64)>,
    positions: HashMap<String, usize>,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: &str) {
        match self.positions.get(value) {
            Some(&idx) => self.entries[idx].1 += 1,
            None => {
                self.positions.insert(value.to_string(), self.entries.len());
                self.entries.push((value.to_string(), 1));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// The `limit` most frequent values.
    pub fn top(&self, limit: usize) -> Vec<RankedAnswer> {
        let mut ranked: Vec<&(String, u64)> = self.entries.iter().collect();
        // `sort_by` is stable, so ties stay in first-seen order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(limit)
            .map(|(value, count)| RankedAnswer {
                value: value.clone(),
                count: *count,
            })
            .collect()
    }

    /// Full value → count mapping.
    pub fn distribution(&self) -> BTreeMap<String, u64> {
        self.entries.iter().cloned().collect()
    }
}

impl<'a> FromIterator<&'a str> for FrequencyCounter {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut counter = Self::new();
        for value in iter {
            counter.add(value);
        }
        counter
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
