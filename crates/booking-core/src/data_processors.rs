use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::models::{DISCOVERY_CHANNEL, SERVICE_INTEREST};

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Numeric epochs at or above this magnitude are milliseconds.
const MILLIS_THRESHOLD: f64 = 1e11;
/// 1900-01-01T00:00:00Z.
const MIN_EPOCH_SECS: i64 = -2_208_988_800;
/// 2200-01-01T00:00:00Z.
const MAX_EPOCH_SECS: i64 = 7_258_118_400;

/// Parses timestamps from the variety of formats found in booking exports.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to parse a [`serde_json::Value`] into a UTC [`DateTime`].
    ///
    /// Handles:
    /// * `null`       → `None`
    /// * JSON string  → ISO 8601 / RFC 3339 (including `Z`-suffix), RFC 2822,
    ///   or common naive date-time patterns (read as UTC).
    /// * JSON number  → Unix timestamp in seconds, or in milliseconds when
    ///   its magnitude is at least 1e11. Epochs outside 1900..2200 are
    ///   rejected.
    pub fn parse(value: &Value) -> Option<DateTime<Utc>> {
        match value {
            Value::Null => None,
            Value::String(s) => Self::parse_str(s.trim()),
            Value::Number(n) => n.as_f64().and_then(Self::from_epoch),
            _ => None,
        }
    }

    /// Convert a numeric epoch, flooring so the fractional part is never
    /// negative.
    fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
        if !value.is_finite() {
            return None;
        }
        let secs = if value.abs() >= MILLIS_THRESHOLD {
            value / 1000.0
        } else {
            value
        };
        let whole = secs.floor();
        if whole < MIN_EPOCH_SECS as f64 || whole >= MAX_EPOCH_SECS as f64 {
            debug!("TimestampProcessor: epoch {} out of range", value);
            return None;
        }
        let nanos = ((secs - whole) * 1_000_000_000.0).round() as u32;
        DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
    }

    pub fn parse_str(s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }

        // Replace trailing 'Z' with '+00:00' for RFC 3339 compatibility.
        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d",
            "%m/%d/%Y %H:%M:%S",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
            if let Ok(date) = chrono::NaiveDate::parse_from_str(s, fmt) {
                let naive = date.and_hms_opt(0, 0, 0)?;
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        debug!("TimestampProcessor: could not parse timestamp \"{}\"", s);
        None
    }
}

// ── Field lookup ──────────────────────────────────────────────────────────────

/// Resolve a dotted path such as `"cancellation.created_at"` inside `data`.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(data, |current, key| current.get(key))
        .filter(|v| !v.is_null())
}

/// First candidate path that resolves to a non-null value.
pub fn first_present<'a>(data: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|path| lookup(data, path))
}

/// First candidate path that resolves to a non-blank string, trimmed.
pub fn first_str<'a>(data: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(data, path).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

// ── QuestionClassifier ────────────────────────────────────────────────────────

struct QuestionPattern {
    key: &'static str,
    pattern: &'static str,
}

/// Order matters: the first matching pattern wins.
const QUESTION_PATTERNS: &[QuestionPattern] = &[
    QuestionPattern {
        key: SERVICE_INTEREST,
        pattern: r"(?i)(service.*interest|interest.*service)",
    },
    QuestionPattern {
        key: DISCOVERY_CHANNEL,
        pattern: r"(?i)(how did you (find|hear)|find us|hear about us)",
    },
    QuestionPattern {
        key: "website_url",
        pattern: r"(?i)website",
    },
    QuestionPattern {
        key: "phone_number",
        pattern: r"(?i)phone",
    },
    QuestionPattern {
        key: "linkedin_url",
        pattern: r"(?i)linkedin.*profile",
    },
];

fn compiled_patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        QUESTION_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(p.pattern).ok().map(|re| (p.key, re)))
            .collect()
    })
}

/// Maps free-text booking questions onto stable answer keys.
pub struct QuestionClassifier;

impl QuestionClassifier {
    /// Classify a question's text.
    ///
    /// Returns `None` for questions the analytics do not track.
    ///
    /// # Examples
    ///
    /// ```
    /// use booking_core::data_processors::QuestionClassifier;
    ///
    /// assert_eq!(
    ///     QuestionClassifier::classify("Which service are you interested in?"),
    ///     Some("service_interest")
    /// );
    /// assert_eq!(
    ///     QuestionClassifier::classify("How did you find us?"),
    ///     Some("discovery_channel")
    /// );
    /// assert_eq!(QuestionClassifier::classify("Anything else?"), None);
    /// ```
    pub fn classify(question: &str) -> Option<&'static str> {
        compiled_patterns()
            .iter()
            .find(|(_, re)| re.is_match(question))
            .map(|(key, _)| *key)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
