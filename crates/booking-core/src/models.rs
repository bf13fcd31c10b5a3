use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bucket name for events without an internal note.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Answer key for the "which service are you interested in" question.
pub const SERVICE_INTEREST: &str = "service_interest";

/// Answer key for the "how did you find us" question.
pub const DISCOVERY_CHANNEL: &str = "discovery_channel";

/// Lifecycle status of a booked event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Active,
    Canceled,
    Completed,
    NoShow,
    /// Any status string the vendor sends that we do not recognise.
    Unknown,
}

impl EventStatus {
    /// Map a raw status string onto the canonical enum.
    ///
    /// Matching is case-insensitive and tolerates the common spelling
    /// variants; anything else becomes [`EventStatus::Unknown`].
    ///
    /// # Examples
    ///
    /// ```
    /// use booking_core::models::EventStatus;
    ///
    /// assert_eq!(EventStatus::parse("Cancelled"), EventStatus::Canceled);
    /// assert_eq!(EventStatus::parse("no-show"), EventStatus::NoShow);
    /// assert_eq!(EventStatus::parse("rescheduled"), EventStatus::Unknown);
    /// ```
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            "canceled" | "cancelled" => Self::Canceled,
            "completed" => Self::Completed,
            "no_show" | "no-show" | "noshow" => Self::NoShow,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Canceled => "canceled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
            Self::Unknown => "unknown",
        }
    }

    /// Whether the event counts towards conversion.
    pub fn is_converted(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One booked meeting after normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier (vendor id or URI).
    pub id: String,
    pub status: EventStatus,
    /// When the booking was made (UTC).
    pub created_at: DateTime<Utc>,
    /// When the meeting is scheduled to start (UTC).
    pub start_time: DateTime<Utc>,
    /// Trimmed, non-empty internal note. `None` falls into [`UNCATEGORIZED`].
    #[serde(default)]
    pub internal_note: Option<String>,
    /// Trimmed, non-empty answers keyed by question key.
    #[serde(default)]
    pub answers: BTreeMap<String, String>,
    /// Hours between creation and the first state-changing action.
    #[serde(default)]
    pub response_time_hours: Option<f64>,
    /// Lower-cased invitee e-mail, used for distinct-invitee counts.
    #[serde(default)]
    pub invitee_email: Option<String>,
}

impl EventRecord {
    /// The internal-note bucket this record is grouped under.
    pub fn note_bucket(&self) -> &str {
        self.internal_note.as_deref().unwrap_or(UNCATEGORIZED)
    }

    /// Answer for `key`, if the invitee supplied one.
    pub fn answer(&self, key: &str) -> Option<&str> {
        self.answers.get(key).map(String::as_str)
    }

    pub fn service_interest(&self) -> Option<&str> {
        self.answer(SERVICE_INTEREST)
    }

    pub fn discovery_channel(&self) -> Option<&str> {
        self.answer(DISCOVERY_CHANNEL)
    }
}

/// Normalise a raw note value: trim, and treat blank as absent.
///
/// ```
/// use booking_core::models::normalize_note;
///
/// assert_eq!(normalize_note("  Sales "), Some("Sales".to_string()));
/// assert_eq!(normalize_note("   "), None);
/// ```
pub fn normalize_note(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
