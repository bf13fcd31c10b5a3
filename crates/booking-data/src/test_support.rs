//! Record builders shared by the analyzer tests.

use std::collections::BTreeMap;

use booking_core::models::{EventRecord, EventStatus, DISCOVERY_CHANNEL, SERVICE_INTEREST};
use chrono::{DateTime, Utc};

use crate::normalizer::NormalizedBatch;

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339 timestamp")
        .with_timezone(&Utc)
}

/// An event starting at `start`, booked at the same instant.
pub fn event(id: &str, status: EventStatus, start: &str, note: Option<&str>) -> EventRecord {
    EventRecord {
        id: id.to_string(),
        status,
        created_at: ts(start),
        start_time: ts(start),
        internal_note: note.map(str::to_string),
        answers: BTreeMap::new(),
        response_time_hours: None,
        invitee_email: None,
    }
}

pub fn with_answers(
    mut record: EventRecord,
    service: Option<&str>,
    channel: Option<&str>,
) -> EventRecord {
    if let Some(s) = service {
        record.answers.insert(SERVICE_INTEREST.to_string(), s.to_string());
    }
    if let Some(c) = channel {
        record.answers.insert(DISCOVERY_CHANNEL.to_string(), c.to_string());
    }
    record
}

pub fn batch(records: Vec<EventRecord>) -> NormalizedBatch {
    NormalizedBatch {
        records,
        dropped_count: 0,
    }
}
