//! Raw export records → canonical [`EventRecord`]s.
//!
//! Normalisation fails closed per record: anything missing an id, a status or
//! a usable timestamp is dropped and counted, and the rest of the batch
//! carries on.

use std::collections::{BTreeMap, HashMap};

use booking_core::data_processors::{
    first_present, first_str, lookup, QuestionClassifier, TimestampProcessor,
};
use booking_core::error::{RecordError, RefreshError};
use booking_core::models::{normalize_note, EventRecord, EventStatus};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info};

/// Keys under which paginated exports nest their record array.
const ENVELOPE_KEYS: &[&str] = &["collection", "data", "resources"];

const ID_PATHS: &[&str] = &["id", "uri"];
const CREATED_AT_PATHS: &[&str] = &[
    "created_at",
    "scheduled_event_created_at",
    "scheduled_event.created_at",
    "event_data.created_at",
];
const START_TIME_PATHS: &[&str] = &[
    "start_time",
    "scheduled_event_start_time",
    "scheduled_event.start_time",
    "event_data.start_time",
];
const NOTE_PATHS: &[&str] = &["internal_note", "event_type.internal_note"];
/// Where an event or invitee references its event type by URI.
const EVENT_TYPE_REF_PATHS: &[&str] = &[
    "event_type",
    "scheduled_event.event_type",
    "event_data.event_type",
];
const EMAIL_PATHS: &[&str] = &["email", "invitee_email"];
/// Timestamps of the first state-changing action, in order of preference.
const ACTION_PATHS: &[&str] = &["cancellation.created_at", "first_action_at"];

// ── NormalizedBatch ───────────────────────────────────────────────────────────

/// The valid records of one raw batch plus how many were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<EventRecord>,
    pub dropped_count: u64,
}

impl NormalizedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ── EventTypeIndex ────────────────────────────────────────────────────────────

/// Internal notes of the event-type definitions found in a batch, keyed by URI.
///
/// Exports that list event types next to events reference them by URI only,
/// so the note has to be joined back in.
#[derive(Debug, Clone, Default)]
pub struct EventTypeIndex {
    notes: HashMap<String, String>,
}

impl EventTypeIndex {
    pub fn from_items(items: &[Value]) -> Self {
        let notes = items
            .iter()
            .filter(|item| Self::is_definition(item))
            .filter_map(|item| {
                let data = unwrap_resource(item);
                let uri = first_str(data, &["uri"])?;
                let note = first_str(data, &["internal_note"])?;
                Some((uri.to_string(), note.to_string()))
            })
            .collect();
        Self { notes }
    }

    /// An event-type definition rather than an event: no start time, and
    /// either an `/event_types/` URI or a scheduling link.
    pub fn is_definition(item: &Value) -> bool {
        let data = unwrap_resource(item);
        if !data.is_object() || first_present(data, START_TIME_PATHS).is_some() {
            return false;
        }
        first_str(data, &["uri"]).is_some_and(|uri| uri.contains("/event_types/"))
            || first_str(data, &["scheduling_url"]).is_some()
    }

    pub fn note_for(&self, uri: &str) -> Option<&str> {
        self.notes.get(uri).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// The record array of a raw batch: the value itself when it is an array, or
/// the array nested under one of the envelope keys.
pub fn envelope_items(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array)),
        _ => None,
    }
}

/// Normalise a whole raw batch.
///
/// Fails only when `raw` is not a collection of records; malformed records
/// are dropped and counted in [`NormalizedBatch::dropped_count`].
pub fn normalize_batch(raw: &Value) -> Result<NormalizedBatch, RefreshError> {
    let items = envelope_items(raw).ok_or_else(|| {
        RefreshError::InvalidBatch(format!(
            "expected an array of records, got {}",
            json_kind(raw)
        ))
    })?;

    let event_types = EventTypeIndex::from_items(items);
    if !event_types.is_empty() {
        debug!("Indexed {} event type notes", event_types.len());
    }

    let mut batch = NormalizedBatch {
        records: Vec::with_capacity(items.len()),
        dropped_count: 0,
    };
    let mut definitions = 0usize;

    for (index, item) in items.iter().enumerate() {
        if EventTypeIndex::is_definition(item) {
            definitions += 1;
            continue;
        }
        match normalize_record_in(item, &event_types) {
            Ok(record) => batch.records.push(record),
            Err(e) => {
                debug!("Dropping record {}: {}", index, e);
                batch.dropped_count += 1;
            }
        }
    }

    if batch.dropped_count > 0 {
        info!(
            "Dropped {} of {} raw records during normalisation",
            batch.dropped_count,
            items.len() - definitions
        );
    }
    Ok(batch)
}

/// Normalise one raw record on its own, without event-type lookups.
pub fn normalize_record(raw: &Value) -> Result<EventRecord, RecordError> {
    normalize_record_in(raw, &EventTypeIndex::default())
}

/// Normalise one raw record, resolving a by-URI event type through
/// `event_types` when the record carries no note of its own.
pub fn normalize_record_in(
    raw: &Value,
    event_types: &EventTypeIndex,
) -> Result<EventRecord, RecordError> {
    if !raw.is_object() {
        return Err(RecordError::NotAnObject);
    }
    let data = unwrap_resource(raw);

    let id = record_id(data).ok_or(RecordError::MissingField("id"))?;
    let status = first_str(data, &["status"]).ok_or(RecordError::MissingField("status"))?;
    let created_at = required_timestamp(data, "created_at", CREATED_AT_PATHS)?;
    let start_time = required_timestamp(data, "start_time", START_TIME_PATHS)?;

    let internal_note = first_str(data, NOTE_PATHS)
        .or_else(|| {
            first_str(data, EVENT_TYPE_REF_PATHS).and_then(|uri| event_types.note_for(uri))
        })
        .and_then(normalize_note);

    Ok(EventRecord {
        id,
        status: EventStatus::parse(status),
        created_at,
        start_time,
        internal_note,
        answers: extract_answers(data),
        response_time_hours: response_time_hours(data, created_at),
        invitee_email: first_str(data, EMAIL_PATHS).map(str::to_lowercase),
    })
}

// ── Internal helpers ──────────────────────────────────────────────────────────

fn unwrap_resource(raw: &Value) -> &Value {
    raw.get("resource").filter(|v| v.is_object()).unwrap_or(raw)
}

/// A non-blank string id, or an integer id rendered in decimal.
fn record_id(data: &Value) -> Option<String> {
    ID_PATHS.iter().find_map(|path| match lookup(data, path)? {
        Value::String(s) => non_blank(s),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    })
}

fn required_timestamp(
    data: &Value,
    field: &'static str,
    paths: &[&str],
) -> Result<DateTime<Utc>, RecordError> {
    let value = first_present(data, paths).ok_or(RecordError::MissingField(field))?;
    TimestampProcessor::parse(value).ok_or_else(|| RecordError::InvalidTimestamp {
        field,
        value: value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
    })
}

fn non_blank(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Classified `questions_and_answers` pairs, overlaid with any explicit
/// `answers` object.
fn extract_answers(data: &Value) -> BTreeMap<String, String> {
    let mut answers = BTreeMap::new();

    if let Some(pairs) = data.get("questions_and_answers").and_then(Value::as_array) {
        for pair in pairs {
            let Some(key) = pair
                .get("question")
                .and_then(Value::as_str)
                .and_then(QuestionClassifier::classify)
            else {
                continue;
            };
            if let Some(answer) = pair.get("answer").and_then(Value::as_str).and_then(non_blank) {
                answers.insert(key.to_string(), answer);
            }
        }
    }

    if let Some(explicit) = data.get("answers").and_then(Value::as_object) {
        for (key, value) in explicit {
            if let Some(answer) = value.as_str().and_then(non_blank) {
                answers.insert(key.clone(), answer);
            }
        }
    }

    answers
}

fn response_time_hours(data: &Value, created_at: DateTime<Utc>) -> Option<f64> {
    let valid = |hours: f64| (hours.is_finite() && hours >= 0.0).then_some(hours);

    if let Some(explicit) = data.get("response_time_hours").and_then(Value::as_f64) {
        return valid(explicit);
    }

    ACTION_PATHS
        .iter()
        .find_map(|path| lookup(data, path).and_then(TimestampProcessor::parse))
        .and_then(|acted_at| {
            valid((acted_at - created_at).num_milliseconds() as f64 / 3_600_000.0)
        })
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without a record array",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
