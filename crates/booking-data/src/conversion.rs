use std::collections::BTreeMap;

use booking_core::calculations::{rate, FrequencyCounter};
use booking_core::models::EventRecord;
use booking_core::snapshot::{ConversionAnalysis, TOP_CONVERTED_LIMIT};

use crate::aggregator::{converted_count, group_by_note};

pub struct ConversionAnalyzer;

impl ConversionAnalyzer {
    pub fn analyze(records: &[EventRecord]) -> ConversionAnalysis {
        let conversion_by_internal_note: BTreeMap<String, f64> = group_by_note(records)
            .into_iter()
            .map(|(note, group)| {
                let converted = converted_count(group.iter().copied());
                (note.to_string(), rate(converted, group.len() as u64))
            })
            .collect();

        let converted: Vec<&EventRecord> =
            records.iter().filter(|r| r.status.is_converted()).collect();
        let services: FrequencyCounter =
            converted.iter().filter_map(|r| r.service_interest()).collect();
        let channels: FrequencyCounter =
            converted.iter().filter_map(|r| r.discovery_channel()).collect();

        ConversionAnalysis {
            overall_conversion_rate: rate(converted.len() as u64, records.len() as u64),
            conversion_by_internal_note,
            conversion_by_service: services.top(TOP_CONVERTED_LIMIT),
            conversion_by_channel: channels.top(TOP_CONVERTED_LIMIT),
        }
    }
}
