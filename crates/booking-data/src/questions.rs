use booking_core::calculations::FrequencyCounter;
use booking_core::models::EventRecord;
use booking_core::snapshot::{
    DiscoveryChannels, QuestionAnalysis, ServiceInterests, TOP_ANSWERS_LIMIT,
};

/// Batch-wide answer distributions for the tracked booking questions.
pub struct QuestionAnalyzer;

impl QuestionAnalyzer {
    pub fn analyze(records: &[EventRecord]) -> QuestionAnalysis {
        let services: FrequencyCounter =
            records.iter().filter_map(|r| r.service_interest()).collect();
        let channels: FrequencyCounter =
            records.iter().filter_map(|r| r.discovery_channel()).collect();

        QuestionAnalysis {
            service_interests: ServiceInterests {
                distribution: services.distribution(),
                top_services: top_values(&services),
            },
            discovery_channels: DiscoveryChannels {
                distribution: channels.distribution(),
                top_channels: top_values(&channels),
            },
        }
    }
}

fn top_values(counter: &FrequencyCounter) -> Vec<String> {
    counter
        .top(TOP_ANSWERS_LIMIT)
        .into_iter()
        .map(|answer| answer.value)
        .collect()
}
