//! Plain-text rendering of a snapshot for `--output summary`.

use std::fmt::Write;

use booking_core::formatting::{format_count, format_hours, format_number, format_percent};
use booking_core::snapshot::{AnalyticsSnapshot, RankedAnswer, TrendDirection};

pub fn render_summary(snapshot: &AnalyticsSnapshot) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = write_summary(&mut out, snapshot);
    out
}

fn write_summary(out: &mut String, snapshot: &AnalyticsSnapshot) -> std::fmt::Result {
    let summary = &snapshot.summary;

    writeln!(out, "Booking analytics ({})", snapshot.generated_at.to_rfc3339())?;
    writeln!(out)?;
    writeln!(out, "Events:          {}", format_count(summary.total_events))?;
    writeln!(out, "Invitees:        {}", format_count(summary.total_invitees))?;
    if summary.dropped_count > 0 {
        writeln!(out, "Dropped records: {}", format_count(summary.dropped_count))?;
    }
    writeln!(out, "Completion rate: {}", format_percent(summary.completion_rate))?;
    writeln!(out, "Events per day:  {}", format_number(summary.avg_events_per_day, 1))?;
    if let (Some(start), Some(end)) = (summary.date_range.start, summary.date_range.end) {
        writeln!(
            out,
            "Date range:      {} .. {} ({} days)",
            start.date_naive(),
            end.date_naive(),
            summary.date_range.days_span
        )?;
    }

    if !summary.status_distribution.is_empty() {
        writeln!(out)?;
        writeln!(out, "Status")?;
        for (status, count) in &summary.status_distribution {
            writeln!(out, "  {:<12} {:>8}", status.as_str(), format_count(*count))?;
        }
    }

    if !snapshot.internal_notes_analysis.is_empty() {
        writeln!(out)?;
        writeln!(out, "Internal notes")?;
        for (note, analysis) in &snapshot.internal_notes_analysis {
            let peaks: Vec<String> = analysis
                .peak_hours
                .iter()
                .map(|h| format!("{h:02}:00"))
                .collect();
            writeln!(
                out,
                "  {:<20} {:>8} events  {:>7} converted  median response {}  peak {}",
                note,
                format_count(analysis.total_events),
                format_percent(analysis.conversion_rate),
                format_hours(analysis.response_time_stats.median),
                if peaks.is_empty() { "-".to_string() } else { peaks.join(", ") },
            )?;
        }
    }

    let temporal = &snapshot.temporal_analysis;
    writeln!(out)?;
    writeln!(
        out,
        "Weekday/weekend: {} / {}",
        format_count(temporal.weekday_vs_weekend.weekday),
        format_count(temporal.weekday_vs_weekend.weekend)
    )?;
    writeln!(
        out,
        "Monthly trend:   {} ({})",
        trend_label(temporal.seasonal_trend.trend),
        format_percent(temporal.seasonal_trend.growth_rate)
    )?;
    if !temporal.high_activity_days.is_empty() {
        let days: Vec<&str> = temporal.high_activity_days.keys().map(String::as_str).collect();
        writeln!(out, "Unusual days:    {}", days.join(", "))?;
    }

    let conversion = &snapshot.conversion_analysis;
    writeln!(out)?;
    writeln!(
        out,
        "Overall conversion: {}",
        format_percent(conversion.overall_conversion_rate)
    )?;
    write_ranked(out, "Converting services", &conversion.conversion_by_service)?;
    write_ranked(out, "Converting channels", &conversion.conversion_by_channel)?;

    let questions = &snapshot.question_analysis;
    if !questions.service_interests.top_services.is_empty() {
        writeln!(
            out,
            "Top services: {}",
            questions.service_interests.top_services.join(", ")
        )?;
    }
    if !questions.discovery_channels.top_channels.is_empty() {
        writeln!(
            out,
            "Top channels: {}",
            questions.discovery_channels.top_channels.join(", ")
        )?;
    }

    Ok(())
}

fn write_ranked(out: &mut String, title: &str, ranked: &[RankedAnswer]) -> std::fmt::Result {
    if ranked.is_empty() {
        return Ok(());
    }
    writeln!(out, "{title}")?;
    for answer in ranked {
        writeln!(out, "  {:<30} {:>6}", answer.value, format_count(answer.count))?;
    }
    Ok(())
}

fn trend_label(trend: TrendDirection) -> &'static str {
    match trend {
        TrendDirection::InsufficientData => "insufficient data",
        TrendDirection::Increasing => "increasing",
        TrendDirection::Declining => "declining",
        TrendDirection::Stable => "stable",
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
