//! Human-readable rendering of snapshot numbers for the text summary.

/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use booking_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    let negative = value < 0.0;
    let factor = 10_f64.powi(decimals as i32);
    let abs_value = value.abs();
    // Nudge by a relative epsilon so exact binary midpoints round up.
    let rounded = ((abs_value * factor) + f64::EPSILON * abs_value * factor).round() / factor;

    let grouped = group_thousands(&(rounded.trunc() as u64).to_string());
    let body = if decimals == 0 {
        grouped
    } else {
        let frac = format!("{:.prec$}", rounded.fract(), prec = decimals as usize);
        format!("{}{}", grouped, &frac[1..])
    };

    if negative && rounded > 0.0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Format an event count with thousands separators.
///
/// ```
/// use booking_core::formatting::format_count;
///
/// assert_eq!(format_count(1_204), "1,204");
/// ```
pub fn format_count(count: u64) -> String {
    group_thousands(&count.to_string())
}

/// Format a `[0, 100]` rate with one decimal place.
///
/// ```
/// use booking_core::formatting::format_percent;
///
/// assert_eq!(format_percent(75.0), "75.0%");
/// assert_eq!(format_percent(33.3333), "33.3%");
/// ```
pub fn format_percent(rate: f64) -> String {
    format!("{}%", format_number(rate, 1))
}

/// Format an optional duration in hours.
///
/// Durations under an hour are shown in minutes; absent values as `"n/a"`.
///
/// ```
/// use booking_core::formatting::format_hours;
///
/// assert_eq!(format_hours(Some(0.5)), "30m");
/// assert_eq!(format_hours(Some(26.25)), "26.3h");
/// assert_eq!(format_hours(None), "n/a");
/// ```
pub fn format_hours(hours: Option<f64>) -> String {
    match hours {
        Some(h) if h.is_finite() && h < 1.0 => format!("{}m", (h * 60.0).round() as i64),
        Some(h) if h.is_finite() => format!("{}h", format_number(h, 1)),
        _ => "n/a".to_string(),
    }
}

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = s.len() % 3;
    for (i, c) in s.chars().enumerate() {
        if i != 0 && i % 3 == remainder {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────
