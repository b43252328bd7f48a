//! Formatting helpers shared across report frontends.

/// Format fractional hours as "3h 20m" (or "45m" under an hour).
pub fn format_hours(hours: f64) -> String {
    let total_minutes = (hours.max(0.0) * 60.0).round() as i64;
    let h = total_minutes / 60;
    let m = total_minutes % 60;
    if h > 0 {
        format!("{}h {}m", h, m)
    } else {
        format!("{}m", m)
    }
}

/// Format a percentage with one decimal place (e.g. "42.5%").
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Hour-of-day bucket display (e.g. "10am–11am").
pub fn hour_display(hour: u8) -> String {
    let h = hour % 12;
    let h = if h == 0 { 12 } else { h };
    let period = if hour < 12 { "am" } else { "pm" };
    let next_h = (hour + 1) % 12;
    let next_h = if next_h == 0 { 12 } else { next_h };
    let next_period = if (hour + 1) % 24 < 12 { "am" } else { "pm" };
    format!("{}{}–{}{}", h, period, next_h, next_period)
}

/// Weekday name for 0 = Sunday.
pub fn weekday_name(day: usize) -> &'static str {
    match day {
        0 => "Sunday",
        1 => "Monday",
        2 => "Tuesday",
        3 => "Wednesday",
        4 => "Thursday",
        5 => "Friday",
        6 => "Saturday",
        _ => "Unknown",
    }
}

/// Signed change in attack days (e.g. "-3 days", "+1 day", "no change").
pub fn format_day_change(before: u32, after: u32) -> String {
    let delta = after as i64 - before as i64;
    match delta {
        0 => "no change".to_string(),
        1 | -1 => format!("{:+} day", delta),
        _ => format!("{:+} days", delta),
    }
}
