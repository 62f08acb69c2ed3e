//! Display helpers for sizes and ages

use chrono::{DateTime, Utc};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Format a byte count using binary units, e.g. `1.50 MB`
pub fn human_readable_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Whole days elapsed since `timestamp`, 0 for future timestamps
pub fn age_in_days(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - timestamp).num_days().max(0)
}

/// Short relative description such as `3 days ago`
pub fn describe_age(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - timestamp;
    match elapsed.num_days() {
        d if d >= 2 => format!("{} days ago", d),
        1 => "1 day ago".to_string(),
        _ => match elapsed.num_hours() {
            h if h >= 2 => format!("{} hours ago", h),
            1 => "1 hour ago".to_string(),
            _ => "just now".to_string(),
        },
    }
}

pub fn status_mark(ok: bool) -> &'static str {
    if ok {
        "✓"
    } else {
        "✗"
    }
}
