//! Shared formatting helpers.

use chrono::{Local, TimeZone};

/// Formats a throughput as a human-readable rate string.
pub fn format_rate(bps: f64) -> String {
    const GB: f64 = 1024.0 * 1024.0 * 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    const KB: f64 = 1024.0;

    if bps >= GB {
        format!("{:.1} GB/s", bps / GB)
    } else if bps >= MB {
        format!("{:.1} MB/s", bps / MB)
    } else if bps >= KB {
        format!("{:.1} KB/s", bps / KB)
    } else {
        format!("{:.0} B/s", bps)
    }
}

/// Formats a utilization percentage.
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Formats an optional utilization percentage, `n/a` when absent.
pub fn format_percent_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format_percent(v),
        None => "n/a".to_string(),
    }
}

/// Formats a Unix-millisecond timestamp as local wall-clock time.
pub fn format_clock(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_rate_picks_unit() {
        assert_eq!(format_rate(0.0), "0 B/s");
        assert_eq!(format_rate(512.0), "512 B/s");
        assert_eq!(format_rate(2048.0), "2.0 KB/s");
        assert_eq!(format_rate(3.5 * 1024.0 * 1024.0), "3.5 MB/s");
        assert_eq!(format_rate(2.0 * 1024.0 * 1024.0 * 1024.0), "2.0 GB/s");
    }

    #[test]
    fn format_percent_variants() {
        assert_eq!(format_percent(42.35), "42.3%");
        assert_eq!(format_percent_opt(Some(7.0)), "7.0%");
        assert_eq!(format_percent_opt(None), "n/a");
    }
}
