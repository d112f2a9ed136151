//! Formatting helpers for terminal output.

use chrono::{DateTime, Duration, Local, Utc};

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a timestamp in local time for tables
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%b %d, %Y %H:%M").to_string()
}

/// Format a segment offset in seconds as `m:ss.s`
pub fn format_offset(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "-".to_string();
    }
    let tenths = (seconds * 10.0).round() as u64;
    let minutes = tenths / 600;
    let rem = tenths % 600;
    format!("{}:{:02}.{}", minutes, rem / 10, rem % 10)
}

/// Describe time left before a token expires
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds();
    if secs <= 0 {
        "expired".to_string()
    } else if secs < 60 {
        format!("in {}s", secs)
    } else if secs < 3600 {
        format!("in {}m", secs / 60)
    } else {
        format!("in {}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Last path component of a stored upload, e.g. `processor_files/a.mp3` -> `a.mp3`
pub fn file_basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("héllo wörld", 6), "hél...");
    }

    #[test]
    fn test_format_offset() {
        assert_eq!(format_offset(0.0), "0:00.0");
        assert_eq!(format_offset(1.54), "0:01.5");
        assert_eq!(format_offset(75.25), "1:15.3");
        assert_eq!(format_offset(-1.0), "-");
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::seconds(-5)), "expired");
        assert_eq!(format_remaining(Duration::seconds(42)), "in 42s");
        assert_eq!(format_remaining(Duration::minutes(12)), "in 12m");
        assert_eq!(format_remaining(Duration::minutes(135)), "in 2h 15m");
    }

    #[test]
    fn test_file_basename() {
        assert_eq!(file_basename("processor_files/clip.mp3"), "clip.mp3");
        assert_eq!(file_basename("clip.mp3"), "clip.mp3");
    }
}
