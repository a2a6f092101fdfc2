//! Date pattern auto-detection for the date operators.
//!
//! A candidate string is matched against a table of known layouts by length
//! and regex before it is parsed, so `03.04.2024` and `2024-04-03` compare as
//! the same day.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

/// A known date layout
struct DatePattern {
    /// Exact length of a matching string
    length: usize,
    regex: Regex,
    /// chrono format string
    format: &'static str,
    /// Layout carries a time part
    has_time: bool,
}

impl DatePattern {
    fn new(length: usize, regex: &str, format: &'static str, has_time: bool) -> Option<Self> {
        Some(Self {
            length,
            regex: Regex::new(regex).ok()?,
            format,
            has_time,
        })
    }

    fn parse(&self, value: &str) -> Option<NaiveDateTime> {
        if self.has_time {
            NaiveDateTime::parse_from_str(value, self.format).ok()
        } else {
            NaiveDate::parse_from_str(value, self.format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    }
}

static PATTERNS: Lazy<Vec<DatePattern>> = Lazy::new(|| {
    vec![
        DatePattern::new(10, r"^\d{4}-\d{2}-\d{2}$", "%Y-%m-%d", false),
        DatePattern::new(10, r"^\d{2}\.\d{2}\.\d{4}$", "%d.%m.%Y", false),
        DatePattern::new(10, r"^\d{2}/\d{2}/\d{4}$", "%d/%m/%Y", false),
        DatePattern::new(10, r"^\d{4}/\d{2}/\d{2}$", "%Y/%m/%d", false),
        DatePattern::new(8, r"^\d{8}$", "%Y%m%d", false),
        DatePattern::new(16, r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}$", "%Y-%m-%d %H:%M", true),
        DatePattern::new(16, r"^\d{2}\.\d{2}\.\d{4} \d{2}:\d{2}$", "%d.%m.%Y %H:%M", true),
        DatePattern::new(19, r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$", "%Y-%m-%d %H:%M:%S", true),
        DatePattern::new(19, r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$", "%Y-%m-%dT%H:%M:%S", true),
        DatePattern::new(19, r"^\d{2}\.\d{2}\.\d{4} \d{2}:\d{2}:\d{2}$", "%d.%m.%Y %H:%M:%S", true),
        DatePattern::new(19, r"^\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2}$", "%d/%m/%Y %H:%M:%S", true),
        DatePattern::new(14, r"^\d{14}$", "%Y%m%d%H%M%S", true),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// Return the chrono format of the first layout matching `value`
pub fn detect_format(value: &str) -> Option<&'static str> {
    let value = value.trim();
    PATTERNS
        .iter()
        .find(|p| p.length == value.len() && p.regex.is_match(value))
        .map(|p| p.format)
}

/// Parse a date or date-time in any known layout.
///
/// Falls back to RFC 3339 (offsets are normalized to UTC).
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    PATTERNS
        .iter()
        .filter(|p| p.length == value.len() && p.regex.is_match(value))
        .find_map(|p| p.parse(value))
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}
