//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod error;
pub mod retry;

use chrono::{Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::OnceLock;

/// Korea Standard Time offset from UTC, in hours
const KST_OFFSET_HOURS: i64 = 9;

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

    let re = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    re.replace_all(text.trim(), " ").to_string()
}

/// Remove every whitespace character
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Truncate text to a maximum number of characters, for log fields
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Today's date in Korea, which is what the reservation sites mean by "today"
pub fn today_kst() -> NaiveDate {
    (Utc::now() + Duration::hours(KST_OFFSET_HOURS)).date_naive()
}

/// Parse an ISO `YYYY-MM-DD` date
pub fn parse_iso_date(text: &str) -> Result<NaiveDate, error::ParseError> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| error::ParseError::InvalidDate(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  카라반   05  "), "카라반 05");
        assert_eq!(normalize_whitespace("hello\n\nworld"), "hello world");
    }

    #[test]
    fn test_strip_whitespace() {
        assert_eq!(strip_whitespace(" 예약 가능\n"), "예약가능");
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("short", 10), "short");
        assert_eq!(truncate_for_log("very long text here", 10), "very lo...");
        assert_eq!(truncate_for_log("가나다라마바사", 5), "가나...");
    }

    #[test]
    fn test_parse_iso_date() {
        let date = parse_iso_date("2025-07-04").unwrap();
        assert_eq!(date.to_string(), "2025-07-04");
        assert!(parse_iso_date("2025/07/04").is_err());
        assert!(parse_iso_date("2025-02-30").is_err());
    }
}
