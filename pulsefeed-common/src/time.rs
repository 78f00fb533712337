//! Date and timestamp utilities

use crate::{Error, Result};
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Parse an ISO calendar date (`YYYY-MM-DD`)
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid date '{}': {}", input, e)))
}

/// Inclusive iterator over calendar dates, ascending
pub struct DateRange {
    next: Option<NaiveDate>,
    end: NaiveDate,
}

impl Iterator for DateRange {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        let current = self.next?;
        if current > self.end {
            self.next = None;
            return None;
        }
        self.next = current.checked_add_signed(ChronoDuration::days(1));
        Some(current)
    }
}

/// Iterate every date in `[start, end]`; empty when `start > end`
pub fn date_range(start: NaiveDate, end: NaiveDate) -> DateRange {
    DateRange {
        next: Some(start),
        end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_millis_to_duration_one_second() {
        let duration = millis_to_duration(1000);
        assert_eq!(duration, Duration::from_secs(1));
        assert_eq!(duration.as_millis(), 1000);
    }

    #[tokio::test]
    async fn test_now_successive_calls_advance() {
        let time1 = now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let time2 = now();
        // Second call should be after first call
        assert!(time2 > time1);
    }

    #[test]
    fn test_parse_date_valid() {
        assert_eq!(parse_date("2024-03-15").unwrap(), date(2024, 3, 15));
    }

    #[test]
    fn test_parse_date_invalid() {
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("15/03/2024").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_date_range_single_day() {
        let days: Vec<NaiveDate> = date_range(date(2024, 1, 5), date(2024, 1, 5)).collect();
        assert_eq!(days, vec![date(2024, 1, 5)]);
    }

    #[test]
    fn test_date_range_ascending_inclusive() {
        let days: Vec<NaiveDate> = date_range(date(2024, 1, 30), date(2024, 2, 2)).collect();
        assert_eq!(
            days,
            vec![
                date(2024, 1, 30),
                date(2024, 1, 31),
                date(2024, 2, 1),
                date(2024, 2, 2),
            ]
        );
    }

    #[test]
    fn test_date_range_empty_when_reversed() {
        let days: Vec<NaiveDate> = date_range(date(2024, 2, 2), date(2024, 1, 30)).collect();
        assert!(days.is_empty());
    }

    #[test]
    fn test_date_range_crosses_year_boundary() {
        let days: Vec<NaiveDate> = date_range(date(2023, 12, 31), date(2024, 1, 1)).collect();
        assert_eq!(days, vec![date(2023, 12, 31), date(2024, 1, 1)]);
    }
}
