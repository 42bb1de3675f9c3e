// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time formatting, input checks, and waiting.

use chrono::{
    DateTime, Datelike, Duration as ChronoDuration, NaiveDate, NaiveTime, Timelike, Utc,
};
use std::future::Future;
use std::time::Duration;
use validator::ValidationError;

/// Format a whole number of seconds as `H:MM:SS` (hours are not zero-padded).
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{}:{:02}:{:02}", hours, minutes, seconds)
}

/// Format a timestamp as `DD-MM-YYYY`.
pub fn format_day(date: DateTime<Utc>) -> String {
    date.format("%d-%m-%Y").to_string()
}

/// Format a distance in metres as kilometres with two decimals.
pub fn format_distance_km(meters: f64) -> String {
    format!("{:.2} KM", meters / 1000.0)
}

/// Parse a strict `HH:MM:SS` time of day.
pub fn parse_time_of_day(input: &str) -> Option<NaiveTime> {
    let bytes = input.as_bytes();
    if bytes.len() != 8 || bytes[2] != b':' || bytes[5] != b':' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 2 && *i != 5)
        .all(|(_, b)| b.is_ascii_digit());
    if !digits_ok {
        return None;
    }
    // chrono reads second 60 as a leap second
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .ok()
        .filter(|t| t.nanosecond() < 1_000_000_000)
}

/// Coarse IANA check: non-empty and `Area/Location` shaped.
pub fn is_iana_like(time_zone: &str) -> bool {
    let tz = time_zone.trim();
    !tz.is_empty() && tz == time_zone && tz.contains('/')
}

pub fn validate_time_of_day(value: &str) -> Result<(), ValidationError> {
    if parse_time_of_day(value).is_some() {
        Ok(())
    } else {
        Err(ValidationError::new("time_of_day")
            .with_message("Invalid time format. Use HH:MM:SS (e.g. 09:00:00)".into()))
    }
}

pub fn validate_timezone(value: &str) -> Result<(), ValidationError> {
    if is_iana_like(value) {
        Ok(())
    } else {
        Err(ValidationError::new("time_zone").with_message(
            "Invalid timezone. Use an IANA name (e.g. Europe/London, America/New_York)".into(),
        ))
    }
}

/// The first Monday strictly after `today`.
pub fn next_monday(today: NaiveDate) -> NaiveDate {
    let days_ahead = 7 - today.weekday().num_days_from_monday() as i64;
    today + ChronoDuration::days(days_ahead)
}

/// Waits between remote calls. Swappable so tests don't actually sleep.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(312), "0:05:12");
        assert_eq!(format_duration(3723), "1:02:03");
        assert_eq!(format_duration(36_000), "10:00:00");
    }

    #[test]
    fn test_format_day() {
        let date = Utc.with_ymd_and_hms(2025, 3, 7, 6, 30, 0).unwrap();
        assert_eq!(format_day(date), "07-03-2025");
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance_km(5000.0), "5.00 KM");
        assert_eq!(format_distance_km(10234.6), "10.23 KM");
    }

    #[test]
    fn test_parse_time_of_day() {
        assert!(parse_time_of_day("09:00:00").is_some());
        assert!(parse_time_of_day("23:59:59").is_some());
        assert!(parse_time_of_day("25:00:00").is_none());
        assert!(parse_time_of_day("9:00:00").is_none());
        assert!(parse_time_of_day("09:00").is_none());
        assert!(parse_time_of_day("09:60:00").is_none());
        assert!(parse_time_of_day("23:59:60").is_none());
        assert!(parse_time_of_day("12:00:61").is_none());
        assert!(parse_time_of_day("0a:00:00").is_none());
    }

    #[test]
    fn test_is_iana_like() {
        assert!(is_iana_like("Europe/London"));
        assert!(is_iana_like("America/Argentina/Buenos_Aires"));
        assert!(!is_iana_like("Nowhere"));
        assert!(!is_iana_like(""));
        assert!(!is_iana_like(" Europe/London"));
    }

    #[test]
    fn test_next_monday() {
        // 2025-06-11 is a Wednesday
        let wed = NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        assert_eq!(next_monday(wed), NaiveDate::from_ymd_opt(2025, 6, 16).unwrap());

        // A Monday rolls to the following week
        let mon = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        assert_eq!(next_monday(mon), NaiveDate::from_ymd_opt(2025, 6, 23).unwrap());
    }
}
