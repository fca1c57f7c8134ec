//! Calendar-date handling for ownership boundaries.
//!
//! Ownership dates carry no time of day and no timezone. They cross the API boundary as
//! `YYYY-MM-DD`, but backing stores sometimes hand back full timestamps; only the calendar
//! portion of those is kept, so an implicit UTC-to-local conversion can never shift the day.

use std::sync::LazyLock;

use chrono::{DateTime, Local, NaiveDate};
use regex::Regex;

/// `strftime` pattern used for every serialized ownership date.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

static LEADING_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})").expect("static date pattern"));

/// Failure to read a calendar date from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DateParseError {
    /// Input was empty or whitespace.
    #[error("date is empty")]
    Empty,
    /// Input had a `YYYY-MM-DD` shape but named no real day.
    #[error("date out of range: {0}")]
    OutOfRange(String),
    /// Input matched no supported date or timestamp format.
    #[error("unrecognized date: {0}")]
    Unrecognized(String),
}

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| DateParseError::Unrecognized(trimmed.to_string()))
}

/// Extracts the calendar date from a date or timestamp string.
///
/// A leading `YYYY-MM-DD` is taken verbatim, whatever follows it. Other inputs are parsed as
/// RFC 3339 or RFC 2822 timestamps and reduced to the date in their own offset.
pub fn extract_calendar_date(raw: &str) -> Result<NaiveDate, DateParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }

    if let Some(caps) = LEADING_DATE.captures(trimmed) {
        let ymd = (
            caps[1].parse::<i32>().ok(),
            caps[2].parse::<u32>().ok(),
            caps[3].parse::<u32>().ok(),
        );
        if let (Some(y), Some(m), Some(d)) = ymd {
            return NaiveDate::from_ymd_opt(y, m, d)
                .ok_or_else(|| DateParseError::OutOfRange(trimmed.to_string()));
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(ts.date_naive());
    }
    if let Ok(ts) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(ts.date_naive());
    }

    Err(DateParseError::Unrecognized(trimmed.to_string()))
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Current calendar date on the local clock.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Serde adapters that accept either dates or full timestamps and keep only the calendar day.
pub mod lenient {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer};

    use super::extract_calendar_date;

    /// Deserializes a required date.
    pub fn date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        extract_calendar_date(&raw).map_err(serde::de::Error::custom)
    }

    /// Deserializes an optional date; `null` and the empty string both mean absent.
    pub fn opt_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => extract_calendar_date(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
