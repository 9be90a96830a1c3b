//! Textual duration formats.
//!
//! Two formats are used across timex:
//!  - `HH:MM:SS` for display, manual edits and report export. Hours are unbounded and always
//!    at least two digits wide.
//!  - ISO-8601 (`PT1H30M`) for persisted ledgers.

use std::sync::LazyLock;

use chrono::Duration;
use regex::Regex;
use thiserror::Error;

/// Hours take two or more digits so every formatted duration parses back, including ones of
/// 100 hours and more. Minutes and seconds are exactly two digits.
static CLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{2,}):(\d{2}):(\d{2})$").expect("Clock pattern should be a valid regex")
});

static ISO_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:[.,](\d+))?S)?)?$")
        .expect("ISO-8601 pattern should be a valid regex")
});

/// Returned when user supplied text isn't a `HH:MM:SS` duration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Invalid duration {input:?}, expected the format <hh>:<mm>:<ss>")]
pub struct InvalidFormat {
    pub input: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DurationError {
    #[error("Invalid ISO-8601 duration {0:?}")]
    Malformed(String),
    #[error("ISO-8601 duration {0:?} is out of range")]
    OutOfRange(String),
}

/// Formats a duration as `HH:MM:SS`. Negative durations are shown as zero.
pub fn format_clock(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parses the strict `HH:MM:SS` format produced by [format_clock].
pub fn parse_clock(text: &str) -> Result<Duration, InvalidFormat> {
    let invalid = || InvalidFormat {
        input: text.to_string(),
    };
    let captures = CLOCK_PATTERN.captures(text).ok_or_else(invalid)?;
    let field = |index: usize| -> Result<i64, InvalidFormat> {
        captures[index].parse::<i64>().map_err(|_| invalid())
    };
    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;

    Duration::try_hours(hours)
        .and_then(|h| h.checked_add(&Duration::minutes(minutes)))
        .and_then(|h| h.checked_add(&Duration::seconds(seconds)))
        .ok_or_else(invalid)
}

/// Formats a duration the way ledgers store it, e.g. `PT1H30M` or `PT0S`.
pub fn format_iso8601(duration: Duration) -> String {
    let total_seconds = duration.num_seconds().max(0);
    if total_seconds == 0 {
        return "PT0S".into();
    }
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut text = String::from("PT");
    if hours > 0 {
        text.push_str(&format!("{hours}H"));
    }
    if minutes > 0 {
        text.push_str(&format!("{minutes}M"));
    }
    if seconds > 0 {
        text.push_str(&format!("{seconds}S"));
    }
    text
}

/// Parses a stored ISO-8601 duration. Fractions of a second are dropped.
pub fn parse_iso8601(text: &str) -> Result<Duration, DurationError> {
    let captures = ISO_PATTERN
        .captures(text)
        .filter(|_| text != "P" && text != "PT" && !text.ends_with('T'))
        .ok_or_else(|| DurationError::Malformed(text.to_string()))?;

    let component = |index: usize| -> Result<i64, DurationError> {
        captures
            .get(index)
            .map(|v| v.as_str().parse::<i64>())
            .transpose()
            .map(|v| v.unwrap_or(0))
            .map_err(|_| DurationError::OutOfRange(text.to_string()))
    };

    let days = component(1)?;
    let hours = component(2)?;
    let minutes = component(3)?;
    let seconds = component(4)?;

    Duration::try_days(days)
        .and_then(|d| d.checked_add(&Duration::try_hours(hours)?))
        .and_then(|d| d.checked_add(&Duration::try_minutes(minutes)?))
        .and_then(|d| d.checked_add(&Duration::try_seconds(seconds)?))
        .ok_or_else(|| DurationError::OutOfRange(text.to_string()))
}
