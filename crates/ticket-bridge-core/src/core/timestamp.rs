// crates/ticket-bridge-core/src/core/timestamp.rs
// ============================================================================
// Module: Ticket Bridge Time Parsing
// Description: Webhook timestamp formats and UTC normalization.
// Purpose: Parse tool-specific timestamps into UTC instants.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Ticketing tools encode timestamps either as Unix epoch milliseconds or as
//! ISO-8601 strings. Parsing accepts RFC 3339 and the compact-offset form used
//! by Jira (`2024-01-15T10:30:00.000+0000`). Every parsed instant is
//! normalized to UTC. Nothing in this module reads the wall clock.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Formats
// ============================================================================

/// Compact-offset timestamp with fractional seconds.
const COMPACT_OFFSET_FRACTION: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory][offset_minute]"
);

/// Compact-offset timestamp without fractional seconds.
const COMPACT_OFFSET: &[FormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second][offset_hour sign:mandatory][offset_minute]"
);

/// Encoding used by a tool for webhook timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampFormat {
    /// Unix epoch milliseconds as a JSON integer or numeric string.
    UnixMillis,
    /// ISO-8601 / RFC 3339 string.
    Iso8601,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeParseError {
    /// Value had the wrong JSON type.
    #[error("timestamp must be {expected}")]
    WrongType {
        /// Expected encoding description.
        expected: &'static str,
    },
    /// Value could not be parsed.
    #[error("unparsable timestamp: {0}")]
    Unparsable(String),
    /// Value is outside the representable range.
    #[error("timestamp out of range")]
    OutOfRange,
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses a JSON timestamp value according to its declared format.
///
/// # Errors
///
/// Returns [`TimeParseError`] when the value cannot be interpreted.
pub fn parse_timestamp_value(
    value: &Value,
    format: TimestampFormat,
) -> Result<OffsetDateTime, TimeParseError> {
    match format {
        TimestampFormat::UnixMillis => {
            let millis = match value {
                Value::Number(number) => number
                    .as_i64()
                    .ok_or(TimeParseError::WrongType { expected: "integer milliseconds" })?,
                Value::String(text) => text
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| TimeParseError::Unparsable(text.clone()))?,
                _ => return Err(TimeParseError::WrongType { expected: "integer milliseconds" }),
            };
            from_unix_millis(millis)
        }
        TimestampFormat::Iso8601 => {
            let text =
                value.as_str().ok_or(TimeParseError::WrongType { expected: "an iso-8601 string" })?;
            parse_iso8601(text)
        }
    }
}

/// Parses an ISO-8601 string and normalizes it to UTC.
///
/// # Errors
///
/// Returns [`TimeParseError::Unparsable`] when no supported form matches.
pub fn parse_iso8601(text: &str) -> Result<OffsetDateTime, TimeParseError> {
    let text = text.trim();
    OffsetDateTime::parse(text, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(text, COMPACT_OFFSET_FRACTION))
        .or_else(|_| OffsetDateTime::parse(text, COMPACT_OFFSET))
        .map(|parsed| parsed.to_offset(UtcOffset::UTC))
        .map_err(|_| TimeParseError::Unparsable(text.to_string()))
}

/// Converts Unix epoch milliseconds into a UTC instant.
///
/// # Errors
///
/// Returns [`TimeParseError::OutOfRange`] when the value is not representable.
pub fn from_unix_millis(millis: i64) -> Result<OffsetDateTime, TimeParseError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|_| TimeParseError::OutOfRange)
}

/// Returns Unix epoch milliseconds for an instant.
#[must_use]
pub fn unix_millis(instant: OffsetDateTime) -> i128 {
    instant.unix_timestamp_nanos() / 1_000_000
}

// ============================================================================
// SECTION: Tests
// ============================================================================
