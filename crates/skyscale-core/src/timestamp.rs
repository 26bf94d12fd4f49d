//! Epoch timestamp parsing for job records.

use chrono::{DateTime, TimeZone, Utc};

use crate::error::{ConfigError, ConfigResult};

/// Parse an epoch timestamp string. Strings longer than ten digits are
/// milliseconds, shorter ones are seconds.
pub fn parse_epoch(stamp: &str) -> ConfigResult<DateTime<Utc>> {
    let stamp = stamp.trim();
    let value: i64 = stamp
        .parse()
        .map_err(|_| ConfigError::InvalidTimestamp(stamp.to_string()))?;

    let parsed = if stamp.trim_start_matches('-').len() > 10 {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    };
    parsed.ok_or_else(|| ConfigError::InvalidTimestamp(stamp.to_string()))
}

/// Parse either an RFC 3339 string or an epoch string.
pub fn parse_flexible(stamp: &str) -> ConfigResult<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(stamp.trim()) {
        Ok(t) => Ok(t.with_timezone(&Utc)),
        Err(_) => parse_epoch(stamp),
    }
}
