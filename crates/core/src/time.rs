//! Parsing of the print server's formatted timestamps.
//!
//! The server emits Python `isoformat()` strings, usually without a UTC
//! offset (`2024-05-01T12:34:56.123456`). Offset-less values are resolved in
//! the zone configured by [`NaiveZone`]. The server's "never set"
//! placeholder (`0001-01-01T00:00:00`) decodes to `None`.

use std::str::FromStr;

use chrono::{DateTime, Datelike, Local, NaiveDateTime, TimeZone};

use crate::error::CoreError;
use crate::types::EpochMillis;

/// Dates at or before this year are the server's unset placeholder.
const PLACEHOLDER_YEAR: i32 = 1;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Time zone used to interpret timestamps that carry no UTC offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NaiveZone {
    /// The zone of the machine running the mirror (the server's own zone
    /// when both run on the same site).
    #[default]
    Local,
    Utc,
}

impl FromStr for NaiveZone {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "utc" => Ok(Self::Utc),
            other => Err(CoreError::Validation(format!(
                "unknown timestamp zone '{other}', expected 'local' or 'utc'"
            ))),
        }
    }
}

/// Parse a wire timestamp into epoch milliseconds.
///
/// Returns `Ok(None)` for the unset placeholder and
/// [`CoreError::InvalidTimestamp`] when the string matches no known format.
pub fn parse_timestamp(raw: &str, zone: NaiveZone) -> Result<Option<EpochMillis>, CoreError> {
    let raw = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        if with_offset.year() <= PLACEHOLDER_YEAR {
            return Ok(None);
        }
        return Ok(Some(with_offset.timestamp_millis()));
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| CoreError::InvalidTimestamp(raw.to_string()))?;

    if naive.year() <= PLACEHOLDER_YEAR {
        return Ok(None);
    }

    let millis = match zone {
        NaiveZone::Utc => naive.and_utc().timestamp_millis(),
        NaiveZone::Local => Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| CoreError::InvalidTimestamp(format!("{raw} (no such local time)")))?
            .timestamp_millis(),
    };

    Ok(Some(millis))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn utc_millis(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32, ms: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_milli_opt(h, min, s, ms)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    #[test]
    fn naive_iso_with_microseconds() {
        let parsed = parse_timestamp("2024-05-01T12:34:56.123456", NaiveZone::Utc).unwrap();
        assert_eq!(parsed, Some(utc_millis(2024, 5, 1, 12, 34, 56, 123)));
    }

    #[test]
    fn naive_iso_without_fraction() {
        let parsed = parse_timestamp("2024-05-01T12:34:56", NaiveZone::Utc).unwrap();
        assert_eq!(parsed, Some(utc_millis(2024, 5, 1, 12, 34, 56, 0)));
    }

    #[test]
    fn space_separated_form() {
        let parsed = parse_timestamp("2024-05-01 00:00:01", NaiveZone::Utc).unwrap();
        assert_eq!(parsed, Some(utc_millis(2024, 5, 1, 0, 0, 1, 0)));
    }

    #[test]
    fn explicit_offset_wins_over_zone() {
        let parsed = parse_timestamp("2024-05-01T14:00:00+02:00", NaiveZone::Local).unwrap();
        assert_eq!(parsed, Some(utc_millis(2024, 5, 1, 12, 0, 0, 0)));
    }

    #[test]
    fn local_zone_matches_chrono_local() {
        let raw = "2024-05-01T12:00:00";
        let expected = Local
            .from_local_datetime(&NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc)
            .timestamp_millis();
        assert_eq!(parse_timestamp(raw, NaiveZone::Local).unwrap(), Some(expected));
    }

    #[test]
    fn placeholder_is_unset() {
        assert_eq!(parse_timestamp("0001-01-01T00:00:00", NaiveZone::Utc).unwrap(), None);
        assert_eq!(parse_timestamp("0001-01-01T00:00:00", NaiveZone::Local).unwrap(), None);
    }

    #[test]
    fn garbage_is_rejected() {
        assert_matches!(
            parse_timestamp("00:00:00", NaiveZone::Utc),
            Err(CoreError::InvalidTimestamp(_))
        );
        assert_matches!(
            parse_timestamp("", NaiveZone::Utc),
            Err(CoreError::InvalidTimestamp(_))
        );
    }

    #[test]
    fn zone_from_str() {
        assert_eq!("UTC".parse::<NaiveZone>().unwrap(), NaiveZone::Utc);
        assert_eq!(" local ".parse::<NaiveZone>().unwrap(), NaiveZone::Local);
        assert_matches!("mars".parse::<NaiveZone>(), Err(CoreError::Validation(_)));
    }
}
