//! Duration strings on the wire.
//!
//! The API exchanges durations as `<digits><unit>` strings with unit
//! `ms`, `s`, `m` or `h`, or the literal `"0"`. Responses render
//! durations with three decimal places, in milliseconds below five
//! seconds and in seconds at or above.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

static DURATION_EXPR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(ms|s|m|h)$").expect("invalid duration regex"));

/// A duration string failed to parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid duration: {0:?}")]
pub struct InvalidDuration(pub String);

/// Parses a duration string.
pub fn parse_duration(raw: &str) -> Result<Duration, InvalidDuration> {
    // Handle the special case of a zero duration.
    if raw == "0" {
        return Ok(Duration::ZERO);
    }

    let invalid = || InvalidDuration(raw.to_string());

    let caps = DURATION_EXPR.captures(raw).ok_or_else(invalid)?;
    let value: u64 = caps[1].parse().map_err(|_| invalid())?;

    match &caps[2] {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => value
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(invalid),
        "h" => value
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

/// Formats a duration for API responses.
pub fn format_duration(dur: Duration) -> String {
    if dur >= Duration::from_secs(5) {
        format!("{:.3}s", dur.as_secs_f64())
    } else {
        format!("{:.3}ms", dur.as_secs_f64() * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_durations() {
        for (raw, expected) in [
            ("0", Duration::ZERO),
            ("0ms", Duration::ZERO),
            ("250ms", Duration::from_millis(250)),
            ("5s", Duration::from_secs(5)),
            ("3m", Duration::from_secs(180)),
            ("2h", Duration::from_secs(7200)),
        ] {
            assert_eq!(parse_duration(raw), Ok(expected), "parsing {raw:?}");
        }
    }

    #[test]
    fn rejects_invalid_durations() {
        for raw in ["", "1", "00", "1d", "ms", "-1s", "1.5s", "1 s", "1m2s"] {
            assert_eq!(
                parse_duration(raw),
                Err(InvalidDuration(raw.to_string())),
                "parsing {raw:?}",
            );
        }
    }

    #[test]
    fn formats_short_durations_as_milliseconds() {
        assert_eq!(format_duration(Duration::ZERO), "0.000ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500.000ms");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.500ms");
    }

    #[test]
    fn formats_long_durations_as_seconds() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5.000s");
        assert_eq!(format_duration(Duration::from_millis(72_250)), "72.250s");
    }
}
