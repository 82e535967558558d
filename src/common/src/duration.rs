//! Day-aware duration parsing for retention settings.
//!
//! Retention intervals and policy durations are configured as strings such
//! as `"30s"`, `"10m"` or `"3d10h"`. Spans may be concatenated and the day
//! unit is accepted next to the usual `ns`/`us`/`ms`/`s`/`m`/`h` units.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("invalid duration '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

/// Parse a duration string that may carry a day unit.
///
/// An empty string parses to zero. Negative inputs (`"-1s"`) are valid but
/// collapse to zero, since every caller treats a non-positive duration as
/// "disabled".
pub fn parse_duration_with_day(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(Duration::ZERO);
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    if body.is_empty() {
        return Err(DurationParseError::Invalid {
            input: input.to_string(),
            reason: "missing value".to_string(),
        });
    }

    // A bare zero is the only unit-less value accepted.
    if body == "0" {
        return Ok(Duration::ZERO);
    }

    let parsed = humantime::parse_duration(body).map_err(|e| DurationParseError::Invalid {
        input: input.to_string(),
        reason: e.to_string(),
    })?;

    if negative {
        return Ok(Duration::ZERO);
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_units() {
        assert_eq!(
            parse_duration_with_day("10m").unwrap(),
            Duration::from_secs(600)
        );
        assert_eq!(
            parse_duration_with_day("1h30m").unwrap(),
            Duration::from_secs(5400)
        );
        assert_eq!(
            parse_duration_with_day("250ms").unwrap(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn parses_day_unit() {
        let expected = Duration::from_secs(3 * 86_400 + 10 * 3_600);
        assert_eq!(parse_duration_with_day("3d10h").unwrap(), expected);
        assert_eq!(
            parse_duration_with_day("7d").unwrap(),
            Duration::from_secs(7 * 86_400)
        );
    }

    #[test]
    fn empty_and_zero_are_zero() {
        assert_eq!(parse_duration_with_day("").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration_with_day("   ").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration_with_day("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration_with_day("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn negative_collapses_to_zero() {
        assert_eq!(parse_duration_with_day("-1s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration_with_day("-3d").unwrap(), Duration::ZERO);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_duration_with_day("abc"),
            Err(DurationParseError::Invalid { .. })
        ));
        assert!(parse_duration_with_day("-").is_err());
        assert!(parse_duration_with_day("10").is_err());
        assert!(parse_duration_with_day("-abc").is_err());
    }
}
