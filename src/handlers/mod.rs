pub mod admin;
pub mod bookings;
pub mod calendar;
pub mod extract;
pub mod health;
pub mod notifications;
pub mod reviews;
pub mod services;

use chrono::{DateTime, Datelike, NaiveDateTime, SubsecRound, Utc};

use crate::errors::AppError;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const NAIVE_MINUTE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"];
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 1..=9999;

/// Parses a request timestamp into UTC at whole-second precision.
///
/// Accepts RFC 3339 with any offset, or a naive `YYYY-MM-DDTHH:MM[:SS]`
/// (space separator also allowed) taken as UTC. Years outside 1..=9999 are
/// rejected.
pub fn parse_timestamp(field: &str, raw: &str) -> Result<NaiveDateTime, AppError> {
    let raw = raw.trim();
    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => Some(dt.with_timezone(&Utc).naive_utc()),
        Err(_) => NAIVE_FORMATS
            .iter()
            .chain(NAIVE_MINUTE_FORMATS.iter())
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok()),
    };
    let dt = parsed
        .ok_or_else(|| AppError::invalid(field, "expected an RFC 3339 or YYYY-MM-DDTHH:MM timestamp"))?;
    if !YEAR_RANGE.contains(&dt.year()) {
        return Err(AppError::invalid(field, "year must be between 1 and 9999"));
    }
    Ok(dt.trunc_subsecs(0))
}

pub fn parse_optional_timestamp(field: &str, raw: Option<&str>) -> Result<Option<NaiveDateTime>, AppError> {
    raw.filter(|r| !r.trim().is_empty())
        .map(|r| parse_timestamp(field, r))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expected(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_accepted_timestamp_forms() {
        let at = expected("2025-06-02 14:00:00");
        assert_eq!(parse_timestamp("t", "2025-06-02T14:00").unwrap(), at);
        assert_eq!(parse_timestamp("t", "2025-06-02T14:00:00").unwrap(), at);
        assert_eq!(parse_timestamp("t", "2025-06-02 14:00").unwrap(), at);
        assert_eq!(parse_timestamp("t", "2025-06-02T14:00:00Z").unwrap(), at);
        assert_eq!(parse_timestamp("t", "2025-06-02T16:00:00+02:00").unwrap(), at);
        assert_eq!(parse_timestamp("t", "2025-06-02T14:00:00.750Z").unwrap(), at);
    }

    #[test]
    fn test_rejects_garbage() {
        match parse_timestamp("scheduled_at", "next tuesday") {
            Err(AppError::Validation { fields, .. }) => assert!(fields.contains_key("scheduled_at")),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert_eq!(parse_optional_timestamp("from", Some("  ")).unwrap(), None);
    }

    #[test]
    fn test_rejects_years_out_of_range() {
        for raw in ["+262142-12-31T23:30", "+10000-01-01T00:00:00Z", "0000-06-01T10:00"] {
            match parse_timestamp("scheduled_at", raw) {
                Err(AppError::Validation { fields, .. }) => assert!(fields.contains_key("scheduled_at")),
                other => panic!("expected validation error for {raw}, got {other:?}"),
            }
        }
        assert!(parse_timestamp("scheduled_at", "9999-12-31T23:00").is_ok());
    }
}
