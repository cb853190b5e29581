//! Derives "today" for callers that need the current date.
//!
//! The engine itself never reads the clock; this is the single place where
//! the configured UTC offset turns an instant into a calendar date.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::config::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    offset: FixedOffset,
}

impl Default for Clock {
    fn default() -> Self {
        Self::utc()
    }
}

impl Clock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn today(&self) -> NaiveDate {
        self.date_at(Utc::now())
    }

    /// Calendar date of `instant` in this clock's offset.
    pub fn date_at(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

/// Parse `Z`, `UTC`, `+05:30`, `-0800` or `+02` into a fixed offset.
pub fn parse_utc_offset(s: &str) -> Result<FixedOffset, ConfigError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("z") || s.eq_ignore_ascii_case("utc") {
        return Ok(Clock::utc().offset());
    }

    let invalid = || ConfigError::InvalidUtcOffset(s.to_string());

    let (sign, rest) = match s.as_bytes().first() {
        Some(b'+') => (1, &s[1..]),
        Some(b'-') => (-1, &s[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_common_offset_forms() {
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19_800);
        assert_eq!(parse_utc_offset("-0800").unwrap().local_minus_utc(), -28_800);
        assert_eq!(parse_utc_offset("+02").unwrap().local_minus_utc(), 7_200);
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("utc").unwrap().local_minus_utc(), 0);
    }

    #[test]
    fn rejects_malformed_offsets() {
        for bad in ["", "05:30", "+5:3", "+24:00", "+05:60", "+ab:cd", "+053000"] {
            assert!(parse_utc_offset(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn date_depends_on_offset() {
        let instant = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();
        assert_eq!(
            Clock::utc().date_at(instant),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        let ist = Clock::new(parse_utc_offset("+05:30").unwrap());
        assert_eq!(ist.date_at(instant), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }
}
