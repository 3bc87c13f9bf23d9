//! Recurrence intervals for scheduled jobs.
//!
//! An interval is a `(unit, magnitude)` pair. Months and years are fixed-length
//! approximations: a month is 30 days and a year is 365 days.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Upper bound on single-step catch-up iterations before jumping arithmetically.
const MAX_CATCH_UP_STEPS: u32 = 1024;

/// Errors that can occur when building an interval.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntervalError {
    /// Unknown interval unit.
    #[error("invalid interval unit: {0}")]
    InvalidUnit(String),

    /// Zero or negative magnitude.
    #[error("interval magnitude must be positive, got {0}")]
    NonPositive(i64),

    /// Magnitude too large to represent.
    #[error("interval of {every} {unit}(s) is out of range")]
    OutOfRange { unit: IntervalUnit, every: i64 },
}

/// Unit of a recurrence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// Approximated as 30 days.
    Month,
    /// Approximated as 365 days.
    Year,
}

impl IntervalUnit {
    /// Length of one unit in seconds.
    pub fn seconds(self) -> i64 {
        match self {
            IntervalUnit::Second => 1,
            IntervalUnit::Minute => 60,
            IntervalUnit::Hour => 3_600,
            IntervalUnit::Day => 86_400,
            IntervalUnit::Month => 30 * 86_400,
            IntervalUnit::Year => 365 * 86_400,
        }
    }

    /// Lowercase singular name.
    pub fn as_str(self) -> &'static str {
        match self {
            IntervalUnit::Second => "second",
            IntervalUnit::Minute => "minute",
            IntervalUnit::Hour => "hour",
            IntervalUnit::Day => "day",
            IntervalUnit::Month => "month",
            IntervalUnit::Year => "year",
        }
    }
}

impl FromStr for IntervalUnit {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(IntervalUnit::Second),
            "m" | "min" | "minute" | "minutes" => Ok(IntervalUnit::Minute),
            "h" | "hour" | "hours" => Ok(IntervalUnit::Hour),
            "d" | "day" | "days" => Ok(IntervalUnit::Day),
            "month" | "months" => Ok(IntervalUnit::Month),
            "y" | "year" | "years" => Ok(IntervalUnit::Year),
            _ => Err(IntervalError::InvalidUnit(s.to_string())),
        }
    }
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fixed recurrence interval such as "every 6 hours".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    unit: IntervalUnit,
    every: u32,
}

impl Interval {
    /// Create an interval, rejecting zero or negative magnitudes.
    pub fn new(unit: IntervalUnit, every: i64) -> Result<Self, IntervalError> {
        if every <= 0 {
            return Err(IntervalError::NonPositive(every));
        }
        let every_u32 =
            u32::try_from(every).map_err(|_| IntervalError::OutOfRange { unit, every })?;
        // Must be representable as a chrono::Duration.
        unit.seconds()
            .checked_mul(every)
            .and_then(Duration::try_seconds)
            .ok_or(IntervalError::OutOfRange { unit, every })?;

        Ok(Self {
            unit,
            every: every_u32,
        })
    }

    /// Parse an interval from a unit name and magnitude.
    pub fn parse(unit: &str, every: i64) -> Result<Self, IntervalError> {
        Self::new(unit.parse()?, every)
    }

    /// Shorthand constructors.
    pub fn seconds(every: u32) -> Result<Self, IntervalError> {
        Self::new(IntervalUnit::Second, every.into())
    }

    pub fn minutes(every: u32) -> Result<Self, IntervalError> {
        Self::new(IntervalUnit::Minute, every.into())
    }

    pub fn hours(every: u32) -> Result<Self, IntervalError> {
        Self::new(IntervalUnit::Hour, every.into())
    }

    pub fn days(every: u32) -> Result<Self, IntervalError> {
        Self::new(IntervalUnit::Day, every.into())
    }

    /// Get the unit.
    pub fn unit(&self) -> IntervalUnit {
        self.unit
    }

    /// Get the magnitude.
    pub fn every(&self) -> u32 {
        self.every
    }

    /// Total length of the interval.
    pub fn as_duration(&self) -> Duration {
        Duration::seconds(self.unit.seconds() * i64::from(self.every))
    }

    /// Earliest time at or after `now` on the grid `last_run + k * interval`, `k >= 1`.
    ///
    /// A job that missed several cycles fires once at the next grid point rather
    /// than once per missed cycle. Returns [`DateTime::<Utc>::MAX_UTC`] if the
    /// next occurrence is beyond the representable range.
    pub fn next_after(&self, last_run: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.as_duration();
        let Some(mut next) = last_run.checked_add_signed(step) else {
            return DateTime::<Utc>::MAX_UTC;
        };

        let mut steps = 0;
        while next < now {
            if steps == MAX_CATCH_UP_STEPS {
                return self.jump_forward(next, now);
            }
            next = match next.checked_add_signed(step) {
                Some(t) => t,
                None => return DateTime::<Utc>::MAX_UTC,
            };
            steps += 1;
        }

        next
    }

    /// Skip `next` forward by whole intervals until it is no longer before `now`.
    fn jump_forward(&self, next: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        let step_ms = self.as_duration().num_milliseconds();
        let behind_ms = (now - next).num_milliseconds();
        // ceil(behind / step), computed without floating point
        let cycles = (behind_ms + step_ms - 1) / step_ms;
        let mut next = cycles
            .checked_mul(step_ms)
            .and_then(Duration::try_milliseconds)
            .and_then(|d| next.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        // Sub-millisecond residue can leave us just short of `now`.
        if next < now {
            next = next
                .checked_add_signed(self.as_duration())
                .unwrap_or(DateTime::<Utc>::MAX_UTC);
        }
        next
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.every == 1 {
            write!(f, "every {}", self.unit)
        } else {
            write!(f, "every {} {}s", self.every, self.unit)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unit_lengths() {
        assert_eq!(IntervalUnit::Second.seconds(), 1);
        assert_eq!(IntervalUnit::Month.seconds(), 30 * 86_400);
        assert_eq!(IntervalUnit::Year.seconds(), 365 * 86_400);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!("minute".parse::<IntervalUnit>(), Ok(IntervalUnit::Minute));
        assert_eq!("Hours".parse::<IntervalUnit>(), Ok(IntervalUnit::Hour));
        assert_eq!("month".parse::<IntervalUnit>(), Ok(IntervalUnit::Month));
        assert!(matches!(
            "fortnight".parse::<IntervalUnit>(),
            Err(IntervalError::InvalidUnit(_))
        ));
    }

    #[test]
    fn test_zero_and_negative_rejected() {
        assert_eq!(
            Interval::new(IntervalUnit::Minute, 0),
            Err(IntervalError::NonPositive(0))
        );
        assert_eq!(
            Interval::new(IntervalUnit::Minute, -5),
            Err(IntervalError::NonPositive(-5))
        );
    }

    #[test]
    fn test_out_of_range_rejected() {
        let result = Interval::new(IntervalUnit::Year, i64::from(u32::MAX) + 1);
        assert!(matches!(result, Err(IntervalError::OutOfRange { .. })));
    }

    #[test]
    fn test_next_after_adds_one_interval() {
        let interval = Interval::minutes(2).unwrap();
        let next = interval.next_after(base(), base());

        assert_eq!(next, base() + Duration::minutes(2));
    }

    #[test]
    fn test_next_after_skips_missed_cycles() {
        let interval = Interval::minutes(2).unwrap();
        // Process slept for 7 minutes: grid points are +2, +4, +6, +8.
        let now = base() + Duration::minutes(7);
        let next = interval.next_after(base(), now);

        assert_eq!(next, base() + Duration::minutes(8));
    }

    #[test]
    fn test_next_after_exact_grid_point_is_due() {
        let interval = Interval::hours(6).unwrap();
        let now = base() + Duration::hours(12);

        assert_eq!(interval.next_after(base(), now), now);
    }

    #[test]
    fn test_next_after_long_outage_uses_jump() {
        let interval = Interval::seconds(1).unwrap();
        // Far more missed cycles than the step cap.
        let now = base() + Duration::days(30) + Duration::milliseconds(500);
        let next = interval.next_after(base(), now);

        assert!(next >= now);
        assert!(next - now < Duration::seconds(1));
        assert_eq!((next - base()).num_milliseconds() % 1000, 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Interval::days(1).unwrap().to_string(), "every day");
        assert_eq!(Interval::hours(6).unwrap().to_string(), "every 6 hours");
    }

    #[test]
    fn test_interval_serialization() {
        let interval = Interval::new(IntervalUnit::Month, 3).unwrap();
        let json = serde_json::to_string(&interval).expect("serialize");
        assert_eq!(json, r#"{"unit":"month","every":3}"#);
    }
}
