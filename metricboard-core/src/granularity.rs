//! Granularity catalog: the five calendar units a metric can be charted at.
//!
//! Everything calendar-aware lives here: unit names, parent units, how many
//! ticks fit in one parent window (variable for days), flooring, rounding to
//! the nearest tick, and tick arithmetic. The tables are `const` data, so the
//! catalog is shared freely across threads without locking.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Months, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

/// Output label format for materialized series.
pub const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Request/ingest timestamp format (ISO-8601, UTC).
pub const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A calendar unit. Covers every granularity plus the units either side of
/// the range (year as the parent of month, millisecond as the sub-tick of
/// second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarUnit {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl CalendarUnit {
    pub fn name(self) -> &'static str {
        match self {
            CalendarUnit::Year => "year",
            CalendarUnit::Month => "month",
            CalendarUnit::Day => "day",
            CalendarUnit::Hour => "hour",
            CalendarUnit::Minute => "minute",
            CalendarUnit::Second => "second",
            CalendarUnit::Millisecond => "millisecond",
        }
    }
}

impl fmt::Display for CalendarUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Round-up rule for one granularity: a time whose sub-tick component
/// (measured in `unit`) is at least `at` rounds up to the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundingThreshold {
    pub unit: CalendarUnit,
    pub at: u32,
}

const MONTH_ROUND_UP_DAY: u32 = 15;
const DAY_ROUND_UP_HOUR: u32 = 12;
const HOUR_ROUND_UP_MINUTE: u32 = 30;
const MINUTE_ROUND_UP_SECOND: u32 = 30;
const SECOND_ROUND_UP_MILLI: u32 = 500;

/// Charting granularity, coded `M|D|h|m|s` on the wire and in config files.
///
/// Variants are declared coarse to fine, so `Ord` sorts months first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Granularity {
    #[serde(rename = "M")]
    Month,
    #[serde(rename = "D")]
    Day,
    #[serde(rename = "h")]
    Hour,
    #[serde(rename = "m")]
    Minute,
    #[serde(rename = "s")]
    Second,
}

impl Granularity {
    pub const ALL: [Granularity; 5] = [
        Granularity::Month,
        Granularity::Day,
        Granularity::Hour,
        Granularity::Minute,
        Granularity::Second,
    ];

    /// Parse a single-letter code. Unknown codes are an error, never a default.
    pub fn from_code(code: &str) -> Result<Self, SeriesError> {
        match code {
            "M" => Ok(Granularity::Month),
            "D" => Ok(Granularity::Day),
            "h" => Ok(Granularity::Hour),
            "m" => Ok(Granularity::Minute),
            "s" => Ok(Granularity::Second),
            other => Err(SeriesError::InvalidGranularityCode {
                code: other.to_string(),
            }),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Granularity::Month => "M",
            Granularity::Day => "D",
            Granularity::Hour => "h",
            Granularity::Minute => "m",
            Granularity::Second => "s",
        }
    }

    /// The calendar unit one tick of this granularity spans.
    pub fn unit(self) -> CalendarUnit {
        match self {
            Granularity::Month => CalendarUnit::Month,
            Granularity::Day => CalendarUnit::Day,
            Granularity::Hour => CalendarUnit::Hour,
            Granularity::Minute => CalendarUnit::Minute,
            Granularity::Second => CalendarUnit::Second,
        }
    }

    /// The next-higher unit; one bucket document covers one parent window.
    pub fn parent_unit(self) -> CalendarUnit {
        match self {
            Granularity::Month => CalendarUnit::Year,
            Granularity::Day => CalendarUnit::Month,
            Granularity::Hour => CalendarUnit::Day,
            Granularity::Minute => CalendarUnit::Hour,
            Granularity::Second => CalendarUnit::Minute,
        }
    }

    /// Name of the tick map field in a bucket document (`"minute"` etc).
    pub fn field_name(self) -> &'static str {
        self.unit().name()
    }

    /// Index of the first tick as keyed on the wire. Months and days count
    /// from 1, the clock units from 0.
    pub fn first_tick_index(self) -> u32 {
        match self {
            Granularity::Month | Granularity::Day => 1,
            Granularity::Hour | Granularity::Minute | Granularity::Second => 0,
        }
    }

    pub fn rounding_threshold(self) -> RoundingThreshold {
        match self {
            Granularity::Month => RoundingThreshold {
                unit: CalendarUnit::Day,
                at: MONTH_ROUND_UP_DAY,
            },
            Granularity::Day => RoundingThreshold {
                unit: CalendarUnit::Hour,
                at: DAY_ROUND_UP_HOUR,
            },
            Granularity::Hour => RoundingThreshold {
                unit: CalendarUnit::Minute,
                at: HOUR_ROUND_UP_MINUTE,
            },
            Granularity::Minute => RoundingThreshold {
                unit: CalendarUnit::Second,
                at: MINUTE_ROUND_UP_SECOND,
            },
            Granularity::Second => RoundingThreshold {
                unit: CalendarUnit::Millisecond,
                at: SECOND_ROUND_UP_MILLI,
            },
        }
    }

    /// Number of ticks in the parent window containing `reference`.
    ///
    /// Constant except for days, which follow the month length of
    /// `reference` (including February 29 in leap years).
    pub fn ticks_per_parent(self, reference: DateTime<Utc>) -> u32 {
        match self {
            Granularity::Month => 12,
            Granularity::Day => days_in_month(reference.year(), reference.month()),
            Granularity::Hour => 24,
            Granularity::Minute | Granularity::Second => 60,
        }
    }

    /// Start of the tick containing `time`.
    pub fn floor(self, time: DateTime<Utc>) -> DateTime<Utc> {
        time - into_unit(time, self.unit())
    }

    /// Start of the parent window containing `time`, i.e. the `start` the
    /// backend stamps on the bucket document that holds `time`.
    pub fn parent_start(self, time: DateTime<Utc>) -> DateTime<Utc> {
        time - into_unit(time, self.parent_unit())
    }

    /// Round `time` to the nearest whole tick, rounding up once the sub-tick
    /// component reaches the granularity's threshold.
    pub fn round_to_nearest_tick(self, time: DateTime<Utc>) -> DateTime<Utc> {
        let floored = self.floor(time);
        if self.sub_tick_component(time) >= self.rounding_threshold().at {
            // Only fails at the very end of chrono's range; stay on the floor.
            self.checked_add_ticks(floored, 1).unwrap_or(floored)
        } else {
            floored
        }
    }

    /// `time + n` ticks, or `None` when the result leaves chrono's range.
    ///
    /// Month arithmetic clamps the day-of-month (Jan 31 + 1 → Feb 28/29).
    pub fn checked_add_ticks(self, time: DateTime<Utc>, n: i64) -> Option<DateTime<Utc>> {
        match self {
            Granularity::Month => {
                let months = Months::new(u32::try_from(n.unsigned_abs()).ok()?);
                if n >= 0 {
                    time.checked_add_months(months)
                } else {
                    time.checked_sub_months(months)
                }
            }
            Granularity::Day => time.checked_add_signed(TimeDelta::try_days(n)?),
            Granularity::Hour => time.checked_add_signed(TimeDelta::try_hours(n)?),
            Granularity::Minute => time.checked_add_signed(TimeDelta::try_minutes(n)?),
            Granularity::Second => time.checked_add_signed(TimeDelta::try_seconds(n)?),
        }
    }

    pub fn add_ticks(self, time: DateTime<Utc>, n: i64) -> Result<DateTime<Utc>, SeriesError> {
        self.checked_add_ticks(time, n)
            .ok_or_else(|| SeriesError::TimestampOutOfRange(format!("{time} + {n}{}", self.code())))
    }

    /// Signed whole ticks from `from` to `to`, floored.
    ///
    /// `ticks_between(a, b) == k` means `a + k ticks <= b < a + (k+1) ticks`.
    pub fn ticks_between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
        match self {
            Granularity::Month => {
                let mut k = (i64::from(to.year()) - i64::from(from.year())) * 12
                    + (i64::from(to.month()) - i64::from(from.month()));
                // Day-of-month clamping can leave the estimate off by one.
                while self.checked_add_ticks(from, k).map_or(true, |t| t > to) {
                    k -= 1;
                }
                while self
                    .checked_add_ticks(from, k + 1)
                    .is_some_and(|t| t <= to)
                {
                    k += 1;
                }
                k
            }
            _ => {
                let delta = to - from;
                let nanos = i128::from(delta.num_seconds()) * 1_000_000_000
                    + i128::from(delta.subsec_nanos());
                let tick = match self {
                    Granularity::Day => 86_400_000_000_000_i128,
                    Granularity::Hour => 3_600_000_000_000,
                    Granularity::Minute => 60_000_000_000,
                    _ => 1_000_000_000,
                };
                nanos.div_euclid(tick) as i64
            }
        }
    }

    /// The component of `time` below one tick, in the threshold's unit.
    fn sub_tick_component(self, time: DateTime<Utc>) -> u32 {
        match self {
            Granularity::Month => time.day(),
            Granularity::Day => time.hour(),
            Granularity::Hour => time.minute(),
            Granularity::Minute => time.second(),
            // Leap-second nanos run past 1e9; clamp into the last milli.
            Granularity::Second => (time.nanosecond() / 1_000_000).min(999),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Granularity {
    type Err = SeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Granularity::from_code(s)
    }
}

/// Unit name for a granularity code.
pub fn calendar_unit(code: &str) -> Result<CalendarUnit, SeriesError> {
    Ok(Granularity::from_code(code)?.unit())
}

/// Parent unit for a granularity code.
pub fn parent_unit(code: &str) -> Result<CalendarUnit, SeriesError> {
    Ok(Granularity::from_code(code)?.parent_unit())
}

/// Ticks per parent window for a granularity code.
pub fn ticks_per_parent(code: &str, reference: DateTime<Utc>) -> Result<u32, SeriesError> {
    Ok(Granularity::from_code(code)?.ticks_per_parent(reference))
}

/// Round `time` to the nearest tick of the granularity `code`.
pub fn round_to_nearest_tick(time: DateTime<Utc>, code: &str) -> Result<DateTime<Utc>, SeriesError> {
    Ok(Granularity::from_code(code)?.round_to_nearest_tick(time))
}

/// Format a timestamp as a series label (`YYYY-MM-DD HH:mm:ss`).
pub fn format_label(time: DateTime<Utc>) -> String {
    time.format(LABEL_FORMAT).to_string()
}

/// Format a timestamp for a request path (`YYYY-MM-DDTHH:mm:ssZ`).
pub fn format_iso(time: DateTime<Utc>) -> String {
    time.format(ISO_FORMAT).to_string()
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 31,
    }
}

/// Elapsed time from the start of the enclosing `unit` to `time`.
fn into_unit(time: DateTime<Utc>, unit: CalendarUnit) -> TimeDelta {
    let nanos = TimeDelta::nanoseconds(i64::from(time.nanosecond()));
    let seconds = TimeDelta::seconds(i64::from(time.second())) + nanos;
    let minutes = TimeDelta::minutes(i64::from(time.minute())) + seconds;
    let hours = TimeDelta::hours(i64::from(time.hour())) + minutes;
    match unit {
        CalendarUnit::Millisecond => TimeDelta::nanoseconds(i64::from(time.nanosecond() % 1_000_000)),
        CalendarUnit::Second => nanos,
        CalendarUnit::Minute => seconds,
        CalendarUnit::Hour => minutes,
        CalendarUnit::Day => hours,
        CalendarUnit::Month => TimeDelta::days(i64::from(time.day0())) + hours,
        CalendarUnit::Year => TimeDelta::days(i64::from(time.ordinal0())) + hours,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn codes_round_trip() {
        for g in Granularity::ALL {
            assert_eq!(Granularity::from_code(g.code()).unwrap(), g);
        }
    }

    #[test]
    fn unknown_code_is_rejected() {
        let err = Granularity::from_code("w").unwrap_err();
        assert_eq!(
            err,
            SeriesError::InvalidGranularityCode { code: "w".into() }
        );
        assert!(calendar_unit("").is_err());
        assert!(parent_unit("H").is_err());
    }

    #[test]
    fn units_and_parents() {
        assert_eq!(calendar_unit("M").unwrap(), CalendarUnit::Month);
        assert_eq!(calendar_unit("s").unwrap().name(), "second");
        assert_eq!(parent_unit("M").unwrap(), CalendarUnit::Year);
        assert_eq!(parent_unit("D").unwrap(), CalendarUnit::Month);
        assert_eq!(parent_unit("h").unwrap(), CalendarUnit::Day);
        assert_eq!(parent_unit("m").unwrap(), CalendarUnit::Hour);
        assert_eq!(parent_unit("s").unwrap(), CalendarUnit::Minute);
    }

    #[test]
    fn ticks_per_parent_follows_calendar() {
        let jan = at(2023, 1, 10, 0, 0, 0);
        assert_eq!(ticks_per_parent("M", jan).unwrap(), 12);
        assert_eq!(ticks_per_parent("h", jan).unwrap(), 24);
        assert_eq!(ticks_per_parent("m", jan).unwrap(), 60);
        assert_eq!(ticks_per_parent("s", jan).unwrap(), 60);

        assert_eq!(Granularity::Day.ticks_per_parent(jan), 31);
        assert_eq!(Granularity::Day.ticks_per_parent(at(2023, 4, 1, 0, 0, 0)), 30);
        assert_eq!(Granularity::Day.ticks_per_parent(at(2023, 2, 1, 0, 0, 0)), 28);
        assert_eq!(Granularity::Day.ticks_per_parent(at(2024, 2, 1, 0, 0, 0)), 29);
        assert_eq!(Granularity::Day.ticks_per_parent(at(1900, 2, 1, 0, 0, 0)), 28);
        assert_eq!(Granularity::Day.ticks_per_parent(at(2000, 2, 1, 0, 0, 0)), 29);
    }

    #[test]
    fn floor_and_parent_start() {
        let t = at(2024, 3, 17, 13, 45, 27);
        assert_eq!(Granularity::Month.floor(t), at(2024, 3, 1, 0, 0, 0));
        assert_eq!(Granularity::Day.floor(t), at(2024, 3, 17, 0, 0, 0));
        assert_eq!(Granularity::Hour.floor(t), at(2024, 3, 17, 13, 0, 0));
        assert_eq!(Granularity::Minute.floor(t), at(2024, 3, 17, 13, 45, 0));
        assert_eq!(Granularity::Second.floor(t), t);

        assert_eq!(Granularity::Month.parent_start(t), at(2024, 1, 1, 0, 0, 0));
        assert_eq!(Granularity::Day.parent_start(t), at(2024, 3, 1, 0, 0, 0));
        assert_eq!(Granularity::Hour.parent_start(t), at(2024, 3, 17, 0, 0, 0));
        assert_eq!(Granularity::Minute.parent_start(t), at(2024, 3, 17, 13, 0, 0));
        assert_eq!(Granularity::Second.parent_start(t), at(2024, 3, 17, 13, 45, 0));
    }

    #[test]
    fn rounding_thresholds() {
        assert_eq!(
            round_to_nearest_tick(at(2024, 1, 15, 0, 0, 0), "M").unwrap(),
            at(2024, 2, 1, 0, 0, 0)
        );
        assert_eq!(
            round_to_nearest_tick(at(2024, 1, 14, 23, 59, 59), "M").unwrap(),
            at(2024, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            round_to_nearest_tick(at(2024, 1, 31, 12, 0, 0), "D").unwrap(),
            at(2024, 2, 1, 0, 0, 0)
        );
        assert_eq!(
            round_to_nearest_tick(at(2024, 1, 31, 11, 59, 0), "D").unwrap(),
            at(2024, 1, 31, 0, 0, 0)
        );
        assert_eq!(
            round_to_nearest_tick(at(2024, 1, 1, 23, 30, 0), "h").unwrap(),
            at(2024, 1, 2, 0, 0, 0)
        );
        assert_eq!(
            round_to_nearest_tick(at(2024, 1, 1, 0, 0, 30), "m").unwrap(),
            at(2024, 1, 1, 0, 1, 0)
        );
        assert_eq!(
            round_to_nearest_tick(at(2024, 1, 1, 0, 0, 29), "m").unwrap(),
            at(2024, 1, 1, 0, 0, 0)
        );

        let half = at(2024, 1, 1, 0, 0, 59) + TimeDelta::milliseconds(500);
        assert_eq!(Granularity::Second.round_to_nearest_tick(half), at(2024, 1, 1, 0, 1, 0));
        let under = at(2024, 1, 1, 0, 0, 59) + TimeDelta::milliseconds(499);
        assert_eq!(Granularity::Second.round_to_nearest_tick(under), at(2024, 1, 1, 0, 0, 59));
    }

    #[test]
    fn rounding_aligned_time_is_identity() {
        let t = at(2024, 6, 1, 0, 0, 0);
        for g in Granularity::ALL {
            assert_eq!(g.round_to_nearest_tick(t), t, "{g}");
        }
    }

    #[test]
    fn month_ticks_clamp_day_of_month() {
        let jan31 = at(2024, 1, 31, 0, 0, 0);
        assert_eq!(Granularity::Month.add_ticks(jan31, 1).unwrap(), at(2024, 2, 29, 0, 0, 0));
        assert_eq!(Granularity::Month.add_ticks(jan31, 2).unwrap(), at(2024, 3, 31, 0, 0, 0));
        assert_eq!(Granularity::Month.add_ticks(jan31, -2).unwrap(), at(2023, 11, 30, 0, 0, 0));
    }

    #[test]
    fn ticks_between_floors() {
        let t0 = at(2024, 1, 1, 0, 0, 0);
        assert_eq!(Granularity::Minute.ticks_between(t0, at(2024, 1, 1, 0, 2, 59)), 2);
        assert_eq!(Granularity::Minute.ticks_between(t0, at(2023, 12, 31, 23, 59, 30)), -1);
        assert_eq!(Granularity::Hour.ticks_between(t0, at(2024, 1, 2, 1, 0, 0)), 25);
        assert_eq!(Granularity::Day.ticks_between(t0, at(2024, 3, 1, 0, 0, 0)), 60);
        assert_eq!(Granularity::Second.ticks_between(t0, t0), 0);

        assert_eq!(Granularity::Month.ticks_between(t0, at(2024, 12, 1, 0, 0, 0)), 11);
        assert_eq!(Granularity::Month.ticks_between(t0, at(2023, 12, 1, 0, 0, 0)), -1);
        assert_eq!(Granularity::Month.ticks_between(t0, at(2023, 12, 31, 0, 0, 0)), -1);
        assert_eq!(Granularity::Month.ticks_between(at(2024, 1, 15, 0, 0, 0), at(2024, 2, 14, 0, 0, 0)), 0);
    }

    #[test]
    fn labels_and_iso() {
        let t = at(2024, 1, 1, 0, 1, 0);
        assert_eq!(format_label(t), "2024-01-01 00:01:00");
        assert_eq!(format_iso(t), "2024-01-01T00:01:00Z");
    }

    #[test]
    fn serde_uses_codes() {
        let json = serde_json::to_string(&Granularity::Hour).unwrap();
        assert_eq!(json, "\"h\"");
        let g: Granularity = serde_json::from_str("\"M\"").unwrap();
        assert_eq!(g, Granularity::Month);
        assert!(serde_json::from_str::<Granularity>("\"x\"").is_err());
    }
}
