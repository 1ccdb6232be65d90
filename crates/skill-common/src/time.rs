//! Time handling: rounding, periods and resampling frequencies.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{SkillError, SkillResult};

/// Timestamps are rounded to this resolution at every construction boundary.
pub const TIME_RESOLUTION_NANOS: i64 = 100_000;

/// Round a timestamp to the nearest 100 µs, ties to even.
///
/// Timestamps outside the nanosecond-representable range (years 1677..2262)
/// are returned unchanged.
pub fn round_to_resolution(t: NaiveDateTime) -> NaiveDateTime {
    let Some(nanos) = t.and_utc().timestamp_nanos_opt() else {
        return t;
    };
    let step = TIME_RESOLUTION_NANOS;
    let mut q = nanos.div_euclid(step);
    let r = nanos.rem_euclid(step);
    if r * 2 > step || (r * 2 == step && q % 2 != 0) {
        q += 1;
    }
    DateTime::from_timestamp_nanos(q * step).naive_utc()
}

/// Parse an ISO 8601 timestamp. A timezone offset, if present, is converted to UTC.
pub fn parse_datetime(s: &str) -> SkillResult<NaiveDateTime> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_utc());
    }

    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ndt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }

    Err(SkillError::invalid_value(format!("cannot parse '{s}' as a timestamp")))
}

/// Convert fractional seconds to a Duration with microsecond precision.
pub fn duration_from_secs_f64(secs: f64) -> SkillResult<Duration> {
    if !secs.is_finite() {
        return Err(SkillError::invalid_value(format!("duration must be finite, got {secs}")));
    }
    Ok(Duration::microseconds((secs * 1e6).round() as i64))
}

/// A closed time interval [start, end].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Period {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> SkillResult<Self> {
        if end < start {
            return Err(SkillError::invalid_value(format!(
                "period end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Period spanning the first and last entries of a sorted time axis.
    pub fn of_sorted(time: &[NaiveDateTime]) -> Option<Self> {
        Some(Self {
            start: *time.first()?,
            end: *time.last()?,
        })
    }

    pub fn contains(&self, t: &NaiveDateTime) -> bool {
        t >= &self.start && t <= &self.end
    }

    pub fn overlaps(&self, other: &Period) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Smallest period covering both.
    pub fn union(&self, other: &Period) -> Period {
        Period {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

/// Unit of a resampling frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FreqUnit {
    Second,
    Minute,
    Hour,
    Day,
    /// Weeks ending on Sunday, labelled by the Sunday.
    Week,
    MonthStart,
    MonthEnd,
    QuarterStart,
    QuarterEnd,
    YearStart,
    YearEnd,
}

/// A resampling frequency such as "D", "6h" or "MS".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frequency {
    pub count: u32,
    pub unit: FreqUnit,
}

impl Frequency {
    pub fn new(count: u32, unit: FreqUnit) -> SkillResult<Self> {
        if count == 0 {
            return Err(SkillError::invalid_value("frequency count must be positive"));
        }
        Ok(Self { count, unit })
    }

    /// Label of the bucket containing `t`.
    ///
    /// Fixed-width buckets (seconds to days) start at `origin`, which callers
    /// set to midnight of the first timestamp in the data.
    pub fn bucket(&self, t: NaiveDateTime, origin: NaiveDateTime) -> NaiveDateTime {
        let n = self.count as i64;
        match self.unit {
            FreqUnit::Second => fixed_bucket(t, origin, 1_000 * n),
            FreqUnit::Minute => fixed_bucket(t, origin, 60_000 * n),
            FreqUnit::Hour => fixed_bucket(t, origin, 3_600_000 * n),
            FreqUnit::Day => fixed_bucket(t, origin, 86_400_000 * n),
            FreqUnit::Week => {
                let date = t.date();
                let to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
                let sunday = date + Duration::days(to_sunday);
                let weeks = (sunday - epoch_sunday()).num_days().div_euclid(7);
                // ceil to a multiple of n
                let k = -((-weeks).div_euclid(n)) * n;
                (epoch_sunday() + Duration::days(7 * k)).and_time(chrono::NaiveTime::MIN)
            }
            FreqUnit::MonthStart => month_bucket(t, n, false),
            FreqUnit::MonthEnd => month_bucket(t, n, true),
            FreqUnit::QuarterStart => month_bucket(t, 3 * n, false),
            FreqUnit::QuarterEnd => month_bucket(t, 3 * n, true),
            FreqUnit::YearStart => month_bucket(t, 12 * n, false),
            FreqUnit::YearEnd => month_bucket(t, 12 * n, true),
        }
    }
}

fn epoch_sunday() -> NaiveDate {
    // 1970-01-04 was a Sunday
    NaiveDate::from_ymd_opt(1970, 1, 4).unwrap_or(NaiveDate::MIN)
}

fn fixed_bucket(t: NaiveDateTime, origin: NaiveDateTime, width_ms: i64) -> NaiveDateTime {
    let offset = (t - origin).num_milliseconds();
    origin + Duration::milliseconds(offset.div_euclid(width_ms) * width_ms)
}

fn first_of_month(month_index: i64) -> NaiveDate {
    let year = month_index.div_euclid(12) as i32;
    let month = month_index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

/// Calendar buckets of `months` months, aligned to January of year zero.
fn month_bucket(t: NaiveDateTime, months: i64, label_end: bool) -> NaiveDateTime {
    let index = t.year() as i64 * 12 + t.month0() as i64;
    let start = index.div_euclid(months) * months;
    let date = if label_end {
        first_of_month(start + months).pred_opt().unwrap_or(NaiveDate::MIN)
    } else {
        first_of_month(start)
    };
    date.and_time(chrono::NaiveTime::MIN)
}

/// Midnight of the day containing `t`.
pub fn start_of_day(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_time(chrono::NaiveTime::MIN)
}

impl FromStr for Frequency {
    type Err = SkillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, alias) = s.split_at(split);
        let count = if digits.is_empty() {
            1
        } else {
            digits
                .parse()
                .map_err(|_| SkillError::invalid_value(format!("invalid frequency count in '{s}'")))?
        };
        let unit = match alias {
            "s" | "S" => FreqUnit::Second,
            "min" | "T" => FreqUnit::Minute,
            "h" | "H" => FreqUnit::Hour,
            "D" | "d" => FreqUnit::Day,
            "W" | "W-SUN" => FreqUnit::Week,
            "MS" => FreqUnit::MonthStart,
            "M" | "ME" => FreqUnit::MonthEnd,
            "QS" => FreqUnit::QuarterStart,
            "Q" | "QE" => FreqUnit::QuarterEnd,
            "YS" | "AS" => FreqUnit::YearStart,
            "Y" | "A" | "YE" => FreqUnit::YearEnd,
            _ => return Err(SkillError::invalid_value(format!("unknown frequency '{s}'"))),
        };
        Frequency::new(count, unit)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let alias = match self.unit {
            FreqUnit::Second => "s",
            FreqUnit::Minute => "min",
            FreqUnit::Hour => "h",
            FreqUnit::Day => "D",
            FreqUnit::Week => "W",
            FreqUnit::MonthStart => "MS",
            FreqUnit::MonthEnd => "M",
            FreqUnit::QuarterStart => "QS",
            FreqUnit::QuarterEnd => "Q",
            FreqUnit::YearStart => "YS",
            FreqUnit::YearEnd => "Y",
        };
        if self.count == 1 {
            f.write_str(alias)
        } else {
            write!(f, "{}{}", self.count, alias)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_datetime(s).unwrap()
    }

    #[test]
    fn test_round_to_100us() {
        let t = ts("2019-01-01T00:00:00.000049");
        assert_eq!(round_to_resolution(t), ts("2019-01-01T00:00:00"));
        let t = ts("2019-01-01T00:00:00.000051");
        assert_eq!(round_to_resolution(t), ts("2019-01-01T00:00:00.0001"));
        // tie goes to even
        let t = ts("2019-01-01T00:00:00.00015");
        assert_eq!(round_to_resolution(t), ts("2019-01-01T00:00:00.0002"));
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!(ts("2019-01-01"), ts("2019-01-01T00:00:00"));
        assert_eq!(ts("2019-01-01 12:30"), ts("2019-01-01T12:30:00"));
        assert_eq!(ts("2019-01-01T12:00:00+01:00"), ts("2019-01-01T11:00:00"));
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn test_period() {
        let p = Period::new(ts("2019-01-01"), ts("2019-01-05")).unwrap();
        assert!(p.contains(&ts("2019-01-05")));
        assert!(!p.contains(&ts("2019-01-06")));
        let q = Period::new(ts("2019-01-04"), ts("2019-01-09")).unwrap();
        assert!(p.overlaps(&q));
        assert_eq!(p.union(&q).end, ts("2019-01-09"));
        assert!(Period::new(ts("2019-01-05"), ts("2019-01-01")).is_err());
    }

    #[test]
    fn test_parse_frequency() {
        assert_eq!("D".parse::<Frequency>().unwrap(), Frequency::new(1, FreqUnit::Day).unwrap());
        assert_eq!("6h".parse::<Frequency>().unwrap(), Frequency::new(6, FreqUnit::Hour).unwrap());
        assert_eq!("MS".parse::<Frequency>().unwrap().unit, FreqUnit::MonthStart);
        assert!("0D".parse::<Frequency>().is_err());
        assert!("fortnight".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_buckets() {
        let origin = ts("2019-01-01");
        let six_hourly: Frequency = "6h".parse().unwrap();
        assert_eq!(six_hourly.bucket(ts("2019-01-01T13:20"), origin), ts("2019-01-01T12:00"));

        let monthly_end: Frequency = "M".parse().unwrap();
        assert_eq!(monthly_end.bucket(ts("2019-02-10"), origin), ts("2019-02-28"));

        let monthly_start: Frequency = "MS".parse().unwrap();
        assert_eq!(monthly_start.bucket(ts("2019-02-10"), origin), ts("2019-02-01"));

        // 2019-01-02 was a Wednesday
        let weekly: Frequency = "W".parse().unwrap();
        assert_eq!(weekly.bucket(ts("2019-01-02T10:00"), origin), ts("2019-01-06"));

        let quarterly: Frequency = "QS".parse().unwrap();
        assert_eq!(quarterly.bucket(ts("2019-05-17"), origin), ts("2019-04-01"));
    }
}
