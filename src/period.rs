//! Chart period alignment.
//!
//! A period kind plus a reference point resolves to an aligned start, a
//! fixed bucket count and a fixed bucket width. Month and year buckets are
//! calendar approximations (30 days, 30-day "months") so every chart of a
//! given period has the same number of points.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::Day, Period::Week, Period::Month, Period::Year];

    pub fn sample_count(self) -> usize {
        match self {
            Period::Day => 24,
            Period::Week => 7,
            Period::Month => 30,
            Period::Year => 12,
        }
    }

    pub fn interval(self) -> Duration {
        match self {
            Period::Day => Duration::hours(1),
            Period::Week | Period::Month => Duration::days(1),
            Period::Year => Duration::days(30),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "year" => Ok(Period::Year),
            other => Err(Error::invalid(format!("unknown period '{}'", other))),
        }
    }
}

/// Aligned bucket layout for one chart
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodWindow<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub sample_count: usize,
    pub interval: Duration,
}

impl<Tz: TimeZone> PeriodWindow<Tz> {
    pub fn interval_millis(&self) -> i64 {
        self.interval.num_milliseconds()
    }

    /// Timestamp of bucket `index`, computed as `start + index * interval`.
    pub fn timestamp(&self, index: usize) -> DateTime<Tz> {
        self.start.clone() + self.interval * index as i32
    }

    pub fn timestamps(&self) -> impl Iterator<Item = DateTime<Tz>> + '_ {
        (0..self.sample_count).map(move |i| self.timestamp(i))
    }

    /// Exclusive end of the last bucket
    pub fn end(&self) -> DateTime<Tz> {
        self.timestamp(self.sample_count)
    }
}

/// Resolves `period` around `reference`, interpreted in the reference's own time zone.
pub fn resolve<Tz: TimeZone>(period: Period, reference: &DateTime<Tz>) -> Result<PeriodWindow<Tz>> {
    let date = reference.date_naive();

    let aligned = match period {
        Period::Day => date,
        Period::Week => {
            let weekday = date.weekday().num_days_from_sunday() as i64;
            let offset = if weekday == 0 { -6 } else { 1 - weekday };
            date + Duration::days(offset)
        }
        Period::Month => date
            .with_day(1)
            .ok_or_else(|| Error::invalid(format!("no first day for {}", date)))?,
        Period::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)
            .ok_or_else(|| Error::invalid(format!("no January 1st in {}", date.year())))?,
    };

    Ok(PeriodWindow {
        start: local_midnight(&reference.timezone(), aligned)?,
        sample_count: period.sample_count(),
        interval: period.interval(),
    })
}

/// Start of `date` in `tz`. A midnight skipped by a DST jump becomes 01:00.
pub fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .ok_or_else(|| Error::invalid(format!("{} has no valid local midnight", date)))
}

/// Converts a date-picker value into a reference point for `period`.
///
/// Accepted formats are `YYYY-MM-DD` (day), `YYYY-Www` (week), `YYYY-MM`
/// (month) and `YYYY` (year).
pub fn parse_reference<Tz: TimeZone>(tz: &Tz, period: Period, value: &str) -> Result<DateTime<Tz>> {
    let value = value.trim();
    let date = match period {
        Period::Day => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|e| Error::invalid(format!("invalid date '{}': {}", value, e)))?,
        Period::Week => {
            let (year, week) = value
                .split_once("-W")
                .ok_or_else(|| Error::invalid(format!("invalid week '{}', expected YYYY-Www", value)))?;
            let year = parse_year(year)?;
            let week = parse_number(week, 2, "week")?;
            if !(1..=53).contains(&week) {
                return Err(Error::invalid(format!("week {} out of range", week)));
            }
            first_of_year(year)? + Duration::days((week as i64 - 1) * 7)
        }
        Period::Month => {
            let (year, month) = value
                .split_once('-')
                .ok_or_else(|| Error::invalid(format!("invalid month '{}', expected YYYY-MM", value)))?;
            let year = parse_year(year)?;
            let month = parse_number(month, 2, "month")?;
            NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| Error::invalid(format!("month {} out of range", month)))?
        }
        Period::Year => first_of_year(parse_year(value)?)?,
    };

    local_midnight(tz, date)
}

/// Default date-picker value for `period` on `date`.
pub fn selection_value(period: Period, date: NaiveDate) -> String {
    match period {
        Period::Day => date.format("%Y-%m-%d").to_string(),
        Period::Week => week_string(date),
        Period::Month => date.format("%Y-%m").to_string(),
        Period::Year => date.format("%Y").to_string(),
    }
}

/// Week label in `YYYY-Www` form, counting weeks from January 1st of the
/// same year: `ceil((day_of_year0 + weekday(jan1) + 1) / 7)`.
pub fn week_string(date: NaiveDate) -> String {
    let jan1 = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
    let days = (date - jan1).num_days();
    let lead = jan1.weekday().num_days_from_sunday() as i64;
    let week = (days + lead + 1 + 6) / 7;
    format!("{}-W{:02}", date.year(), week)
}

fn first_of_year(year: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1).ok_or_else(|| Error::invalid(format!("year {} out of range", year)))
}

fn parse_year(s: &str) -> Result<i32> {
    Ok(parse_number(s, 4, "year")? as i32)
}

fn parse_number(s: &str, digits: usize, what: &str) -> Result<u32> {
    if s.len() != digits || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::invalid(format!("invalid {} '{}'", what, s)));
    }
    s.parse()
        .map_err(|_| Error::invalid(format!("invalid {} '{}'", what, s)))
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Timelike, Utc};

    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_sample_counts_and_intervals() {
        let counts: Vec<usize> = Period::ALL.iter().map(|p| p.sample_count()).collect();
        assert_eq!(counts, vec![24, 7, 30, 12]);
        assert_eq!(Period::Day.interval().num_milliseconds(), 3_600_000);
        assert_eq!(Period::Week.interval().num_milliseconds(), 86_400_000);
        assert_eq!(Period::Month.interval().num_milliseconds(), 86_400_000);
        assert_eq!(Period::Year.interval().num_milliseconds(), 30 * 86_400_000);
    }

    #[test]
    fn test_day_truncates_to_midnight() {
        let window = resolve(Period::Day, &utc(2024, 6, 15, 17, 45)).unwrap();
        assert_eq!(window.start, utc(2024, 6, 15, 0, 0));
        assert_eq!(window.timestamps().last().unwrap(), utc(2024, 6, 15, 23, 0));
        assert_eq!(window.end(), utc(2024, 6, 16, 0, 0));
    }

    #[test]
    fn test_day_uses_reference_time_zone() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        // 2024-06-14T23:30Z is already the 15th at +02:00.
        let reference = utc(2024, 6, 14, 23, 30).with_timezone(&tz);
        let window = resolve(Period::Day, &reference).unwrap();
        assert_eq!(window.start, tz.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap());
        assert_eq!(window.start.with_timezone(&Utc), utc(2024, 6, 14, 22, 0));
    }

    #[test]
    fn test_week_from_wednesday() {
        let window = resolve(Period::Week, &utc(2024, 6, 12, 9, 30)).unwrap();
        assert_eq!(window.start, utc(2024, 6, 10, 0, 0));
        assert_eq!(window.sample_count, 7);
    }

    #[test]
    fn test_week_from_sunday_goes_back() {
        let window = resolve(Period::Week, &utc(2024, 6, 16, 12, 0)).unwrap();
        assert_eq!(window.start, utc(2024, 6, 10, 0, 0));
    }

    #[test]
    fn test_week_from_monday_stays() {
        let window = resolve(Period::Week, &utc(2024, 6, 10, 0, 0)).unwrap();
        assert_eq!(window.start, utc(2024, 6, 10, 0, 0));
    }

    #[test]
    fn test_month_aligns_to_first() {
        for day in [1, 15, 31] {
            let window = resolve(Period::Month, &utc(2024, 3, day, 8, 0)).unwrap();
            assert_eq!(window.start, utc(2024, 3, 1, 0, 0));
            assert_eq!(window.sample_count, 30);
        }
    }

    #[test]
    fn test_year_uses_thirty_day_buckets() {
        let window = resolve(Period::Year, &utc(2024, 6, 15, 0, 0)).unwrap();
        assert_eq!(window.start, utc(2024, 1, 1, 0, 0));
        assert_eq!(window.interval_millis(), 2_592_000_000);
        // 11 * 30 days after January 1st of a leap year
        assert_eq!(window.timestamp(11), utc(2024, 11, 26, 0, 0));
    }

    #[test]
    fn test_unknown_period_is_rejected() {
        let err = "fortnight".parse::<Period>().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!("WEEK".parse::<Period>().unwrap(), Period::Week);
    }

    #[test]
    fn test_parse_day_and_month() {
        let day = parse_reference(&Utc, Period::Day, "2024-06-15").unwrap();
        assert_eq!(day, utc(2024, 6, 15, 0, 0));

        let month = parse_reference(&Utc, Period::Month, "2024-03").unwrap();
        assert_eq!(month, utc(2024, 3, 1, 0, 0));
        assert_eq!(month.hour(), 0);
    }

    #[test]
    fn test_parse_week_and_year() {
        let week = parse_reference(&Utc, Period::Week, "2024-W24").unwrap();
        assert_eq!(week, utc(2024, 6, 10, 0, 0));

        let year = parse_reference(&Utc, Period::Year, "2023").unwrap();
        assert_eq!(year, utc(2023, 1, 1, 0, 0));
    }

    #[test]
    fn test_parse_rejects_malformed_values() {
        for (period, value) in [
            (Period::Day, "2024-02-30"),
            (Period::Day, "yesterday"),
            (Period::Week, "2024-24"),
            (Period::Week, "2024-W60"),
            (Period::Week, "2024-W00"),
            (Period::Month, "2024-13"),
            (Period::Month, "2024-3"),
            (Period::Year, "24"),
            (Period::Year, "two thousand"),
        ] {
            let result = parse_reference(&Utc, period, value);
            assert!(
                matches!(result, Err(Error::InvalidArgument(_))),
                "{} '{}' should be rejected",
                period,
                value
            );
        }
    }

    #[test]
    fn test_week_string() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
        assert_eq!(week_string(date), "2024-W24");
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(week_string(jan1), "2024-W01");
        assert_eq!(selection_value(Period::Month, date), "2024-06");
        assert_eq!(selection_value(Period::Year, date), "2024");
    }
}
