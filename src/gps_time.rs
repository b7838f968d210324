use std::sync::LazyLock;

use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use regex::Regex;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const SECONDS_PER_WEEK: i64 = 7 * SECONDS_PER_DAY;
const MICROS_PER_SECOND: f64 = 1_000_000.0;

static YYMMDD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<yy>\d{2})(?P<mm>\d{2})(?P<dd>\d{2})$").unwrap());

/// Parse the `YYMMDD` token of a camera folder name. Years are 2000-based.
pub fn parse_yymmdd(token: &str) -> anyhow::Result<NaiveDate> {
    let caps = YYMMDD_RE
        .captures(token)
        .with_context(|| format!("dataset date {:?} is not YYMMDD", token))?;

    let yy: i32 = caps["yy"].parse()?;
    let mm: u32 = caps["mm"].parse()?;
    let dd: u32 = caps["dd"].parse()?;

    NaiveDate::from_ymd_opt(2000 + yy, mm, dd)
        .with_context(|| format!("dataset date {:?} is not a valid date", token))
}

/// Saturday midnight (GMT) at or before `date`, i.e. the start of the GPS week.
pub fn week_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    let days_since_sunday = date.weekday().num_days_from_sunday() as i64;
    midnight - Duration::seconds(days_since_sunday * SECONDS_PER_DAY)
}

/// Converts GPS seconds of week into absolute microsecond timestamps.
///
/// The week anchor is computed from the dataset date on the first record.
/// Once a timestamp goes backwards the dataset has crossed a week boundary,
/// and every timestamp from then on gets one extra week.
#[derive(Debug)]
pub struct GpsTimeReconstructor {
    date_token: String,
    /// Week start in seconds since the Unix epoch, set on the first record.
    anchor: Option<i64>,
    prev_time: Option<i64>,
    rollover: bool,
}

impl GpsTimeReconstructor {
    pub fn new(date_token: &str) -> Self {
        Self {
            date_token: date_token.to_string(),
            anchor: None,
            prev_time: None,
            rollover: false,
        }
    }

    pub fn rolled_over(&self) -> bool {
        self.rollover
    }

    /// Absolute picture time in microseconds for one record.
    pub fn picture_time(&mut self, seconds_of_week: f64) -> anyhow::Result<i64> {
        let anchor = match self.anchor {
            Some(anchor) => anchor,
            None => {
                let date = parse_yymmdd(&self.date_token)?;
                let anchor = week_start(date).timestamp();
                self.anchor = Some(anchor);
                anchor
            }
        };

        let mut picture_time = ((anchor as f64 + seconds_of_week) * MICROS_PER_SECOND).round() as i64;

        // Compared before correction so the check only sees raw week offsets.
        if self.prev_time.is_some_and(|prev| picture_time < prev) {
            self.rollover = true;
        }
        self.prev_time = Some(picture_time);

        if self.rollover {
            picture_time += SECONDS_PER_WEEK * MICROS_PER_SECOND as i64;
        }
        Ok(picture_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yymmdd() {
        assert_eq!(parse_yymmdd("220301").unwrap(), NaiveDate::from_ymd_opt(2022, 3, 1).unwrap());
        assert!(parse_yymmdd("2203").is_err());
        assert!(parse_yymmdd("221301").is_err());
        assert!(parse_yymmdd("22030a").is_err());
    }

    #[test]
    fn test_week_start() {
        // 2022-03-01 is a Tuesday; the GPS week began at 2022-02-27 00:00 GMT.
        let start = week_start(NaiveDate::from_ymd_opt(2022, 3, 1).unwrap());
        assert_eq!(start.to_rfc3339(), "2022-02-27T00:00:00+00:00");
        assert_eq!(start.timestamp(), 1_645_920_000);

        // A Sunday is its own week start.
        let sunday = week_start(NaiveDate::from_ymd_opt(2022, 2, 27).unwrap());
        assert_eq!(sunday.timestamp(), 1_645_920_000);
    }

    #[test]
    fn test_picture_time_from_anchor() {
        let mut rec = GpsTimeReconstructor::new("220301");
        assert!(rec.anchor.is_none());

        let t = rec.picture_time(12345.6789).unwrap();
        let anchor = rec.anchor.unwrap();
        assert_eq!(anchor, 1_645_920_000);
        assert_eq!(t, ((anchor as f64 + 12345.6789) * 1e6).round() as i64);
        assert!(!rec.rolled_over());
    }

    #[test]
    fn test_week_rollover_is_latched() {
        let mut rec = GpsTimeReconstructor::new("220301");
        let anchor = 1_645_920_000i64;
        let week_us = SECONDS_PER_WEEK * 1_000_000;

        let t0 = rec.picture_time(604_790.0).unwrap();
        let t1 = rec.picture_time(5.0).unwrap();
        let t2 = rec.picture_time(6.0).unwrap();

        assert_eq!(t0, (anchor + 604_790) * 1_000_000);
        assert!(rec.rolled_over());
        assert_eq!(t1, (anchor + 5) * 1_000_000 + week_us);
        assert_eq!(t2, (anchor + 6) * 1_000_000 + week_us);
        assert!(t0 <= t1 && t1 <= t2);
    }

    #[test]
    fn test_bad_date_token_fails_on_first_record() {
        let mut rec = GpsTimeReconstructor::new("22xx01");
        assert!(rec.picture_time(1.0).is_err());
    }
}
