//! Calendar classification of timestamps into the task time periods.
//!
//! Every function takes the "now" it classifies against, so results depend only on
//! the arguments; the `*_now` helpers read the local clock and timezone at call time.

use chrono::{DateTime, Datelike, Local, Months, NaiveDate, NaiveTime, TimeZone, Weekday};

use crate::models::TimePeriod;
use crate::utils;

/// Season index for a 0-based month: Mar-May 0, Jun-Aug 1, Sep-Nov 2, Dec-Feb 3
pub fn season_of_month0(month0: u32) -> u8 {
    match month0 {
        2..=4 => 0,
        5..=7 => 1,
        8..=10 => 2,
        _ => 3,
    }
}

/// First calendar day of the season containing `date`.
/// Winter starts in December, so January and February belong to the previous year's winter.
pub fn season_start_date(date: NaiveDate) -> NaiveDate {
    let (year, start_month) = match season_of_month0(date.month0()) {
        0 => (date.year(), 3),
        1 => (date.year(), 6),
        2 => (date.year(), 9),
        _ if date.month() == 12 => (date.year(), 12),
        _ => (date.year() - 1, 12),
    };
    NaiveDate::from_ymd_opt(year, start_month, 1).unwrap_or(date)
}

/// First calendar day of the week containing `date`, for the given first weekday
pub fn week_start_date(date: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = (date.weekday().num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7;
    date - chrono::Days::new(u64::from(offset))
}

/// Epoch millis of the first instant of `date` in `tz`
pub fn day_start_millis<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> i64 {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
        // midnight fell into a DST gap
        .unwrap_or_else(|| tz.from_utc_datetime(&naive).timestamp_millis())
}

/// First and first-after-last calendar day of the period containing `today`
pub fn period_dates(period: TimePeriod, today: NaiveDate, week_start: Weekday) -> (NaiveDate, NaiveDate) {
    match period {
        TimePeriod::Today => (today, today + chrono::Days::new(1)),
        TimePeriod::ThisWeek => {
            let start = week_start_date(today, week_start);
            (start, start + chrono::Days::new(7))
        }
        TimePeriod::ThisMonth => {
            let start = today.with_day(1).unwrap_or(today);
            (start, start + Months::new(1))
        }
        TimePeriod::ThisSeason => {
            let start = season_start_date(today);
            (start, start + Months::new(3))
        }
        TimePeriod::ThisYear => {
            let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(today);
            (start, start + Months::new(12))
        }
    }
}

impl TimePeriod {
    /// Inclusive start of the period around `now`, in epoch millis
    pub fn start_at<Tz: TimeZone>(self, now: &DateTime<Tz>, week_start: Weekday) -> i64 {
        let (start, _) = period_dates(self, now.date_naive(), week_start);
        day_start_millis(&now.timezone(), start)
    }

    /// Inclusive end (last millisecond) of the period around `now`
    pub fn end_at<Tz: TimeZone>(self, now: &DateTime<Tz>, week_start: Weekday) -> i64 {
        let (_, next) = period_dates(self, now.date_naive(), week_start);
        day_start_millis(&now.timezone(), next) - 1
    }

    /// Whether `timestamp` (epoch millis) falls in this period relative to `now`
    pub fn contains_at<Tz: TimeZone>(self, timestamp: i64, now: &DateTime<Tz>, week_start: Weekday) -> bool
    where
        Tz::Offset: std::fmt::Display,
    {
        let Some(target) = now.timezone().timestamp_millis_opt(timestamp).single() else {
            return false;
        };
        match self {
            TimePeriod::Today => {
                utils::date_key_of_millis(timestamp, now).as_deref() == Some(utils::date_key(now).as_str())
            }
            TimePeriod::ThisMonth => now.year() == target.year() && now.month() == target.month(),
            TimePeriod::ThisYear => now.year() == target.year(),
            TimePeriod::ThisWeek | TimePeriod::ThisSeason => {
                let start = self.start_at(now, week_start);
                let end = self.end_at(now, week_start);
                (start..=end).contains(&timestamp)
            }
        }
    }

    pub fn contains_now(self, timestamp: i64, week_start: Weekday) -> bool {
        self.contains_at(timestamp, &Local::now(), week_start)
    }

    pub fn start_now(self, week_start: Weekday) -> i64 {
        self.start_at(&Local::now(), week_start)
    }

    pub fn end_now(self, week_start: Weekday) -> i64 {
        self.end_at(&Local::now(), week_start)
    }
}
