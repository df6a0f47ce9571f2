//! Holiday determination: weekends plus a configurable exception list.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};

/// Day names indexed by days-since-Sunday. The table carries eight entries
/// so that index 7 wraps back to Sunday.
pub const DAY_NAMES: [&str; 8] = ["日", "月", "火", "水", "木", "金", "土", "日"];

/// National holidays baked in; personal days off come from configuration.
const DEFAULT_HOLIDAYS: &[&str] = &[
    "2020-01-01",
    "2020-01-02",
    "2020-01-03",
    "2020-02-11",
    "2020-02-24",
    "2020-03-20",
    "2020-04-29",
    "2020-05-05",
    "2020-05-06",
    "2020-07-23",
    "2020-07-24",
    "2020-08-10",
    "2020-09-21",
    "2020-09-22",
    "2020-11-23",
    "2021-01-01",
    "2021-01-02",
    "2021-01-03",
    "2021-01-11",
    "2021-02-11",
    "2021-02-23",
    "2021-04-29",
    "2021-05-03",
    "2021-05-04",
    "2021-05-05",
    "2021-07-22",
    "2021-07-23",
    "2021-08-09",
];

/// Japanese day-of-week name for a date.
pub fn day_name(date: NaiveDate) -> &'static str {
    DAY_NAMES[date.weekday().num_days_from_sunday() as usize]
}

/// Decides whether a date counts as a holiday.
#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    dates: HashSet<NaiveDate>,
}

impl HolidayCalendar {
    /// Builds the calendar from the built-in list plus extra dates.
    pub fn new(extra: &[NaiveDate]) -> Self {
        let mut dates: HashSet<NaiveDate> = DEFAULT_HOLIDAYS
            .iter()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").expect("valid holiday literal"))
            .collect();
        dates.extend(extra);
        Self { dates }
    }

    /// Weekends and exception-list dates are holidays.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday();
        weekday == 0 || weekday >= 6 || self.dates.contains(&date)
    }
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::new(&[])
    }
}
