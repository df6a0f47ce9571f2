//! Aggregation of closed days into weekday/holiday time totals.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::category::CategorySet;
use crate::day::Day;
use crate::holiday::HolidayCalendar;

/// Errors from aggregate queries.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// Aggregation ran against a day that was never closed.
    #[error("day {date} must be closed before aggregation")]
    UnclosedDay { date: NaiveDate },
}

/// Division that treats an empty bucket as zero instead of an error.
pub fn zdiv(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Minutes bucketed by day kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BucketMinutes {
    pub weekday: f64,
    pub holiday: f64,
}

impl BucketMinutes {
    pub fn total(&self) -> f64 {
        self.weekday + self.holiday
    }

    fn add(&mut self, minutes: f64, holiday: bool) {
        if holiday {
            self.holiday += minutes;
        } else {
            self.weekday += minutes;
        }
    }
}

/// Per-category totals over a run of closed days.
#[derive(Debug, Clone, Serialize)]
pub struct Totals {
    pub work_days: u32,
    pub holidays: u32,
    /// Keyed by fully-collapsed category name.
    pub times: BTreeMap<String, BucketMinutes>,
}

impl Totals {
    pub const fn day_count(&self) -> u32 {
        self.work_days + self.holidays
    }
}

/// Sums weighted category time over closed days.
///
/// Time rolls up to each category's fully-collapsed ancestor. The sleep
/// category substitutes the two-pass derived sleep total for literal
/// interval durations; the first day's pre-getup and last day's post-getup
/// sleep, which have no adjacent day to pair with, are added explicitly.
pub fn totals(
    days: &[Day],
    categories: &CategorySet,
    calendar: &HolidayCalendar,
) -> Result<Totals, AggregateError> {
    let sleep = categories.sleep();
    let sleep_name = categories.name(categories.root_of(sleep)).to_string();

    let mut result = Totals {
        work_days: 0,
        holidays: 0,
        times: BTreeMap::from([(sleep_name.clone(), BucketMinutes::default())]),
    };

    for day in days {
        if !day.closed() {
            return Err(AggregateError::UnclosedDay { date: day.date() });
        }
        let holiday = calendar.is_holiday(day.date());
        if holiday {
            result.holidays += 1;
        } else {
            result.work_days += 1;
        }
        for (from, to, activity) in day.iter_intervals() {
            for weighted in activity.categories() {
                let root = categories.root_of(weighted.category);
                if root == sleep {
                    continue;
                }
                let name = categories.name(root);
                result
                    .times
                    .entry(name.to_string())
                    .or_default()
                    .add(f64::from(to - from) * weighted.weight, holiday);
            }
        }
        let slept = f64::from(day.sleep_time().unwrap_or(0));
        if let Some(bucket) = result.times.get_mut(&sleep_name) {
            bucket.add(slept, holiday);
        }
    }

    if let Some(first) = days.first() {
        let holiday = calendar.is_holiday(first.date());
        if let Some(bucket) = result.times.get_mut(&sleep_name) {
            bucket.add(f64::from(first.sleep_before_getup(sleep)), holiday);
        }
    }
    if let Some(last) = days.last() {
        let holiday = calendar.is_holiday(last.date());
        if let Some(bucket) = result.times.get_mut(&sleep_name) {
            bucket.add(f64::from(last.sleep_after_getup(sleep)), holiday);
        }
    }

    Ok(result)
}

/// Per-raw-activity-label totals for diagnostic output, without weighting
/// or sleep substitution.
pub fn label_totals(
    days: &[Day],
    calendar: &HolidayCalendar,
) -> Result<BTreeMap<String, BucketMinutes>, AggregateError> {
    let mut times: BTreeMap<String, BucketMinutes> = BTreeMap::new();
    for day in days {
        if !day.closed() {
            return Err(AggregateError::UnclosedDay { date: day.date() });
        }
        let holiday = calendar.is_holiday(day.date());
        for (from, to, activity) in day.iter_intervals() {
            times
                .entry(activity.label().to_string())
                .or_default()
                .add(f64::from(to - from), holiday);
        }
    }
    Ok(times)
}
