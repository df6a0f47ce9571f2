//! Per-day activity intervals.
//!
//! A [`Day`] is an append-only sequence of contiguous activity intervals.
//! Times are minutes from midnight; the day's window runs from the nominal
//! start (05:00) to start + 24 h, so a value like `2530` (01:30 past
//! midnight) still belongs to the same day.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::category::{CategoryId, CategorySet, SLEEP_CATEGORY, WeightedCategory};

/// Nominal start of a day, in minutes from midnight.
pub const DAY_START: i32 = 5 * 60;

pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// Nominal end of a day.
pub const DAY_END: i32 = DAY_START + MINUTES_PER_DAY;

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-3]\d)([0-5]\d)$").expect("time pattern"));

/// Parses an `HHMM` time into minutes from midnight. Hours up to 39 are
/// accepted so times past midnight (`2530`) stay on the same day.
pub fn parse_minutes(text: &str) -> Option<i32> {
    let caps = TIME_RE.captures(text)?;
    let hours: i32 = caps[1].parse().ok()?;
    let minutes: i32 = caps[2].parse().ok()?;
    Some(hours * 60 + minutes)
}

/// Renders minutes as `HH:MM`; hours may exceed 24.
pub fn format_minutes(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Renders fractional minutes as `HH:MM.ff`.
pub fn format_minutes_f(minutes: f64) -> String {
    let whole = minutes.trunc();
    let frac = format!("{:.2}", minutes - whole);
    format!("{}{}", format_minutes(whole as i64), &frac[1..])
}

/// One categorized interval of a day.
#[derive(Debug, Clone)]
pub struct Activity {
    label: String,
    start: i32,
    end: Option<i32>,
    display_start: Option<i32>,
    display_end: Option<i32>,
    categories: Vec<WeightedCategory>,
}

impl Activity {
    fn new(label: &str, start: i32, categories: Vec<WeightedCategory>) -> Self {
        Self {
            label: label.to_string(),
            start,
            end: None,
            display_start: None,
            display_end: None,
            categories,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub const fn start(&self) -> i32 {
        self.start
    }

    /// Authoritative end; `None` until the following activity or day close
    /// fixes it.
    pub const fn end(&self) -> Option<i32> {
        self.end
    }

    pub fn duration(&self) -> Option<i32> {
        self.end.map(|end| end - self.start)
    }

    pub fn categories(&self) -> &[WeightedCategory] {
        &self.categories
    }

    /// Whether this interval is pure sleep.
    pub fn is_sleep(&self, sleep: CategoryId) -> bool {
        matches!(self.categories.as_slice(), [w] if w.category == sleep)
    }

    /// Display range used for cross-day visual merging; may extend past the
    /// day window. Falls back to the authoritative times.
    pub fn display_range(&self) -> (i32, Option<i32>) {
        (
            self.display_start.unwrap_or(self.start),
            self.display_end.or(self.end),
        )
    }

    /// True when this interval visually continues the previous day.
    pub fn continues_previous_day(&self) -> bool {
        self.display_start.is_some_and(|start| start < self.start)
    }

    pub(crate) fn set_display_start(&mut self, minutes: i32) {
        self.display_start = Some(minutes);
    }

    pub(crate) fn set_display_end(&mut self, minutes: i32) {
        self.display_end = Some(minutes);
    }
}

/// A named timestamp annotation on a day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayMarker {
    pub minutes: i32,
    pub name: String,
}

/// One calendar day of contiguous activity intervals.
#[derive(Debug, Clone)]
pub struct Day {
    date: NaiveDate,
    activities: Vec<Activity>,
    markers: Vec<DayMarker>,
    sleep_time: Option<i32>,
    closed: bool,
}

impl Day {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            activities: Vec::new(),
            markers: Vec::new(),
            sleep_time: None,
            closed: false,
        }
    }

    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn markers(&self) -> &[DayMarker] {
        &self.markers
    }

    pub const fn closed(&self) -> bool {
        self.closed
    }

    /// Derived sleep total; set by the two-pass linkage, absent on the
    /// chronologically last day.
    pub const fn sleep_time(&self) -> Option<i32> {
        self.sleep_time
    }

    pub(crate) fn set_sleep_time(&mut self, minutes: Option<i32>) {
        self.sleep_time = minutes;
    }

    pub fn add_marker(&mut self, minutes: i32, name: &str) {
        self.markers.push(DayMarker {
            minutes,
            name: name.to_string(),
        });
    }

    /// Removes any marker with this name, then records the new one.
    pub fn replace_marker(&mut self, minutes: i32, name: &str) {
        self.markers.retain(|m| m.name != name);
        self.add_marker(minutes, name);
    }

    pub fn find_marker(&self, name: &str) -> Option<&DayMarker> {
        self.markers.iter().find(|m| m.name == name)
    }

    /// Appends an activity interval.
    ///
    /// Times before the nominal start clamp up to it; a first activity after
    /// the nominal start synthesizes a leading sleep interval; consecutive
    /// identical labels merge. Returns `true` when the time was earlier than
    /// the previous activity and was clamped to it (a recorded, non-fatal
    /// ordering violation).
    pub fn add_activity(
        &mut self,
        minutes: i32,
        label: &str,
        categories: Vec<WeightedCategory>,
        sleep: CategoryId,
    ) -> bool {
        let mut time = minutes.max(DAY_START);
        let mut out_of_order = false;
        if self.activities.is_empty() {
            if time > DAY_START {
                self.activities.push(Activity::new(
                    SLEEP_CATEGORY,
                    DAY_START,
                    vec![WeightedCategory {
                        category: sleep,
                        weight: 1.0,
                    }],
                ));
            }
        } else if time < self.activities[self.activities.len() - 1].start {
            out_of_order = true;
            time = self.activities[self.activities.len() - 1].start;
        }
        let same_as_previous = self
            .activities
            .last()
            .is_some_and(|previous| previous.label == label);
        if !same_as_previous {
            if let Some(previous) = self.activities.last_mut() {
                previous.end = Some(time);
            }
            self.activities.push(Activity::new(label, time, categories));
        }
        out_of_order
    }

    /// Fixes the last activity's end to the day's nominal end and pushes
    /// weighted durations into the category accumulators. After this, the
    /// day accepts aggregate queries.
    pub fn close(&mut self, holiday: bool, categories: &mut CategorySet) {
        if self.closed {
            return;
        }
        if let Some(last) = self.activities.last_mut() {
            last.end = Some(DAY_END);
        }
        for index in 0..self.activities.len() {
            let (from, to) = self.interval_bounds(index);
            let minutes = f64::from(to - from);
            for weighted in &self.activities[index].categories {
                categories.add_time(weighted.category, minutes * weighted.weight, holiday);
            }
        }
        self.closed = true;
    }

    fn interval_bounds(&self, index: usize) -> (i32, i32) {
        let activity = &self.activities[index];
        let end = self
            .activities
            .get(index + 1)
            .map(|next| next.start)
            .or(activity.end)
            .unwrap_or(DAY_END);
        (activity.start, end)
    }

    /// Iterates `(from, to, activity)` triples; an unset final end reads as
    /// the day's nominal end.
    pub fn iter_intervals(&self) -> impl Iterator<Item = (i32, i32, &Activity)> + '_ {
        (0..self.activities.len()).map(|index| {
            let (from, to) = self.interval_bounds(index);
            (from, to, &self.activities[index])
        })
    }

    /// Start of the first non-sleep activity.
    pub fn getup(&self, sleep: CategoryId) -> Option<i32> {
        self.activities
            .iter()
            .find(|a| !a.is_sleep(sleep))
            .map(Activity::start)
    }

    /// Minutes slept between the nominal start and getting up.
    pub fn sleep_before_getup(&self, sleep: CategoryId) -> i32 {
        self.getup(sleep).map_or(0, |getup| getup - DAY_START)
    }

    /// Minutes slept strictly after getting up (evening sleep and naps).
    pub fn sleep_after_getup(&self, sleep: CategoryId) -> i32 {
        let getup = self.getup(sleep).unwrap_or(0);
        self.iter_intervals()
            .filter(|(from, _, activity)| *from > getup && activity.is_sleep(sleep))
            .map(|(from, to, _)| to - from)
            .sum()
    }

    pub(crate) fn first_activity_mut(&mut self) -> Option<&mut Activity> {
        self.activities.first_mut()
    }

    pub(crate) fn last_activity_mut(&mut self) -> Option<&mut Activity> {
        self.activities.last_mut()
    }
}
