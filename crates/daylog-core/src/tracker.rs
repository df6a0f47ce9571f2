//! Open-interval tracking for counters and marker recording policies.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::Serialize;
use thiserror::Error;

use crate::day::Day;
use crate::rules::MarkerPolicy;

/// Accumulated occurrences and minutes for one counter category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterTotal {
    pub count: i64,
    pub minutes: i64,
}

/// All counter totals, keyed by category name.
pub type CounterTotals = BTreeMap<String, CounterTotal>;

/// Errors from counter interval tracking.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// Two simultaneously open counters resolved to the same category.
    #[error("counter category {name:?} opened twice on one line")]
    DuplicateCategory { name: String },
}

/// Open counter intervals: category name to the minute it opened at.
///
/// A counter opens when a timestamped line matches its pattern and closes on
/// the next timestamped line, accruing the elapsed minutes.
#[derive(Debug, Default)]
pub struct CounterTracker {
    open: BTreeMap<String, i32>,
}

impl CounterTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }

    /// Categories currently holding an open interval.
    pub fn open_categories(&self) -> impl Iterator<Item = &str> {
        self.open.keys().map(String::as_str)
    }

    /// Opens an interval for a category at the given minute.
    pub fn open(&mut self, category: String, at: i32) -> Result<(), TrackerError> {
        match self.open.entry(category) {
            Entry::Occupied(entry) => Err(TrackerError::DuplicateCategory {
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(at);
                Ok(())
            }
        }
    }

    /// Closes every open interval at `now`, adding the elapsed minutes to
    /// the totals.
    pub fn close_all(&mut self, now: i32, totals: &mut CounterTotals) {
        for (category, opened_at) in std::mem::take(&mut self.open) {
            let total = totals.entry(category).or_default();
            total.minutes += i64::from(now - opened_at);
        }
    }

    /// Drops open intervals without accruing time (end of input).
    pub fn discard(&mut self) {
        if !self.open.is_empty() {
            tracing::debug!(open = self.open.len(), "dropping open counters at end of input");
            self.open.clear();
        }
    }
}

/// Adds an occurrence contribution for a counter category.
pub fn add_count(totals: &mut CounterTotals, category: &str, contribution: i64) {
    totals.entry(category.to_string()).or_default().count += contribution;
}

/// Records a marker on a day according to its policy.
pub fn apply_marker(day: &mut Day, policy: MarkerPolicy, minutes: i32, name: &str) {
    match policy {
        MarkerPolicy::Each => day.add_marker(minutes, name),
        MarkerPolicy::First => {
            if day.find_marker(name).is_none() {
                day.add_marker(minutes, name);
            }
        }
        MarkerPolicy::Last => day.replace_marker(minutes, name),
    }
}
