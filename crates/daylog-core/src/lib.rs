//! Core categorization engine for daily activity logs.
//!
//! This crate contains the fundamental types and logic for:
//! - Rule compilation: the rules mini-language (sections, weighted category
//!   splits, counters, markers, collapse chains) compiled into an
//!   executable classification pipeline
//! - Log parsing: raw log lines turned into ordered, gap-free per-day
//!   activity intervals with derived sleep semantics
//! - Aggregation: categorized time rolled up a memoized category hierarchy
//!   into weekday/holiday totals

pub mod aggregate;
pub mod category;
pub mod day;
pub mod holiday;
pub mod parser;
pub mod period;
pub mod rules;
pub mod sleep_stats;
pub mod tracker;

pub use aggregate::{AggregateError, BucketMinutes, Totals, label_totals, totals, zdiv};
pub use category::{
    Category, CategoryError, CategoryId, CategorySet, ERROR_CATEGORY, SLEEP_CATEGORY,
    WeightedCategory,
};
pub use day::{Activity, DAY_END, DAY_START, Day, DayMarker, MINUTES_PER_DAY};
pub use holiday::{DAY_NAMES, HolidayCalendar, day_name};
pub use parser::{
    Gap, LogData, LogSource, ParseError, ParseOptions, ParseOutcome, SoftError, UNKNOWN_FILLER,
    parse_files, parse_sources,
};
pub use period::{Period, PeriodError};
pub use rules::{
    MarkerPolicy, RenderMode, Rule, RulesError, Ruleset, RunSpec, compile_rules, find_rules_file,
    load_rules,
};
pub use sleep_stats::{SleepReport, SleepStat, sleep_report};
pub use tracker::{CounterTotal, CounterTotals, CounterTracker, TrackerError};
