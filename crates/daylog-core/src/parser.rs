//! Log interval parser.
//!
//! One forward pass turns raw log lines into ordered per-day activity
//! intervals, consulting the compiled rules for categorization and the
//! counter/marker tracker for side annotations; a second, reverse pass links
//! consecutive days (derived sleep totals, merged display boundaries).
//! Soft errors collect in a [`ParseOutcome`] so one run surfaces every
//! offending line.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use regex::Regex;
use thiserror::Error;

use crate::category::{CategorySet, ERROR_CATEGORY, WeightedCategory};
use crate::day::{DAY_END, DAY_START, Day, MINUTES_PER_DAY, format_minutes, parse_minutes};
use crate::holiday::HolidayCalendar;
use crate::period::Period;
use crate::rules::Ruleset;
use crate::tracker::{CounterTotals, CounterTracker, TrackerError, add_count, apply_marker};

/// Label standing in for time not covered by any log file.
pub const UNKNOWN_FILLER: &str = "?";

static DAY_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d{4})-)?(\d{2})-(\d{2})(?: :.*)?$").expect("day header pattern")
});
static ACTIVITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}) (.*)$").expect("activity pattern"));
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#").expect("comment pattern"));
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:\A|\D)(20\d{2})").expect("year pattern"));

/// Fatal structural errors; parsing aborts immediately.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{file}:{line}: log line before any day header")]
    DayUnknown { file: String, line: usize },

    #[error("{file}:{line}: invalid time in {text:?} (expected HHMM with minutes 00-59)")]
    BadTime {
        file: String,
        line: usize,
        text: String,
    },

    #[error("{file}:{line}: invalid date {text:?}")]
    BadDate {
        file: String,
        line: usize,
        text: String,
    },

    #[error("{file}:{line}: counter {name:?} still open at day boundary")]
    OpenCounterAtDayBreak {
        file: String,
        line: usize,
        name: String,
    },

    #[error("{file}:{line}: {source}")]
    Counter {
        file: String,
        line: usize,
        #[source]
        source: TrackerError,
    },

    #[error("log files {earlier} and {later} cover overlapping periods")]
    OverlappingFiles { earlier: String, later: String },

    #[error("log file {file} contains no day header")]
    EmptyLog { file: String },

    #[error("failed to read log file {file}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },
}

/// Recoverable errors, reported in a batch after the whole input is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoftError {
    /// An activity's time went backwards and was clamped.
    OutOfOrder { date: NaiveDate, minutes: i32 },
    /// No rule matched the activity label.
    UnknownCategory {
        date: NaiveDate,
        file: String,
        line: usize,
        label: String,
    },
}

impl fmt::Display for SoftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfOrder { date, minutes } => {
                write!(f, "not ordered {date} {}", format_minutes(i64::from(*minutes)))
            }
            Self::UnknownCategory {
                date,
                file,
                line,
                label,
            } => {
                write!(
                    f,
                    "unknown category for day {} at {file}:{line}: {label}",
                    date.format("%m-%d")
                )
            }
        }
    }
}

/// One seen activity label, for diagnostic output.
#[derive(Debug, Clone)]
pub struct SeenActivity {
    /// Fully-collapsed category the matched rule filed it under.
    pub category: String,
    /// The matched rule's pattern text.
    pub pattern: String,
    /// `file:line` occurrences.
    pub lines: Vec<String>,
}

/// Per-raw-label record of which rule matched where.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    seen: std::collections::BTreeMap<String, SeenActivity>,
}

impl Diagnostics {
    fn record(&mut self, label: &str, category: &str, pattern: &str, file: &str, line: usize) {
        self.seen
            .entry(label.to_string())
            .or_insert_with(|| SeenActivity {
                category: category.to_string(),
                pattern: pattern.to_string(),
                lines: Vec::new(),
            })
            .lines
            .push(format!("{file}:{line}"));
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Labels grouped by the category that claimed them, both sorted.
    pub fn by_category(&self) -> std::collections::BTreeMap<&str, Vec<(&str, &SeenActivity)>> {
        let mut grouped: std::collections::BTreeMap<&str, Vec<(&str, &SeenActivity)>> =
            std::collections::BTreeMap::new();
        for (label, seen) in &self.seen {
            grouped
                .entry(seen.category.as_str())
                .or_default()
                .push((label.as_str(), seen));
        }
        grouped
    }
}

/// Soft errors and diagnostics threaded through the parsing pipeline.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub errors: Vec<SoftError>,
    pub diagnostics: Diagnostics,
}

impl ParseOutcome {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// One suggested rules line per distinct unknown label, with regex
    /// metacharacters escaped, ready to paste and edit.
    pub fn rule_suggestions(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();
        for error in &self.errors {
            if let SoftError::UnknownCategory { label, .. } = error {
                if seen.insert(label.clone()) {
                    suggestions.push(format!("{} = {ERROR_CATEGORY}", regex::escape(label)));
                }
            }
        }
        suggestions
    }
}

/// A span of time between two log files not covered by either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
}

/// The parsed model: closed days in chronological order, counter totals and
/// inter-file coverage gaps.
#[derive(Debug)]
pub struct LogData {
    pub days: Vec<Day>,
    pub counters: CounterTotals,
    pub gaps: Vec<Gap>,
}

/// Knobs for a parsing run.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Days outside this range are parsed but ignored.
    pub period: Period,
    /// Year for files whose path does not carry one.
    pub default_year: i32,
    /// Collect per-label diagnostics.
    pub diagnostics: bool,
}

/// One log stream with the year its dates belong to.
#[derive(Debug, Clone)]
pub struct LogSource {
    pub name: String,
    pub year: i32,
    pub text: String,
}

impl LogSource {
    /// Reads a file, deducing its year from the path.
    pub fn from_path(path: &Path, default_year: i32) -> Result<Self, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
            file: path.display().to_string(),
            source,
        })?;
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        Ok(Self {
            name: path.display().to_string(),
            year: deduce_year(&absolute).unwrap_or(default_year),
            text,
        })
    }
}

/// Year from the last `20xx` group in a path.
pub fn deduce_year(path: &Path) -> Option<i32> {
    let text = path.to_string_lossy();
    YEAR_RE
        .captures_iter(&text)
        .last()
        .and_then(|caps| caps[1].parse().ok())
}

/// Parses and merges log files into one chronological model.
pub fn parse_files(
    paths: &[PathBuf],
    rules: &Ruleset,
    categories: &mut CategorySet,
    calendar: &HolidayCalendar,
    options: &ParseOptions,
) -> Result<(LogData, ParseOutcome), ParseError> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        sources.push(LogSource::from_path(path, options.default_year)?);
    }
    parse_sources(&sources, rules, categories, calendar, options)
}

/// Parses log sources, orders them by earliest timestamp, verifies coverage
/// and links consecutive days.
pub fn parse_sources(
    sources: &[LogSource],
    rules: &Ruleset,
    categories: &mut CategorySet,
    calendar: &HolidayCalendar,
    options: &ParseOptions,
) -> Result<(LogData, ParseOutcome), ParseError> {
    let mut outcome = ParseOutcome::default();
    let mut counters = CounterTotals::new();

    let mut files = Vec::with_capacity(sources.len());
    for source in sources {
        let days = parse_single(
            source,
            rules,
            categories,
            calendar,
            options,
            &mut counters,
            &mut outcome,
        )?;
        tracing::debug!(file = %source.name, days = days.len(), "parsed log file");
        if !days.is_empty() {
            files.push(FileParse {
                name: source.name.clone(),
                days,
            });
        }
    }
    files.sort_by_key(FileParse::first_instant);

    let mut gaps = Vec::new();
    for pair in files.windows(2) {
        let (earlier, later) = (&pair[0], &pair[1]);
        let earlier_end = earlier.last_end();
        let later_start = later.first_instant();
        if later_start < earlier_end {
            return Err(ParseError::OverlappingFiles {
                earlier: earlier.name.clone(),
                later: later.name.clone(),
            });
        }
        if later_start - earlier_end > Duration::hours(24) {
            gaps.push(Gap {
                from: earlier_end,
                to: later_start,
            });
        }
    }

    let mut days: Vec<Day> = files.into_iter().flat_map(|f| f.days).collect();
    link_days(&mut days, categories);

    Ok((
        LogData {
            days,
            counters,
            gaps,
        },
        outcome,
    ))
}

struct FileParse {
    name: String,
    days: Vec<Day>,
}

impl FileParse {
    fn first_instant(&self) -> NaiveDateTime {
        let day = &self.days[0];
        let start = day.activities().first().map_or(DAY_START, |a| a.start());
        instant(day.date(), start)
    }

    fn last_end(&self) -> NaiveDateTime {
        let day = &self.days[self.days.len() - 1];
        instant(day.date(), DAY_END)
    }
}

fn instant(date: NaiveDate, minutes: i32) -> NaiveDateTime {
    date.and_hms_opt(0, 0, 0).expect("midnight exists") + Duration::minutes(i64::from(minutes))
}

enum State {
    AwaitingDay,
    Ignoring,
    InDay(Day),
}

#[allow(clippy::too_many_lines)]
fn parse_single(
    source: &LogSource,
    rules: &Ruleset,
    categories: &mut CategorySet,
    calendar: &HolidayCalendar,
    options: &ParseOptions,
    counters: &mut CounterTotals,
    outcome: &mut ParseOutcome,
) -> Result<Vec<Day>, ParseError> {
    let file = source.name.as_str();
    let mut state = State::AwaitingDay;
    let mut tracker = CounterTracker::new();
    let mut days = Vec::new();
    let mut saw_header = false;

    for (index, raw_line) in source.text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || COMMENT_RE.is_match(line) {
            continue;
        }

        if let Some(caps) = DAY_HEADER_RE.captures(line) {
            saw_header = true;
            if let Some(open) = tracker.open_categories().next() {
                return Err(ParseError::OpenCounterAtDayBreak {
                    file: file.to_string(),
                    line: line_no,
                    name: open.to_string(),
                });
            }
            if let State::InDay(day) = std::mem::replace(&mut state, State::AwaitingDay) {
                close_day(day, calendar, categories, &mut days);
            }
            let year = caps
                .get(1)
                .map_or(Ok(source.year), |m| m.as_str().parse())
                .map_err(|_| bad_date(file, line_no, line))?;
            let month: u32 = caps[2].parse().map_err(|_| bad_date(file, line_no, line))?;
            let day_of_month: u32 = caps[3].parse().map_err(|_| bad_date(file, line_no, line))?;
            let date = NaiveDate::from_ymd_opt(year, month, day_of_month)
                .ok_or_else(|| bad_date(file, line_no, line))?;
            state = if options.period.contains(date) {
                State::InDay(Day::new(date))
            } else {
                State::Ignoring
            };
            continue;
        }

        let day = match &mut state {
            State::Ignoring => continue,
            State::AwaitingDay => {
                return Err(ParseError::DayUnknown {
                    file: file.to_string(),
                    line: line_no,
                });
            }
            State::InDay(day) => day,
        };

        let Some(caps) = ACTIVITY_RE.captures(line) else {
            // Free-form annotation: counter contributions only, no
            // timestamp to open an interval with.
            for (category, contribution) in rules.match_counters(line) {
                add_count(counters, &category, contribution);
            }
            continue;
        };

        let time_text = &caps[1];
        let label = caps.get(2).map_or("", |m| m.as_str()).trim();
        let raw_minutes = parse_minutes(time_text).ok_or_else(|| ParseError::BadTime {
            file: file.to_string(),
            line: line_no,
            text: line.to_string(),
        })?;

        // Every open counter closes at this line's timestamp; fresh matches
        // open new intervals at it.
        tracker.close_all(raw_minutes, counters);
        for check in rules.checks() {
            if check.matches(label) {
                add_count(counters, &check.name, 1);
                tracker
                    .open(check.name.clone(), raw_minutes)
                    .map_err(|source| counter_error(file, line_no, source))?;
            }
        }
        for (category, contribution) in rules.match_counters(line) {
            add_count(counters, &category, contribution);
            tracker
                .open(category, raw_minutes)
                .map_err(|source| counter_error(file, line_no, source))?;
        }

        for marker in rules.markers_for(label) {
            apply_marker(day, marker.policy, raw_minutes, &marker.name);
        }

        let weights = categorize(
            label,
            rules,
            categories,
            options.diagnostics,
            file,
            line_no,
            day.date(),
            outcome,
        );
        let out_of_order = day.add_activity(raw_minutes, label, weights, categories.sleep());
        if out_of_order {
            outcome.errors.push(SoftError::OutOfOrder {
                date: day.date(),
                minutes: raw_minutes.max(DAY_START),
            });
        }
    }

    if let State::InDay(day) = state {
        close_day(day, calendar, categories, &mut days);
    }
    tracker.discard();

    if !saw_header {
        return Err(ParseError::EmptyLog {
            file: file.to_string(),
        });
    }
    Ok(days)
}

/// Weighted categories for a label: first matching rule, then the implicit
/// sleep sentinel, then the error pseudo-category with a soft error.
#[allow(clippy::too_many_arguments)]
fn categorize(
    label: &str,
    rules: &Ruleset,
    categories: &mut CategorySet,
    diagnostics: bool,
    file: &str,
    line: usize,
    date: NaiveDate,
    outcome: &mut ParseOutcome,
) -> Vec<WeightedCategory> {
    if let Some(rule) = rules.categorize(label) {
        if diagnostics {
            let root = rule
                .categories()
                .first()
                .map(|w| categories.name(categories.root_of(w.category)).to_string())
                .unwrap_or_default();
            outcome
                .diagnostics
                .record(label, &root, rule.pattern_text(), file, line);
        }
        return rule.categories().to_vec();
    }
    if label == categories.name(categories.sleep()) {
        return vec![WeightedCategory {
            category: categories.sleep(),
            weight: 1.0,
        }];
    }
    outcome.errors.push(SoftError::UnknownCategory {
        date,
        file: file.to_string(),
        line,
        label: label.to_string(),
    });
    let error_category = categories
        .get(ERROR_CATEGORY)
        .expect("pre-resolved during rule compilation");
    vec![WeightedCategory {
        category: error_category,
        weight: 1.0,
    }]
}

fn close_day(mut day: Day, calendar: &HolidayCalendar, categories: &mut CategorySet, days: &mut Vec<Day>) {
    let holiday = calendar.is_holiday(day.date());
    day.close(holiday, categories);
    days.push(day);
}

fn bad_date(file: &str, line: usize, text: &str) -> ParseError {
    ParseError::BadDate {
        file: file.to_string(),
        line,
        text: text.to_string(),
    }
}

fn counter_error(file: &str, line: usize, source: TrackerError) -> ParseError {
    ParseError::Counter {
        file: file.to_string(),
        line,
        source,
    }
}

/// Reverse-chronological pass: derives each day's sleep total from its
/// successor and merges the display ranges of identical boundary
/// activities on calendar-adjacent days.
fn link_days(days: &mut [Day], categories: &CategorySet) {
    let sleep = categories.sleep();
    for index in (0..days.len()).rev() {
        if index + 1 >= days.len() {
            days[index].set_sleep_time(None);
            continue;
        }
        let (head, tail) = days.split_at_mut(index + 1);
        let current = &mut head[index];
        let next = &mut tail[0];

        let total = current.sleep_after_getup(sleep) + next.sleep_before_getup(sleep);
        current.set_sleep_time(Some(total));

        let adjacent = current
            .date()
            .succ_opt()
            .is_some_and(|successor| successor == next.date());
        if !adjacent {
            continue;
        }
        if let (Some(last), Some(first)) = (current.last_activity_mut(), next.first_activity_mut())
        {
            if last.label() == first.label() {
                if let Some(first_end) = first.end() {
                    last.set_display_end(first_end + MINUTES_PER_DAY);
                }
                first.set_display_start(last.start() - MINUTES_PER_DAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::compile_rules;
    use std::collections::HashMap;

    const RULES: &str = "\
[rules]
Travail.* = Travail
Guitare = 50% Musique 50% Loisir
Repos = Repos
";

    fn options() -> ParseOptions {
        ParseOptions {
            period: Period::full_year(2021),
            default_year: 2021,
            diagnostics: false,
        }
    }

    fn parse_one(rules_text: &str, log: &str) -> (LogData, ParseOutcome, CategorySet) {
        let (rules, mut categories) =
            compile_rules(rules_text, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: log.to_string(),
        };
        let (data, outcome) = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options(),
        )
        .expect("parse should succeed");
        (data, outcome, categories)
    }

    #[test]
    fn single_day_parses_contiguous_intervals() {
        let log = "06-01\n0700 Travail matin\n1200 Repos\n1400 Travail soir\n";
        let (data, outcome, _) = parse_one(RULES, log);
        assert!(!outcome.has_errors());
        assert_eq!(data.days.len(), 1);
        let day = &data.days[0];
        assert!(day.closed());
        let intervals: Vec<(i32, i32)> = day.iter_intervals().map(|(f, t, _)| (f, t)).collect();
        // Synthesized sleep from 05:00, then the three logged intervals.
        assert_eq!(
            intervals,
            [(300, 420), (420, 720), (720, 840), (840, DAY_END)]
        );
        let starts: Vec<i32> = intervals.iter().map(|(f, _)| *f).collect();
        let mut sorted = starts.clone();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    }

    #[test]
    fn sleep_label_is_implicitly_categorized() {
        let log = "06-01\n0500 Zzz\n0900 Travail\n";
        let (_, outcome, _) = parse_one(RULES, log);
        assert!(!outcome.has_errors());
    }

    #[test]
    fn unknown_label_is_a_soft_error_with_suggestion() {
        let log = "06-01\n0700 Mystère (x?)\n";
        let (data, outcome, set) = parse_one(RULES, log);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            &outcome.errors[0],
            SoftError::UnknownCategory { label, line: 2, .. } if label == "Mystère (x?)"
        ));
        let suggestions = outcome.rule_suggestions();
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].contains(r"\("));
        assert!(suggestions[0].contains(r"\?"));
        assert!(suggestions[0].ends_with("= Error"));
        // The activity still lands in the error pseudo-category.
        let error = set.get(ERROR_CATEGORY).expect("created on demand");
        let day = &data.days[0];
        assert!(
            day.activities()
                .iter()
                .any(|a| a.categories().iter().any(|w| w.category == error))
        );
    }

    #[test]
    fn repeated_unknown_label_suggested_once() {
        let log = "06-01\n0700 Mystère\n0800 Travail\n0900 Mystère\n";
        let (_, outcome, _) = parse_one(RULES, log);
        assert_eq!(outcome.errors.len(), 2);
        assert_eq!(outcome.rule_suggestions().len(), 1);
    }

    #[test]
    fn out_of_order_time_is_a_soft_error() {
        let log = "06-01\n0900 Travail\n0800 Repos\n";
        let (data, outcome, _) = parse_one(RULES, log);
        assert_eq!(outcome.errors.len(), 1);
        assert!(matches!(
            &outcome.errors[0],
            SoftError::OutOfOrder { minutes: 480, .. }
        ));
        // Clamped, not reordered.
        let day = &data.days[0];
        assert_eq!(day.activities().last().unwrap().start(), 540);
    }

    #[test]
    fn line_before_day_header_is_fatal() {
        let (rules, mut categories) =
            compile_rules(RULES, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: "0700 Travail\n".to_string(),
        };
        let err = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options(),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::DayUnknown { line: 1, .. }));
    }

    #[test]
    fn malformed_time_is_fatal() {
        let (rules, mut categories) =
            compile_rules(RULES, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: "06-01\n4590 Travail\n".to_string(),
        };
        let err = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options(),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::BadTime { line: 2, .. }));
    }

    #[test]
    fn counter_accrues_time_until_next_line() {
        let rules_text = "[counters]\n.*vélo.* = 1 = Vélo\n[rules]\n.* = Divers\n";
        let log = "06-01\n0600 vélo\n0615 repos\n";
        let (data, outcome, _) = parse_one(rules_text, log);
        assert!(!outcome.has_errors());
        let total = data.counters["Vélo"];
        assert_eq!(total.count, 1);
        assert_eq!(total.minutes, 15);
    }

    #[test]
    fn annotation_line_counts_without_interval() {
        let rules_text = "[counters]\n(\\d+) pompes = $1 = Pompes\n[rules]\n.* = Divers\n";
        let log = "06-01\n0600 sport\n25 pompes\n0700 repos\n";
        let (data, _, _) = parse_one(rules_text, log);
        let total = data.counters["Pompes"];
        assert_eq!(total.count, 25);
        assert_eq!(total.minutes, 0);
    }

    #[test]
    fn open_counter_at_day_header_is_fatal() {
        let rules_text = "[counters]\n.*vélo.* = 1 = Vélo\n[rules]\n.* = Divers\n";
        let (rules, mut categories) =
            compile_rules(rules_text, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: "06-01\n0600 vélo\n06-02\n0700 repos\n".to_string(),
        };
        let err = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ParseError::OpenCounterAtDayBreak { line: 3, .. }
        ));
    }

    #[test]
    fn two_counters_on_one_category_is_fatal() {
        let rules_text =
            "[counters]\n.*vélo.* = 1 = Sport\n.*course.* = 1 = Sport\n[rules]\n.* = Divers\n";
        let (rules, mut categories) =
            compile_rules(rules_text, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: "06-01\n0600 vélo et course\n".to_string(),
        };
        let err = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options(),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::Counter { line: 2, .. }));
    }

    #[test]
    fn marker_policies_apply_per_day() {
        let rules_text = "\
[markers]
pause.* = Each = Pause
lever.* = First = Lever
coucher.* = Last = Coucher
[rules]
.* = Divers
";
        let log = "\
06-01
0510 pause a
0520 pause b
0530 pause c
0600 lever un
0700 lever deux
0800 coucher un
0900 coucher deux
";
        let (data, _, _) = parse_one(rules_text, log);
        let day = &data.days[0];
        let pauses: Vec<i32> = day
            .markers()
            .iter()
            .filter(|m| m.name == "Pause")
            .map(|m| m.minutes)
            .collect();
        assert_eq!(pauses, [310, 320, 330]);
        assert_eq!(day.find_marker("Lever").unwrap().minutes, 360);
        assert_eq!(day.find_marker("Coucher").unwrap().minutes, 540);
    }

    #[test]
    fn two_pass_linkage_computes_sleep_totals() {
        let log = "\
06-01
0700 Travail
2300 Zzz
06-02
0800 Travail
";
        let (data, _, _) = parse_one(RULES, log);
        assert_eq!(data.days.len(), 2);
        // Day 1: slept 05:00-07:00 before getup (not counted here), then
        // 23:00-29:00 after getup (360), plus day 2's 05:00-08:00 (180).
        assert_eq!(data.days[0].sleep_time(), Some(540));
        // Last day has no successor.
        assert_eq!(data.days[1].sleep_time(), None);
    }

    #[test]
    fn adjacent_days_merge_displayed_sleep_boundary() {
        let log = "\
06-01
0700 Travail
2300 Zzz
06-02
0800 Travail
";
        let (data, _, _) = parse_one(RULES, log);
        let last = data.days[0].activities().last().unwrap();
        let first = data.days[1].activities().first().unwrap();
        assert_eq!(last.label(), first.label());

        // Both sides describe the same absolute interval once normalized by
        // one day.
        let (_, last_display_end) = last.display_range();
        let (first_display_start, _) = first.display_range();
        assert_eq!(last_display_end, Some(first.end().unwrap() + MINUTES_PER_DAY));
        assert_eq!(first_display_start, last.start() - MINUTES_PER_DAY);
        assert!(first.continues_previous_day());

        // Authoritative times are untouched by the merge.
        assert_eq!(last.end(), Some(DAY_END));
        assert_eq!(first.start(), DAY_START);
    }

    #[test]
    fn display_merge_skipped_for_non_adjacent_days() {
        let log = "\
06-01
0700 Travail
2300 Zzz
06-05
0800 Travail
";
        let (data, _, _) = parse_one(RULES, log);
        let last = data.days[0].activities().last().unwrap();
        assert_eq!(last.display_range().1, last.end());
        // Sleep linkage still follows list order.
        assert_eq!(data.days[0].sleep_time(), Some(540));
    }

    #[test]
    fn days_outside_period_are_ignored() {
        let (rules, mut categories) =
            compile_rules(RULES, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: "06-01\n0700 Travail\n07-01\n0700 Travail\n".to_string(),
        };
        let opts = ParseOptions {
            period: Period::parse("06-01~06-30", 2021).unwrap(),
            default_year: 2021,
            diagnostics: false,
        };
        let (data, _) = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &opts,
        )
        .expect("parse should succeed");
        assert_eq!(data.days.len(), 1);
    }

    #[test]
    fn explicit_year_in_header_wins() {
        let log = "2020-06-01\n0700 Travail\n";
        let (data, _, _) = parse_one(RULES, log);
        assert_eq!(
            data.days[0].date(),
            NaiveDate::from_ymd_opt(2020, 6, 1).unwrap()
        );
    }

    #[test]
    fn day_header_note_suffix_is_accepted() {
        let log = "06-01 : memorable day\n0700 Travail\n";
        let (data, _, _) = parse_one(RULES, log);
        assert_eq!(data.days.len(), 1);
    }

    #[test]
    fn comment_lines_are_skipped() {
        let log = "# year 2021\n06-01\n# morning\n0700 Travail\n";
        let (data, outcome, _) = parse_one(RULES, log);
        assert!(!outcome.has_errors());
        assert_eq!(data.days[0].activities().len(), 2);
    }

    #[test]
    fn file_without_day_header_is_fatal() {
        let (rules, mut categories) =
            compile_rules(RULES, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: "# only comments\n".to_string(),
        };
        let err = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options(),
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::EmptyLog { .. }));
    }

    fn two_sources(first: &str, second: &str) -> Result<(LogData, ParseOutcome), ParseError> {
        let (rules, mut categories) =
            compile_rules(RULES, None, &HashMap::new()).expect("rules should compile");
        let sources = [
            LogSource {
                name: "a.log".to_string(),
                year: 2021,
                text: first.to_string(),
            },
            LogSource {
                name: "b.log".to_string(),
                year: 2021,
                text: second.to_string(),
            },
        ];
        parse_sources(
            &sources,
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options(),
        )
    }

    #[test]
    fn files_merge_in_timestamp_order() {
        let (data, _) = two_sources("06-03\n0700 Travail\n", "06-02\n0700 Travail\n")
            .expect("parse should succeed");
        let dates: Vec<NaiveDate> = data.days.iter().map(Day::date).collect();
        assert_eq!(
            dates,
            [
                NaiveDate::from_ymd_opt(2021, 6, 2).unwrap(),
                NaiveDate::from_ymd_opt(2021, 6, 3).unwrap()
            ]
        );
        assert!(data.gaps.is_empty());
    }

    #[test]
    fn overlapping_files_are_fatal() {
        let err = two_sources(
            "06-01\n0700 Travail\n06-02\n0700 Travail\n",
            "06-02\n0900 Repos\n",
        )
        .unwrap_err();
        assert!(matches!(err, ParseError::OverlappingFiles { .. }));
    }

    #[test]
    fn wide_gap_between_files_is_recorded() {
        let (data, _) = two_sources("06-01\n0700 Travail\n", "06-05\n0700 Travail\n")
            .expect("parse should succeed");
        assert_eq!(data.gaps.len(), 1);
        let gap = data.gaps[0];
        assert_eq!(gap.from, instant(NaiveDate::from_ymd_opt(2021, 6, 1).unwrap(), DAY_END));
        assert_eq!(gap.to, instant(NaiveDate::from_ymd_opt(2021, 6, 5).unwrap(), 420));
    }

    #[test]
    fn diagnostics_group_labels_by_category() {
        let (rules, mut categories) =
            compile_rules(RULES, None, &HashMap::new()).expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: "06-01\n0700 Travail matin\n0900 Travail soir\n1100 Guitare\n".to_string(),
        };
        let opts = ParseOptions {
            diagnostics: true,
            ..options()
        };
        let (_, outcome) = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &opts,
        )
        .expect("parse should succeed");
        let grouped = outcome.diagnostics.by_category();
        assert!(grouped.contains_key("Travail"));
        assert!(grouped.contains_key("Musique"));
        let travail = &grouped["Travail"];
        assert_eq!(travail.len(), 2);
        assert_eq!(travail[0].1.pattern, "Travail.*");
    }

    #[test]
    fn year_deduced_from_path() {
        assert_eq!(deduce_year(Path::new("/home/u/data/2021.log")), Some(2021));
        assert_eq!(
            deduce_year(Path::new("/home/u/2020/december-2021.log")),
            Some(2021)
        );
        assert_eq!(deduce_year(Path::new("/home/u/data/journal.log")), None);
    }
}
