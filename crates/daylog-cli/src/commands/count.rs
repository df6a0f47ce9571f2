//! Count command: occurrences and time spent for an ad-hoc pattern.

use std::collections::HashMap;

use anyhow::{Context, Result};
use regex::RegexBuilder;

use daylog_core::{HolidayCalendar, ParseOptions, day::format_minutes, parse_files};

use crate::Config;
use crate::commands::util;

/// Counts activities matching a case-insensitive pattern: total occurrences,
/// days with at least one match, and the time spent in matching intervals.
pub fn run(config: &Config, rules_arg: Option<&str>, pattern: &str, files: &[String]) -> Result<()> {
    let matcher = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("invalid pattern {pattern:?}"))?;

    let (ruleset, mut categories) =
        util::load_ruleset(config, rules_arg, &HashMap::new(), &[])?;
    let calendar = HolidayCalendar::new(&config.holidays);
    let year = util::default_year(config);
    let options = ParseOptions {
        period: util::parse_period(None, year)?,
        default_year: year,
        diagnostics: false,
    };
    let paths: Vec<_> = files.iter().map(|f| util::resolve_log_path(f)).collect();
    // Unknown labels don't matter here; the soft-error batch is ignored.
    let (data, _) = parse_files(&paths, &ruleset, &mut categories, &calendar, &options)?;

    let mut total_count = 0u64;
    let mut day_count = 0u64;
    let mut total_minutes = 0i64;
    for day in &data.days {
        let mut matched_today = false;
        for (from, to, activity) in day.iter_intervals() {
            if !matcher.is_match(activity.label()) {
                continue;
            }
            total_count += 1;
            total_minutes += i64::from(to - from);
            let elapsed = format_minutes(i64::from(to - from));
            if matched_today {
                println!("     ...{} : {elapsed}", activity.label());
            } else {
                matched_today = true;
                day_count += 1;
                println!("{} : {} : {elapsed}", day.date(), activity.label());
            }
        }
    }

    println!(
        "Total : {total_count} times over {day_count} days and {}",
        format_minutes(total_minutes)
    );
    Ok(())
}
