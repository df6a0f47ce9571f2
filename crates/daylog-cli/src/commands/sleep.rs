//! Sleep command: nightly sleep hour and duration averaged over periods.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use anyhow::{Context, Result};

use daylog_core::{
    HolidayCalendar, ParseOptions, SLEEP_CATEGORY, day::format_minutes, parse_files, sleep_report,
};

use crate::Config;
use crate::commands::util;

/// Prints one tab-separated record per period: start date, average sleep
/// hour (minutes from midnight) and average duration (hours). Suitable for
/// external plotting.
pub fn run(config: &Config, rules_arg: Option<&str>, length: usize, files: &[String]) -> Result<()> {
    let period_length =
        NonZeroUsize::new(length).context("length must be a positive number of days")?;

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
    // Categorization errors don't matter for sleep intervals.
    let (data, _) = parse_files(&paths, &ruleset, &mut categories, &calendar, &options)?;

    let mut labels = vec![SLEEP_CATEGORY.to_string()];
    labels.extend(config.nap_labels.iter().cloned());
    let report = sleep_report(&data.days, &labels, period_length)?;

    if let Some(latest) = report.latest_hour {
        eprintln!("latest sleep hour {}", format_minutes(i64::from(latest)));
    }
    for stat in &report.stats {
        println!(
            "{}\t{}\t{}",
            stat.date, stat.avg_hour, stat.avg_duration_hours
        );
    }
    Ok(())
}
