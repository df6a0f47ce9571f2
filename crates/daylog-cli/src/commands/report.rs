//! Report command: per-category totals, counter reports and diagnostics.
//!
//! Soft errors collected during parsing are printed as a batch (with
//! suggested rules lines for unknown labels) and fail the run before any
//! report is produced.

use ansi_term::Colour::{Blue, Red};
use anyhow::{Result, bail};
use serde::Serialize;

use daylog_core::{
    CounterTotal, CounterTotals, HolidayCalendar, LogData, ParseOptions, ParseOutcome, Totals,
    day::{format_minutes, format_minutes_f},
    label_totals, parse_files, totals, zdiv,
};

use crate::Config;
use crate::commands::util;

/// Everything the JSON output mode emits.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    name: &'a str,
    mode: &'a str,
    totals: &'a Totals,
    counters: &'a CounterTotals,
    /// Configured or generated color per reported category.
    colors: std::collections::BTreeMap<&'a str, &'a str>,
}

#[allow(clippy::too_many_arguments, clippy::fn_params_excessive_bools)]
pub fn run(
    config: &Config,
    rules_arg: Option<&str>,
    period_arg: Option<&str>,
    counters: &[String],
    collapses: &[String],
    diag: bool,
    json: bool,
    files: &[String],
) -> Result<()> {
    let overrides = util::parse_collapse_overrides(collapses)?;
    let (ruleset, mut categories) = util::load_ruleset(config, rules_arg, &overrides, counters)?;
    let calendar = HolidayCalendar::new(&config.holidays);
    let year = util::default_year(config);
    let options = ParseOptions {
        period: util::parse_period(period_arg, year)?,
        default_year: year,
        diagnostics: diag,
    };

    let paths: Vec<_> = files.iter().map(|f| util::resolve_log_path(f)).collect();
    let (data, outcome) = parse_files(&paths, &ruleset, &mut categories, &calendar, &options)?;

    if outcome.has_errors() {
        report_soft_errors(&outcome);
        bail!("fix the errors above");
    }

    if diag {
        print_diagnostics(&outcome, &data, &calendar)?;
    }

    let totals = totals(&data.days, &categories, &calendar)?;

    if json {
        categories.generate_colors(totals.times.keys().map(String::as_str));
        let colors = totals
            .times
            .keys()
            .filter_map(|name| {
                categories
                    .color_for_name(name)
                    .map(|color| (name.as_str(), color))
            })
            .collect();
        let report = JsonReport {
            name: &ruleset.spec.name,
            mode: ruleset.spec.mode.as_str(),
            totals: &totals,
            counters: &data.counters,
            colors,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_totals(&totals);
    if !data.counters.is_empty() {
        print_counters(&data.counters);
    }
    Ok(())
}

/// Prints every soft error, then one paste-ready rules line per distinct
/// unknown label.
fn report_soft_errors(outcome: &ParseOutcome) {
    for error in &outcome.errors {
        println!("{error}");
    }
    let suggestions = outcome.rule_suggestions();
    if !suggestions.is_empty() {
        println!();
        for suggestion in suggestions {
            println!("{suggestion}");
        }
        println!();
    }
}

fn print_diagnostics(
    outcome: &ParseOutcome,
    data: &LogData,
    calendar: &HolidayCalendar,
) -> Result<()> {
    for (category, labels) in outcome.diagnostics.by_category() {
        println!("{}", Red.paint(category));
        for (label, seen) in labels {
            println!(
                " {label} {} : {}",
                Blue.paint(format!("({})", seen.pattern)),
                seen.lines.join(", ")
            );
        }
    }
    let by_label = label_totals(&data.days, calendar)?;
    if !by_label.is_empty() {
        println!();
        println!("Time by {} :", Red.paint("activity"));
        let width = by_label.keys().map(String::len).max().unwrap_or(0);
        for (label, bucket) in &by_label {
            println!(
                " {label:<width$} {} ({} + {})",
                hours_text(bucket.total()),
                hours_text(bucket.weekday),
                hours_text(bucket.holiday),
            );
        }
        println!();
    }
    Ok(())
}

/// `HH:MM` for whole minutes, `HH:MM.ff` once weights make them fractional.
#[allow(clippy::cast_possible_truncation)]
fn hours_text(minutes: f64) -> String {
    if minutes.fract().abs() < 1e-9 {
        format_minutes(minutes as i64)
    } else {
        format_minutes_f(minutes)
    }
}

fn print_totals(totals: &Totals) {
    println!(
        "Total days : {} ({} work + {} holidays)",
        totals.day_count(),
        totals.work_days,
        totals.holidays
    );

    let day_count = f64::from(totals.day_count());
    let work_days = f64::from(totals.work_days);
    let holidays = f64::from(totals.holidays);
    let rows: Vec<[String; 7]> = totals
        .times
        .iter()
        .map(|(category, times)| {
            [
                category.clone(),
                hours_text(times.total()),
                format_minutes_f(zdiv(times.total(), day_count)),
                hours_text(times.weekday),
                format_minutes_f(zdiv(times.weekday, work_days)),
                hours_text(times.holiday),
                format_minutes_f(zdiv(times.holiday, holidays)),
            ]
        })
        .collect();

    let mut widths = [0usize; 7];
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }
    for row in &rows {
        println!(
            "{:<w0$} : {:>w1$} ({:>w2$}/d) ({:>w3$} ({:>w4$}/d) + {:>w5$} ({:>w6$}/d))",
            row[0],
            row[1],
            row[2],
            row[3],
            row[4],
            row[5],
            row[6],
            w0 = widths[0],
            w1 = widths[1],
            w2 = widths[2],
            w3 = widths[3],
            w4 = widths[4],
            w5 = widths[5],
            w6 = widths[6],
        );
    }
}

struct CounterRow {
    name: String,
    count: i64,
    count_text: String,
    minutes: i64,
    time_text: String,
    average: f64,
    average_text: String,
}

impl CounterRow {
    #[allow(clippy::cast_precision_loss)]
    fn new(name: &str, total: CounterTotal) -> Self {
        let average = zdiv(total.minutes as f64, total.count as f64);
        Self {
            name: name.to_string(),
            count: total.count,
            count_text: format!("{:02}", total.count),
            minutes: total.minutes,
            time_text: format_minutes(total.minutes),
            average,
            average_text: format_minutes_f(average),
        }
    }
}

fn print_counters(counters: &CounterTotals) {
    let rows: Vec<CounterRow> = counters
        .iter()
        .map(|(name, total)| CounterRow::new(name, *total))
        .collect();
    let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let count_width = rows.iter().map(|r| r.count_text.len()).max().unwrap_or(0);
    let time_width = rows.iter().map(|r| r.time_text.len()).max().unwrap_or(0);

    println!();
    println!("Counters by {} :", Red.paint("name"));
    for row in &rows {
        if row.minutes == 0 {
            println!(
                " {:<name_width$} {:>count_width$}",
                row.name, row.count_text
            );
        } else {
            println!(
                " {:<name_width$} {:>count_width$} {:>time_width$} ({} avg)",
                row.name, row.count_text, row.time_text, row.average_text
            );
        }
    }

    println!();
    println!("By {} :", Red.paint("average time"));
    let mut by_average: Vec<&CounterRow> = rows.iter().filter(|r| r.minutes != 0).collect();
    by_average.sort_by(|a, b| b.average.total_cmp(&a.average));
    for row in by_average {
        println!(
            " {} {:>name_width$} {:>time_width$} {:>count_width$}",
            row.average_text, row.name, row.time_text, row.count_text
        );
    }

    println!();
    println!("By {} :", Red.paint("total time"));
    let mut by_time: Vec<&CounterRow> = rows.iter().filter(|r| r.minutes != 0).collect();
    by_time.sort_by(|a, b| b.minutes.cmp(&a.minutes));
    for row in by_time {
        println!(
            " {:>time_width$} {:>name_width$} ({} avg) {:>count_width$}",
            row.time_text, row.name, row.average_text, row.count_text
        );
    }

    println!();
    println!("By {} :", Red.paint("count"));
    let mut by_count: Vec<&CounterRow> = rows.iter().collect();
    by_count.sort_by(|a, b| b.count.cmp(&a.count));
    for row in by_count {
        println!(
            " {:>count_width$} {:>name_width$} ({:>time_width$}, avg {})",
            row.count_text, row.name, row.time_text, row.average_text
        );
    }
}
