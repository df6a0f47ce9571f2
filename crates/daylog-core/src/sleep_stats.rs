//! Sleep statistics: nightly sleep hour and duration averaged over
//! fixed-length periods, for external plotting.

use std::num::NonZeroUsize;

use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::aggregate::{AggregateError, zdiv};
use crate::day::Day;

/// The first sleep interval starting after this time sets the day's sleep
/// hour.
pub const NIGHT_START: i32 = 19 * 60;

/// One day's raw sleep measurements. `hour` is `None` for gap-filler
/// entries, which contribute nothing to averages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRecord {
    pub date: NaiveDate,
    pub hour: Option<i32>,
    pub duration: i32,
}

/// Averages over one period.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepStat {
    pub date: NaiveDate,
    /// Average sleep hour in minutes from midnight.
    pub avg_hour: f64,
    /// Average sleep duration in hours.
    pub avg_duration_hours: f64,
}

/// The full sleep series.
#[derive(Debug, Clone)]
pub struct SleepReport {
    /// Latest sleep hour over the untrimmed series.
    pub latest_hour: Option<i32>,
    pub stats: Vec<SleepStat>,
}

/// Computes period-averaged sleep statistics over closed days.
///
/// Sleep intervals are read from the display-merged timeline, so a night
/// spanning midnight counts wholly for the day it started on. The series is
/// trimmed to begin on a Monday and end on a Sunday before averaging.
pub fn sleep_report(
    days: &[Day],
    labels: &[String],
    period_length: NonZeroUsize,
) -> Result<SleepReport, AggregateError> {
    let records = collect_records(days, labels)?;
    let latest_hour = records.iter().filter_map(|r| r.hour).max();
    let trimmed = trim_to_whole_weeks(records);
    let filled = fill_calendar_gaps(trimmed);
    let stats = filled
        .chunks(period_length.get())
        .map(average_chunk)
        .collect();
    Ok(SleepReport { latest_hour, stats })
}

fn collect_records(days: &[Day], labels: &[String]) -> Result<Vec<DayRecord>, AggregateError> {
    let mut records = Vec::new();
    for day in days {
        if !day.closed() {
            return Err(AggregateError::UnclosedDay { date: day.date() });
        }
        let mut duration = 0;
        let mut hour = None;
        for activity in day.activities() {
            if !labels.iter().any(|l| l.as_str() == activity.label()) {
                continue;
            }
            // An interval continuing the previous day already counted there.
            if activity.continues_previous_day() {
                continue;
            }
            let (_, display_end) = activity.display_range();
            if let Some(end) = display_end {
                duration += end - activity.start();
            }
            if hour.is_none() && activity.start() > NIGHT_START {
                hour = Some(activity.start());
            }
        }
        if let Some(hour) = hour {
            records.push(DayRecord {
                date: day.date(),
                hour: Some(hour),
                duration,
            });
        }
    }
    Ok(records)
}

/// Drops records before the first Monday, then pops trailing records until
/// the popped one is a Monday (that Monday is dropped too, leaving the
/// series ending on a Sunday).
fn trim_to_whole_weeks(mut records: Vec<DayRecord>) -> Vec<DayRecord> {
    let Some(start) = records
        .iter()
        .position(|r| r.date.weekday() == Weekday::Mon)
    else {
        return Vec::new();
    };
    records.drain(..start);
    while let Some(record) = records.pop() {
        if record.date.weekday() == Weekday::Mon {
            break;
        }
    }
    records
}

/// Inserts empty records for calendar days missing from the series.
fn fill_calendar_gaps(records: Vec<DayRecord>) -> Vec<DayRecord> {
    let Some(first) = records.first() else {
        return records;
    };
    let mut filled = Vec::with_capacity(records.len());
    let mut date = first.date;
    for record in records {
        while date < record.date {
            filled.push(DayRecord {
                date,
                hour: None,
                duration: 0,
            });
            date = date + Days::new(1);
        }
        date = record.date + Days::new(1);
        filled.push(record);
    }
    filled
}

fn average_chunk(chunk: &[DayRecord]) -> SleepStat {
    let day_count = chunk.iter().filter(|r| r.hour.is_some()).count();
    let hours: i32 = chunk.iter().filter_map(|r| r.hour).sum();
    let durations: i32 = chunk.iter().map(|r| r.duration).sum();
    #[allow(clippy::cast_precision_loss)]
    let count = day_count as f64;
    SleepStat {
        date: chunk[0].date,
        avg_hour: zdiv(f64::from(hours), count),
        avg_duration_hours: zdiv(f64::from(durations), count) / 60.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::holiday::HolidayCalendar;
    use crate::parser::{LogSource, ParseOptions, parse_sources};
    use crate::period::Period;
    use crate::rules::compile_rules;
    use std::collections::HashMap;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, m, d).expect("valid test date")
    }

    fn record(m: u32, d: u32, hour: i32) -> DayRecord {
        DayRecord {
            date: date(m, d),
            hour: Some(hour),
            duration: 480,
        }
    }

    #[test]
    fn trim_starts_monday_and_drops_final_monday() {
        // 2021-06-07 and 06-14 are Mondays.
        let records: Vec<DayRecord> = (6..=15).map(|d| record(6, d, 1380)).collect();
        let trimmed = trim_to_whole_weeks(records);
        assert_eq!(trimmed.first().unwrap().date, date(6, 7));
        // 06-15 and the Monday 06-14 are both dropped.
        assert_eq!(trimmed.last().unwrap().date, date(6, 13));
    }

    #[test]
    fn trim_without_any_monday_is_empty() {
        let records = vec![record(6, 8, 1380), record(6, 9, 1380)];
        let trimmed = trim_to_whole_weeks(records);
        assert!(trimmed.is_empty());
    }

    #[test]
    fn gaps_fill_with_empty_records() {
        let records = vec![record(6, 7, 1380), record(6, 10, 1400)];
        let filled = fill_calendar_gaps(records);
        let dates: Vec<NaiveDate> = filled.iter().map(|r| r.date).collect();
        assert_eq!(dates, [date(6, 7), date(6, 8), date(6, 9), date(6, 10)]);
        assert!(filled[1].hour.is_none());
        assert!(filled[2].hour.is_none());
    }

    #[test]
    fn averages_skip_empty_records() {
        let chunk = [
            record(6, 7, 1380),
            DayRecord {
                date: date(6, 8),
                hour: None,
                duration: 0,
            },
            record(6, 9, 1440),
        ];
        let stat = average_chunk(&chunk);
        assert!((stat.avg_hour - 1410.0).abs() < 1e-9);
        assert!((stat.avg_duration_hours - 8.0).abs() < 1e-9);
    }

    #[test]
    fn empty_chunk_averages_to_zero() {
        let chunk = [DayRecord {
            date: date(6, 7),
            hour: None,
            duration: 0,
        }];
        let stat = average_chunk(&chunk);
        assert!(stat.avg_hour.abs() < f64::EPSILON);
        assert!(stat.avg_duration_hours.abs() < f64::EPSILON);
    }

    #[test]
    fn report_over_parsed_days_averages_by_week() {
        // 06-06 is a Sunday; 06-07..06-13 form the retained week.
        let mut log = String::new();
        for d in 6..=15 {
            log.push_str(&format!("06-{d:02}\n0700 Up\n2300 Zzz\n"));
        }
        let (rules, mut categories) =
            compile_rules("[rules]\nUp = Divers\n", None, &HashMap::new())
                .expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: log,
        };
        let options = ParseOptions {
            period: Period::full_year(2021),
            default_year: 2021,
            diagnostics: false,
        };
        let (data, outcome) = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options,
        )
        .expect("parse should succeed");
        assert!(!outcome.has_errors());

        let report = sleep_report(
            &data.days,
            &["Zzz".to_string(), "Sieste".to_string()],
            NonZeroUsize::new(7).expect("non-zero"),
        )
        .expect("days are closed");

        assert_eq!(report.latest_hour, Some(1380));
        assert_eq!(report.stats.len(), 1);
        let week = &report.stats[0];
        assert_eq!(week.date, date(6, 7));
        assert!((week.avg_hour - 1380.0).abs() < 1e-9);
        // 23:00 to 07:00 via the merged display boundary.
        assert!((week.avg_duration_hours - 8.0).abs() < 1e-9);
    }

    #[test]
    fn naps_add_duration_but_not_hour() {
        let log = "06-07\n0700 Up\n1400 Sieste\n1500 Up\n2300 Zzz\n06-08\n0700 Up\n2300 Zzz\n";
        let (rules, mut categories) = compile_rules(
            "[rules]\nUp = Divers\nSieste = Repos\n",
            None,
            &HashMap::new(),
        )
        .expect("rules should compile");
        let source = LogSource {
            name: "test.log".to_string(),
            year: 2021,
            text: log.to_string(),
        };
        let options = ParseOptions {
            period: Period::full_year(2021),
            default_year: 2021,
            diagnostics: false,
        };
        let (data, _) = parse_sources(
            &[source],
            &rules,
            &mut categories,
            &HolidayCalendar::default(),
            &options,
        )
        .expect("parse should succeed");
        let records = collect_records(&data.days, &["Zzz".to_string(), "Sieste".to_string()])
            .expect("days are closed");
        // Day 1: synthesized morning sleep 05:00-07:00 (120), nap 60, and
        // the merged night 23:00-07:00 (480); hour from the night interval
        // only.
        assert_eq!(records[0].hour, Some(1380));
        assert_eq!(records[0].duration, 660);
    }

    #[test]
    fn unclosed_day_is_rejected() {
        let day = Day::new(date(6, 7));
        let err = sleep_report(
            &[day],
            &["Zzz".to_string()],
            NonZeroUsize::new(7).expect("non-zero"),
        )
        .unwrap_err();
        assert!(matches!(err, AggregateError::UnclosedDay { .. }));
    }
}
