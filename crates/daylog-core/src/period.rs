//! Retention periods limiting which days are gathered.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors from period parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error(
        "period must be a date or a ~ range (06-12, ~06-12, 06-03~, 06-03~06-12; dashes optional): {text}"
    )]
    BadFormat { text: String },

    #[error("period contains an invalid date: {text}")]
    BadDate { text: String },
}

/// An inclusive date range within one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    from: NaiveDate,
    to: NaiveDate,
}

impl Period {
    /// A period excluding nothing, for runs with no retention limit.
    pub const fn unbounded() -> Self {
        Self {
            from: NaiveDate::MIN,
            to: NaiveDate::MAX,
        }
    }

    /// The whole of a year.
    pub fn full_year(year: i32) -> Self {
        Self {
            from: NaiveDate::from_ymd_opt(year, 1, 1).expect("January 1st exists"),
            to: NaiveDate::from_ymd_opt(year, 12, 31).expect("December 31st exists"),
        }
    }

    /// Parses `MM-DD` (a single day), `~MM-DD`, `MM-DD~` or `MM-DD~MM-DD`;
    /// dashes within dates are optional.
    pub fn parse(text: &str, year: i32) -> Result<Self, PeriodError> {
        let compact: String = text.chars().filter(|&c| c != '-').collect();
        let (from_text, to_text) = match compact.split_once('~') {
            None => (compact.as_str(), compact.as_str()),
            Some((from, to)) if !to.contains('~') => (
                if from.is_empty() { "0101" } else { from },
                if to.is_empty() { "1231" } else { to },
            ),
            Some(_) => {
                return Err(PeriodError::BadFormat {
                    text: text.to_string(),
                });
            }
        };
        let from = parse_month_day(from_text, year, text)?;
        let to = parse_month_day(to_text, year, text)?;
        Ok(Self { from, to })
    }

    pub const fn from(&self) -> NaiveDate {
        self.from
    }

    pub const fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

fn parse_month_day(compact: &str, year: i32, original: &str) -> Result<NaiveDate, PeriodError> {
    if compact.len() != 4 || !compact.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PeriodError::BadFormat {
            text: original.to_string(),
        });
    }
    let month: u32 = compact[..2].parse().expect("two digits");
    let day: u32 = compact[2..].parse().expect("two digits");
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| PeriodError::BadDate {
        text: original.to_string(),
    })
}
