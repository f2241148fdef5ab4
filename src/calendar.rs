//! Date arithmetic used to place payment dates.

use crate::error::{AmortError, Result};
use crate::frequency::{Frequency, PeriodStep};
use chrono::{Datelike, Days, Months, NaiveDate};

pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Calendar operations the schedule engine needs.
pub trait Calendar {
    fn add_days(&self, date: NaiveDate, days: u64) -> Option<NaiveDate>;

    /// Adds calendar months, clamping the day to the target month's length.
    fn add_months(&self, date: NaiveDate, months: u32) -> Option<NaiveDate>;

    fn last_day_of_month(&self, date: NaiveDate) -> NaiveDate;

    fn is_month_end(&self, date: NaiveDate) -> bool {
        self.last_day_of_month(date) == date
    }
}

/// Proleptic Gregorian calendar backed by `chrono`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Gregorian;

impl Calendar for Gregorian {
    fn add_days(&self, date: NaiveDate, days: u64) -> Option<NaiveDate> {
        date.checked_add_days(Days::new(days))
    }

    fn add_months(&self, date: NaiveDate, months: u32) -> Option<NaiveDate> {
        date.checked_add_months(Months::new(months))
    }

    fn last_day_of_month(&self, date: NaiveDate) -> NaiveDate {
        (28..=31)
            .rev()
            .find_map(|day| date.with_day(day))
            .unwrap_or(date)
    }
}

/// Next payment date one period after `date`.
///
/// With `anchor_month_end` set, month-based frequencies land on the last day
/// of the target month. Otherwise the day of month is kept and clamped to the
/// target month's length.
pub fn next_payment_date<C: Calendar + ?Sized>(
    calendar: &C,
    date: NaiveDate,
    frequency: Frequency,
    anchor_month_end: bool,
) -> Result<NaiveDate> {
    let next = match frequency.step() {
        PeriodStep::Days(days) => calendar.add_days(date, days),
        PeriodStep::Months(months) => calendar.add_months(date, months).map(|next| {
            if anchor_month_end {
                calendar.last_day_of_month(next)
            } else {
                next
            }
        }),
    };

    next.ok_or_else(|| {
        AmortError::InvalidDate(format!(
            "{} does not return a new payment date",
            format_date(&date)
        ))
    })
}

/// Parses a `DD/MM/YYYY` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|e| AmortError::InvalidDate(format!("'{}' is not DD/MM/YYYY: {}", s, e)))
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
