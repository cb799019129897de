//! Calendar month windows used by the budget, cash flow and report pages.

use serde::Deserialize;
use time::{Date, Month};

use crate::{Error, FieldErrors};

/// Query parameters selecting a calendar month. Missing parts default to the current month.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct MonthQuery {
    /// The calendar year, e.g. 2024.
    pub year: Option<i32>,
    /// The month number, 1 to 12.
    pub month: Option<u8>,
}

/// A calendar month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    /// The calendar year.
    pub year: i32,
    /// The month of the year.
    pub month: Month,
}

impl MonthWindow {
    /// The month that contains `date`.
    pub fn containing(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Resolve `query` against `today`.
    ///
    /// # Errors
    /// Returns a validation error if the month is not between 1 and 12.
    pub fn from_query(query: MonthQuery, today: Date) -> Result<Self, Error> {
        let year = query.year.unwrap_or(today.year());
        let month = match query.month {
            Some(month) => Month::try_from(month)
                .map_err(|_| FieldErrors::single("month", "The month must be between 1 and 12."))?,
            None => today.month(),
        };

        Ok(Self { year, month })
    }

    /// The month number, 1 to 12.
    pub fn month_number(&self) -> u8 {
        self.month as u8
    }

    /// The first day of the month.
    pub fn start(&self) -> Result<Date, Error> {
        Date::from_calendar_date(self.year, self.month, 1)
            .map_err(|_| FieldErrors::single("year", "The year is out of range."))
    }

    /// The last day of the month.
    pub fn end(&self) -> Result<Date, Error> {
        let next = self.next();
        let first_of_next = Date::from_calendar_date(next.year, next.month, 1)
            .map_err(|_| FieldErrors::single("year", "The year is out of range."))?;

        first_of_next
            .previous_day()
            .ok_or_else(|| FieldErrors::single("year", "The year is out of range."))
    }

    /// The following calendar month.
    pub fn next(&self) -> Self {
        match self.month {
            Month::December => Self {
                year: self.year + 1,
                month: Month::January,
            },
            month => Self {
                year: self.year,
                month: month.next(),
            },
        }
    }

    /// The calendar month `count` months before this one.
    pub fn months_before(&self, count: u32) -> Self {
        let index = self.year * 12 + i32::from(self.month_number()) - 1 - count as i32;
        let year = index.div_euclid(12);
        let month = (index.rem_euclid(12) + 1) as u8;

        Self {
            year,
            month: Month::try_from(month).unwrap_or(Month::January),
        }
    }

    /// The month formatted as "YYYY-MM".
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month_number())
    }
}
