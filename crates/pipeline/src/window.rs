//! Acquisition date windows

use chrono::{NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, Result};

/// A `[start, end)` date range with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Explicit range. Fails unless `start < end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start >= end {
            return Err(PipelineError::InvalidDateWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// `[anchor - half_days, anchor + half_days)`
    pub fn around(anchor: NaiveDate, half_days: i64) -> Result<Self> {
        let start = offset(anchor, half_days.checked_neg(), half_days)?;
        let end = offset(anchor, Some(half_days), half_days)?;
        Self::new(start, end)
    }

    /// `[start, start + days)`
    pub fn starting_at(start: NaiveDate, days: i64) -> Result<Self> {
        Self::new(start, offset(start, Some(days), days)?)
    }

    /// Window from a date picker: one date expands to `default_days`, two
    /// dates are taken as an explicit range.
    pub fn from_inputs(dates: &[NaiveDate], default_days: i64) -> Result<Self> {
        match *dates {
            [start] => Self::starting_at(start, default_days),
            [start, end] => Self::new(start, end),
            _ => Err(PipelineError::InvalidParameter {
                name: "dates",
                value: format!("{} dates", dates.len()),
                reason: "expected a start date and optionally an end date".into(),
            }),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// `date + days`, failing instead of leaving the calendar range
fn offset(date: NaiveDate, days: Option<i64>, requested: i64) -> Result<NaiveDate> {
    days.and_then(TimeDelta::try_days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| PipelineError::InvalidParameter {
            name: "days",
            value: requested.to_string(),
            reason: format!("shifts {date} outside the supported calendar"),
        })
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.start, self.end)
    }
}

#[derive(Serialize, Deserialize)]
struct RawWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawWindow> for DateWindow {
    type Error = PipelineError;

    fn try_from(raw: RawWindow) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl From<DateWindow> for RawWindow {
    fn from(w: DateWindow) -> Self {
        Self {
            start: w.start,
            end: w.end,
        }
    }
}
