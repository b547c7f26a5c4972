//! Named reporting periods and the comparison windows they produce.
//!
//! All windows are UTC and half-open: `start <= t < end`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Today,
    #[default]
    Week,
    Month,
    Quarter,
    Year,
}

impl Period {
    pub fn as_str(self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Week => "week",
            Period::Month => "month",
            Period::Quarter => "quarter",
            Period::Year => "year",
        }
    }

    /// Current and previous comparison windows for this period as seen at `now`.
    ///
    /// `week` and `month` are rolling blocks of 7 and 30 days; the others are
    /// anchored to the calendar day, quarter or year containing `now`.
    pub fn windows(self, now: DateTime<Utc>) -> (DateWindow, DateWindow) {
        let today = now.date_naive();
        match self {
            Period::Today => {
                let start = midnight(today);
                (
                    DateWindow::new(start, now),
                    DateWindow::new(start - Duration::hours(24), start),
                )
            }
            Period::Week => rolling(now, Duration::days(7)),
            Period::Month => rolling(now, Duration::days(30)),
            Period::Quarter => {
                let start = quarter_start(today);
                (
                    DateWindow::new(midnight(start), now),
                    DateWindow::new(midnight(start - Months::new(3)), midnight(start)),
                )
            }
            Period::Year => {
                let start = year_start(today);
                (
                    DateWindow::new(midnight(start), now),
                    DateWindow::new(midnight(start - Months::new(12)), midnight(start)),
                )
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Period::Today),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            "quarter" => Ok(Period::Quarter),
            "year" => Ok(Period::Year),
            other => Err(format!("unknown period '{other}'")),
        }
    }
}

/// Half-open UTC time range.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }

    /// Smallest window covering both `self` and `other`.
    pub fn union(&self, other: &DateWindow) -> DateWindow {
        DateWindow::new(self.start.min(other.start), self.end.max(other.end))
    }
}

fn rolling(now: DateTime<Utc>, span: Duration) -> (DateWindow, DateWindow) {
    let start = now - span;
    (
        DateWindow::new(start, now),
        DateWindow::new(start - span, start),
    )
}

pub(crate) fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

pub(crate) fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

pub(crate) fn week_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.weekday().num_days_from_monday()))
}

pub(crate) fn quarter_start(date: NaiveDate) -> NaiveDate {
    month_start(date) - Months::new(date.month0() % 3)
}

pub(crate) fn year_start(date: NaiveDate) -> NaiveDate {
    month_start(date) - Months::new(date.month0())
}
