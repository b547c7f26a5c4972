use std::collections::HashMap;

use chrono::{DateTime, Days, Duration, Months, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use till_ledger::{LedgerEntry, TransactionType};

use crate::period::{midnight, month_start, quarter_start, week_start, year_start, DateWindow};
use crate::summary::add;
use crate::{Period, ReportError, ReportResult};

/// Width of one chart bucket.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn for_period(period: Period) -> Self {
        match period {
            Period::Today => Granularity::Hour,
            Period::Week | Period::Month => Granularity::Day,
            Period::Quarter => Granularity::Week,
            Period::Year => Granularity::Month,
        }
    }

    /// Start of the bucket containing `ts`. Weeks start on Monday.
    pub fn truncate(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let date = ts.date_naive();
        match self {
            Granularity::Hour => midnight(date) + Duration::hours(i64::from(ts.hour())),
            Granularity::Day => midnight(date),
            Granularity::Week => midnight(week_start(date)),
            Granularity::Month => midnight(month_start(date)),
        }
    }

    /// Start of the bucket following the one starting at `start`.
    pub fn next(self, start: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Granularity::Hour => start + Duration::hours(1),
            Granularity::Day => start + Days::new(1),
            Granularity::Week => start + Days::new(7),
            Granularity::Month => start + Months::new(1),
        }
    }

    pub fn label(self, start: DateTime<Utc>) -> String {
        match self {
            Granularity::Hour => start.format("%H:00").to_string(),
            Granularity::Day => start.format("%Y-%m-%d").to_string(),
            Granularity::Week => start.format("%G-W%V").to_string(),
            Granularity::Month => start.format("%Y-%m").to_string(),
        }
    }
}

/// Every bucket start the chart for `period` shows at `now`, oldest first.
pub fn bucket_starts(period: Period, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    let today = now.date_naive();
    let granularity = Granularity::for_period(period);
    let (first, last) = match period {
        Period::Today => (midnight(today), midnight(today) + Duration::hours(23)),
        Period::Week => (midnight(today - Days::new(6)), midnight(today)),
        Period::Month => (midnight(today - Days::new(29)), midnight(today)),
        Period::Quarter => (
            midnight(week_start(quarter_start(today))),
            midnight(week_start(today)),
        ),
        Period::Year => (midnight(year_start(today)), midnight(month_start(today))),
    };
    let mut starts = Vec::new();
    let mut cursor = first;
    while cursor <= last {
        starts.push(cursor);
        cursor = granularity.next(cursor);
    }
    starts
}

/// Time range covered by the chart buckets of `period` at `now`.
///
/// For `week` and `month` the buckets are whole calendar days ending today,
/// while [`Period::windows`] rolls back exactly 7 or 30 days from `now`. The
/// current metrics therefore also count the hours of the day before the first
/// bucket that come after `now`'s time of day. The chart leaves them out.
pub fn chart_window(period: Period, now: DateTime<Utc>) -> DateWindow {
    let starts = bucket_starts(period, now);
    let granularity = Granularity::for_period(period);
    match (starts.first(), starts.last()) {
        (Some(first), Some(last)) => DateWindow::new(*first, granularity.next(*last)),
        _ => DateWindow::new(now, now),
    }
}

/// One point of the income/expense chart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub bucket_start: DateTime<Utc>,
    pub label: String,
    pub income: Decimal,
    pub expenses: Decimal,
    pub net_flow: Decimal,
}

/// Build the zero-filled chart for `period` and fold `entries` into it.
///
/// Entries land in the bucket whose start equals their truncated date;
/// entries outside every bucket are ignored.
pub fn chart<'a>(
    period: Period,
    now: DateTime<Utc>,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> ReportResult<Vec<ChartPoint>> {
    let granularity = Granularity::for_period(period);
    let mut points: Vec<ChartPoint> = bucket_starts(period, now)
        .into_iter()
        .map(|bucket_start| ChartPoint {
            bucket_start,
            label: granularity.label(bucket_start),
            income: Decimal::ZERO,
            expenses: Decimal::ZERO,
            net_flow: Decimal::ZERO,
        })
        .collect();
    let index: HashMap<DateTime<Utc>, usize> = points
        .iter()
        .enumerate()
        .map(|(idx, point)| (point.bucket_start, idx))
        .collect();

    for entry in entries {
        let Some(&idx) = index.get(&granularity.truncate(entry.transaction_date)) else {
            continue;
        };
        let point = &mut points[idx];
        match entry.transaction_type {
            TransactionType::Sale | TransactionType::Income => {
                add(&mut point.income, entry.amount, "chart income")?
            }
            TransactionType::Purchase | TransactionType::Expense => {
                add(&mut point.expenses, entry.amount, "chart expenses")?
            }
            _ => {}
        }
    }
    for point in &mut points {
        point.net_flow = point
            .income
            .checked_sub(point.expenses)
            .ok_or(ReportError::Overflow("chart net flow"))?;
    }
    Ok(points)
}
