//! Period-over-period dashboard snapshot.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use till_ledger::{money, LedgerQuery, LedgerRepository};
use tracing::info;

use crate::buckets::{chart, chart_window, ChartPoint};
use crate::period::DateWindow;
use crate::{Period, PeriodSummary, ReportResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increase,
    Decrease,
    Neutral,
}

impl Direction {
    fn of(change: Decimal) -> Self {
        if change > Decimal::ZERO {
            Direction::Increase
        } else if change < Decimal::ZERO {
            Direction::Decrease
        } else {
            Direction::Neutral
        }
    }
}

/// A metric in the current window next to its value in the previous one.
///
/// `change` is a percentage rounded to cents. It is zero when the previous
/// value is not positive or the percentage does not fit a `Decimal`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub current: Decimal,
    pub previous: Decimal,
    pub change: Decimal,
    pub direction: Direction,
}

impl MetricChange {
    pub fn compare(current: Decimal, previous: Decimal) -> Self {
        Self::build(current, previous, current.checked_sub(previous))
    }

    /// Like [`MetricChange::compare`] but favourable when the value drops.
    pub fn compare_expense(current: Decimal, previous: Decimal) -> Self {
        Self::build(current, previous, previous.checked_sub(current))
    }

    fn build(current: Decimal, previous: Decimal, delta: Option<Decimal>) -> Self {
        let change = if previous > Decimal::ZERO {
            delta
                .and_then(|delta| delta.checked_div(previous))
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .map(money)
                .unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };
        Self {
            current,
            previous,
            change,
            direction: Direction::of(change),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub revenue: MetricChange,
    pub expenses: MetricChange,
    pub net_profit: MetricChange,
    pub cash_flow: MetricChange,
}

impl DashboardMetrics {
    pub fn between(current: &PeriodSummary, previous: &PeriodSummary) -> Self {
        Self {
            revenue: MetricChange::compare(current.total_revenue, previous.total_revenue),
            expenses: MetricChange::compare_expense(current.total_expenses, previous.total_expenses),
            net_profit: MetricChange::compare(current.net_profit, previous.net_profit),
            cash_flow: MetricChange::compare(current.cash_flow, previous.cash_flow),
        }
    }
}

/// Who is asking for which device and period. `user_id` is only logged.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DashboardRequest {
    pub user_id: i64,
    pub device_id: i64,
    #[serde(default)]
    pub period: Period,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub device_id: i64,
    pub period: Period,
    pub generated_at: DateTime<Utc>,
    pub current_window: DateWindow,
    pub previous_window: DateWindow,
    /// Current window totals plus device-wide receivable and payable balances.
    pub summary: PeriodSummary,
    pub metrics: DashboardMetrics,
    pub chart: Vec<ChartPoint>,
}

pub fn summarize_dashboard<R>(repo: &R, request: &DashboardRequest) -> ReportResult<DashboardSnapshot>
where
    R: LedgerRepository + ?Sized,
{
    summarize_dashboard_at(repo, request, Utc::now())
}

/// Build the dashboard as seen at `now`.
///
/// Loads every entry touching the comparison windows or the chart range in
/// one query and splits them in memory.
pub fn summarize_dashboard_at<R>(
    repo: &R,
    request: &DashboardRequest,
    now: DateTime<Utc>,
) -> ReportResult<DashboardSnapshot>
where
    R: LedgerRepository + ?Sized,
{
    let period = request.period;
    let (current_window, previous_window) = period.windows(now);
    let span = previous_window
        .union(&current_window)
        .union(&chart_window(period, now));
    let entries = repo.entries(
        &LedgerQuery::for_device(request.device_id).with_time_range(Some(span.start), Some(span.end)),
    )?;

    let current = PeriodSummary::from_entries(
        entries
            .iter()
            .filter(|entry| current_window.contains(entry.transaction_date)),
    )?;
    let previous = PeriodSummary::from_entries(
        entries
            .iter()
            .filter(|entry| previous_window.contains(entry.transaction_date)),
    )?;
    let metrics = DashboardMetrics::between(&current, &previous);
    let summary = current.with_subledgers(
        repo.total_receivable(request.device_id)?,
        repo.total_payable(request.device_id)?,
    );
    let chart = chart(period, now, &entries)?;

    info!(
        user_id = request.user_id,
        device_id = request.device_id,
        period = %period,
        entries = entries.len(),
        buckets = chart.len(),
        "dashboard summarized"
    );
    Ok(DashboardSnapshot {
        device_id: request.device_id,
        period,
        generated_at: now,
        current_window,
        previous_window,
        summary,
        metrics,
        chart,
    })
}
