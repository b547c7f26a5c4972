use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use till_ledger::{LedgerEntry, LedgerQuery, LedgerRepository, TransactionType};
use tracing::debug;

use crate::{ReportError, ReportResult};

/// Profit, cash and subledger totals for one device over a window.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub total_revenue: Decimal,
    pub total_expenses: Decimal,
    pub total_cogs: Decimal,
    pub gross_profit: Decimal,
    pub net_profit: Decimal,
    pub cash_flow: Decimal,
    pub total_receivable: Decimal,
    pub total_payable: Decimal,
}

impl PeriodSummary {
    /// Fold ledger entries in one pass. Subledger totals are left at zero.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> ReportResult<Self> {
        let mut summary = Self::default();
        for entry in entries {
            let amount = entry.amount;
            match entry.transaction_type {
                TransactionType::Sale => add(&mut summary.total_revenue, amount, "revenue")?,
                TransactionType::Purchase | TransactionType::Expense => {
                    add(&mut summary.total_expenses, amount, "expenses")?
                }
                TransactionType::Cogs => add(&mut summary.total_cogs, amount, "cost of goods")?,
                TransactionType::PaymentReceived => add(&mut summary.cash_flow, amount, "cash flow")?,
                TransactionType::PaymentMade => add(&mut summary.cash_flow, -amount, "cash flow")?,
                TransactionType::Income => {}
            }
        }
        summary.gross_profit = summary
            .total_revenue
            .checked_sub(summary.total_cogs)
            .ok_or(ReportError::Overflow("gross profit"))?;
        summary.net_profit = summary
            .gross_profit
            .checked_sub(summary.total_expenses)
            .ok_or(ReportError::Overflow("net profit"))?;
        Ok(summary)
    }

    pub fn with_subledgers(mut self, total_receivable: Decimal, total_payable: Decimal) -> Self {
        self.total_receivable = total_receivable;
        self.total_payable = total_payable;
        self
    }
}

pub(crate) fn add(total: &mut Decimal, amount: Decimal, what: &'static str) -> ReportResult<()> {
    *total = total.checked_add(amount).ok_or(ReportError::Overflow(what))?;
    Ok(())
}

/// Summarize a device's ledger over `[from, to)`; open bounds cover the whole ledger.
pub fn summarize<R>(
    repo: &R,
    device_id: i64,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> ReportResult<PeriodSummary>
where
    R: LedgerRepository + ?Sized,
{
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ReportError::InvalidWindow(format!(
                "start {from} is after end {to}"
            )));
        }
    }
    let entries = repo.entries(&LedgerQuery::for_device(device_id).with_time_range(from, to))?;
    let summary = PeriodSummary::from_entries(&entries)?.with_subledgers(
        repo.total_receivable(device_id)?,
        repo.total_payable(device_id)?,
    );
    debug!(device_id, entries = entries.len(), "period summarized");
    Ok(summary)
}
