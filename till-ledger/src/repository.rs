use rust_decimal::Decimal;

use crate::{LedgerEntry, LedgerError, LedgerQuery, LedgerResult, PayableRecord, ReceivableRecord};

/// Read-side view over ledger storage consumed by reporting.
pub trait LedgerRepository: Send + Sync {
    /// Load entries matching the supplied query.
    fn entries(&self, query: &LedgerQuery) -> LedgerResult<Vec<LedgerEntry>>;

    /// Receivable rows for a device, optionally only those still owed.
    fn receivables(&self, device_id: i64, only_outstanding: bool) -> LedgerResult<Vec<ReceivableRecord>>;

    /// Payable rows for a device, optionally only those still owed.
    fn payables(&self, device_id: i64, only_outstanding: bool) -> LedgerResult<Vec<PayableRecord>>;

    /// Sum of positive outstanding receivable balances.
    fn total_receivable(&self, device_id: i64) -> LedgerResult<Decimal> {
        positive_total(
            self.receivables(device_id, true)?
                .iter()
                .map(|record| record.outstanding_amount),
        )
    }

    /// Sum of positive outstanding payable balances.
    fn total_payable(&self, device_id: i64) -> LedgerResult<Decimal> {
        positive_total(
            self.payables(device_id, true)?
                .iter()
                .map(|record| record.outstanding_amount),
        )
    }
}

fn positive_total(amounts: impl Iterator<Item = Decimal>) -> LedgerResult<Decimal> {
    amounts
        .filter(|amount| *amount > Decimal::ZERO)
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or_else(|| LedgerError::validation("subledger total overflows"))
}
