//! Accounts-receivable and accounts-payable rollups.
//!
//! `paid_amount` is always an absolute cumulative value. Payments add to it
//! inside the caller's write transaction, so the read and the update happen
//! under the same database lock.

use chrono::Utc;
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::sqlite::{encode_timestamp, find_payable, find_receivable};
use crate::{money, LedgerError, LedgerResult, PayableRecord, ReceivableRecord, Scope, SqliteLedger};

impl SqliteLedger {
    /// Create or update the receivable for a sale.
    pub fn upsert_receivable(
        &self,
        customer_id: Option<i64>,
        sale_id: i64,
        original_amount: Decimal,
        paid_amount: Decimal,
        scope: Scope,
    ) -> LedgerResult<ReceivableRecord> {
        self.write(|tx| {
            upsert_receivable_in(tx, customer_id, sale_id, original_amount, paid_amount, scope)
        })
    }

    /// Create or update the payable for a purchase.
    pub fn upsert_payable(
        &self,
        supplier_name: &str,
        purchase_id: i64,
        original_amount: Decimal,
        paid_amount: Decimal,
        scope: Scope,
    ) -> LedgerResult<PayableRecord> {
        self.write(|tx| {
            upsert_payable_in(tx, supplier_name, purchase_id, original_amount, paid_amount, scope)
        })
    }
}

fn validate_amounts(original_amount: Decimal, paid_amount: Decimal) -> LedgerResult<()> {
    if original_amount < Decimal::ZERO || paid_amount < Decimal::ZERO {
        return Err(LedgerError::validation(
            "subledger amounts must not be negative",
        ));
    }
    Ok(())
}

/// New `(paid, outstanding)` after adding `amount` to what was already paid.
fn settle(original: Decimal, paid: Decimal, amount: Decimal) -> LedgerResult<(Decimal, Decimal)> {
    let paid = paid
        .checked_add(money(amount))
        .ok_or_else(|| LedgerError::validation("paid amount overflows"))?;
    let outstanding = original
        .checked_sub(paid)
        .ok_or_else(|| LedgerError::validation("outstanding amount overflows"))?;
    Ok((paid, outstanding))
}

pub(crate) fn upsert_receivable_in(
    conn: &Connection,
    customer_id: Option<i64>,
    sale_id: i64,
    original_amount: Decimal,
    paid_amount: Decimal,
    scope: Scope,
) -> LedgerResult<ReceivableRecord> {
    validate_amounts(original_amount, paid_amount)?;
    let paid = money(paid_amount);
    let now = encode_timestamp(Utc::now());
    match find_receivable(conn, scope.device_id, sale_id)? {
        Some(existing) => {
            if money(original_amount) != existing.original_amount {
                warn!(
                    sale_id,
                    stored = %existing.original_amount,
                    supplied = %original_amount,
                    "ignoring new original amount for existing receivable"
                );
            }
            let outstanding = existing.original_amount - paid;
            conn.execute(
                "UPDATE accounts_receivable
                 SET paid_amount = ?1, outstanding_amount = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![paid.to_string(), outstanding.to_string(), now, existing.id],
            )?;
        }
        None => {
            let original = money(original_amount);
            conn.execute(
                "INSERT INTO accounts_receivable (
                    sale_id, customer_id, original_amount, paid_amount, outstanding_amount,
                    device_id, company_id, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    sale_id,
                    customer_id,
                    original.to_string(),
                    paid.to_string(),
                    (original - paid).to_string(),
                    scope.device_id,
                    scope.company_id,
                    now,
                ],
            )?;
        }
    }
    receivable_after_write(conn, scope.device_id, sale_id)
}

pub(crate) fn upsert_payable_in(
    conn: &Connection,
    supplier_name: &str,
    purchase_id: i64,
    original_amount: Decimal,
    paid_amount: Decimal,
    scope: Scope,
) -> LedgerResult<PayableRecord> {
    validate_amounts(original_amount, paid_amount)?;
    let paid = money(paid_amount);
    let now = encode_timestamp(Utc::now());
    match find_payable(conn, scope.device_id, purchase_id)? {
        Some(existing) => {
            if money(original_amount) != existing.original_amount {
                warn!(
                    purchase_id,
                    stored = %existing.original_amount,
                    supplied = %original_amount,
                    "ignoring new original amount for existing payable"
                );
            }
            let outstanding = existing.original_amount - paid;
            conn.execute(
                "UPDATE accounts_payable
                 SET paid_amount = ?1, outstanding_amount = ?2, updated_at = ?3
                 WHERE id = ?4",
                params![paid.to_string(), outstanding.to_string(), now, existing.id],
            )?;
        }
        None => {
            let original = money(original_amount);
            conn.execute(
                "INSERT INTO accounts_payable (
                    purchase_id, supplier_name, original_amount, paid_amount, outstanding_amount,
                    device_id, company_id, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
                params![
                    purchase_id,
                    supplier_name,
                    original.to_string(),
                    paid.to_string(),
                    (original - paid).to_string(),
                    scope.device_id,
                    scope.company_id,
                    now,
                ],
            )?;
        }
    }
    payable_after_write(conn, scope.device_id, purchase_id)
}

/// Add a received payment to the sale's receivable.
pub(crate) fn apply_receivable_payment(
    conn: &Connection,
    device_id: i64,
    sale_id: i64,
    amount: Decimal,
) -> LedgerResult<ReceivableRecord> {
    let existing = find_receivable(conn, device_id, sale_id)?.ok_or_else(|| {
        LedgerError::NotFound(format!("receivable for sale {sale_id} on device {device_id}"))
    })?;
    let (paid, outstanding) = settle(existing.original_amount, existing.paid_amount, amount)?;
    if outstanding < Decimal::ZERO {
        warn!(
            sale_id,
            device_id,
            credit = %(-outstanding),
            "receivable overpaid; balance is now in the customer's favour"
        );
    }
    conn.execute(
        "UPDATE accounts_receivable
         SET paid_amount = ?1, outstanding_amount = ?2, updated_at = ?3
         WHERE id = ?4",
        params![
            paid.to_string(),
            outstanding.to_string(),
            encode_timestamp(Utc::now()),
            existing.id
        ],
    )?;
    info!(sale_id, device_id, paid = %paid, outstanding = %outstanding, "receivable updated");
    receivable_after_write(conn, device_id, sale_id)
}

/// Add an outgoing payment to the purchase's payable.
pub(crate) fn apply_payable_payment(
    conn: &Connection,
    device_id: i64,
    purchase_id: i64,
    amount: Decimal,
) -> LedgerResult<PayableRecord> {
    let existing = find_payable(conn, device_id, purchase_id)?.ok_or_else(|| {
        LedgerError::NotFound(format!(
            "payable for purchase {purchase_id} on device {device_id}"
        ))
    })?;
    let (paid, outstanding) = settle(existing.original_amount, existing.paid_amount, amount)?;
    if outstanding < Decimal::ZERO {
        warn!(
            purchase_id,
            device_id,
            credit = %(-outstanding),
            "payable overpaid; balance is now in our favour"
        );
    }
    conn.execute(
        "UPDATE accounts_payable
         SET paid_amount = ?1, outstanding_amount = ?2, updated_at = ?3
         WHERE id = ?4",
        params![
            paid.to_string(),
            outstanding.to_string(),
            encode_timestamp(Utc::now()),
            existing.id
        ],
    )?;
    info!(purchase_id, device_id, paid = %paid, outstanding = %outstanding, "payable updated");
    payable_after_write(conn, device_id, purchase_id)
}

fn receivable_after_write(
    conn: &Connection,
    device_id: i64,
    sale_id: i64,
) -> LedgerResult<ReceivableRecord> {
    find_receivable(conn, device_id, sale_id)?.ok_or_else(|| {
        LedgerError::Storage(format!("receivable for sale {sale_id} vanished after write"))
    })
}

fn payable_after_write(
    conn: &Connection,
    device_id: i64,
    purchase_id: i64,
) -> LedgerResult<PayableRecord> {
    find_payable(conn, device_id, purchase_id)?.ok_or_else(|| {
        LedgerError::Storage(format!(
            "payable for purchase {purchase_id} vanished after write"
        ))
    })
}
