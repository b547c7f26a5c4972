use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use crate::LedgerResult;

pub(crate) const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS financial_ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    transaction_date TEXT NOT NULL,
    transaction_type TEXT NOT NULL CHECK (transaction_type IN (
        'sale', 'cogs', 'purchase', 'payment_received', 'payment_made', 'income', 'expense'
    )),
    reference_type TEXT CHECK (reference_type IN ('sale', 'purchase', 'manual')),
    reference_id INTEGER,
    amount TEXT NOT NULL,
    account_type TEXT NOT NULL CHECK (account_type IN ('revenue', 'expense', 'asset', 'liability')),
    debit_amount TEXT NOT NULL,
    credit_amount TEXT NOT NULL,
    category TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    device_id INTEGER NOT NULL,
    company_id INTEGER NOT NULL,
    created_by INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS financial_ledger_idx_device_date
    ON financial_ledger(device_id, transaction_date);
CREATE INDEX IF NOT EXISTS financial_ledger_idx_reference
    ON financial_ledger(reference_type, reference_id, device_id);
CREATE TRIGGER IF NOT EXISTS financial_ledger_no_update
    BEFORE UPDATE ON financial_ledger
    BEGIN SELECT RAISE(ABORT, 'financial_ledger is append-only'); END;
CREATE TRIGGER IF NOT EXISTS financial_ledger_no_delete
    BEFORE DELETE ON financial_ledger
    BEGIN SELECT RAISE(ABORT, 'financial_ledger is append-only'); END;

CREATE TABLE IF NOT EXISTS payments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference_type TEXT NOT NULL CHECK (reference_type IN ('sale', 'purchase', 'manual')),
    reference_id INTEGER,
    amount TEXT NOT NULL,
    method TEXT NOT NULL,
    notes TEXT,
    payment_date TEXT NOT NULL,
    device_id INTEGER NOT NULL,
    company_id INTEGER NOT NULL,
    created_by INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS payments_idx_reference
    ON payments(reference_type, reference_id, device_id);

CREATE TABLE IF NOT EXISTS cogs_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sale_id INTEGER NOT NULL,
    product_id INTEGER NOT NULL,
    quantity INTEGER NOT NULL,
    cost_price TEXT NOT NULL,
    total_cost TEXT NOT NULL,
    device_id INTEGER NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS cogs_entries_idx_sale
    ON cogs_entries(sale_id, device_id);

CREATE TABLE IF NOT EXISTS accounts_receivable (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sale_id INTEGER NOT NULL,
    customer_id INTEGER,
    original_amount TEXT NOT NULL,
    paid_amount TEXT NOT NULL,
    outstanding_amount TEXT NOT NULL,
    device_id INTEGER NOT NULL,
    company_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (sale_id, device_id)
);

CREATE TABLE IF NOT EXISTS accounts_payable (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    purchase_id INTEGER NOT NULL,
    supplier_name TEXT NOT NULL,
    original_amount TEXT NOT NULL,
    paid_amount TEXT NOT NULL,
    outstanding_amount TEXT NOT NULL,
    device_id INTEGER NOT NULL,
    company_id INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (purchase_id, device_id)
);

CREATE TABLE IF NOT EXISTS products (
    id INTEGER NOT NULL,
    device_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    price TEXT,
    wholesale_price TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (id, device_id)
);
"#;

/// Serializes schema bootstrap for every clone of a store handle.
#[derive(Debug, Default)]
pub(crate) struct SchemaGuard {
    ready: Mutex<bool>,
}

impl SchemaGuard {
    /// Apply the schema unless this handle already did. Returns whether DDL ran.
    pub(crate) fn ensure(&self, conn: &mut Connection) -> LedgerResult<bool> {
        let mut ready = self.ready.lock();
        if *ready {
            return Ok(false);
        }
        apply_schema(conn)?;
        *ready = true;
        Ok(true)
    }
}

fn apply_schema(conn: &mut Connection) -> LedgerResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    match tx.execute_batch(LEDGER_SCHEMA) {
        Ok(()) => {}
        Err(err) if is_already_exists(&err) => {
            debug!(error = %err, "ledger schema object already present");
        }
        Err(err) => return Err(err.into()),
    }
    tx.commit()?;
    Ok(())
}

fn is_already_exists(err: &rusqlite::Error) -> bool {
    err.to_string().contains("already exists")
}
