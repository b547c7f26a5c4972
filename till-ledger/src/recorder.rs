use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::catalog::find_product;
use crate::reconciler::{apply_payable_payment, apply_receivable_payment, upsert_payable_in, upsert_receivable_in};
use crate::sale::validate_quantity;
use crate::sqlite::encode_timestamp;
use crate::{
    money, AccountType, BackfillFailure, BackfillReport, CogsLine, CogsOutcome, LedgerEntry, LedgerError,
    LedgerEvent, LedgerResult, ManualTransaction, NewPayment, Payment, PaymentReceipt, PurchaseOutcome,
    PurchaseRecord, Reference, SaleLine, SaleOutcome, SaleRecord, Scope, SqliteLedger, SubledgerBalance,
    TransactionType,
};

impl SqliteLedger {
    /// Append one ledger entry for an economic event.
    pub fn record(&self, event: LedgerEvent) -> LedgerResult<LedgerEntry> {
        self.write(|tx| insert_entry(tx, &event))
    }

    /// Record staff-entered income (revenue) or expense.
    pub fn add_manual_transaction(&self, transaction: ManualTransaction) -> LedgerResult<LedgerEntry> {
        self.record(transaction.into_event())
    }

    /// Cost the lines of a sale and book the aggregated cost of goods sold.
    ///
    /// Every line gets a `cogs_entries` row. The ledger entry is only written
    /// when the total cost is positive: a sale of items with no known cost
    /// incurred no expense.
    pub fn record_cogs(
        &self,
        sale_id: i64,
        items: &[SaleLine],
        scope: Scope,
        sale_date: DateTime<Utc>,
    ) -> LedgerResult<CogsOutcome> {
        self.write(|tx| cost_sale(tx, sale_id, items, scope, sale_date))
    }

    /// Persist a payment, book it, and settle it against the matching subledger.
    pub fn record_payment(&self, payment: NewPayment) -> LedgerResult<PaymentReceipt> {
        self.write(|tx| {
            let (row, entry) = insert_payment(tx, &payment)?;
            let balance = match payment.reference {
                Reference::Sale(sale_id) => Some(SubledgerBalance::Receivable(
                    apply_receivable_payment(tx, payment.scope.device_id, sale_id, row.amount)?,
                )),
                Reference::Purchase(purchase_id) => Some(SubledgerBalance::Payable(
                    apply_payable_payment(tx, payment.scope.device_id, purchase_id, row.amount)?,
                )),
                Reference::Manual => None,
            };
            Ok(PaymentReceipt {
                payment: row,
                entry,
                balance,
            })
        })
    }

    /// Book a completed sale: revenue, cost of goods, upfront payment and any receivable.
    pub fn record_sale(&self, sale: &SaleRecord) -> LedgerResult<SaleOutcome> {
        sale.validate()?;
        self.write(|tx| finalize_sale(tx, sale))
    }

    /// Book a supplier purchase: expense, upfront payment and any payable.
    pub fn record_purchase(&self, purchase: &PurchaseRecord) -> LedgerResult<PurchaseOutcome> {
        purchase.validate()?;
        self.write(|tx| finalize_purchase(tx, purchase))
    }

    /// Replay historical sales into the ledger.
    ///
    /// Sales that already have a revenue entry are skipped. Each sale is booked
    /// in its own transaction and a failing sale does not stop the batch.
    pub fn backfill_sales(&self, sales: &[SaleRecord]) -> BackfillReport {
        let mut report = BackfillReport::default();
        for sale in sales {
            let already = self.read(|conn| sale_recorded(conn, sale.scope.device_id, sale.sale_id));
            let outcome = match already {
                Ok(true) => {
                    debug!(sale_id = sale.sale_id, "sale already in ledger; skipping");
                    report.skipped += 1;
                    continue;
                }
                Ok(false) => self.record_sale(sale).map(|_| ()),
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => report.recorded += 1,
                Err(err) => {
                    warn!(sale_id = sale.sale_id, error = %err, "failed to backfill sale; continuing");
                    report.failures.push(BackfillFailure {
                        sale_id: sale.sale_id,
                        error: err.to_string(),
                    });
                }
            }
        }
        info!(
            recorded = report.recorded,
            skipped = report.skipped,
            failed = report.failed(),
            "sale backfill finished"
        );
        report
    }
}

pub(crate) fn insert_entry(conn: &Connection, event: &LedgerEvent) -> LedgerResult<LedgerEntry> {
    event.validate()?;
    let amount = money(event.amount);
    let (debit_amount, credit_amount) = event.account_type.split(amount);
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO financial_ledger (
            transaction_date, transaction_type, reference_type, reference_id, amount, account_type,
            debit_amount, credit_amount, category, description, device_id, company_id, created_by,
            created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            encode_timestamp(event.transaction_date),
            event.transaction_type.as_str(),
            event.reference.map(|reference| reference.kind()),
            event.reference.and_then(|reference| reference.id()),
            amount.to_string(),
            event.account_type.as_str(),
            debit_amount.to_string(),
            credit_amount.to_string(),
            event.category,
            event.description,
            event.scope.device_id,
            event.scope.company_id,
            event.scope.created_by,
            encode_timestamp(created_at),
        ],
    )?;
    let entry = LedgerEntry {
        id: conn.last_insert_rowid(),
        transaction_date: event.transaction_date,
        transaction_type: event.transaction_type,
        reference: event.reference,
        amount,
        account_type: event.account_type,
        debit_amount,
        credit_amount,
        category: event.category.clone(),
        description: event.description.clone(),
        device_id: event.scope.device_id,
        company_id: event.scope.company_id,
        created_by: event.scope.created_by,
        created_at,
    };
    info!(
        entry_id = entry.id,
        device_id = entry.device_id,
        transaction_type = %entry.transaction_type,
        amount = %entry.amount,
        "ledger entry recorded"
    );
    Ok(entry)
}

fn insert_payment(conn: &Connection, payment: &NewPayment) -> LedgerResult<(Payment, LedgerEntry)> {
    let (transaction_type, account_type) = payment.classification();
    let description = payment.notes.clone().unwrap_or_else(|| match payment.reference {
        Reference::Sale(id) => format!("Payment received for sale #{id}"),
        Reference::Purchase(id) => format!("Payment made for purchase #{id}"),
        Reference::Manual => "Manual payment".to_string(),
    });
    let event = LedgerEvent::new(transaction_type, account_type, payment.amount, payment.scope)
        .with_reference(payment.reference)
        .with_category("payment")
        .with_description(description)
        .dated(payment.payment_date);
    event.validate()?;

    let amount = money(payment.amount);
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO payments (
            reference_type, reference_id, amount, method, notes, payment_date, device_id,
            company_id, created_by, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            payment.reference.kind(),
            payment.reference.id(),
            amount.to_string(),
            payment.method.as_str(),
            payment.notes,
            encode_timestamp(payment.payment_date),
            payment.scope.device_id,
            payment.scope.company_id,
            payment.scope.created_by,
            encode_timestamp(created_at),
        ],
    )?;
    let row = Payment {
        id: conn.last_insert_rowid(),
        reference: payment.reference,
        amount,
        method: payment.method,
        notes: payment.notes.clone(),
        payment_date: payment.payment_date,
        device_id: payment.scope.device_id,
        company_id: payment.scope.company_id,
        created_by: payment.scope.created_by,
        created_at,
    };
    let entry = insert_entry(conn, &event)?;
    Ok((row, entry))
}

fn cost_sale(
    conn: &Connection,
    sale_id: i64,
    items: &[SaleLine],
    scope: Scope,
    sale_date: DateTime<Utc>,
) -> LedgerResult<CogsOutcome> {
    let mut lines = Vec::with_capacity(items.len());
    let mut total_cost = Decimal::ZERO;
    for item in items {
        validate_quantity(sale_id, item)?;
        let product = find_product(conn, scope.device_id, item.product_id)?.ok_or_else(|| {
            LedgerError::NotFound(format!(
                "product {} on device {} (sale {sale_id})",
                item.product_id, scope.device_id
            ))
        })?;
        let cost_price = product.unit_cost();
        let line_cost = cost_price
            .checked_mul(Decimal::from(item.quantity))
            .map(money)
            .ok_or_else(|| {
                LedgerError::validation(format!(
                    "sale {sale_id}: cost of product {} overflows",
                    item.product_id
                ))
            })?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO cogs_entries (
                sale_id, product_id, quantity, cost_price, total_cost, device_id, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                sale_id,
                item.product_id,
                item.quantity,
                cost_price.to_string(),
                line_cost.to_string(),
                scope.device_id,
                encode_timestamp(created_at),
            ],
        )?;
        lines.push(CogsLine {
            id: conn.last_insert_rowid(),
            sale_id,
            product_id: item.product_id,
            quantity: item.quantity,
            cost_price,
            total_cost: line_cost,
            device_id: scope.device_id,
            created_at,
        });
        total_cost = total_cost.checked_add(line_cost).ok_or_else(|| {
            LedgerError::validation(format!("sale {sale_id}: total cost overflows"))
        })?;
    }

    let entry = if total_cost > Decimal::ZERO {
        let event = LedgerEvent::new(TransactionType::Cogs, AccountType::Expense, total_cost, scope)
            .with_reference(Reference::Sale(sale_id))
            .with_category("cogs")
            .with_description(format!("Cost of goods sold for sale #{sale_id}"))
            .dated(sale_date);
        Some(insert_entry(conn, &event)?)
    } else {
        debug!(sale_id, "sale has no cost basis; no cogs entry written");
        None
    };
    Ok(CogsOutcome {
        lines,
        total_cost,
        entry,
    })
}

fn finalize_sale(conn: &Connection, sale: &SaleRecord) -> LedgerResult<SaleOutcome> {
    let scope = sale.scope;
    if sale_recorded(conn, scope.device_id, sale.sale_id)? {
        return Err(LedgerError::Conflict(format!(
            "sale {} is already recorded on device {}",
            sale.sale_id, scope.device_id
        )));
    }
    let total = money(sale.total);
    let revenue = insert_entry(
        conn,
        &LedgerEvent::new(TransactionType::Sale, AccountType::Revenue, total, scope)
            .with_reference(Reference::Sale(sale.sale_id))
            .with_category("sales")
            .with_description(format!("Sale #{}", sale.sale_id))
            .dated(sale.sale_date),
    )?;
    let cogs = cost_sale(conn, sale.sale_id, &sale.items, scope, sale.sale_date)?;

    // Tendered cash above the total is change handed back, not revenue.
    let upfront = money(sale.paid_amount).min(total);
    let receivable = if upfront < total {
        Some(upsert_receivable_in(
            conn,
            sale.customer_id,
            sale.sale_id,
            total,
            upfront,
            scope,
        )?)
    } else {
        None
    };
    let payment = if upfront > Decimal::ZERO {
        let request = NewPayment::new(Reference::Sale(sale.sale_id), upfront, scope)
            .with_method(sale.method)
            .dated(sale.sale_date);
        let (row, entry) = insert_payment(conn, &request)?;
        Some(PaymentReceipt {
            payment: row,
            entry,
            balance: receivable.clone().map(SubledgerBalance::Receivable),
        })
    } else {
        None
    };
    Ok(SaleOutcome {
        revenue,
        cogs,
        payment,
        receivable,
    })
}

fn finalize_purchase(conn: &Connection, purchase: &PurchaseRecord) -> LedgerResult<PurchaseOutcome> {
    let scope = purchase.scope;
    if purchase_recorded(conn, scope.device_id, purchase.purchase_id)? {
        return Err(LedgerError::Conflict(format!(
            "purchase {} is already recorded on device {}",
            purchase.purchase_id, scope.device_id
        )));
    }
    let total = money(purchase.total);
    let expense = insert_entry(
        conn,
        &LedgerEvent::new(TransactionType::Purchase, AccountType::Expense, total, scope)
            .with_reference(Reference::Purchase(purchase.purchase_id))
            .with_category("purchases")
            .with_description(format!(
                "Purchase #{} from {}",
                purchase.purchase_id, purchase.supplier_name
            ))
            .dated(purchase.purchase_date),
    )?;
    let upfront = money(purchase.paid_amount).min(total);
    let payable = if upfront < total {
        Some(upsert_payable_in(
            conn,
            &purchase.supplier_name,
            purchase.purchase_id,
            total,
            upfront,
            scope,
        )?)
    } else {
        None
    };
    let payment = if upfront > Decimal::ZERO {
        let request = NewPayment::new(Reference::Purchase(purchase.purchase_id), upfront, scope)
            .with_method(purchase.method)
            .dated(purchase.purchase_date);
        let (row, entry) = insert_payment(conn, &request)?;
        Some(PaymentReceipt {
            payment: row,
            entry,
            balance: payable.clone().map(SubledgerBalance::Payable),
        })
    } else {
        None
    };
    Ok(PurchaseOutcome {
        expense,
        payment,
        payable,
    })
}

fn sale_recorded(conn: &Connection, device_id: i64, sale_id: i64) -> LedgerResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (
            SELECT 1 FROM financial_ledger
            WHERE device_id = ?1 AND transaction_type = 'sale'
              AND reference_type = 'sale' AND reference_id = ?2
         )",
        params![device_id, sale_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn purchase_recorded(conn: &Connection, device_id: i64, purchase_id: i64) -> LedgerResult<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS (
            SELECT 1 FROM financial_ledger
            WHERE device_id = ?1 AND transaction_type = 'purchase'
              AND reference_type = 'purchase' AND reference_id = ?2
         )",
        params![device_id, purchase_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}
