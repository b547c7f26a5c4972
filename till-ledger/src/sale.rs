use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{money, LedgerEntry, LedgerError, LedgerResult, PayableRecord, PaymentMethod, PaymentReceipt, ReceivableRecord, Scope};

/// Catalog item as far as cost accounting is concerned.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub device_id: i64,
    pub name: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub wholesale_price: Option<Decimal>,
}

impl Product {
    /// Cost basis per unit: wholesale price, then retail price, then zero.
    ///
    /// A zero price counts as unset, so a product with a zero wholesale price
    /// is costed at retail.
    pub fn unit_cost(&self) -> Decimal {
        self.wholesale_price
            .filter(|price| !price.is_zero())
            .or(self.price.filter(|price| !price.is_zero()))
            .map(money)
            .unwrap_or(Decimal::ZERO)
    }
}

/// One product line on a sale.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_id: i64,
    pub quantity: i64,
}

/// Cost-of-goods row written for each sold line.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CogsLine {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub cost_price: Decimal,
    pub total_cost: Decimal,
    pub device_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Result of costing a sale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CogsOutcome {
    pub lines: Vec<CogsLine>,
    pub total_cost: Decimal,
    /// Absent when every line costs nothing.
    pub entry: Option<LedgerEntry>,
}

/// Completed sale handed over by the checkout flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaleRecord {
    pub sale_id: i64,
    #[serde(default)]
    pub customer_id: Option<i64>,
    pub total: Decimal,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub method: PaymentMethod,
    pub items: Vec<SaleLine>,
    pub scope: Scope,
    pub sale_date: DateTime<Utc>,
}

impl SaleRecord {
    pub(crate) fn validate(&self) -> LedgerResult<()> {
        if self.items.is_empty() {
            return Err(LedgerError::validation(format!(
                "sale {} has no line items",
                self.sale_id
            )));
        }
        for line in &self.items {
            validate_quantity(self.sale_id, line)?;
        }
        validate_settlement(self.total, self.paid_amount, "sale", self.sale_id)
    }
}

/// Supplier purchase handed over by the receiving flow.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub purchase_id: i64,
    pub supplier_name: String,
    pub total: Decimal,
    #[serde(default)]
    pub paid_amount: Decimal,
    #[serde(default)]
    pub method: PaymentMethod,
    pub scope: Scope,
    pub purchase_date: DateTime<Utc>,
}

impl PurchaseRecord {
    pub(crate) fn validate(&self) -> LedgerResult<()> {
        validate_settlement(self.total, self.paid_amount, "purchase", self.purchase_id)
    }
}

/// Rows written when a sale is finalized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaleOutcome {
    pub revenue: LedgerEntry,
    pub cogs: CogsOutcome,
    pub payment: Option<PaymentReceipt>,
    pub receivable: Option<ReceivableRecord>,
}

/// Rows written when a purchase is finalized.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub expense: LedgerEntry,
    pub payment: Option<PaymentReceipt>,
    pub payable: Option<PayableRecord>,
}

/// Tally of a historical backfill run.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BackfillReport {
    pub recorded: usize,
    pub skipped: usize,
    pub failures: Vec<BackfillFailure>,
}

impl BackfillReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackfillFailure {
    pub sale_id: i64,
    pub error: String,
}

pub(crate) fn validate_quantity(sale_id: i64, line: &SaleLine) -> LedgerResult<()> {
    if line.quantity <= 0 {
        return Err(LedgerError::validation(format!(
            "sale {sale_id}: product {} has non-positive quantity {}",
            line.product_id, line.quantity
        )));
    }
    Ok(())
}

fn validate_settlement(total: Decimal, paid: Decimal, kind: &str, id: i64) -> LedgerResult<()> {
    if total <= Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "{kind} {id} total must be greater than zero"
        )));
    }
    if paid < Decimal::ZERO {
        return Err(LedgerError::validation(format!(
            "{kind} {id} paid amount must not be negative"
        )));
    }
    Ok(())
}
