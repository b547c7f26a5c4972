use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outstanding balance owed by a customer for a single sale.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReceivableRecord {
    pub id: i64,
    pub sale_id: i64,
    pub customer_id: Option<i64>,
    pub original_amount: Decimal,
    pub paid_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub device_id: i64,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReceivableRecord {
    pub fn is_settled(&self) -> bool {
        self.outstanding_amount <= Decimal::ZERO
    }
}

/// Outstanding balance owed to a supplier for a single purchase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PayableRecord {
    pub id: i64,
    pub purchase_id: i64,
    pub supplier_name: String,
    pub original_amount: Decimal,
    pub paid_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub device_id: i64,
    pub company_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayableRecord {
    pub fn is_settled(&self) -> bool {
        self.outstanding_amount <= Decimal::ZERO
    }
}
