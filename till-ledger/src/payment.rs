use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{AccountType, LedgerEntry, PayableRecord, ReceivableRecord, Reference, Scope, TransactionType};

/// Tender used to settle a payment.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    Transfer,
    Other,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Other => "other",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "transfer" => Ok(PaymentMethod::Transfer),
            "other" => Ok(PaymentMethod::Other),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Payment instruction submitted by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewPayment {
    pub reference: Reference,
    pub amount: Decimal,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub notes: Option<String>,
    pub scope: Scope,
    pub payment_date: DateTime<Utc>,
}

impl NewPayment {
    pub fn new(reference: Reference, amount: Decimal, scope: Scope) -> Self {
        Self {
            reference,
            amount,
            method: PaymentMethod::default(),
            notes: None,
            scope,
            payment_date: Utc::now(),
        }
    }

    pub fn with_method(mut self, method: PaymentMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn dated(mut self, payment_date: DateTime<Utc>) -> Self {
        self.payment_date = payment_date;
        self
    }

    /// Money coming in for sales, going out for everything else.
    pub fn classification(&self) -> (TransactionType, AccountType) {
        match self.reference {
            Reference::Sale(_) => (TransactionType::PaymentReceived, AccountType::Asset),
            Reference::Purchase(_) | Reference::Manual => {
                (TransactionType::PaymentMade, AccountType::Liability)
            }
        }
    }
}

/// Persisted payment row.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub reference: Reference,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub device_id: i64,
    pub company_id: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Subledger row touched by a payment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubledgerBalance {
    Receivable(ReceivableRecord),
    Payable(PayableRecord),
}

impl SubledgerBalance {
    pub fn outstanding_amount(&self) -> Decimal {
        match self {
            SubledgerBalance::Receivable(record) => record.outstanding_amount,
            SubledgerBalance::Payable(record) => record.outstanding_amount,
        }
    }
}

/// Everything written by a single recorded payment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub entry: LedgerEntry,
    pub balance: Option<SubledgerBalance>,
}
