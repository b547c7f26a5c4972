use chrono::{DateTime, Utc};
use rust_decimal::prelude::RoundingStrategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{LedgerError, LedgerResult};

/// Number of fractional digits carried by every monetary column.
pub const MONEY_SCALE: u32 = 2;

/// Round a monetary value to the ledger's fixed-point scale.
pub fn money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Tenancy and audit attribution carried by every write.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub device_id: i64,
    pub company_id: i64,
    pub created_by: i64,
}

impl Scope {
    pub fn new(device_id: i64, company_id: i64, created_by: i64) -> Self {
        Self {
            device_id,
            company_id,
            created_by,
        }
    }
}

/// Immutable bookkeeping row describing a single financial event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub transaction_date: DateTime<Utc>,
    pub transaction_type: TransactionType,
    pub reference: Option<Reference>,
    pub amount: Decimal,
    pub account_type: AccountType,
    pub debit_amount: Decimal,
    pub credit_amount: Decimal,
    pub category: String,
    pub description: String,
    pub device_id: i64,
    pub company_id: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Signed effect on the account, positive on the debit side.
    pub fn net_debit(&self) -> Decimal {
        self.debit_amount - self.credit_amount
    }
}

/// Economic event handed to the recorder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub transaction_type: TransactionType,
    pub account_type: AccountType,
    pub amount: Decimal,
    #[serde(default)]
    pub reference: Option<Reference>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub scope: Scope,
    pub transaction_date: DateTime<Utc>,
}

impl LedgerEvent {
    /// Creates an event dated now with no reference or labels.
    pub fn new(
        transaction_type: TransactionType,
        account_type: AccountType,
        amount: Decimal,
        scope: Scope,
    ) -> Self {
        Self {
            transaction_type,
            account_type,
            amount,
            reference: None,
            category: String::new(),
            description: String::new(),
            scope,
            transaction_date: Utc::now(),
        }
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn dated(mut self, transaction_date: DateTime<Utc>) -> Self {
        self.transaction_date = transaction_date;
        self
    }

    pub(crate) fn validate(&self) -> LedgerResult<()> {
        if self.amount < Decimal::ZERO {
            return Err(LedgerError::validation(format!(
                "{} amount must not be negative (got {})",
                self.transaction_type, self.amount
            )));
        }
        if money(self.amount).is_zero() {
            return Err(LedgerError::validation(format!(
                "{} amount must be greater than zero",
                self.transaction_type
            )));
        }
        Ok(())
    }
}

/// Kind of economic event a ledger row describes.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Cogs,
    Purchase,
    PaymentReceived,
    PaymentMade,
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Cogs => "cogs",
            TransactionType::Purchase => "purchase",
            TransactionType::PaymentReceived => "payment_received",
            TransactionType::PaymentMade => "payment_made",
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(TransactionType::Sale),
            "cogs" => Ok(TransactionType::Cogs),
            "purchase" => Ok(TransactionType::Purchase),
            "payment_received" => Ok(TransactionType::PaymentReceived),
            "payment_made" => Ok(TransactionType::PaymentMade),
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(format!("unknown transaction type: {other}")),
        }
    }
}

/// Account classification that decides which side of the entry carries the amount.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Revenue,
    Expense,
    Asset,
    Liability,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
        }
    }

    /// Split an amount into `(debit, credit)`.
    ///
    /// Revenue and liabilities grow on the credit side; expenses and assets on
    /// the debit side.
    pub fn split(self, amount: Decimal) -> (Decimal, Decimal) {
        match self {
            AccountType::Revenue | AccountType::Liability => (Decimal::ZERO, amount),
            AccountType::Expense | AccountType::Asset => (amount, Decimal::ZERO),
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            other => Err(format!("unknown account type: {other}")),
        }
    }
}

/// Weak pointer from a ledger row or payment back to the domain object that caused it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Reference {
    Sale(i64),
    Purchase(i64),
    Manual,
}

impl Reference {
    pub fn kind(&self) -> &'static str {
        match self {
            Reference::Sale(_) => "sale",
            Reference::Purchase(_) => "purchase",
            Reference::Manual => "manual",
        }
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Reference::Sale(id) | Reference::Purchase(id) => Some(*id),
            Reference::Manual => None,
        }
    }

    /// Rebuild a reference from its `(reference_type, reference_id)` storage columns.
    pub fn from_columns(kind: Option<&str>, id: Option<i64>) -> Result<Option<Self>, String> {
        match (kind, id) {
            (None, _) => Ok(None),
            (Some("manual"), _) => Ok(Some(Reference::Manual)),
            (Some("sale"), Some(id)) => Ok(Some(Reference::Sale(id))),
            (Some("purchase"), Some(id)) => Ok(Some(Reference::Purchase(id))),
            (Some(kind @ ("sale" | "purchase")), None) => {
                Err(format!("{kind} reference is missing its id"))
            }
            (Some(other), _) => Err(format!("unknown reference type: {other}")),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id() {
            Some(id) => write!(f, "{}:{id}", self.kind()),
            None => f.write_str(self.kind()),
        }
    }
}

impl FromStr for Reference {
    type Err = String;

    /// Parses `sale:12`, `purchase:7` or `manual`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = match s.split_once(':') {
            Some((kind, raw)) => {
                let id = raw
                    .trim()
                    .parse::<i64>()
                    .map_err(|err| format!("invalid reference id {raw}: {err}"))?;
                (kind.trim(), Some(id))
            }
            None => (s.trim(), None),
        };
        Reference::from_columns(Some(kind), id)?
            .ok_or_else(|| format!("invalid reference: {s}"))
    }
}

/// Direction of a manual cash movement.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualKind {
    Income,
    Expense,
}

impl ManualKind {
    pub fn transaction_type(self) -> TransactionType {
        match self {
            ManualKind::Income => TransactionType::Income,
            ManualKind::Expense => TransactionType::Expense,
        }
    }

    pub fn account_type(self) -> AccountType {
        match self {
            ManualKind::Income => AccountType::Revenue,
            ManualKind::Expense => AccountType::Expense,
        }
    }
}

impl FromStr for ManualKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(ManualKind::Income),
            "expense" => Ok(ManualKind::Expense),
            other => Err(format!("unknown manual transaction kind: {other}")),
        }
    }
}

/// Income or expense keyed in by staff rather than derived from a sale or purchase.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManualTransaction {
    pub kind: ManualKind,
    pub amount: Decimal,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub scope: Scope,
    pub transaction_date: DateTime<Utc>,
}

impl ManualTransaction {
    pub fn into_event(self) -> LedgerEvent {
        LedgerEvent::new(
            self.kind.transaction_type(),
            self.kind.account_type(),
            self.amount,
            self.scope,
        )
        .with_reference(Reference::Manual)
        .with_category(self.category)
        .with_description(self.description)
        .dated(self.transaction_date)
    }
}
