//! Append-only financial ledger, receivable/payable subledgers and their SQLite store.

mod catalog;
mod entry;
mod error;
mod payment;
mod query;
mod reconciler;
mod recorder;
mod repository;
mod sale;
mod schema;
mod sqlite;
mod subledger;

pub use entry::{
    money, AccountType, LedgerEntry, LedgerEvent, ManualKind, ManualTransaction, Reference, Scope,
    TransactionType, MONEY_SCALE,
};
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use payment::{NewPayment, Payment, PaymentMethod, PaymentReceipt, SubledgerBalance};
pub use query::LedgerQuery;
pub use repository::LedgerRepository;
pub use sale::{
    BackfillFailure, BackfillReport, CogsLine, CogsOutcome, Product, PurchaseOutcome, PurchaseRecord,
    SaleLine, SaleOutcome, SaleRecord,
};
pub use sqlite::{SqliteLedger, DEFAULT_BUSY_TIMEOUT};
pub use subledger::{PayableRecord, ReceivableRecord};

