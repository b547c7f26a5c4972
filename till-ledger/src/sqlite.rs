use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Params, Row, Transaction, TransactionBehavior};
use rust_decimal::Decimal;
use tracing::debug;

use crate::schema::SchemaGuard;
use crate::{
    AccountType, CogsLine, LedgerEntry, LedgerError, LedgerQuery, LedgerRepository, LedgerResult, PayableRecord,
    Payment, PaymentMethod, Product, ReceivableRecord, Reference, TransactionType,
};

/// Busy timeout applied when the caller does not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const ENTRY_COLUMNS: &str = "id, transaction_date, transaction_type, reference_type, reference_id, amount, \
     account_type, debit_amount, credit_amount, category, description, device_id, company_id, \
     created_by, created_at";

pub(crate) const PAYMENT_COLUMNS: &str = "id, reference_type, reference_id, amount, method, notes, payment_date, \
     device_id, company_id, created_by, created_at";

pub(crate) const RECEIVABLE_COLUMNS: &str = "id, sale_id, customer_id, original_amount, paid_amount, \
     outstanding_amount, device_id, company_id, created_at, updated_at";

pub(crate) const PAYABLE_COLUMNS: &str = "id, purchase_id, supplier_name, original_amount, paid_amount, \
     outstanding_amount, device_id, company_id, created_at, updated_at";

pub(crate) const COGS_COLUMNS: &str =
    "id, sale_id, product_id, quantity, cost_price, total_cost, device_id, created_at";

pub(crate) const PRODUCT_COLUMNS: &str = "id, device_id, name, price, wholesale_price";

/// SQLite-backed ledger store.
///
/// Each operation opens its own connection and runs inside a single
/// transaction; clones share the schema bootstrap guard.
#[derive(Clone, Debug)]
pub struct SqliteLedger {
    path: PathBuf,
    busy_timeout: Duration,
    schema: Arc<SchemaGuard>,
}

impl SqliteLedger {
    pub fn new(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        Self::with_busy_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn with_busy_timeout(path: impl Into<PathBuf>, busy_timeout: Duration) -> LedgerResult<Self> {
        let repo = Self {
            path: path.into(),
            busy_timeout,
            schema: Arc::new(SchemaGuard::default()),
        };
        repo.ensure_schema()?;
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create tables, indexes and triggers if they are missing. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> LedgerResult<()> {
        let mut conn = self.connect()?;
        if self.schema.ensure(&mut conn)? {
            debug!(path = %self.path.display(), "ledger schema ready");
        }
        Ok(())
    }

    fn connect(&self) -> LedgerResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Ok(conn)
    }

    /// Run `op` inside an IMMEDIATE transaction; any error rolls every statement back.
    pub(crate) fn write<T>(
        &self,
        op: impl FnOnce(&Transaction<'_>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = op(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub(crate) fn read<T>(&self, op: impl FnOnce(&Connection) -> LedgerResult<T>) -> LedgerResult<T> {
        let conn = self.connect()?;
        op(&conn)
    }

    /// Highest ledger id assigned so far.
    pub fn latest_entry_id(&self) -> LedgerResult<Option<i64>> {
        self.read(|conn| {
            let id: Option<Option<i64>> = conn
                .query_row("SELECT MAX(id) FROM financial_ledger", [], |row| {
                    row.get::<_, Option<i64>>(0)
                })
                .optional()?;
            Ok(id.flatten())
        })
    }

    pub fn entry(&self, device_id: i64, id: i64) -> LedgerResult<LedgerEntry> {
        self.read(|conn| {
            query_one(
                conn,
                &format!("SELECT {ENTRY_COLUMNS} FROM financial_ledger WHERE id = ?1 AND device_id = ?2"),
                params![id, device_id],
                row_to_entry,
            )?
            .ok_or_else(|| LedgerError::NotFound(format!("ledger entry {id} on device {device_id}")))
        })
    }

    /// Payments for a device, optionally narrowed to one originating document.
    pub fn payments(&self, device_id: i64, reference: Option<Reference>) -> LedgerResult<Vec<Payment>> {
        let (kind, id) = match reference {
            Some(reference) => (Some(reference.kind()), reference.id()),
            None => (None, None),
        };
        self.read(|conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {PAYMENT_COLUMNS} FROM payments
                     WHERE device_id = ?1
                       AND (?2 IS NULL OR reference_type = ?2)
                       AND (?3 IS NULL OR reference_id = ?3)
                     ORDER BY payment_date ASC, id ASC"
                ),
                params![device_id, kind, id],
                row_to_payment,
            )
        })
    }

    pub fn cogs_lines(&self, device_id: i64, sale_id: i64) -> LedgerResult<Vec<CogsLine>> {
        self.read(|conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {COGS_COLUMNS} FROM cogs_entries
                     WHERE sale_id = ?1 AND device_id = ?2 ORDER BY id ASC"
                ),
                params![sale_id, device_id],
                row_to_cogs,
            )
        })
    }

    pub fn receivable(&self, device_id: i64, sale_id: i64) -> LedgerResult<Option<ReceivableRecord>> {
        self.read(|conn| find_receivable(conn, device_id, sale_id))
    }

    pub fn payable(&self, device_id: i64, purchase_id: i64) -> LedgerResult<Option<PayableRecord>> {
        self.read(|conn| find_payable(conn, device_id, purchase_id))
    }
}

impl LedgerRepository for SqliteLedger {
    fn entries(&self, query: &LedgerQuery) -> LedgerResult<Vec<LedgerEntry>> {
        let mut sql = format!(
            "SELECT {ENTRY_COLUMNS}
             FROM financial_ledger
             WHERE device_id = ?1
               AND (?2 IS NULL OR transaction_type = ?2)
               AND (?3 IS NULL OR reference_type = ?3)
               AND (?4 IS NULL OR reference_id = ?4)
               AND (?5 IS NULL OR created_by = ?5)
               AND (?6 IS NULL OR transaction_date >= ?6)
               AND (?7 IS NULL OR transaction_date < ?7)"
        );
        sql.push_str(if query.ascending {
            " ORDER BY transaction_date ASC, id ASC"
        } else {
            " ORDER BY transaction_date DESC, id DESC"
        });
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?8");
        }

        let mut params: Vec<Value> = Vec::with_capacity(8);
        params.push(Value::Integer(query.device_id));
        params.push(optional_text(
            query.transaction_type.map(|t| t.as_str().to_string()),
        ));
        params.push(optional_text(query.reference.map(|r| r.kind().to_string())));
        params.push(optional_int(query.reference.and_then(|r| r.id())));
        params.push(optional_int(query.created_by));
        params.push(optional_text(query.start_time.map(encode_timestamp)));
        params.push(optional_text(query.end_time.map(encode_timestamp)));
        if let Some(limit) = query.limit {
            let limit = i64::try_from(limit)
                .map_err(|_| LedgerError::validation(format!("entry limit {limit} is too large")))?;
            params.push(Value::Integer(limit));
        }

        self.read(|conn| query_all(conn, &sql, params_from_iter(params.iter()), row_to_entry))
    }

    fn receivables(&self, device_id: i64, only_outstanding: bool) -> LedgerResult<Vec<ReceivableRecord>> {
        let records = self.read(|conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {RECEIVABLE_COLUMNS} FROM accounts_receivable
                     WHERE device_id = ?1 ORDER BY sale_id ASC"
                ),
                params![device_id],
                row_to_receivable,
            )
        })?;
        Ok(records
            .into_iter()
            .filter(|record| !only_outstanding || record.outstanding_amount > Decimal::ZERO)
            .collect())
    }

    fn payables(&self, device_id: i64, only_outstanding: bool) -> LedgerResult<Vec<PayableRecord>> {
        let records = self.read(|conn| {
            query_all(
                conn,
                &format!(
                    "SELECT {PAYABLE_COLUMNS} FROM accounts_payable
                     WHERE device_id = ?1 ORDER BY purchase_id ASC"
                ),
                params![device_id],
                row_to_payable,
            )
        })?;
        Ok(records
            .into_iter()
            .filter(|record| !only_outstanding || record.outstanding_amount > Decimal::ZERO)
            .collect())
    }
}

pub(crate) fn find_receivable(
    conn: &Connection,
    device_id: i64,
    sale_id: i64,
) -> LedgerResult<Option<ReceivableRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM accounts_receivable WHERE sale_id = ?1 AND device_id = ?2"
        ),
        params![sale_id, device_id],
        row_to_receivable,
    )
}

pub(crate) fn find_payable(
    conn: &Connection,
    device_id: i64,
    purchase_id: i64,
) -> LedgerResult<Option<PayableRecord>> {
    query_one(
        conn,
        &format!(
            "SELECT {PAYABLE_COLUMNS} FROM accounts_payable WHERE purchase_id = ?1 AND device_id = ?2"
        ),
        params![purchase_id, device_id],
        row_to_payable,
    )
}

pub(crate) fn query_all<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> LedgerResult<T>,
) -> LedgerResult<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(map(row)?);
    }
    Ok(out)
}

pub(crate) fn query_one<T, P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
    map: fn(&Row<'_>) -> LedgerResult<T>,
) -> LedgerResult<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(map(row)?)),
        None => Ok(None),
    }
}

/// Fixed-width UTC encoding so text comparison matches chronological order.
pub(crate) fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn optional_text(value: Option<String>) -> Value {
    value.map(Value::from).unwrap_or(Value::Null)
}

fn optional_int(value: Option<i64>) -> Value {
    value.map(Value::Integer).unwrap_or(Value::Null)
}

fn parse_timestamp(raw: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| LedgerError::Serialization(format!("invalid timestamp {raw}: {err}")))
}

fn parse_decimal(raw: &str) -> LedgerResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|err| LedgerError::Serialization(format!("invalid decimal {raw}: {err}")))
}

fn parse_optional_decimal(raw: Option<String>) -> LedgerResult<Option<Decimal>> {
    raw.as_deref().map(parse_decimal).transpose()
}

fn parse_reference(kind: Option<String>, id: Option<i64>) -> LedgerResult<Option<Reference>> {
    Reference::from_columns(kind.as_deref(), id).map_err(LedgerError::Serialization)
}

fn row_to_entry(row: &Row<'_>) -> LedgerResult<LedgerEntry> {
    let transaction_type: String = row.get(2)?;
    let account_type: String = row.get(6)?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        transaction_date: parse_timestamp(&row.get::<_, String>(1)?)?,
        transaction_type: TransactionType::from_str(&transaction_type)
            .map_err(LedgerError::Serialization)?,
        reference: parse_reference(row.get(3)?, row.get(4)?)?,
        amount: parse_decimal(&row.get::<_, String>(5)?)?,
        account_type: AccountType::from_str(&account_type).map_err(LedgerError::Serialization)?,
        debit_amount: parse_decimal(&row.get::<_, String>(7)?)?,
        credit_amount: parse_decimal(&row.get::<_, String>(8)?)?,
        category: row.get(9)?,
        description: row.get(10)?,
        device_id: row.get(11)?,
        company_id: row.get(12)?,
        created_by: row.get(13)?,
        created_at: parse_timestamp(&row.get::<_, String>(14)?)?,
    })
}

pub(crate) fn row_to_payment(row: &Row<'_>) -> LedgerResult<Payment> {
    let id: i64 = row.get(0)?;
    let reference = parse_reference(row.get(1)?, row.get(2)?)?
        .ok_or_else(|| LedgerError::Serialization(format!("payment {id} has no reference")))?;
    let method: String = row.get(4)?;
    Ok(Payment {
        id,
        reference,
        amount: parse_decimal(&row.get::<_, String>(3)?)?,
        method: PaymentMethod::from_str(&method).map_err(LedgerError::Serialization)?,
        notes: row.get(5)?,
        payment_date: parse_timestamp(&row.get::<_, String>(6)?)?,
        device_id: row.get(7)?,
        company_id: row.get(8)?,
        created_by: row.get(9)?,
        created_at: parse_timestamp(&row.get::<_, String>(10)?)?,
    })
}

fn row_to_receivable(row: &Row<'_>) -> LedgerResult<ReceivableRecord> {
    Ok(ReceivableRecord {
        id: row.get(0)?,
        sale_id: row.get(1)?,
        customer_id: row.get(2)?,
        original_amount: parse_decimal(&row.get::<_, String>(3)?)?,
        paid_amount: parse_decimal(&row.get::<_, String>(4)?)?,
        outstanding_amount: parse_decimal(&row.get::<_, String>(5)?)?,
        device_id: row.get(6)?,
        company_id: row.get(7)?,
        created_at: parse_timestamp(&row.get::<_, String>(8)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(9)?)?,
    })
}

fn row_to_payable(row: &Row<'_>) -> LedgerResult<PayableRecord> {
    Ok(PayableRecord {
        id: row.get(0)?,
        purchase_id: row.get(1)?,
        supplier_name: row.get(2)?,
        original_amount: parse_decimal(&row.get::<_, String>(3)?)?,
        paid_amount: parse_decimal(&row.get::<_, String>(4)?)?,
        outstanding_amount: parse_decimal(&row.get::<_, String>(5)?)?,
        device_id: row.get(6)?,
        company_id: row.get(7)?,
        created_at: parse_timestamp(&row.get::<_, String>(8)?)?,
        updated_at: parse_timestamp(&row.get::<_, String>(9)?)?,
    })
}

fn row_to_cogs(row: &Row<'_>) -> LedgerResult<CogsLine> {
    Ok(CogsLine {
        id: row.get(0)?,
        sale_id: row.get(1)?,
        product_id: row.get(2)?,
        quantity: row.get(3)?,
        cost_price: parse_decimal(&row.get::<_, String>(4)?)?,
        total_cost: parse_decimal(&row.get::<_, String>(5)?)?,
        device_id: row.get(6)?,
        created_at: parse_timestamp(&row.get::<_, String>(7)?)?,
    })
}

pub(crate) fn row_to_product(row: &Row<'_>) -> LedgerResult<Product> {
    Ok(Product {
        id: row.get(0)?,
        device_id: row.get(1)?,
        name: row.get(2)?,
        price: parse_optional_decimal(row.get(3)?)?,
        wholesale_price: parse_optional_decimal(row.get(4)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LedgerEvent, Scope};
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    #[test]
    fn sqlite_roundtrip() {
        let dir = tempdir().unwrap();
        let repo = SqliteLedger::new(dir.path().join("ledger.db")).unwrap();
        let date = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let event = LedgerEvent::new(
            TransactionType::Sale,
            AccountType::Revenue,
            dec!(12.5),
            Scope::new(3, 1, 8),
        )
        .with_reference(Reference::Sale(77))
        .with_category("sales")
        .dated(date);
        let recorded = repo.record(event).unwrap();

        let result = repo.entries(&LedgerQuery::for_device(3)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, recorded.id);
        assert_eq!(result[0].amount, dec!(12.50));
        assert_eq!(result[0].credit_amount, dec!(12.50));
        assert_eq!(result[0].transaction_date, date);
        assert_eq!(result[0].reference, Some(Reference::Sale(77)));
        assert!(repo.entries(&LedgerQuery::for_device(4)).unwrap().is_empty());
        assert_eq!(repo.latest_entry_id().unwrap(), Some(recorded.id));
    }

    #[test]
    fn time_range_is_half_open() {
        let dir = tempdir().unwrap();
        let repo = SqliteLedger::new(dir.path().join("ledger.db")).unwrap();
        let scope = Scope::new(1, 1, 1);
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        for date in [start, end] {
            repo.record(
                LedgerEvent::new(TransactionType::Expense, AccountType::Expense, dec!(5), scope)
                    .dated(date),
            )
            .unwrap();
        }
        let query = LedgerQuery::for_device(1).with_time_range(Some(start), Some(end));
        let entries = repo.entries(&query).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transaction_date, start);
    }

    #[test]
    fn ledger_rows_cannot_be_rewritten() {
        let dir = tempdir().unwrap();
        let repo = SqliteLedger::new(dir.path().join("ledger.db")).unwrap();
        let entry = repo
            .record(LedgerEvent::new(
                TransactionType::Income,
                AccountType::Revenue,
                dec!(1),
                Scope::new(1, 1, 1),
            ))
            .unwrap();
        let err = repo
            .write(|tx| {
                tx.execute(
                    "UPDATE financial_ledger SET amount = '2.00' WHERE id = ?1",
                    params![entry.id],
                )?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
        let err = repo
            .write(|tx| {
                tx.execute("DELETE FROM financial_ledger", [])?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
    }

    #[test]
    fn timestamp_encoding_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let later = early + chrono::Duration::milliseconds(1500);
        assert!(encode_timestamp(early) < encode_timestamp(later));
        assert_eq!(encode_timestamp(early), "2026-01-01T09:00:00.000000Z");
    }
}
