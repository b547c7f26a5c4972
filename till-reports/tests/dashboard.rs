use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::{tempdir, TempDir};

use till_ledger::{
    AccountType, ErrorKind, LedgerEntry, LedgerEvent, LedgerQuery, LedgerRepository, LedgerResult,
    PayableRecord, ReceivableRecord, Scope, SqliteLedger, TransactionType,
};
use till_reports::{
    summarize, summarize_dashboard_at, DashboardRequest, Direction, Period, PeriodSummary,
};

const DEVICE: i64 = 4;

fn scope() -> Scope {
    Scope::new(DEVICE, 1, 9)
}

fn at(m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, m, d, h, 0, 0).unwrap()
}

fn open_ledger() -> (TempDir, SqliteLedger) {
    let dir = tempdir().unwrap();
    let ledger = SqliteLedger::new(dir.path().join("till.db")).unwrap();
    (dir, ledger)
}

fn book(
    ledger: &SqliteLedger,
    transaction_type: TransactionType,
    account_type: AccountType,
    amount: Decimal,
    when: DateTime<Utc>,
) {
    ledger
        .record(LedgerEvent::new(transaction_type, account_type, amount, scope()).dated(when))
        .unwrap();
}

fn request(period: Period) -> DashboardRequest {
    DashboardRequest {
        user_id: 77,
        device_id: DEVICE,
        period,
    }
}

#[test]
fn empty_week_has_seven_zero_buckets() {
    let (_dir, ledger) = open_ledger();
    let now = at(5, 20, 12);
    let snapshot = summarize_dashboard_at(&ledger, &request(Period::Week), now).unwrap();

    assert_eq!(snapshot.chart.len(), 7);
    for (offset, point) in snapshot.chart.iter().enumerate() {
        assert_eq!(point.bucket_start, at(5, 14 + offset as u32, 0));
        assert_eq!(point.income, Decimal::ZERO);
        assert_eq!(point.expenses, Decimal::ZERO);
        assert_eq!(point.net_flow, Decimal::ZERO);
    }
    assert_eq!(snapshot.summary, PeriodSummary::default());
    assert_eq!(snapshot.metrics.revenue.direction, Direction::Neutral);
    assert_eq!(snapshot.metrics.expenses.change, Decimal::ZERO);
}

#[test]
fn week_over_week_metrics_and_chart() {
    let (_dir, ledger) = open_ledger();
    let now = at(5, 20, 12);
    // Previous window is [05-06 12:00, 05-13 12:00).
    book(&ledger, TransactionType::Sale, AccountType::Revenue, dec!(100), at(5, 8, 10));
    book(&ledger, TransactionType::Expense, AccountType::Expense, dec!(100), at(5, 10, 9));
    // Current window.
    book(&ledger, TransactionType::Sale, AccountType::Revenue, dec!(200), at(5, 18, 15));
    book(&ledger, TransactionType::Cogs, AccountType::Expense, dec!(50), at(5, 18, 15));
    book(&ledger, TransactionType::Expense, AccountType::Expense, dec!(80), at(5, 19, 8));
    book(&ledger, TransactionType::PaymentReceived, AccountType::Asset, dec!(150), at(5, 18, 16));
    book(&ledger, TransactionType::Income, AccountType::Revenue, dec!(10), at(5, 19, 11));
    // Outside both windows.
    book(&ledger, TransactionType::Sale, AccountType::Revenue, dec!(999), at(4, 1, 10));

    let snapshot = summarize_dashboard_at(&ledger, &request(Period::Week), now).unwrap();

    let expenses = &snapshot.metrics.expenses;
    assert_eq!((expenses.current, expenses.previous), (dec!(80), dec!(100)));
    assert_eq!(expenses.change, dec!(20));
    assert_eq!(expenses.direction, Direction::Increase);

    assert_eq!(snapshot.metrics.revenue.change, dec!(100));
    assert_eq!(snapshot.metrics.revenue.direction, Direction::Increase);
    assert_eq!(snapshot.summary.gross_profit, dec!(150));
    assert_eq!(snapshot.summary.net_profit, dec!(70));
    assert_eq!(snapshot.metrics.cash_flow.current, dec!(150));
    assert_eq!(snapshot.metrics.cash_flow.change, Decimal::ZERO);

    let day = |d: u32| {
        snapshot
            .chart
            .iter()
            .find(|point| point.bucket_start == at(5, d, 0))
            .unwrap()
    };
    assert_eq!(day(18).income, dec!(200));
    assert_eq!(day(18).expenses, Decimal::ZERO);
    assert_eq!(day(19).income, dec!(10));
    assert_eq!(day(19).expenses, dec!(80));
    assert_eq!(day(19).net_flow, dec!(-70));
}

#[test]
fn rolling_week_metrics_reach_past_first_chart_day() {
    let (_dir, ledger) = open_ledger();
    let now = at(5, 20, 12);
    // After 05-13 12:00, so inside the rolling window, but before the first bucket.
    book(&ledger, TransactionType::Expense, AccountType::Expense, dec!(40), at(5, 13, 15));

    let snapshot = summarize_dashboard_at(&ledger, &request(Period::Week), now).unwrap();
    assert_eq!(snapshot.metrics.expenses.current, dec!(40));
    assert_eq!(snapshot.chart[0].bucket_start, at(5, 14, 0));
    assert!(snapshot.chart.iter().all(|point| point.expenses.is_zero()));
}

#[test]
fn today_chart_is_hourly() {
    let (_dir, ledger) = open_ledger();
    let now = at(5, 20, 18);
    book(&ledger, TransactionType::Sale, AccountType::Revenue, dec!(12.50), at(5, 20, 9));
    book(&ledger, TransactionType::Sale, AccountType::Revenue, dec!(7.50), at(5, 20, 9));
    book(&ledger, TransactionType::Sale, AccountType::Revenue, dec!(40), at(5, 19, 9));

    let snapshot = summarize_dashboard_at(&ledger, &request(Period::Today), now).unwrap();
    assert_eq!(snapshot.chart.len(), 24);
    assert_eq!(snapshot.chart[9].label, "09:00");
    assert_eq!(snapshot.chart[9].income, dec!(20));
    assert_eq!(snapshot.metrics.revenue.current, dec!(20));
    assert_eq!(snapshot.metrics.revenue.previous, dec!(40));
    assert_eq!(snapshot.metrics.revenue.change, dec!(-50));
    assert_eq!(snapshot.metrics.revenue.direction, Direction::Decrease);
}

#[test]
fn summary_carries_subledger_balances() {
    let (_dir, ledger) = open_ledger();
    ledger
        .upsert_receivable(Some(3), 10, dec!(300), dec!(120), scope())
        .unwrap();
    ledger
        .upsert_payable("Acme", 20, dec!(90), dec!(0), scope())
        .unwrap();
    book(&ledger, TransactionType::Sale, AccountType::Revenue, dec!(300), at(3, 2, 10));
    book(&ledger, TransactionType::Cogs, AccountType::Expense, dec!(110), at(3, 2, 10));
    book(&ledger, TransactionType::Purchase, AccountType::Expense, dec!(90), at(3, 5, 10));

    let summary = summarize(&ledger, DEVICE, None, None).unwrap();
    assert_eq!(summary.total_receivable, dec!(180));
    assert_eq!(summary.total_payable, dec!(90));
    assert_eq!(summary.gross_profit, summary.total_revenue - summary.total_cogs);
    assert_eq!(summary.net_profit, summary.gross_profit - summary.total_expenses);
    assert_eq!(summary.net_profit, dec!(100));

    let march_first_week = summarize(&ledger, DEVICE, Some(at(3, 1, 0)), Some(at(3, 5, 10))).unwrap();
    assert_eq!(march_first_week.total_expenses, Decimal::ZERO);
}

#[test]
fn empty_ledger_summary_is_zero() {
    let (_dir, ledger) = open_ledger();
    let summary = summarize(&ledger, DEVICE, None, None).unwrap();
    assert_eq!(summary, PeriodSummary::default());
}

#[test]
fn inverted_window_is_rejected() {
    let (_dir, ledger) = open_ledger();
    let err = summarize(&ledger, DEVICE, Some(at(5, 2, 0)), Some(at(5, 1, 0))).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}

/// Entries held in memory; exercises reporting against any repository.
struct MemoryLedger {
    entries: Vec<LedgerEntry>,
}

impl LedgerRepository for MemoryLedger {
    fn entries(&self, query: &LedgerQuery) -> LedgerResult<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.device_id == query.device_id)
            .filter(|entry| query.start_time.map_or(true, |start| entry.transaction_date >= start))
            .filter(|entry| query.end_time.map_or(true, |end| entry.transaction_date < end))
            .cloned()
            .collect())
    }

    fn receivables(&self, _device_id: i64, _only_outstanding: bool) -> LedgerResult<Vec<ReceivableRecord>> {
        Ok(Vec::new())
    }

    fn payables(&self, _device_id: i64, _only_outstanding: bool) -> LedgerResult<Vec<PayableRecord>> {
        Ok(Vec::new())
    }
}

fn memory_entry(transaction_type: TransactionType, amount: Decimal, when: DateTime<Utc>) -> LedgerEntry {
    let account_type = match transaction_type {
        TransactionType::Sale | TransactionType::Income => AccountType::Revenue,
        _ => AccountType::Expense,
    };
    let (debit_amount, credit_amount) = account_type.split(amount);
    LedgerEntry {
        id: 0,
        transaction_date: when,
        transaction_type,
        reference: None,
        amount,
        account_type,
        debit_amount,
        credit_amount,
        category: String::new(),
        description: String::new(),
        device_id: DEVICE,
        company_id: 1,
        created_by: 9,
        created_at: when,
    }
}

#[test]
fn quarter_and_year_charts_from_any_repository() {
    let repo = MemoryLedger {
        entries: vec![
            memory_entry(TransactionType::Sale, dec!(30), at(1, 15, 10)),
            memory_entry(TransactionType::Purchase, dec!(12), at(4, 1, 10)),
            memory_entry(TransactionType::Sale, dec!(45), at(5, 19, 10)),
        ],
    };
    let repo: &dyn LedgerRepository = &repo;
    let now = at(5, 20, 12);

    let quarter = summarize_dashboard_at(repo, &request(Period::Quarter), now).unwrap();
    assert_eq!(quarter.chart.len(), 8);
    // 2026-04-01 falls in the ISO week starting Monday 2026-03-30.
    assert_eq!(quarter.chart[0].expenses, dec!(12));
    assert_eq!(quarter.chart[7].income, dec!(45));
    assert_eq!(quarter.metrics.revenue.current, dec!(45));
    assert_eq!(quarter.metrics.revenue.previous, dec!(30));

    let year = summarize_dashboard_at(repo, &request(Period::Year), now).unwrap();
    let labels: Vec<&str> = year.chart.iter().map(|point| point.label.as_str()).collect();
    assert_eq!(labels, ["2026-01", "2026-02", "2026-03", "2026-04", "2026-05"]);
    assert_eq!(year.chart[0].income, dec!(30));
    assert_eq!(year.summary.total_revenue, dec!(75));
}

#[test]
fn overflowing_totals_fail_instead_of_panicking() {
    let now = at(5, 20, 12);
    let repo = MemoryLedger {
        entries: vec![
            memory_entry(TransactionType::Sale, Decimal::MAX, at(5, 19, 10)),
            memory_entry(TransactionType::Sale, Decimal::MAX, at(5, 19, 11)),
        ],
    };
    let err = summarize_dashboard_at(&repo, &request(Period::Week), now).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}
