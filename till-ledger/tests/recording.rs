use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tempfile::{tempdir, TempDir};

use till_ledger::{
    AccountType, ErrorKind, LedgerEvent, LedgerQuery, LedgerRepository, ManualKind,
    ManualTransaction, NewPayment, PaymentMethod, Product, PurchaseRecord, Reference, SaleLine,
    SaleRecord, Scope, SqliteLedger, SubledgerBalance, TransactionType,
};

const DEVICE: i64 = 11;

fn scope() -> Scope {
    Scope::new(DEVICE, 3, 42)
}

fn open_ledger() -> (TempDir, SqliteLedger) {
    let dir = tempdir().unwrap();
    let ledger = SqliteLedger::new(dir.path().join("till.db")).unwrap();
    (dir, ledger)
}

fn product(id: i64, price: Option<Decimal>, wholesale_price: Option<Decimal>) -> Product {
    Product {
        id,
        device_id: DEVICE,
        name: format!("product-{id}"),
        price,
        wholesale_price,
    }
}

fn sale(sale_id: i64, total: Decimal, paid: Decimal, items: Vec<SaleLine>) -> SaleRecord {
    SaleRecord {
        sale_id,
        customer_id: Some(7),
        total,
        paid_amount: paid,
        method: PaymentMethod::Cash,
        items,
        scope: scope(),
        sale_date: Utc.with_ymd_and_hms(2026, 5, 2, 15, 0, 0).unwrap(),
    }
}

#[test]
fn every_account_type_splits_debit_and_credit() {
    let (_dir, ledger) = open_ledger();
    let cases = [
        (TransactionType::Sale, AccountType::Revenue, false),
        (TransactionType::Expense, AccountType::Expense, true),
        (TransactionType::PaymentReceived, AccountType::Asset, true),
        (TransactionType::PaymentMade, AccountType::Liability, false),
    ];
    for (transaction_type, account_type, debit_side) in cases {
        let entry = ledger
            .record(LedgerEvent::new(transaction_type, account_type, dec!(19.99), scope()))
            .unwrap();
        assert_eq!(entry.debit_amount + entry.credit_amount, entry.amount);
        assert_eq!(entry.debit_amount.min(entry.credit_amount), Decimal::ZERO);
        if debit_side {
            assert_eq!(entry.debit_amount, dec!(19.99), "{account_type}");
        } else {
            assert_eq!(entry.credit_amount, dec!(19.99), "{account_type}");
        }
    }
    let stored = ledger.entries(&LedgerQuery::for_device(DEVICE)).unwrap();
    assert_eq!(stored.len(), 4);
    for entry in stored {
        assert_eq!(entry.debit_amount + entry.credit_amount, entry.amount);
    }
}

#[test]
fn negative_amount_is_rejected_without_writing() {
    let (_dir, ledger) = open_ledger();
    let err = ledger
        .record(LedgerEvent::new(
            TransactionType::Sale,
            AccountType::Revenue,
            dec!(-10),
            scope(),
        ))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(ledger.latest_entry_id().unwrap().is_none());
}

#[test]
fn amounts_are_rounded_to_cents() {
    let (_dir, ledger) = open_ledger();
    let entry = ledger
        .record(LedgerEvent::new(
            TransactionType::Income,
            AccountType::Revenue,
            dec!(10.005),
            scope(),
        ))
        .unwrap();
    assert_eq!(entry.amount, dec!(10.01));
}

#[test]
fn cogs_falls_back_to_retail_price() {
    let (_dir, ledger) = open_ledger();
    ledger.upsert_product(&product(1, Some(dec!(25)), None)).unwrap();
    let date = Utc::now();

    let outcome = ledger
        .record_cogs(500, &[SaleLine { product_id: 1, quantity: 3 }], scope(), date)
        .unwrap();

    assert_eq!(outcome.total_cost, dec!(75));
    assert_eq!(outcome.lines.len(), 1);
    assert_eq!(outcome.lines[0].cost_price, dec!(25));
    let entry = outcome.entry.expect("cogs entry");
    assert_eq!(entry.transaction_type, TransactionType::Cogs);
    assert_eq!(entry.account_type, AccountType::Expense);
    assert_eq!(entry.debit_amount, dec!(75));
    assert_eq!(entry.reference, Some(Reference::Sale(500)));
}

#[test]
fn cogs_without_any_price_writes_lines_but_no_entry() {
    let (_dir, ledger) = open_ledger();
    ledger.upsert_product(&product(2, None, None)).unwrap();

    let outcome = ledger
        .record_cogs(501, &[SaleLine { product_id: 2, quantity: 3 }], scope(), Utc::now())
        .unwrap();

    assert_eq!(outcome.total_cost, Decimal::ZERO);
    assert!(outcome.entry.is_none());
    assert_eq!(ledger.cogs_lines(DEVICE, 501).unwrap().len(), 1);
    let cogs = ledger
        .entries(&LedgerQuery::for_device(DEVICE).with_type(TransactionType::Cogs))
        .unwrap();
    assert!(cogs.is_empty());
}

#[test]
fn cogs_prefers_wholesale_and_aggregates_lines() {
    let (_dir, ledger) = open_ledger();
    ledger
        .upsert_product(&product(1, Some(dec!(25)), Some(dec!(10))))
        .unwrap();
    ledger.upsert_product(&product(2, Some(dec!(4.50)), None)).unwrap();
    let outcome = ledger
        .record_cogs(
            502,
            &[
                SaleLine { product_id: 1, quantity: 2 },
                SaleLine { product_id: 2, quantity: 4 },
            ],
            scope(),
            Utc::now(),
        )
        .unwrap();
    assert_eq!(outcome.total_cost, dec!(38));
    assert_eq!(outcome.entry.unwrap().amount, dec!(38));
}

#[test]
fn unknown_product_rolls_back_the_whole_costing() {
    let (_dir, ledger) = open_ledger();
    ledger.upsert_product(&product(1, Some(dec!(5)), None)).unwrap();
    let err = ledger
        .record_cogs(
            503,
            &[
                SaleLine { product_id: 1, quantity: 1 },
                SaleLine { product_id: 99, quantity: 1 },
            ],
            scope(),
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(ledger.cogs_lines(DEVICE, 503).unwrap().is_empty());
}

#[test]
fn zero_wholesale_price_costs_at_retail() {
    let (_dir, ledger) = open_ledger();
    ledger
        .upsert_product(&product(4, Some(dec!(25)), Some(Decimal::ZERO)))
        .unwrap();
    let outcome = ledger
        .record_cogs(504, &[SaleLine { product_id: 4, quantity: 2 }], scope(), Utc::now())
        .unwrap();
    assert_eq!(outcome.total_cost, dec!(50));
    assert_eq!(outcome.entry.unwrap().amount, dec!(50));
}

#[test]
fn oversized_cost_is_rejected_and_rolled_back() {
    let (_dir, ledger) = open_ledger();
    let huge = Decimal::from(10_000_000_000_u64) * Decimal::from(10_000_000_000_u64);
    ledger.upsert_product(&product(1, Some(dec!(5)), None)).unwrap();
    ledger.upsert_product(&product(5, None, Some(huge))).unwrap();

    let err = ledger
        .record_cogs(
            505,
            &[
                SaleLine { product_id: 1, quantity: 1 },
                SaleLine { product_id: 5, quantity: 10_000_000_000 },
            ],
            scope(),
            Utc::now(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert!(ledger.cogs_lines(DEVICE, 505).unwrap().is_empty());
    let entries = ledger.entries(&LedgerQuery::for_device(DEVICE)).unwrap();
    assert!(entries.is_empty());
}

#[test]
fn sequential_payments_reconcile_receivable() {
    let (_dir, ledger) = open_ledger();
    ledger.upsert_product(&product(1, Some(dec!(200)), Some(dec!(120)))).unwrap();
    let outcome = ledger
        .record_sale(&sale(900, dec!(200), dec!(0), vec![SaleLine { product_id: 1, quantity: 1 }]))
        .unwrap();
    let receivable = outcome.receivable.expect("credit sale opens a receivable");
    assert_eq!(receivable.original_amount, dec!(200));
    assert_eq!(receivable.paid_amount, Decimal::ZERO);
    assert!(outcome.payment.is_none());

    for amount in [dec!(50), dec!(30)] {
        let receipt = ledger
            .record_payment(NewPayment::new(Reference::Sale(900), amount, scope()))
            .unwrap();
        assert_eq!(receipt.entry.transaction_type, TransactionType::PaymentReceived);
        assert_eq!(receipt.entry.account_type, AccountType::Asset);
        assert!(matches!(receipt.balance, Some(SubledgerBalance::Receivable(_))));
    }

    let receivable = ledger.receivable(DEVICE, 900).unwrap().unwrap();
    assert_eq!(receivable.paid_amount, dec!(80));
    assert_eq!(receivable.outstanding_amount, dec!(120));

    let received = ledger
        .entries(
            &LedgerQuery::for_device(DEVICE)
                .with_type(TransactionType::PaymentReceived)
                .with_reference(Reference::Sale(900)),
        )
        .unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received.iter().map(|e| e.amount).sum::<Decimal>(), dec!(80));
    assert_eq!(ledger.payments(DEVICE, Some(Reference::Sale(900))).unwrap().len(), 2);
}

#[test]
fn payment_without_receivable_writes_nothing() {
    let (_dir, ledger) = open_ledger();
    let err = ledger
        .record_payment(NewPayment::new(Reference::Sale(404), dec!(10), scope()))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(ledger.payments(DEVICE, None).unwrap().is_empty());
    assert!(ledger.latest_entry_id().unwrap().is_none());
}

#[test]
fn manual_payment_is_booked_as_payment_made() {
    let (_dir, ledger) = open_ledger();
    let receipt = ledger
        .record_payment(
            NewPayment::new(Reference::Manual, dec!(15), scope())
                .with_method(PaymentMethod::Transfer)
                .with_notes("rent deposit"),
        )
        .unwrap();
    assert_eq!(receipt.entry.transaction_type, TransactionType::PaymentMade);
    assert_eq!(receipt.entry.credit_amount, dec!(15));
    assert_eq!(receipt.entry.description, "rent deposit");
    assert!(receipt.balance.is_none());
    assert_eq!(receipt.payment.method, PaymentMethod::Transfer);
}

#[test]
fn cash_sale_books_revenue_cost_and_payment() {
    let (_dir, ledger) = open_ledger();
    ledger.upsert_product(&product(1, Some(dec!(20)), Some(dec!(8)))).unwrap();
    let outcome = ledger
        .record_sale(&sale(901, dec!(40), dec!(50), vec![SaleLine { product_id: 1, quantity: 2 }]))
        .unwrap();
    assert_eq!(outcome.revenue.credit_amount, dec!(40));
    assert_eq!(outcome.cogs.total_cost, dec!(16));
    assert!(outcome.receivable.is_none());
    let payment = outcome.payment.expect("upfront payment");
    assert_eq!(payment.payment.amount, dec!(40), "change is not booked as revenue");
    assert!(ledger.receivable(DEVICE, 901).unwrap().is_none());

    let err = ledger
        .record_sale(&sale(901, dec!(40), dec!(40), vec![SaleLine { product_id: 1, quantity: 2 }]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn resubmitted_purchase_conflicts_and_keeps_payable() {
    let (_dir, ledger) = open_ledger();
    let mut purchase = PurchaseRecord {
        purchase_id: 5,
        supplier_name: "Contoso".into(),
        total: dec!(300),
        paid_amount: dec!(100),
        method: PaymentMethod::Cash,
        scope: scope(),
        purchase_date: Utc::now(),
    };
    ledger.record_purchase(&purchase).unwrap();
    ledger
        .record_payment(NewPayment::new(Reference::Purchase(5), dec!(150), scope()))
        .unwrap();

    purchase.paid_amount = Decimal::ZERO;
    let err = ledger.record_purchase(&purchase).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let payable = ledger.payable(DEVICE, 5).unwrap().unwrap();
    assert_eq!(payable.paid_amount, dec!(250));
    assert_eq!(payable.outstanding_amount, dec!(50));
    let purchases = ledger
        .entries(&LedgerQuery::for_device(DEVICE).with_type(TransactionType::Purchase))
        .unwrap();
    assert_eq!(purchases.len(), 1);
}

#[test]
fn partial_purchase_opens_payable_and_settles() {
    let (_dir, ledger) = open_ledger();
    let purchase = PurchaseRecord {
        purchase_id: 31,
        supplier_name: "Northwind".into(),
        total: dec!(300),
        paid_amount: dec!(100),
        method: PaymentMethod::Transfer,
        scope: scope(),
        purchase_date: Utc::now(),
    };
    let outcome = ledger.record_purchase(&purchase).unwrap();
    assert_eq!(outcome.expense.debit_amount, dec!(300));
    assert_eq!(outcome.payable.as_ref().unwrap().outstanding_amount, dec!(200));
    assert_eq!(
        outcome.payment.unwrap().entry.transaction_type,
        TransactionType::PaymentMade
    );

    let receipt = ledger
        .record_payment(NewPayment::new(Reference::Purchase(31), dec!(200), scope()))
        .unwrap();
    match receipt.balance {
        Some(SubledgerBalance::Payable(record)) => {
            assert_eq!(record.paid_amount, dec!(300));
            assert!(record.is_settled());
        }
        other => panic!("unexpected balance {other:?}"),
    }
    assert_eq!(ledger.total_payable(DEVICE).unwrap(), Decimal::ZERO);
    assert_eq!(ledger.payables(DEVICE, false).unwrap().len(), 1);
}

#[test]
fn manual_transactions_are_tagged_manual() {
    let (_dir, ledger) = open_ledger();
    let entry = ledger
        .add_manual_transaction(ManualTransaction {
            kind: ManualKind::Expense,
            amount: dec!(60),
            category: "utilities".into(),
            description: "electricity".into(),
            scope: scope(),
            transaction_date: Utc::now(),
        })
        .unwrap();
    assert_eq!(entry.transaction_type, TransactionType::Expense);
    assert_eq!(entry.account_type, AccountType::Expense);
    assert_eq!(entry.reference, Some(Reference::Manual));
    assert_eq!(entry.debit_amount, dec!(60));
}

#[test]
fn concurrent_payments_do_not_lose_updates() {
    let (_dir, ledger) = open_ledger();
    ledger
        .upsert_receivable(Some(1), 77, dec!(200), dec!(0), scope())
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            std::thread::spawn(move || {
                ledger
                    .record_payment(NewPayment::new(Reference::Sale(77), dec!(10), scope()))
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let record = ledger.receivable(DEVICE, 77).unwrap().unwrap();
    assert_eq!(record.paid_amount, dec!(80));
    assert_eq!(record.outstanding_amount, dec!(120));
}

#[test]
fn backfill_skips_recorded_sales_and_continues_past_failures() {
    let (_dir, ledger) = open_ledger();
    ledger.upsert_product(&product(1, Some(dec!(10)), None)).unwrap();
    let good = sale(1, dec!(10), dec!(10), vec![SaleLine { product_id: 1, quantity: 1 }]);
    ledger.record_sale(&good).unwrap();

    let batch = vec![
        good.clone(),
        sale(2, dec!(20), dec!(0), vec![SaleLine { product_id: 1, quantity: 2 }]),
        sale(3, dec!(5), dec!(5), vec![SaleLine { product_id: 404, quantity: 1 }]),
        sale(4, dec!(10), dec!(10), vec![SaleLine { product_id: 1, quantity: 1 }]),
    ];
    let report = ledger.backfill_sales(&batch);

    assert_eq!(report.skipped, 1);
    assert_eq!(report.recorded, 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failures[0].sale_id, 3);
    let sales = ledger
        .entries(&LedgerQuery::for_device(DEVICE).with_type(TransactionType::Sale))
        .unwrap();
    assert_eq!(sales.len(), 3);
    assert!(ledger.cogs_lines(DEVICE, 3).unwrap().is_empty());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn entry_limit_beyond_sqlite_range_is_rejected() {
    let (_dir, ledger) = open_ledger();
    let err = ledger
        .entries(&LedgerQuery::for_device(DEVICE).with_limit(usize::MAX))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
}
