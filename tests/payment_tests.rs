// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use stockbook::commands::payments::{
    self, VendorPaymentInput, create_vendor_payment, list_vendor_payments_for_vendor,
};
use stockbook::commands::purchases::{
    PurchaseOrderInput, PurchaseOrderItemInput, PurchaseOrderUpdate, cancel_purchase_order,
    create_purchase_order, get_purchase_order, update_purchase_order,
};
use stockbook::commands::receiving::{StockReceiptInput, StockReceiptItemInput, create_stock_receipt};
use stockbook::error::{ErrorKind, ProcurementError};
use stockbook::models::{Actor, OrderStatus, PaymentMethod, PaymentStatus, PurchaseOrder};
use stockbook::{cli, db, ledger};

const ACTOR: Actor = Actor(5);

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn.execute_batch(
        "INSERT INTO vendors(id, name) VALUES ('v1', 'Acme Supplies');
         INSERT INTO products(id, name) VALUES ('p1', 'Paracetamol 500mg');",
    )
    .unwrap();
    conn
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn order_input(day: &str, qty: i64) -> PurchaseOrderInput {
    PurchaseOrderInput {
        vendor_id: "v1".into(),
        order_date: date(day),
        notes: None,
        items: vec![PurchaseOrderItemInput {
            product_id: "p1".into(),
            quantity_ordered: qty,
            cost_price: Decimal::new(5, 0),
            selling_price: Decimal::new(7, 0),
            expires_at: None,
        }],
    }
}

/// Places an order worth `qty * 5` and receives all of it.
fn received_order(conn: &mut Connection, day: &str, qty: i64) -> PurchaseOrder {
    let input = order_input(day, qty);
    let po = create_purchase_order(conn, ACTOR, &input).unwrap();
    let po = update_purchase_order(
        conn,
        ACTOR,
        &po.id,
        &PurchaseOrderUpdate {
            order: input,
            status: OrderStatus::Ordered,
        },
    )
    .unwrap();
    create_stock_receipt(
        conn,
        ACTOR,
        &StockReceiptInput {
            purchase_order_id: po.id.clone(),
            received_date: date(day),
            notes: None,
            items: vec![StockReceiptItemInput {
                purchase_order_item_id: po.items[0].id.clone(),
                quantity_received: qty,
            }],
        },
    )
    .unwrap();
    get_purchase_order(conn, &po.id).unwrap()
}

fn pay(vendor: &str, amount: i64) -> VendorPaymentInput {
    VendorPaymentInput {
        vendor_id: vendor.into(),
        amount: Decimal::new(amount, 0),
        payment_date: date("2025-02-01"),
        payment_method: PaymentMethod::BankTransfer,
        reference: Some("NEFT-001".into()),
        notes: None,
    }
}

#[test]
fn fifo_allocation_pays_oldest_order_first() {
    let mut conn = setup();
    // B is entered first but dated later; order date decides, not entry order
    let b = received_order(&mut conn, "2025-01-15", 20);
    let a = received_order(&mut conn, "2025-01-01", 10);
    assert_eq!(a.total_amount, Decimal::new(50, 0));
    assert_eq!(b.total_amount, Decimal::new(100, 0));
    assert_eq!(ledger::balance(&conn, "v1").unwrap(), Decimal::new(150, 0));

    let outcome = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 120)).unwrap();
    assert!(outcome.payment.payment_number.starts_with("VP-20250201-"));
    assert_eq!(outcome.unapplied, Decimal::ZERO);
    assert_eq!(outcome.allocations.len(), 2);
    assert_eq!(outcome.allocations[0].purchase_order_id, a.id);
    assert_eq!(outcome.allocations[0].amount, Decimal::new(50, 0));
    assert_eq!(outcome.allocations[1].amount, Decimal::new(70, 0));

    let a_now = get_purchase_order(&conn, &a.id).unwrap();
    assert_eq!(a_now.payment_status, PaymentStatus::Paid);
    assert_eq!(a_now.paid_amount, Decimal::new(50, 0));
    assert!(a_now.last_payment_at.is_some());
    let b_now = get_purchase_order(&conn, &b.id).unwrap();
    assert_eq!(b_now.payment_status, PaymentStatus::Partial);
    assert_eq!(b_now.paid_amount, Decimal::new(70, 0));
    assert_eq!(b_now.outstanding(), Decimal::new(30, 0));
    assert_eq!(ledger::balance(&conn, "v1").unwrap(), Decimal::new(30, 0));

    let follow_up = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 30)).unwrap();
    assert_eq!(follow_up.allocations.len(), 1);
    let b_now = get_purchase_order(&conn, &b.id).unwrap();
    assert_eq!(b_now.payment_status, PaymentStatus::Paid);
    assert_eq!(b_now.paid_amount, Decimal::new(100, 0));
    assert_eq!(ledger::balance(&conn, "v1").unwrap(), Decimal::ZERO);
    assert_eq!(list_vendor_payments_for_vendor(&conn, "v1").unwrap().len(), 2);
}

#[test]
fn balance_drops_by_exactly_the_sum_paid() {
    let mut conn = setup();
    received_order(&mut conn, "2025-01-01", 30);
    for amount in [10, 25, 40] {
        create_vendor_payment(&mut conn, ACTOR, &pay("v1", amount)).unwrap();
    }
    assert_eq!(ledger::balance(&conn, "v1").unwrap(), Decimal::new(75, 0));
}

#[test]
fn payment_larger_than_balance_is_refused() {
    let mut conn = setup();
    received_order(&mut conn, "2025-01-01", 10);
    let err = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 51)).unwrap_err();
    match &err {
        ProcurementError::PaymentExceedsBalance { amount, balance } => {
            assert_eq!(*amount, Decimal::new(51, 0));
            assert_eq!(*balance, Decimal::new(50, 0));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.code(), "PAYMENT_EXCEEDS_BALANCE");
    assert!(list_vendor_payments_for_vendor(&conn, "v1").unwrap().is_empty());
    assert_eq!(ledger::balance(&conn, "v1").unwrap(), Decimal::new(50, 0));
}

#[test]
fn settled_vendor_has_insufficient_balance() {
    let mut conn = setup();
    let err = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 1)).unwrap_err();
    assert!(matches!(err, ProcurementError::InsufficientBalance { .. }));
    assert_eq!(err.kind(), ErrorKind::Domain);

    received_order(&mut conn, "2025-01-01", 2);
    create_vendor_payment(&mut conn, ACTOR, &pay("v1", 10)).unwrap();
    let err = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 1)).unwrap_err();
    assert_eq!(err.code(), "INSUFFICIENT_BALANCE");
}

#[test]
fn unknown_vendor_and_bad_amounts() {
    let mut conn = setup();
    let err = create_vendor_payment(&mut conn, ACTOR, &pay("ghost", 1)).unwrap_err();
    assert!(matches!(err, ProcurementError::VendorNotFound(_)));
    assert_eq!(err.code(), "VENDOR_NOT_FOUND");

    let err = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn cancelled_orders_never_absorb_payments() {
    let mut conn = setup();
    let cancelled = create_purchase_order(&mut conn, ACTOR, &order_input("2024-12-01", 4)).unwrap();
    cancel_purchase_order(&conn, ACTOR, &cancelled.id).unwrap();
    let live = received_order(&mut conn, "2025-01-01", 4);

    let outcome = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 20)).unwrap();
    assert_eq!(outcome.allocations.len(), 1);
    assert_eq!(outcome.allocations[0].purchase_order_id, live.id);
    assert_eq!(
        get_purchase_order(&conn, &cancelled.id).unwrap().paid_amount,
        Decimal::ZERO
    );
}

#[test]
fn open_draft_orders_take_part_in_fifo() {
    let mut conn = setup();
    let draft = create_purchase_order(&mut conn, ACTOR, &order_input("2024-12-01", 2)).unwrap();
    received_order(&mut conn, "2025-01-01", 4);

    let outcome = create_vendor_payment(&mut conn, ACTOR, &pay("v1", 15)).unwrap();
    assert_eq!(outcome.allocations[0].purchase_order_id, draft.id);
    assert_eq!(outcome.allocations[0].amount, Decimal::new(10, 0));
    assert_eq!(outcome.allocations[1].amount, Decimal::new(5, 0));
}

#[test]
fn residual_is_reported_as_unapplied_and_still_debited() {
    let mut conn = setup();
    // opening balance carried over from before any order was recorded here
    conn.execute_batch(
        "INSERT INTO vendors(id, name, balance) VALUES ('v2', 'Legacy Pharma', '80');
         INSERT INTO purchase_orders(id, vendor_id, order_number, order_date, status,
             total_amount, paid_amount, payment_status)
         VALUES ('old', 'v2', 'PO-LEGACY', '2024-06-01', 'received', '30', '0', 'unpaid');",
    )
    .unwrap();

    let outcome = create_vendor_payment(&mut conn, ACTOR, &pay("v2", 50)).unwrap();
    assert_eq!(outcome.allocations.len(), 1);
    assert_eq!(outcome.allocations[0].amount, Decimal::new(30, 0));
    assert_eq!(outcome.unapplied, Decimal::new(20, 0));
    assert_eq!(ledger::balance(&conn, "v2").unwrap(), Decimal::new(30, 0));

    let again = create_vendor_payment(&mut conn, ACTOR, &pay("v2", 30)).unwrap();
    assert!(again.allocations.is_empty());
    assert_eq!(again.unapplied, Decimal::new(30, 0));
    assert_eq!(ledger::balance(&conn, "v2").unwrap(), Decimal::ZERO);
}

#[test]
fn cli_pay_create_parses_method() {
    let mut conn = setup();
    received_order(&mut conn, "2025-01-01", 10);
    let cli = cli::build_cli();
    let matches = cli.get_matches_from([
        "stockbook",
        "pay",
        "create",
        "--vendor",
        " v1 ",
        "--amount",
        " 12.75 ",
        "--date",
        "2025-02-03",
        "--method",
        " UPI ",
        "--reference",
        "txn-77",
    ]);
    if let Some(("pay", m)) = matches.subcommand() {
        payments::handle(&mut conn, ACTOR, m).unwrap();
    } else {
        panic!("pay command not parsed");
    }
    let stored = list_vendor_payments_for_vendor(&conn, "v1").unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].payment_method, PaymentMethod::Upi);
    assert_eq!(stored[0].amount, Decimal::new(1275, 2));
    assert_eq!(stored[0].reference.as_deref(), Some("txn-77"));
    assert_eq!(ledger::balance(&conn, "v1").unwrap(), Decimal::new(3725, 2));

    let bad = cli::build_cli().get_matches_from([
        "stockbook", "pay", "create", "--vendor", "v1", "--amount", "1", "--date",
        "2025-02-03", "--method", "wire",
    ]);
    if let Some(("pay", m)) = bad.subcommand() {
        assert!(payments::handle(&mut conn, ACTOR, m).is_err());
    }
}
