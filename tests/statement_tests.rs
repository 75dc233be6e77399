// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use stockbook::commands::doctor;
use stockbook::commands::exporter::{self, EntryKind, vendor_statement, write_statement};
use stockbook::commands::payments::{VendorPaymentInput, create_vendor_payment};
use stockbook::commands::purchases::{
    PurchaseOrderInput, PurchaseOrderItemInput, PurchaseOrderUpdate, create_purchase_order,
    update_purchase_order,
};
use stockbook::commands::receiving::{StockReceiptInput, StockReceiptItemInput, create_stock_receipt};
use stockbook::commands::reports;
use stockbook::models::{Actor, OrderStatus, PaymentMethod};
use stockbook::{cli, db};
use tempfile::tempdir;

const ACTOR: Actor = Actor(9);

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Receive 4 (20.00), pay 15, receive 6 (30.00): vendor ends up owed 35.
fn setup() -> (Connection, String) {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn.execute_batch(
        "INSERT INTO vendors(id, name) VALUES ('v1', 'Acme Supplies');
         INSERT INTO products(id, name) VALUES ('p1', 'Gauze pads');",
    )
    .unwrap();
    let input = PurchaseOrderInput {
        vendor_id: "v1".into(),
        order_date: date("2025-01-02"),
        notes: None,
        items: vec![PurchaseOrderItemInput {
            product_id: "p1".into(),
            quantity_ordered: 10,
            cost_price: Decimal::new(5, 0),
            selling_price: Decimal::new(9, 0),
            expires_at: None,
        }],
    };
    let po = create_purchase_order(&mut conn, ACTOR, &input).unwrap();
    let po = update_purchase_order(
        &mut conn,
        ACTOR,
        &po.id,
        &PurchaseOrderUpdate {
            order: input,
            status: OrderStatus::Ordered,
        },
    )
    .unwrap();
    let receive = |conn: &mut Connection, day: &str, qty: i64| {
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
    };
    receive(&mut conn, "2025-01-05", 4);
    create_vendor_payment(
        &mut conn,
        ACTOR,
        &VendorPaymentInput {
            vendor_id: "v1".into(),
            amount: Decimal::new(15, 0),
            payment_date: date("2025-01-06"),
            payment_method: PaymentMethod::Cheque,
            reference: Some("CHQ 000123".into()),
            notes: None,
        },
    )
    .unwrap();
    receive(&mut conn, "2025-01-07", 6);
    (conn, po.id)
}

#[test]
fn statement_runs_a_balance_in_date_order() {
    let (conn, _) = setup();
    let lines = vendor_statement(&conn, "v1").unwrap();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0].kind, EntryKind::Receipt);
    assert_eq!(lines[1].kind, EntryKind::Payment);
    assert_eq!(lines[1].reference.as_deref(), Some("CHQ 000123"));
    let balances: Vec<Decimal> = lines.iter().map(|l| l.balance).collect();
    assert_eq!(
        balances,
        vec![Decimal::new(20, 0), Decimal::new(5, 0), Decimal::new(35, 0)]
    );

    let err = vendor_statement(&conn, "ghost").unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[test]
fn export_statement_csv_via_cli() {
    let (conn, _) = setup();
    let dir = tempdir().unwrap();
    let out_path = dir.path().join("acme.csv");
    let out_str = out_path.to_string_lossy().to_string();

    let cli = cli::build_cli();
    let matches = cli.get_matches_from([
        "stockbook",
        "export",
        "statement",
        "--vendor",
        "v1",
        "--out",
        &out_str,
    ]);
    if let Some(("export", m)) = matches.subcommand() {
        exporter::handle(&conn, m).unwrap();
    } else {
        panic!("no export subcommand");
    }

    let mut rdr = csv::Reader::from_path(&out_path).unwrap();
    let headers = rdr.headers().unwrap().clone();
    assert_eq!(headers.get(1), Some("kind"));
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].get(1), Some("payment"));
    assert_eq!(rows[2].get(6).unwrap().parse::<Decimal>().unwrap(), Decimal::new(35, 0));
}

#[test]
fn export_statement_json_and_unknown_format() {
    let (conn, _) = setup();
    let dir = tempdir().unwrap();
    let lines = vendor_statement(&conn, "v1").unwrap();

    let json_path = dir.path().join("acme.json");
    write_statement(&lines, "json", &json_path).unwrap();
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 3);
    assert_eq!(parsed[0]["kind"], "receipt");
    assert_eq!(parsed[0]["date"], "2025-01-05");

    assert!(write_statement(&lines, "xml", &dir.path().join("acme.xml")).is_err());
}

#[test]
fn doctor_is_clean_after_engine_writes_and_flags_tampering() {
    let (conn, order_id) = setup();
    assert!(doctor::check(&conn).unwrap().is_empty());

    conn.execute("UPDATE vendors SET balance='1' WHERE id='v1'", [])
        .unwrap();
    conn.execute(
        "UPDATE purchase_orders SET status='partial', paid_amount='999' WHERE id=?1",
        [&order_id],
    )
    .unwrap();
    let issues: Vec<&str> = doctor::check(&conn)
        .unwrap()
        .into_iter()
        .map(|i| i.issue)
        .collect();
    assert!(issues.contains(&"balance_drift"));
    assert!(issues.contains(&"over_paid"));
    assert!(issues.contains(&"status_mismatch"));
}

#[test]
fn doctor_flags_received_or_partial_orders_with_nothing_received() {
    let (conn, _) = setup();
    conn.execute_batch(
        "INSERT INTO purchase_orders(id, vendor_id, order_number, order_date, status, total_amount)
         VALUES ('r0', 'v1', 'PO-R0', '2025-02-01', 'received', '25'),
                ('p0', 'v1', 'PO-P0', '2025-02-02', 'partial', '10');
         INSERT INTO purchase_order_items(id, purchase_order_id, product_id, quantity_ordered,
             quantity_received, cost_price, selling_price)
         VALUES ('r0-1', 'r0', 'p1', 5, 0, '5', '9'),
                ('p0-1', 'p0', 'p1', 2, 0, '5', '9');",
    )
    .unwrap();
    let flagged: Vec<String> = doctor::check(&conn)
        .unwrap()
        .into_iter()
        .filter(|i| i.issue == "status_mismatch")
        .map(|i| i.detail)
        .collect();
    assert_eq!(flagged.len(), 2, "{flagged:?}");
    assert!(flagged.iter().any(|d| d.starts_with("PO-R0 is received")));
    assert!(flagged.iter().any(|d| d.starts_with("PO-P0 is partial")));

    conn.execute(
        "UPDATE purchase_order_items SET quantity_received=2 WHERE id='p0-1'",
        [],
    )
    .unwrap();
    let flagged: Vec<String> = doctor::check(&conn)
        .unwrap()
        .into_iter()
        .filter(|i| i.issue == "status_mismatch")
        .map(|i| i.detail)
        .collect();
    assert_eq!(flagged.len(), 2, "{flagged:?}");
    assert!(flagged.iter().any(|d| d.starts_with("PO-P0 is partial but items say received")));
}

#[test]
fn payables_reflect_open_orders() {
    let (conn, _) = setup();
    let rows = reports::payables(&conn).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].balance, Decimal::new(35, 0));
    assert_eq!(rows[0].open_orders, 1);
    assert_eq!(rows[0].outstanding, Decimal::new(35, 0));

    let aging = reports::aging(&conn, date("2025-03-15")).unwrap();
    assert_eq!(aging[0].days_61_90, Decimal::new(35, 0));

    let matches = cli::build_cli().get_matches_from([
        "stockbook", "report", "aging", "--as-of", "2025-03-15", "--json",
    ]);
    if let Some(("report", m)) = matches.subcommand() {
        reports::handle(&conn, m).unwrap();
    } else {
        panic!("no report subcommand");
    }
}
