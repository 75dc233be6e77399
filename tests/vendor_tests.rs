// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::Connection;
use rust_decimal::Decimal;
use stockbook::commands::products::{
    NewProduct, create_product, deactivate_product, get_product, list_products,
};
use stockbook::commands::vendors::{
    self, NewVendor, create_vendor, deactivate_vendor, get_vendor, list_vendors, update_vendor,
};
use stockbook::error::{ErrorKind, ProcurementError};
use stockbook::models::Actor;
use stockbook::{cli, db};

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    conn
}

fn vendor(name: &str) -> NewVendor {
    NewVendor {
        name: name.into(),
        phone: Some("+91 98765 43210".into()),
        email: Some("orders@example.com".into()),
        ..Default::default()
    }
}

#[test]
fn vendor_lifecycle_with_soft_delete() {
    let conn = setup();
    let acme = create_vendor(&conn, Actor(2), &vendor("Acme")).unwrap();
    create_vendor(&conn, Actor(2), &vendor("Beta")).unwrap();
    assert_eq!(acme.balance, Decimal::ZERO);
    assert!(acme.active);

    deactivate_vendor(&conn, Actor(4), &acme.id).unwrap();
    let active: Vec<_> = list_vendors(&conn, false)
        .unwrap()
        .into_iter()
        .map(|v| v.name)
        .collect();
    assert_eq!(active, vec!["Beta".to_string()]);
    assert_eq!(list_vendors(&conn, true).unwrap().len(), 2);

    let gone = get_vendor(&conn, &acme.id).unwrap();
    assert!(!gone.active);
    assert_eq!(gone.audit.updated_by, 4);
    assert_eq!(gone.audit.created_by, 2);

    let err = deactivate_vendor(&conn, Actor(4), "missing").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn update_never_touches_balance() {
    let conn = setup();
    let v = create_vendor(&conn, Actor(1), &vendor("Acme")).unwrap();
    conn.execute("UPDATE vendors SET balance='42.50' WHERE id=?1", [&v.id])
        .unwrap();
    let mut changes = vendor("Acme Pharma");
    changes.address = Some("12 MG Road".into());
    let v = update_vendor(&conn, Actor(1), &v.id, &changes).unwrap();
    assert_eq!(v.name, "Acme Pharma");
    assert_eq!(v.address.as_deref(), Some("12 MG Road"));
    assert_eq!(v.balance, Decimal::new(4250, 2));
}

#[test]
fn vendor_validation() {
    let conn = setup();
    create_vendor(&conn, Actor(1), &vendor("Acme")).unwrap();

    let err = create_vendor(&conn, Actor(1), &vendor("Acme")).unwrap_err();
    assert!(matches!(err, ProcurementError::Validation(_)));

    let mut bad = vendor("Gamma");
    bad.email = Some("not-an-email".into());
    assert_eq!(
        create_vendor(&conn, Actor(1), &bad).unwrap_err().kind(),
        ErrorKind::Validation
    );

    let mut bad = vendor("Gamma");
    bad.phone = Some("1".repeat(21));
    assert!(create_vendor(&conn, Actor(1), &bad).is_err());

    assert!(create_vendor(&conn, Actor(1), &vendor("")).is_err());
}

#[test]
fn products_follow_the_same_active_filter() {
    let conn = setup();
    let p = create_product(
        &conn,
        Actor(1),
        &NewProduct {
            name: "Amoxicillin 250mg".into(),
            description: None,
        },
    )
    .unwrap();
    create_product(
        &conn,
        Actor(1),
        &NewProduct {
            name: "Bandage roll".into(),
            description: Some("5cm x 4m".into()),
        },
    )
    .unwrap();
    deactivate_product(&conn, Actor(1), &p.id).unwrap();
    assert_eq!(list_products(&conn, false).unwrap().len(), 1);
    assert_eq!(list_products(&conn, true).unwrap().len(), 2);
    assert!(!get_product(&conn, &p.id).unwrap().active);
}

#[test]
fn cli_vendor_add_trims_and_drops_blanks() {
    let conn = setup();
    let cli = cli::build_cli();
    let matches = cli.get_matches_from([
        "stockbook",
        "vendor",
        "add",
        "--name",
        "  Delta Distributors  ",
        "--contact",
        "   ",
        "--email",
        " sales@delta.example ",
    ]);
    if let Some(("vendor", m)) = matches.subcommand() {
        vendors::handle(&conn, Actor(1), m).unwrap();
    } else {
        panic!("vendor command not parsed");
    }
    let all = list_vendors(&conn, false).unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].name, "Delta Distributors");
    assert_eq!(all[0].contact_person, None);
    assert_eq!(all[0].email.as_deref(), Some("sales@delta.example"));
}
