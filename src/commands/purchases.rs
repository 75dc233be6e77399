// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Purchase orders and their draft -> ordered -> partial -> received life cycle.
//!
//! Orders are freely editable (items fully replaced) while in draft. Once
//! ordered, only receiving advances item quantities and status, and only
//! payments touch the paid amount.

use crate::error::{ProcurementError, Result};
use crate::models::{
    Actor, AuditFields, OrderStatus, PaymentStatus, PurchaseOrder, PurchaseOrderItem,
};
use crate::utils::{
    decimal_at, fmt_money, generate_number, maybe_print_json, new_id, non_negative, parse_date,
    parse_decimal, pretty_table,
};
use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

pub fn handle(conn: &mut Connection, actor: Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("create", sub)) => {
            let input = order_args(sub)?;
            let order = create_purchase_order(conn, actor, &input)?;
            println!(
                "Created {} for {} ({} items)",
                order.order_number,
                fmt_money(&order.total_amount),
                order.items.len()
            );
        }
        Some(("update", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            let status = sub
                .get_one::<String>("status")
                .map(|s| s.parse::<OrderStatus>())
                .transpose()?
                .unwrap_or(OrderStatus::Draft);
            let update = PurchaseOrderUpdate {
                order: order_args(sub)?,
                status,
            };
            let order = update_purchase_order(conn, actor, id, &update)?;
            println!(
                "Updated {} ({}, {})",
                order.order_number,
                order.status,
                fmt_money(&order.total_amount)
            );
        }
        Some(("cancel", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            cancel_purchase_order(conn, actor, id)?;
            println!("Cancelled purchase order {}", id);
        }
        Some(("show", sub)) => {
            let order = get_purchase_order(conn, sub.get_one::<String>("id").unwrap().trim())?;
            if !maybe_print_json(sub.get_flag("json"), false, &order)? {
                print_order(&order);
            }
        }
        Some(("list", sub)) => {
            let orders = match sub.get_one::<String>("vendor") {
                Some(v) => list_purchase_orders_for_vendor(conn, v.trim())?,
                None => list_purchase_orders(conn)?,
            };
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &orders)? {
                let rows = orders
                    .into_iter()
                    .map(|o| {
                        vec![
                            o.order_number.clone(),
                            o.order_date.to_string(),
                            o.status.to_string(),
                            fmt_money(&o.total_amount),
                            fmt_money(&o.paid_amount),
                            o.payment_status.to_string(),
                            o.id,
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["Number", "Date", "Status", "Total", "Paid", "Payment", "ID"],
                        rows
                    )
                );
            }
        }
        _ => {}
    }
    Ok(())
}

fn print_order(order: &PurchaseOrder) {
    println!(
        "{} | {} | vendor {} | {} | total {} | paid {} ({})",
        order.order_number,
        order.order_date,
        order.vendor_id,
        order.status,
        fmt_money(&order.total_amount),
        fmt_money(&order.paid_amount),
        order.payment_status
    );
    let rows = order
        .items
        .iter()
        .map(|i| {
            vec![
                i.id.clone(),
                i.product_id.clone(),
                i.quantity_ordered.to_string(),
                i.quantity_received.to_string(),
                fmt_money(&i.cost_price),
                fmt_money(&i.selling_price),
                fmt_money(&i.line_total()),
                i.expires_at.map(|d| d.to_string()).unwrap_or_default(),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(
            &["Item", "Product", "Ordered", "Received", "Cost", "Sell", "Line", "Expires"],
            rows
        )
    );
}

fn order_args(sub: &clap::ArgMatches) -> anyhow::Result<PurchaseOrderInput> {
    let items = sub
        .get_many::<String>("item")
        .map(|vals| vals.map(|v| parse_item_spec(v)).collect::<anyhow::Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    Ok(PurchaseOrderInput {
        vendor_id: sub.get_one::<String>("vendor").unwrap().trim().to_string(),
        order_date: parse_date(sub.get_one::<String>("date").unwrap())?,
        notes: sub
            .get_one::<String>("notes")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        items,
    })
}

/// Parses `PRODUCT:QTY:COST:SELL[:EXPIRY]`.
pub fn parse_item_spec(spec: &str) -> anyhow::Result<PurchaseOrderItemInput> {
    let parts: Vec<&str> = spec.split(':').map(str::trim).collect();
    if !(4..=5).contains(&parts.len()) {
        return Err(anyhow!(
            "Invalid item '{}', expected PRODUCT:QTY:COST:SELL[:EXPIRY]",
            spec
        ));
    }
    let quantity_ordered = parts[1]
        .parse::<i64>()
        .with_context(|| format!("Invalid quantity '{}'", parts[1]))?;
    Ok(PurchaseOrderItemInput {
        product_id: parts[0].to_string(),
        quantity_ordered,
        cost_price: parse_decimal(parts[2])?,
        selling_price: parse_decimal(parts[3])?,
        expires_at: parts.get(4).map(|d| parse_date(d)).transpose()?,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PurchaseOrderItemInput {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity_ordered: i64,
    #[validate(custom = "non_negative")]
    pub cost_price: Decimal,
    #[validate(custom = "non_negative")]
    pub selling_price: Decimal,
    pub expires_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PurchaseOrderInput {
    #[validate(length(min = 1))]
    pub vendor_id: String,
    pub order_date: NaiveDate,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "purchase order needs at least one item"))]
    pub items: Vec<PurchaseOrderItemInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseOrderUpdate {
    #[serde(flatten)]
    pub order: PurchaseOrderInput,
    pub status: OrderStatus,
}

fn validate_order(input: &PurchaseOrderInput) -> Result<()> {
    input.validate()?;
    for item in &input.items {
        item.validate()?;
    }
    Ok(())
}

fn order_total(items: &[PurchaseOrderItemInput]) -> Result<Decimal> {
    items.iter().try_fold(Decimal::ZERO, |total, i| {
        Decimal::from(i.quantity_ordered)
            .checked_mul(i.cost_price)
            .and_then(|line| total.checked_add(line))
            .ok_or_else(|| ProcurementError::Validation("order total is too large".into()))
    })
}

fn ensure_references(conn: &Connection, input: &PurchaseOrderInput) -> Result<()> {
    let exists = |sql: &str, id: &str| -> Result<bool> {
        Ok(conn
            .query_row(sql, params![id], |_| Ok(()))
            .optional()?
            .is_some())
    };
    if !exists("SELECT 1 FROM vendors WHERE id=?1", &input.vendor_id)? {
        return Err(ProcurementError::not_found("vendor", &input.vendor_id));
    }
    for item in &input.items {
        if !exists("SELECT 1 FROM products WHERE id=?1", &item.product_id)? {
            return Err(ProcurementError::not_found("product", &item.product_id));
        }
    }
    Ok(())
}

fn insert_items(
    conn: &Connection,
    order_id: &str,
    items: &[PurchaseOrderItemInput],
    actor: Actor,
    now: DateTime<Utc>,
) -> Result<()> {
    let mut insert = conn.prepare_cached(
        "INSERT INTO purchase_order_items(id, purchase_order_id, product_id, quantity_ordered,
             quantity_received, cost_price, selling_price, expires_at,
             created_at, updated_at, created_by, updated_by)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8, ?8, ?9, ?9)",
    )?;
    for item in items {
        insert.execute(params![
            new_id(),
            order_id,
            item.product_id,
            item.quantity_ordered,
            item.cost_price.to_string(),
            item.selling_price.to_string(),
            item.expires_at,
            now,
            actor.0
        ])?;
    }
    Ok(())
}

#[instrument(skip(conn, input), fields(vendor_id = %input.vendor_id))]
pub fn create_purchase_order(
    conn: &mut Connection,
    actor: Actor,
    input: &PurchaseOrderInput,
) -> Result<PurchaseOrder> {
    validate_order(input)?;

    let id = new_id();
    let order_number = generate_number("PO", input.order_date);
    let total = order_total(&input.items)?;
    let now = Utc::now();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    ensure_references(&tx, input)?;
    tx.execute(
        "INSERT INTO purchase_orders(id, vendor_id, order_number, order_date, status, total_amount,
             paid_amount, payment_status, last_payment_at, notes,
             created_at, updated_at, created_by, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, '0', ?7, NULL, ?8, ?9, ?9, ?10, ?10)",
        params![
            id,
            input.vendor_id,
            order_number,
            input.order_date,
            OrderStatus::Draft,
            total.to_string(),
            PaymentStatus::Unpaid,
            input.notes,
            now,
            actor.0
        ],
    )?;
    insert_items(&tx, &id, &input.items, actor, now)?;
    tx.commit()?;

    info!(order_id = %id, %order_number, total = %total, "purchase order created");
    get_purchase_order(conn, &id)
}

/// Only draft orders may be edited; the call may also move the order to
/// ordered or cancelled.
#[instrument(skip(conn, update), fields(status = %update.status))]
pub fn update_purchase_order(
    conn: &mut Connection,
    actor: Actor,
    order_id: &str,
    update: &PurchaseOrderUpdate,
) -> Result<PurchaseOrder> {
    validate_order(&update.order)?;
    if !matches!(
        update.status,
        OrderStatus::Draft | OrderStatus::Ordered | OrderStatus::Cancelled
    ) {
        return Err(ProcurementError::Validation(format!(
            "status must be one of draft, ordered, cancelled (got {})",
            update.status
        )));
    }

    let input = &update.order;
    let total = order_total(&input.items)?;
    let now = Utc::now();

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let current = order_status(&tx, order_id)?;
    if current != OrderStatus::Draft {
        return Err(ProcurementError::NonDraftUpdate(current));
    }
    ensure_references(&tx, input)?;

    tx.execute(
        "DELETE FROM purchase_order_items WHERE purchase_order_id=?1",
        params![order_id],
    )?;
    tx.execute(
        "UPDATE purchase_orders
         SET vendor_id=?1, order_date=?2, status=?3, total_amount=?4, notes=?5,
             updated_at=?6, updated_by=?7
         WHERE id=?8 AND status='draft'",
        params![
            input.vendor_id,
            input.order_date,
            update.status,
            total.to_string(),
            input.notes,
            now,
            actor.0,
            order_id
        ],
    )?;
    insert_items(&tx, order_id, &input.items, actor, now)?;
    tx.commit()?;

    info!(order_id, from = %current, to = %update.status, total = %total, "purchase order updated");
    get_purchase_order(conn, order_id)
}

/// Soft cancel: the row is kept with status `cancelled`.
pub fn cancel_purchase_order(conn: &Connection, actor: Actor, order_id: &str) -> Result<()> {
    let current = order_status(conn, order_id)?;
    if current != OrderStatus::Draft {
        return Err(ProcurementError::NonDraftCancel(current));
    }
    let changed = conn.execute(
        "UPDATE purchase_orders SET status='cancelled', updated_at=?1, updated_by=?2
         WHERE id=?3 AND status='draft'",
        params![Utc::now(), actor.0, order_id],
    )?;
    if changed == 0 {
        // lost a race with an update that moved it out of draft
        return Err(ProcurementError::NonDraftCancel(order_status(conn, order_id)?));
    }
    info!(order_id, "purchase order cancelled");
    Ok(())
}

pub(crate) fn order_status(conn: &Connection, order_id: &str) -> Result<OrderStatus> {
    conn.query_row(
        "SELECT status FROM purchase_orders WHERE id=?1",
        params![order_id],
        |r| r.get(0),
    )
    .optional()?
    .ok_or_else(|| ProcurementError::not_found("purchase order", order_id))
}

const ORDER_COLUMNS: &str = "o.id, o.vendor_id, o.order_number, o.order_date, o.status, o.total_amount, \
     o.paid_amount, o.payment_status, o.last_payment_at, o.notes, \
     o.created_at, o.updated_at, o.created_by, o.updated_by";

fn order_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseOrder> {
    Ok(PurchaseOrder {
        id: r.get(0)?,
        vendor_id: r.get(1)?,
        order_number: r.get(2)?,
        order_date: r.get(3)?,
        status: r.get(4)?,
        total_amount: decimal_at(r, 5)?,
        paid_amount: decimal_at(r, 6)?,
        payment_status: r.get(7)?,
        last_payment_at: r.get(8)?,
        notes: r.get(9)?,
        audit: AuditFields::from_row(r, 10)?,
        items: Vec::new(),
    })
}

fn item_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseOrderItem> {
    Ok(PurchaseOrderItem {
        id: r.get(0)?,
        purchase_order_id: r.get(1)?,
        product_id: r.get(2)?,
        quantity_ordered: r.get(3)?,
        quantity_received: r.get(4)?,
        cost_price: decimal_at(r, 5)?,
        selling_price: decimal_at(r, 6)?,
        expires_at: r.get(7)?,
        audit: AuditFields::from_row(r, 8)?,
    })
}

pub(crate) fn load_items(conn: &Connection, order_id: &str) -> Result<Vec<PurchaseOrderItem>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, purchase_order_id, product_id, quantity_ordered, quantity_received,
                cost_price, selling_price, expires_at,
                created_at, updated_at, created_by, updated_by
         FROM purchase_order_items WHERE purchase_order_id=?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![order_id], item_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn query_orders(
    conn: &Connection,
    filter: &str,
    order_by: &str,
    args: &[&dyn rusqlite::ToSql],
    with_items: bool,
) -> Result<Vec<PurchaseOrder>> {
    let sql = format!(
        "SELECT {} FROM purchase_orders o WHERE 1=1{} ORDER BY {}",
        ORDER_COLUMNS, filter, order_by
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut orders = stmt
        .query_map(args, order_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    if with_items {
        for order in &mut orders {
            order.items = load_items(conn, &order.id)?;
        }
    }
    Ok(orders)
}

pub fn find_purchase_order(conn: &Connection, id: &str) -> Result<Option<PurchaseOrder>> {
    let mut orders = query_orders(conn, " AND o.id=?1", "o.id", &[&id], true)?;
    Ok(orders.pop())
}

pub fn get_purchase_order(conn: &Connection, id: &str) -> Result<PurchaseOrder> {
    find_purchase_order(conn, id)?.ok_or_else(|| ProcurementError::not_found("purchase order", id))
}

pub fn list_purchase_orders(conn: &Connection) -> Result<Vec<PurchaseOrder>> {
    query_orders(conn, "", "o.order_date DESC, o.rowid DESC", &[], true)
}

pub fn list_purchase_orders_for_vendor(
    conn: &Connection,
    vendor_id: &str,
) -> Result<Vec<PurchaseOrder>> {
    query_orders(
        conn,
        " AND o.vendor_id=?1",
        "o.order_date DESC, o.rowid DESC",
        &[&vendor_id],
        true,
    )
}

/// Orders still owing money, oldest first (ties broken by creation order).
pub(crate) fn open_orders_fifo(conn: &Connection, vendor_id: &str) -> Result<Vec<PurchaseOrder>> {
    query_orders(
        conn,
        " AND o.vendor_id=?1 AND o.payment_status != 'paid' AND o.status != 'cancelled'",
        "o.order_date ASC, o.rowid ASC",
        &[&vendor_id],
        false,
    )
}

pub(crate) fn record_payment(
    conn: &Connection,
    order_id: &str,
    paid_amount: Decimal,
    payment_status: PaymentStatus,
    at: DateTime<Utc>,
    actor: Actor,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE purchase_orders
         SET paid_amount=?1, payment_status=?2, last_payment_at=?3, updated_at=?3, updated_by=?4
         WHERE id=?5",
        params![paid_amount.to_string(), payment_status, at, actor.0, order_id],
    )?;
    if changed == 0 {
        return Err(ProcurementError::not_found("purchase order", order_id));
    }
    Ok(())
}

pub(crate) fn record_quantity_received(
    conn: &Connection,
    item_id: &str,
    quantity_received: i64,
    actor: Actor,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE purchase_order_items SET quantity_received=?1, updated_at=?2, updated_by=?3
         WHERE id=?4",
        params![quantity_received, Utc::now(), actor.0, item_id],
    )?;
    if changed == 0 {
        return Err(ProcurementError::not_found("purchase order item", item_id));
    }
    Ok(())
}

pub(crate) fn record_status(
    conn: &Connection,
    order_id: &str,
    status: OrderStatus,
    actor: Actor,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE purchase_orders SET status=?1, updated_at=?2, updated_by=?3 WHERE id=?4",
        params![status, Utc::now(), actor.0, order_id],
    )?;
    if changed == 0 {
        return Err(ProcurementError::not_found("purchase order", order_id));
    }
    Ok(())
}
