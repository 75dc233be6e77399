// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Stock receiving: turns ordered quantities into inventory batches.
//!
//! One receipt is one delivery. Every received line becomes a fresh batch
//! valued at the order's cost price; batches are never merged. The value of
//! the receipt is added to what the business owes the vendor.

use crate::commands::purchases::{find_purchase_order, record_quantity_received, record_status};
use crate::error::{ProcurementError, Result};
use crate::ledger;
use crate::models::{
    Actor, AuditFields, OrderStatus, PurchaseOrderItem, StockReceipt, StockReceiptItem,
};
use crate::utils::{
    decimal_at, fmt_money, generate_number, maybe_print_json, new_id, parse_date, pretty_table,
};
use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use validator::Validate;

pub fn handle(conn: &mut Connection, actor: Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("create", sub)) => {
            let items = sub
                .get_many::<String>("item")
                .map(|vals| vals.map(|v| parse_receipt_line(v)).collect::<anyhow::Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            let input = StockReceiptInput {
                purchase_order_id: sub.get_one::<String>("po").unwrap().trim().to_string(),
                received_date: parse_date(sub.get_one::<String>("date").unwrap())?,
                notes: sub
                    .get_one::<String>("notes")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                items,
            };
            let receipt = create_stock_receipt(conn, actor, &input)?;
            println!(
                "Received {} worth {} ({} batches)",
                receipt.receipt_number,
                fmt_money(&receipt.total_amount),
                receipt.items.len()
            );
        }
        Some(("show", sub)) => {
            let receipt = get_stock_receipt(conn, sub.get_one::<String>("id").unwrap().trim())?;
            println!("{}", serde_json::to_string_pretty(&receipt)?);
        }
        Some(("list", sub)) => {
            let receipts = match sub.get_one::<String>("po") {
                Some(po) => list_stock_receipts_for_order(conn, po.trim())?,
                None => list_stock_receipts(conn)?,
            };
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &receipts)? {
                let rows = receipts
                    .into_iter()
                    .map(|r| {
                        vec![
                            r.receipt_number,
                            r.received_date.to_string(),
                            r.purchase_order_id,
                            r.items.len().to_string(),
                            fmt_money(&r.total_amount),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Number", "Date", "Order", "Lines", "Total"], rows)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parses `ORDER_ITEM_ID:QTY`.
pub fn parse_receipt_line(spec: &str) -> anyhow::Result<StockReceiptItemInput> {
    let (item, qty) = spec
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid line '{}', expected ORDER_ITEM_ID:QTY", spec))?;
    Ok(StockReceiptItemInput {
        purchase_order_item_id: item.trim().to_string(),
        quantity_received: qty
            .trim()
            .parse()
            .with_context(|| format!("Invalid quantity '{}'", qty.trim()))?,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StockReceiptItemInput {
    #[validate(length(min = 1))]
    pub purchase_order_item_id: String,
    #[validate(range(min = 1))]
    pub quantity_received: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StockReceiptInput {
    #[validate(length(min = 1))]
    pub purchase_order_id: String,
    pub received_date: NaiveDate,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "receipt needs at least one line"))]
    pub items: Vec<StockReceiptItemInput>,
}

/// Received once every line is complete, partial once anything arrived,
/// otherwise unchanged. A linear scan, independent of item order.
pub fn derive_status(current: OrderStatus, items: &[PurchaseOrderItem]) -> OrderStatus {
    let all_received =
        !items.is_empty() && items.iter().all(|i| i.quantity_received >= i.quantity_ordered);
    let any_received = items.iter().any(|i| i.quantity_received > 0);
    if all_received {
        OrderStatus::Received
    } else if any_received {
        OrderStatus::Partial
    } else {
        current
    }
}

#[instrument(skip(conn, input), fields(order_id = %input.purchase_order_id))]
pub fn create_stock_receipt(
    conn: &mut Connection,
    actor: Actor,
    input: &StockReceiptInput,
) -> Result<StockReceipt> {
    input.validate()?;
    for line in &input.items {
        line.validate()?;
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let order = find_purchase_order(&tx, &input.purchase_order_id)?
        .ok_or_else(|| ProcurementError::not_found("purchase order", &input.purchase_order_id))?;
    if !order.status.is_receivable() {
        return Err(ProcurementError::NotReceivable(order.status));
    }

    // Working copy; repeated lines for one item accumulate against its remainder.
    let mut items = order.items.clone();
    let mut lines: Vec<(usize, i64)> = Vec::with_capacity(input.items.len());
    let mut total = Decimal::ZERO;
    for line in &input.items {
        let idx = items
            .iter()
            .position(|i| i.id == line.purchase_order_item_id)
            .ok_or_else(|| ProcurementError::ItemNotInOrder {
                item_id: line.purchase_order_item_id.clone(),
                order_id: order.id.clone(),
            })?;
        let item = &mut items[idx];
        let remaining = item.remaining();
        if line.quantity_received > remaining {
            return Err(ProcurementError::QuantityExceedsOrdered {
                item_id: item.id.clone(),
                requested: line.quantity_received,
                remaining,
            });
        }
        item.quantity_received += line.quantity_received;
        total = Decimal::from(line.quantity_received)
            .checked_mul(item.cost_price)
            .and_then(|value| total.checked_add(value))
            .ok_or_else(|| ProcurementError::Validation("receipt total is too large".into()))?;
        lines.push((idx, line.quantity_received));
    }

    let receipt_id = new_id();
    let receipt_number = generate_number("SR", input.received_date);
    let now = Utc::now();
    tx.execute(
        "INSERT INTO stock_receipts(id, purchase_order_id, receipt_number, received_date,
             total_amount, notes, created_at, updated_at, created_by, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?8)",
        params![
            receipt_id,
            order.id,
            receipt_number,
            input.received_date,
            total.to_string(),
            input.notes,
            now,
            actor.0
        ],
    )?;

    {
        let mut insert_batch = tx.prepare_cached(
            "INSERT INTO product_batches(id, product_id, cost_price, selling_price,
                 quantity_available, purchased_at, expires_at,
                 created_at, updated_at, created_by, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8, ?9, ?9)",
        )?;
        let mut insert_line = tx.prepare_cached(
            "INSERT INTO stock_receipt_items(id, stock_receipt_id, purchase_order_item_id,
                 product_batch_id, quantity_received,
                 created_at, updated_at, created_by, updated_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6, ?7, ?7)",
        )?;
        for &(idx, qty) in &lines {
            let item = &items[idx];
            let batch_id = new_id();
            insert_batch.execute(params![
                batch_id,
                item.product_id,
                item.cost_price.to_string(),
                item.selling_price.to_string(),
                qty,
                input.received_date,
                item.expires_at,
                now,
                actor.0
            ])?;
            insert_line.execute(params![new_id(), receipt_id, item.id, batch_id, qty, now, actor.0])?;
        }
    }

    for (before, after) in order.items.iter().zip(&items) {
        if after.quantity_received != before.quantity_received {
            record_quantity_received(&tx, &after.id, after.quantity_received, actor)?;
        }
    }

    let next = derive_status(order.status, &items);
    if next != order.status {
        if !order.status.can_transition_to(next) {
            return Err(ProcurementError::NotReceivable(order.status));
        }
        record_status(&tx, &order.id, next, actor)?;
    }

    let balance = ledger::increase_balance(&tx, &order.vendor_id, total, actor)?;
    tx.commit()?;

    info!(
        %receipt_number,
        order_id = %order.id,
        total = %total,
        from = %order.status,
        to = %next,
        vendor_balance = %balance,
        "stock received"
    );
    get_stock_receipt(conn, &receipt_id)
}

fn receipt_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StockReceipt> {
    Ok(StockReceipt {
        id: r.get(0)?,
        purchase_order_id: r.get(1)?,
        receipt_number: r.get(2)?,
        received_date: r.get(3)?,
        total_amount: decimal_at(r, 4)?,
        notes: r.get(5)?,
        audit: AuditFields::from_row(r, 6)?,
        items: Vec::new(),
    })
}

fn load_lines(conn: &Connection, receipt_id: &str) -> Result<Vec<StockReceiptItem>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, stock_receipt_id, purchase_order_item_id, product_batch_id, quantity_received,
                created_at, updated_at, created_by, updated_by
         FROM stock_receipt_items WHERE stock_receipt_id=?1 ORDER BY rowid",
    )?;
    let rows = stmt.query_map(params![receipt_id], |r| {
        Ok(StockReceiptItem {
            id: r.get(0)?,
            stock_receipt_id: r.get(1)?,
            purchase_order_item_id: r.get(2)?,
            product_batch_id: r.get(3)?,
            quantity_received: r.get(4)?,
            audit: AuditFields::from_row(r, 5)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn query_receipts(
    conn: &Connection,
    filter: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<StockReceipt>> {
    let sql = format!(
        "SELECT id, purchase_order_id, receipt_number, received_date, total_amount, notes,
                created_at, updated_at, created_by, updated_by
         FROM stock_receipts WHERE 1=1{} ORDER BY received_date DESC, rowid DESC",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut receipts = stmt
        .query_map(args, receipt_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for receipt in &mut receipts {
        receipt.items = load_lines(conn, &receipt.id)?;
    }
    Ok(receipts)
}

pub fn get_stock_receipt(conn: &Connection, id: &str) -> Result<StockReceipt> {
    query_receipts(conn, " AND id=?1", &[&id])?
        .pop()
        .ok_or_else(|| ProcurementError::not_found("stock receipt", id))
}

pub fn list_stock_receipts(conn: &Connection) -> Result<Vec<StockReceipt>> {
    query_receipts(conn, "", &[])
}

pub fn list_stock_receipts_for_order(conn: &Connection, order_id: &str) -> Result<Vec<StockReceipt>> {
    query_receipts(conn, " AND purchase_order_id=?1", &[&order_id])
}
