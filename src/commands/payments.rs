// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Vendor payments and their first-in-first-out allocation to open orders.

use crate::commands::purchases::{open_orders_fifo, record_payment};
use crate::commands::vendors::find_vendor;
use crate::error::{ProcurementError, Result};
use crate::ledger;
use crate::models::{Actor, AuditFields, PaymentMethod, PaymentStatus, VendorPayment};
use crate::utils::{
    decimal_at, fmt_money, generate_number, maybe_print_json, new_id, parse_date, parse_decimal,
    positive, pretty_table,
};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use validator::Validate;

pub fn handle(conn: &mut Connection, actor: Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("create", sub)) => {
            let opt = |key: &str| {
                sub.get_one::<String>(key)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            };
            let input = VendorPaymentInput {
                vendor_id: sub.get_one::<String>("vendor").unwrap().trim().to_string(),
                amount: parse_decimal(sub.get_one::<String>("amount").unwrap())?,
                payment_date: parse_date(sub.get_one::<String>("date").unwrap())?,
                payment_method: sub.get_one::<String>("method").unwrap().parse()?,
                reference: opt("reference"),
                notes: opt("notes"),
            };
            let outcome = create_vendor_payment(conn, actor, &input)?;
            if !maybe_print_json(sub.get_flag("json"), false, &outcome)? {
                println!(
                    "Recorded {} for {}",
                    outcome.payment.payment_number,
                    fmt_money(&outcome.payment.amount)
                );
                for a in &outcome.allocations {
                    println!(
                        "  {} <- {} ({})",
                        a.order_number,
                        fmt_money(&a.amount),
                        a.payment_status
                    );
                }
                if outcome.unapplied > Decimal::ZERO {
                    println!("  unapplied: {}", fmt_money(&outcome.unapplied));
                }
            }
        }
        Some(("show", sub)) => {
            let payment = get_vendor_payment(conn, sub.get_one::<String>("id").unwrap().trim())?;
            println!("{}", serde_json::to_string_pretty(&payment)?);
        }
        Some(("list", sub)) => {
            let payments = match sub.get_one::<String>("vendor") {
                Some(v) => list_vendor_payments_for_vendor(conn, v.trim())?,
                None => list_vendor_payments(conn)?,
            };
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &payments)? {
                let rows = payments
                    .into_iter()
                    .map(|p| {
                        vec![
                            p.payment_number,
                            p.payment_date.to_string(),
                            p.vendor_id,
                            p.payment_method.to_string(),
                            fmt_money(&p.amount),
                            p.reference.unwrap_or_default(),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(
                        &["Number", "Date", "Vendor", "Method", "Amount", "Reference"],
                        rows
                    )
                );
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VendorPaymentInput {
    #[validate(length(min = 1))]
    pub vendor_id: String,
    #[validate(custom = "positive")]
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 255))]
    pub reference: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// The share of one payment credited to one order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentAllocation {
    pub purchase_order_id: String,
    pub order_number: String,
    pub amount: Decimal,
    pub paid_amount: Decimal,
    pub payment_status: PaymentStatus,
}

/// A recorded payment plus where it went. `unapplied` is the part of the
/// amount that no open order could absorb; the vendor was still debited
/// for the full amount.
#[derive(Debug, Clone, Serialize)]
pub struct AllocatedPayment {
    pub payment: VendorPayment,
    pub allocations: Vec<PaymentAllocation>,
    pub unapplied: Decimal,
}

#[instrument(skip(conn, input), fields(vendor_id = %input.vendor_id, amount = %input.amount))]
pub fn create_vendor_payment(
    conn: &mut Connection,
    actor: Actor,
    input: &VendorPaymentInput,
) -> Result<AllocatedPayment> {
    input.validate()?;

    // Balance checks and the debit share one write transaction.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let vendor = find_vendor(&tx, &input.vendor_id)?
        .ok_or_else(|| ProcurementError::VendorNotFound(input.vendor_id.clone()))?;
    if vendor.balance <= Decimal::ZERO {
        return Err(ProcurementError::InsufficientBalance {
            vendor_id: vendor.id,
        });
    }
    if input.amount > vendor.balance {
        return Err(ProcurementError::PaymentExceedsBalance {
            amount: input.amount,
            balance: vendor.balance,
        });
    }

    let id = new_id();
    let payment_number = generate_number("VP", input.payment_date);
    let now = Utc::now();
    tx.execute(
        "INSERT INTO vendor_payments(id, vendor_id, payment_number, amount, payment_date,
             payment_method, reference, notes, created_at, updated_at, created_by, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9, ?10, ?10)",
        params![
            id,
            vendor.id,
            payment_number,
            input.amount.to_string(),
            input.payment_date,
            input.payment_method,
            input.reference,
            input.notes,
            now,
            actor.0
        ],
    )?;
    let balance = ledger::decrease_balance(&tx, &vendor.id, input.amount, actor)?;

    let mut remaining = input.amount;
    let mut allocations = Vec::new();
    for order in open_orders_fifo(&tx, &vendor.id)? {
        if remaining <= Decimal::ZERO {
            break;
        }
        let outstanding = order.outstanding();
        if outstanding <= Decimal::ZERO {
            continue;
        }
        let applied = remaining.min(outstanding);
        let paid_amount = order.paid_amount + applied;
        let payment_status = if paid_amount >= order.total_amount {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
        record_payment(&tx, &order.id, paid_amount, payment_status, now, actor)?;
        remaining -= applied;
        debug!(order = %order.order_number, %applied, %paid_amount, status = %payment_status, "allocated");
        allocations.push(PaymentAllocation {
            purchase_order_id: order.id,
            order_number: order.order_number,
            amount: applied,
            paid_amount,
            payment_status,
        });
    }
    tx.commit()?;

    if remaining > Decimal::ZERO {
        warn!(%payment_number, unapplied = %remaining, "payment exceeds open order totals");
    }
    info!(
        %payment_number,
        orders = allocations.len(),
        vendor_balance = %balance,
        "vendor payment recorded"
    );
    Ok(AllocatedPayment {
        payment: get_vendor_payment(conn, &id)?,
        allocations,
        unapplied: remaining,
    })
}

const PAYMENT_COLUMNS: &str = "id, vendor_id, payment_number, amount, payment_date, payment_method, \
     reference, notes, created_at, updated_at, created_by, updated_by";

fn payment_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<VendorPayment> {
    Ok(VendorPayment {
        id: r.get(0)?,
        vendor_id: r.get(1)?,
        payment_number: r.get(2)?,
        amount: decimal_at(r, 3)?,
        payment_date: r.get(4)?,
        payment_method: r.get(5)?,
        reference: r.get(6)?,
        notes: r.get(7)?,
        audit: AuditFields::from_row(r, 8)?,
    })
}

pub fn get_vendor_payment(conn: &Connection, id: &str) -> Result<VendorPayment> {
    let sql = format!("SELECT {} FROM vendor_payments WHERE id=?1", PAYMENT_COLUMNS);
    conn.query_row(&sql, params![id], payment_from_row)
        .optional()?
        .ok_or_else(|| ProcurementError::not_found("vendor payment", id))
}

pub fn list_vendor_payments(conn: &Connection) -> Result<Vec<VendorPayment>> {
    let sql = format!(
        "SELECT {} FROM vendor_payments ORDER BY payment_date DESC, rowid DESC",
        PAYMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], payment_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn list_vendor_payments_for_vendor(
    conn: &Connection,
    vendor_id: &str,
) -> Result<Vec<VendorPayment>> {
    let sql = format!(
        "SELECT {} FROM vendor_payments WHERE vendor_id=?1
         ORDER BY payment_date DESC, rowid DESC",
        PAYMENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![vendor_id], payment_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
