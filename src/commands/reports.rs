// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::vendors::list_vendors;
use crate::error::Result;
use crate::models::PaymentStatus;
use crate::utils::{decimal_at, fmt_money, maybe_print_json, parse_date, pretty_table};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("payables", sub)) => {
            let data = payables(conn)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .into_iter()
                    .map(|r| {
                        vec![
                            r.vendor_name,
                            fmt_money(&r.balance),
                            r.open_orders.to_string(),
                            fmt_money(&r.outstanding),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Vendor", "Balance", "Open orders", "Outstanding"], rows)
                );
            }
        }
        Some(("aging", sub)) => {
            let as_of = match sub.get_one::<String>("as-of") {
                Some(d) => parse_date(d)?,
                None => Utc::now().date_naive(),
            };
            let data = aging(conn, as_of)?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
                let rows = data
                    .into_iter()
                    .map(|r| {
                        vec![
                            r.vendor_name,
                            fmt_money(&r.current),
                            fmt_money(&r.days_31_60),
                            fmt_money(&r.days_61_90),
                            fmt_money(&r.over_90),
                            fmt_money(&r.total),
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["Vendor", "0-30", "31-60", "61-90", "90+", "Total"], rows)
                );
            }
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct PayableRow {
    pub vendor_id: String,
    pub vendor_name: String,
    pub balance: Decimal,
    pub open_orders: usize,
    pub outstanding: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AgingRow {
    pub vendor_id: String,
    pub vendor_name: String,
    pub current: Decimal,
    pub days_31_60: Decimal,
    pub days_61_90: Decimal,
    pub over_90: Decimal,
    pub total: Decimal,
}

struct OpenOrder {
    vendor_id: String,
    order_date: NaiveDate,
    outstanding: Decimal,
}

/// Orders that still owe money: not fully paid, not cancelled.
fn open_orders(conn: &Connection) -> Result<Vec<OpenOrder>> {
    let mut stmt = conn.prepare(
        "SELECT vendor_id, order_date, total_amount, paid_amount, payment_status
         FROM purchase_orders
         WHERE status != 'cancelled'
         ORDER BY order_date, rowid",
    )?;
    let rows = stmt.query_map([], |r| {
        let total = decimal_at(r, 2)?;
        let paid = decimal_at(r, 3)?;
        let status: PaymentStatus = r.get(4)?;
        Ok((r.get::<_, String>(0)?, r.get::<_, NaiveDate>(1)?, total - paid, status))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (vendor_id, order_date, outstanding, status) = row?;
        if status != PaymentStatus::Paid && outstanding > Decimal::ZERO {
            out.push(OpenOrder {
                vendor_id,
                order_date,
                outstanding,
            });
        }
    }
    Ok(out)
}

/// One row per active vendor, alphabetical.
pub fn payables(conn: &Connection) -> Result<Vec<PayableRow>> {
    let mut per_vendor: HashMap<String, (usize, Decimal)> = HashMap::new();
    for o in open_orders(conn)? {
        let entry = per_vendor.entry(o.vendor_id).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += o.outstanding;
    }
    Ok(list_vendors(conn, false)?
        .into_iter()
        .map(|v| {
            let (open_orders, outstanding) =
                per_vendor.remove(&v.id).unwrap_or((0, Decimal::ZERO));
            PayableRow {
                vendor_id: v.id,
                vendor_name: v.name,
                balance: v.balance,
                open_orders,
                outstanding,
            }
        })
        .collect())
}

/// Outstanding amounts bucketed by order age in days as of `as_of`.
/// Vendors with nothing outstanding are left out.
pub fn aging(conn: &Connection, as_of: NaiveDate) -> Result<Vec<AgingRow>> {
    let mut per_vendor: HashMap<String, AgingRow> = HashMap::new();
    for o in open_orders(conn)? {
        let row = per_vendor.entry(o.vendor_id.clone()).or_default();
        let age = (as_of - o.order_date).num_days();
        let bucket = match age {
            i64::MIN..=30 => &mut row.current,
            31..=60 => &mut row.days_31_60,
            61..=90 => &mut row.days_61_90,
            _ => &mut row.over_90,
        };
        *bucket += o.outstanding;
        row.total += o.outstanding;
    }
    let mut out = Vec::new();
    for v in list_vendors(conn, true)? {
        if let Some(mut row) = per_vendor.remove(&v.id) {
            row.vendor_id = v.id;
            row.vendor_name = v.name;
            out.push(row);
        }
    }
    Ok(out)
}
