// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::vendors::get_vendor;
use crate::error::Result;
use crate::utils::decimal_at;
use anyhow::bail;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::Path;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("statement", sub)) => {
            let vendor_id = sub.get_one::<String>("vendor").unwrap().trim();
            let fmt = sub.get_one::<String>("format").unwrap().to_lowercase();
            let out = sub.get_one::<String>("out").unwrap();
            let lines = vendor_statement(conn, vendor_id)?;
            write_statement(&lines, &fmt, Path::new(out))?;
            println!("Exported {} statement lines to {}", lines.len(), out);
            Ok(())
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Receipt,
    Payment,
}

/// One movement on a vendor account. Receipts raise what is owed, payments
/// lower it; `balance` is the running total after this line.
#[derive(Debug, Clone, Serialize)]
pub struct StatementLine {
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub number: String,
    pub reference: Option<String>,
    pub charge: Decimal,
    pub payment: Decimal,
    pub balance: Decimal,
    #[serde(skip)]
    recorded_at: DateTime<Utc>,
}

pub fn vendor_statement(conn: &Connection, vendor_id: &str) -> Result<Vec<StatementLine>> {
    get_vendor(conn, vendor_id)?;
    let mut lines = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT r.received_date, r.receipt_number, o.order_number, r.total_amount, r.created_at
         FROM stock_receipts r
         JOIN purchase_orders o ON o.id = r.purchase_order_id
         WHERE o.vendor_id = ?1",
    )?;
    let receipts = stmt.query_map(params![vendor_id], |r| {
        Ok(StatementLine {
            date: r.get(0)?,
            kind: EntryKind::Receipt,
            number: r.get(1)?,
            reference: r.get(2)?,
            charge: decimal_at(r, 3)?,
            payment: Decimal::ZERO,
            balance: Decimal::ZERO,
            recorded_at: r.get(4)?,
        })
    })?;
    for line in receipts {
        lines.push(line?);
    }

    let mut stmt = conn.prepare(
        "SELECT payment_date, payment_number, reference, amount, created_at
         FROM vendor_payments WHERE vendor_id = ?1",
    )?;
    let payments = stmt.query_map(params![vendor_id], |r| {
        Ok(StatementLine {
            date: r.get(0)?,
            kind: EntryKind::Payment,
            number: r.get(1)?,
            reference: r.get(2)?,
            charge: Decimal::ZERO,
            payment: decimal_at(r, 3)?,
            balance: Decimal::ZERO,
            recorded_at: r.get(4)?,
        })
    })?;
    for line in payments {
        lines.push(line?);
    }

    lines.sort_by(|a, b| (a.date, a.recorded_at).cmp(&(b.date, b.recorded_at)));
    let mut running = Decimal::ZERO;
    for line in &mut lines {
        running += line.charge - line.payment;
        line.balance = running;
    }
    Ok(lines)
}

pub fn write_statement(lines: &[StatementLine], fmt: &str, out: &Path) -> anyhow::Result<()> {
    match fmt {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record(["date", "kind", "number", "reference", "charge", "payment", "balance"])?;
            for l in lines {
                let kind = match l.kind {
                    EntryKind::Receipt => "receipt",
                    EntryKind::Payment => "payment",
                };
                wtr.write_record([
                    l.date.to_string(),
                    kind.to_string(),
                    l.number.clone(),
                    l.reference.clone().unwrap_or_default(),
                    l.charge.to_string(),
                    l.payment.to_string(),
                    l.balance.to_string(),
                ])?;
            }
            wtr.flush()?;
        }
        "json" => {
            std::fs::write(out, serde_json::to_string_pretty(lines)?)?;
        }
        other => bail!("Unknown format: {} (use csv|json)", other),
    }
    Ok(())
}
