// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::Result;
use crate::models::{AuditFields, ProductBatch};
use crate::utils::{decimal_at, fmt_money, maybe_print_json, pretty_table};
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> anyhow::Result<()> {
    if let Some(("list", sub)) = m.subcommand() {
        let batches = match sub.get_one::<String>("product") {
            Some(p) => list_batches_for_product(conn, p.trim())?,
            None => list_batches(conn)?,
        };
        if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &batches)? {
            let rows = batches
                .into_iter()
                .map(|b| {
                    vec![
                        b.id,
                        b.product_id,
                        b.quantity_available.to_string(),
                        fmt_money(&b.cost_price),
                        fmt_money(&b.selling_price),
                        b.purchased_at.to_string(),
                        b.expires_at.map(|d| d.to_string()).unwrap_or_default(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(
                    &["Batch", "Product", "Qty", "Cost", "Sell", "Purchased", "Expires"],
                    rows
                )
            );
        }
    }
    Ok(())
}

const BATCH_COLUMNS: &str = "id, product_id, cost_price, selling_price, quantity_available, \
     purchased_at, expires_at, created_at, updated_at, created_by, updated_by";

fn batch_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ProductBatch> {
    Ok(ProductBatch {
        id: r.get(0)?,
        product_id: r.get(1)?,
        cost_price: decimal_at(r, 2)?,
        selling_price: decimal_at(r, 3)?,
        quantity_available: r.get(4)?,
        purchased_at: r.get(5)?,
        expires_at: r.get(6)?,
        audit: AuditFields::from_row(r, 7)?,
    })
}

pub fn list_batches(conn: &Connection) -> Result<Vec<ProductBatch>> {
    let sql = format!(
        "SELECT {} FROM product_batches ORDER BY purchased_at, rowid",
        BATCH_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], batch_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Oldest batch first, the order stock would be consumed in.
pub fn list_batches_for_product(conn: &Connection, product_id: &str) -> Result<Vec<ProductBatch>> {
    let sql = format!(
        "SELECT {} FROM product_batches WHERE product_id=?1 ORDER BY purchased_at, rowid",
        BATCH_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![product_id], batch_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
