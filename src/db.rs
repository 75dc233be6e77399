// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::config::Settings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Stockbook", "stockbook"));

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")
}

pub fn db_path() -> Result<PathBuf> {
    let proj = project_dirs()?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("stockbook.sqlite"))
}

pub fn resolve_path(settings: &Settings) -> Result<PathBuf> {
    match &settings.database.path {
        Some(p) => Ok(p.clone()),
        None => db_path(),
    }
}

pub fn open_or_init(settings: &Settings) -> Result<Connection> {
    let path = resolve_path(settings)?;
    open(&path, settings.busy_timeout())
}

/// Opens a file-backed store, applies connection pragmas and creates any
/// missing tables. Every worker opens its own connection through this.
pub fn open(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |r| r.get::<_, String>(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    init_schema(&conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS vendors(
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL UNIQUE,
        contact_person TEXT,
        phone TEXT,
        email TEXT,
        address TEXT,
        balance TEXT NOT NULL DEFAULT '0',
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS products(
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT,
        active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS purchase_orders(
        id TEXT PRIMARY KEY,
        vendor_id TEXT NOT NULL,
        order_number TEXT NOT NULL UNIQUE,
        order_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'draft'
            CHECK(status IN ('draft','ordered','partial','received','cancelled')),
        total_amount TEXT NOT NULL DEFAULT '0',
        paid_amount TEXT NOT NULL DEFAULT '0',
        payment_status TEXT NOT NULL DEFAULT 'unpaid'
            CHECK(payment_status IN ('unpaid','partial','paid')),
        last_payment_at TEXT,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(vendor_id) REFERENCES vendors(id)
    );
    CREATE INDEX IF NOT EXISTS idx_purchase_orders_vendor ON purchase_orders(vendor_id, order_date);

    CREATE TABLE IF NOT EXISTS purchase_order_items(
        id TEXT PRIMARY KEY,
        purchase_order_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        quantity_ordered INTEGER NOT NULL CHECK(quantity_ordered > 0),
        quantity_received INTEGER NOT NULL DEFAULT 0
            CHECK(quantity_received >= 0 AND quantity_received <= quantity_ordered),
        cost_price TEXT NOT NULL,
        selling_price TEXT NOT NULL,
        expires_at TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(purchase_order_id) REFERENCES purchase_orders(id) ON DELETE CASCADE,
        FOREIGN KEY(product_id) REFERENCES products(id)
    );
    CREATE INDEX IF NOT EXISTS idx_po_items_order ON purchase_order_items(purchase_order_id);

    CREATE TABLE IF NOT EXISTS stock_receipts(
        id TEXT PRIMARY KEY,
        purchase_order_id TEXT NOT NULL,
        receipt_number TEXT NOT NULL UNIQUE,
        received_date TEXT NOT NULL,
        total_amount TEXT NOT NULL DEFAULT '0',
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(purchase_order_id) REFERENCES purchase_orders(id)
    );
    CREATE INDEX IF NOT EXISTS idx_stock_receipts_order ON stock_receipts(purchase_order_id);

    CREATE TABLE IF NOT EXISTS product_batches(
        id TEXT PRIMARY KEY,
        product_id TEXT NOT NULL,
        cost_price TEXT NOT NULL,
        selling_price TEXT NOT NULL,
        quantity_available INTEGER NOT NULL DEFAULT 0 CHECK(quantity_available >= 0),
        purchased_at TEXT NOT NULL,
        expires_at TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(product_id) REFERENCES products(id)
    );
    CREATE INDEX IF NOT EXISTS idx_product_batches_product ON product_batches(product_id);

    CREATE TABLE IF NOT EXISTS stock_receipt_items(
        id TEXT PRIMARY KEY,
        stock_receipt_id TEXT NOT NULL,
        purchase_order_item_id TEXT NOT NULL,
        product_batch_id TEXT NOT NULL,
        quantity_received INTEGER NOT NULL CHECK(quantity_received > 0),
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(stock_receipt_id) REFERENCES stock_receipts(id) ON DELETE CASCADE,
        FOREIGN KEY(purchase_order_item_id) REFERENCES purchase_order_items(id),
        FOREIGN KEY(product_batch_id) REFERENCES product_batches(id)
    );

    CREATE TABLE IF NOT EXISTS vendor_payments(
        id TEXT PRIMARY KEY,
        vendor_id TEXT NOT NULL,
        payment_number TEXT NOT NULL UNIQUE,
        amount TEXT NOT NULL,
        payment_date TEXT NOT NULL,
        payment_method TEXT NOT NULL
            CHECK(payment_method IN ('cash','bank_transfer','cheque','upi')),
        reference TEXT,
        notes TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now')),
        created_by INTEGER NOT NULL DEFAULT 0,
        updated_by INTEGER NOT NULL DEFAULT 0,
        FOREIGN KEY(vendor_id) REFERENCES vendors(id)
    );
    CREATE INDEX IF NOT EXISTS idx_vendor_payments_vendor ON vendor_payments(vendor_id, payment_date);
    "#,
    )?;
    Ok(())
}
