// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Running payable balance per vendor.
//!
//! Only receiving (increase) and payments (decrease) move the balance, always
//! inside their own transaction. Writes are compare-and-set on the stored
//! value so a concurrent writer can never be silently overwritten.

use crate::error::{ProcurementError, Result};
use crate::models::Actor;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

pub fn balance(conn: &Connection, vendor_id: &str) -> Result<Decimal> {
    let (_, value) = stored_balance(conn, vendor_id)?;
    Ok(value)
}

pub(crate) fn increase_balance(
    conn: &Connection,
    vendor_id: &str,
    delta: Decimal,
    actor: Actor,
) -> Result<Decimal> {
    apply_delta(conn, vendor_id, delta, actor)
}

/// Refuses to take the balance below zero.
pub(crate) fn decrease_balance(
    conn: &Connection,
    vendor_id: &str,
    delta: Decimal,
    actor: Actor,
) -> Result<Decimal> {
    apply_delta(conn, vendor_id, -delta, actor)
}

fn stored_balance(conn: &Connection, vendor_id: &str) -> Result<(String, Decimal)> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT balance FROM vendors WHERE id=?1",
            params![vendor_id],
            |r| r.get(0),
        )
        .optional()?;
    let raw = raw.ok_or_else(|| ProcurementError::not_found("vendor", vendor_id))?;
    let value = raw.parse::<Decimal>().map_err(|_| {
        ProcurementError::Corrupt(format!("balance '{}' for vendor {}", raw, vendor_id))
    })?;
    Ok((raw, value))
}

fn apply_delta(conn: &Connection, vendor_id: &str, delta: Decimal, actor: Actor) -> Result<Decimal> {
    let (raw, current) = stored_balance(conn, vendor_id)?;
    let next = current
        .checked_add(delta)
        .ok_or_else(|| ProcurementError::Validation("vendor balance is too large".into()))?;
    if delta < Decimal::ZERO && next < Decimal::ZERO {
        return Err(ProcurementError::PaymentExceedsBalance {
            amount: -delta,
            balance: current,
        });
    }
    compare_and_set(conn, vendor_id, &raw, next, actor)?;
    tracing::debug!(vendor_id, %current, %next, "vendor balance moved");
    Ok(next)
}

/// Writes `next` only if the stored text still equals `expected`.
fn compare_and_set(
    conn: &Connection,
    vendor_id: &str,
    expected: &str,
    next: Decimal,
    actor: Actor,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE vendors SET balance=?1, updated_at=?2, updated_by=?3 WHERE id=?4 AND balance=?5",
        params![next.to_string(), Utc::now(), actor.0, vendor_id, expected],
    )?;
    if changed == 0 {
        // Either the row is gone or someone else moved the balance first.
        stored_balance(conn, vendor_id)?;
        return Err(ProcurementError::ConcurrentUpdate {
            vendor_id: vendor_id.to_string(),
        });
    }
    Ok(())
}
