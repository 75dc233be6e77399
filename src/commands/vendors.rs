// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{ProcurementError, Result};
use crate::models::{Actor, AuditFields, Vendor};
use crate::utils::{active_clause, decimal_at, fmt_money, maybe_print_json, new_id, pretty_table};
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use serde::Deserialize;
use validator::Validate;

pub fn handle(conn: &Connection, actor: Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let vendor = create_vendor(conn, actor, &vendor_args(sub))?;
            println!("Added vendor '{}' ({})", vendor.name, vendor.id);
        }
        Some(("update", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            let vendor = update_vendor(conn, actor, id, &vendor_args(sub))?;
            println!("Updated vendor '{}'", vendor.name);
        }
        Some(("list", sub)) => {
            let vendors = list_vendors(conn, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &vendors)? {
                let rows = vendors
                    .into_iter()
                    .map(|v| {
                        vec![
                            v.id,
                            v.name,
                            v.contact_person.unwrap_or_default(),
                            v.phone.unwrap_or_default(),
                            fmt_money(&v.balance),
                            if v.active { "yes".into() } else { "no".into() },
                        ]
                    })
                    .collect();
                println!(
                    "{}",
                    pretty_table(&["ID", "Name", "Contact", "Phone", "Balance", "Active"], rows)
                );
            }
        }
        Some(("show", sub)) => {
            let vendor = get_vendor(conn, sub.get_one::<String>("id").unwrap().trim())?;
            println!("{}", serde_json::to_string_pretty(&vendor)?);
        }
        Some(("rm", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            deactivate_vendor(conn, actor, id)?;
            println!("Deactivated vendor {}", id);
        }
        _ => {}
    }
    Ok(())
}

fn vendor_args(sub: &clap::ArgMatches) -> NewVendor {
    let opt = |key: &str| {
        sub.get_one::<String>(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    NewVendor {
        name: opt("name").unwrap_or_default(),
        contact_person: opt("contact"),
        phone: opt("phone"),
        email: opt("email"),
        address: opt("address"),
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct NewVendor {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 255))]
    pub contact_person: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
}

const VENDOR_COLUMNS: &str = "v.id, v.name, v.contact_person, v.phone, v.email, v.address, v.balance, v.active, \
     v.created_at, v.updated_at, v.created_by, v.updated_by";

fn vendor_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Vendor> {
    Ok(Vendor {
        id: r.get(0)?,
        name: r.get(1)?,
        contact_person: r.get(2)?,
        phone: r.get(3)?,
        email: r.get(4)?,
        address: r.get(5)?,
        balance: decimal_at(r, 6)?,
        active: r.get(7)?,
        audit: AuditFields::from_row(r, 8)?,
    })
}

fn duplicate_name(err: rusqlite::Error, name: &str) -> ProcurementError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            ProcurementError::Validation(format!("vendor name '{}' already exists", name))
        }
        other => other.into(),
    }
}

pub fn create_vendor(conn: &Connection, actor: Actor, input: &NewVendor) -> Result<Vendor> {
    input.validate()?;
    let id = new_id();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO vendors(id, name, contact_person, phone, email, address, balance, active,
                             created_at, updated_at, created_by, updated_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, '0', 1, ?7, ?7, ?8, ?8)",
        params![
            id,
            input.name,
            input.contact_person,
            input.phone,
            input.email,
            input.address,
            now,
            actor.0
        ],
    )
    .map_err(|e| duplicate_name(e, &input.name))?;
    tracing::info!(vendor_id = %id, name = %input.name, "vendor created");
    get_vendor(conn, &id)
}

/// Balance is deliberately absent: only receiving and payments move it.
pub fn update_vendor(conn: &Connection, actor: Actor, id: &str, input: &NewVendor) -> Result<Vendor> {
    input.validate()?;
    let changed = conn
        .execute(
            "UPDATE vendors SET name=?1, contact_person=?2, phone=?3, email=?4, address=?5,
                                updated_at=?6, updated_by=?7
             WHERE id=?8",
            params![
                input.name,
                input.contact_person,
                input.phone,
                input.email,
                input.address,
                Utc::now(),
                actor.0,
                id
            ],
        )
        .map_err(|e| duplicate_name(e, &input.name))?;
    if changed == 0 {
        return Err(ProcurementError::not_found("vendor", id));
    }
    get_vendor(conn, id)
}

pub fn deactivate_vendor(conn: &Connection, actor: Actor, id: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE vendors SET active=0, updated_at=?1, updated_by=?2 WHERE id=?3",
        params![Utc::now(), actor.0, id],
    )?;
    if changed == 0 {
        return Err(ProcurementError::not_found("vendor", id));
    }
    tracing::info!(vendor_id = id, "vendor deactivated");
    Ok(())
}

pub fn find_vendor(conn: &Connection, id: &str) -> Result<Option<Vendor>> {
    let sql = format!("SELECT {} FROM vendors v WHERE v.id=?1", VENDOR_COLUMNS);
    Ok(conn
        .query_row(&sql, params![id], vendor_from_row)
        .optional()?)
}

pub fn get_vendor(conn: &Connection, id: &str) -> Result<Vendor> {
    find_vendor(conn, id)?.ok_or_else(|| ProcurementError::not_found("vendor", id))
}

pub fn list_vendors(conn: &Connection, include_inactive: bool) -> Result<Vec<Vendor>> {
    let mut sql = format!("SELECT {} FROM vendors v WHERE 1=1", VENDOR_COLUMNS);
    active_clause(&mut sql, "v", include_inactive);
    sql.push_str(" ORDER BY v.name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], vendor_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
