// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::error::{ProcurementError, Result};
use crate::models::{Actor, AuditFields, Product};
use crate::utils::{active_clause, maybe_print_json, new_id, pretty_table};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Deserialize;
use validator::Validate;

pub fn handle(conn: &Connection, actor: Actor, m: &clap::ArgMatches) -> anyhow::Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let input = NewProduct {
                name: sub.get_one::<String>("name").unwrap().trim().to_string(),
                description: sub
                    .get_one::<String>("description")
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
            };
            let product = create_product(conn, actor, &input)?;
            println!("Added product '{}' ({})", product.name, product.id);
        }
        Some(("list", sub)) => {
            let products = list_products(conn, sub.get_flag("all"))?;
            if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &products)? {
                let rows = products
                    .into_iter()
                    .map(|p| vec![p.id, p.name, p.description.unwrap_or_default()])
                    .collect();
                println!("{}", pretty_table(&["ID", "Name", "Description"], rows));
            }
        }
        Some(("show", sub)) => {
            let product = get_product(conn, sub.get_one::<String>("id").unwrap().trim())?;
            println!("{}", serde_json::to_string_pretty(&product)?);
        }
        Some(("rm", sub)) => {
            let id = sub.get_one::<String>("id").unwrap().trim();
            deactivate_product(conn, actor, id)?;
            println!("Deactivated product {}", id);
        }
        _ => {}
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

fn product_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: r.get(0)?,
        name: r.get(1)?,
        description: r.get(2)?,
        active: r.get(3)?,
        audit: AuditFields::from_row(r, 4)?,
    })
}

pub fn create_product(conn: &Connection, actor: Actor, input: &NewProduct) -> Result<Product> {
    input.validate()?;
    let id = new_id();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO products(id, name, description, active, created_at, updated_at, created_by, updated_by)
         VALUES (?1, ?2, ?3, 1, ?4, ?4, ?5, ?5)",
        params![id, input.name, input.description, now, actor.0],
    )?;
    get_product(conn, &id)
}

pub fn deactivate_product(conn: &Connection, actor: Actor, id: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE products SET active=0, updated_at=?1, updated_by=?2 WHERE id=?3",
        params![Utc::now(), actor.0, id],
    )?;
    if changed == 0 {
        return Err(ProcurementError::not_found("product", id));
    }
    Ok(())
}

pub fn get_product(conn: &Connection, id: &str) -> Result<Product> {
    conn.query_row(
        "SELECT p.id, p.name, p.description, p.active,
                p.created_at, p.updated_at, p.created_by, p.updated_by
         FROM products p WHERE p.id=?1",
        params![id],
        product_from_row,
    )
    .optional()?
    .ok_or_else(|| ProcurementError::not_found("product", id))
}

pub fn list_products(conn: &Connection, include_inactive: bool) -> Result<Vec<Product>> {
    let mut sql = String::from(
        "SELECT p.id, p.name, p.description, p.active,
                p.created_at, p.updated_at, p.created_by, p.updated_by
         FROM products p WHERE 1=1",
    );
    active_clause(&mut sql, "p", include_inactive);
    sql.push_str(" ORDER BY p.name");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], product_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
