// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::purchases::list_purchase_orders;
use crate::commands::receiving::derive_status;
use crate::commands::vendors::list_vendors;
use crate::error::Result;
use crate::models::OrderStatus;
use crate::utils::{decimal_at, pretty_table};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> anyhow::Result<()> {
    let issues = check(conn)?;
    if m.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&issues)?);
    } else if issues.is_empty() {
        println!("doctor: no issues found");
    } else {
        let rows = issues
            .into_iter()
            .map(|i| vec![i.issue.to_string(), i.detail])
            .collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub issue: &'static str,
    pub detail: String,
}

pub fn check(conn: &Connection) -> Result<Vec<Issue>> {
    let mut issues = Vec::new();

    // 1) ledger drift: balance must equal receipts minus payments
    for vendor in list_vendors(conn, true)? {
        let received = sum_text_column(
            conn,
            "SELECT r.total_amount FROM stock_receipts r
             JOIN purchase_orders o ON o.id = r.purchase_order_id WHERE o.vendor_id = ?1",
            &vendor.id,
        )?;
        let paid = sum_text_column(
            conn,
            "SELECT amount FROM vendor_payments WHERE vendor_id = ?1",
            &vendor.id,
        )?;
        let expected = received - paid;
        if vendor.balance != expected {
            issues.push(Issue {
                issue: "balance_drift",
                detail: format!(
                    "{} balance {} expected {}",
                    vendor.name, vendor.balance, expected
                ),
            });
        }
    }

    // 2) order level invariants
    for order in list_purchase_orders(conn)? {
        for item in &order.items {
            if item.quantity_received > item.quantity_ordered {
                issues.push(Issue {
                    issue: "over_received",
                    detail: format!(
                        "{} item {} received {} of {}",
                        order.order_number, item.id, item.quantity_received, item.quantity_ordered
                    ),
                });
            }
        }
        if order.paid_amount > order.total_amount {
            issues.push(Issue {
                issue: "over_paid",
                detail: format!(
                    "{} paid {} of {}",
                    order.order_number, order.paid_amount, order.total_amount
                ),
            });
        }
        let any_received = order.items.iter().any(|i| i.quantity_received > 0);
        let all_received = !order.items.is_empty()
            && order
                .items
                .iter()
                .all(|i| i.quantity_received >= i.quantity_ordered);
        let consistent = match order.status {
            OrderStatus::Draft | OrderStatus::Ordered | OrderStatus::Cancelled => !any_received,
            OrderStatus::Partial => any_received && !all_received,
            OrderStatus::Received => all_received,
        };
        if !consistent {
            issues.push(Issue {
                issue: "status_mismatch",
                detail: format!(
                    "{} is {} but items say {}",
                    order.order_number,
                    order.status,
                    if any_received {
                        derive_status(order.status, &order.items).to_string()
                    } else {
                        "nothing received".to_string()
                    }
                ),
            });
        }
    }

    Ok(issues)
}

fn sum_text_column(conn: &Connection, sql: &str, vendor_id: &str) -> Result<Decimal> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![vendor_id], |r| decimal_at(r, 0))?;
    let mut total = Decimal::ZERO;
    for v in rows {
        total += v?;
    }
    Ok(total)
}
