// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authenticated identity a write is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor(pub i64);

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditFields {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: i64,
    pub updated_by: i64,
}

impl AuditFields {
    pub fn stamped(actor: Actor, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            updated_at: now,
            created_by: actor.0,
            updated_by: actor.0,
        }
    }

    /// Reads the four audit columns starting at `start`, in declaration order.
    pub(crate) fn from_row(row: &rusqlite::Row<'_>, start: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            created_at: row.get(start)?,
            updated_at: row.get(start + 1)?,
            created_by: row.get(start + 2)?,
            updated_by: row.get(start + 3)?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ParseEnumError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Ordered,
    Partial,
    Received,
    Cancelled,
}

text_enum!(OrderStatus, "order status", {
    Draft => "draft",
    Ordered => "ordered",
    Partial => "partial",
    Received => "received",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Draft -> {Draft, Ordered, Cancelled}; Ordered -> {Partial, Received};
    /// Partial -> {Partial, Received}. Received and Cancelled are terminal.
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Draft, Draft)
                | (Draft, Ordered)
                | (Draft, Cancelled)
                | (Ordered, Partial)
                | (Ordered, Received)
                | (Partial, Partial)
                | (Partial, Received)
        )
    }

    pub fn is_receivable(self) -> bool {
        matches!(self, OrderStatus::Ordered | OrderStatus::Partial)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Partial,
    Paid,
}

text_enum!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    Partial => "partial",
    Paid => "paid",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Cheque,
    Upi,
}

text_enum!(PaymentMethod, "payment method", {
    Cash => "cash",
    BankTransfer => "bank_transfer",
    Cheque => "cheque",
    Upi => "upi",
});

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub balance: Decimal,
    pub active: bool,
    #[serde(flatten)]
    pub audit: AuditFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    #[serde(flatten)]
    pub audit: AuditFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: String,
    pub vendor_id: String,
    pub order_number: String,
    pub order_date: NaiveDate,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub payment_status: PaymentStatus,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub audit: AuditFields,
    pub items: Vec<PurchaseOrderItem>,
}

impl PurchaseOrder {
    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    pub quantity_ordered: i64,
    pub quantity_received: i64,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub expires_at: Option<NaiveDate>,
    #[serde(flatten)]
    pub audit: AuditFields,
}

impl PurchaseOrderItem {
    pub fn remaining(&self) -> i64 {
        self.quantity_ordered - self.quantity_received
    }

    pub fn line_total(&self) -> Decimal {
        Decimal::from(self.quantity_ordered) * self.cost_price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReceipt {
    pub id: String,
    pub purchase_order_id: String,
    pub receipt_number: String,
    pub received_date: NaiveDate,
    pub total_amount: Decimal,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub audit: AuditFields,
    pub items: Vec<StockReceiptItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReceiptItem {
    pub id: String,
    pub stock_receipt_id: String,
    pub purchase_order_item_id: String,
    pub product_batch_id: String,
    pub quantity_received: i64,
    #[serde(flatten)]
    pub audit: AuditFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductBatch {
    pub id: String,
    pub product_id: String,
    pub cost_price: Decimal,
    pub selling_price: Decimal,
    pub quantity_available: i64,
    pub purchased_at: NaiveDate,
    pub expires_at: Option<NaiveDate>,
    #[serde(flatten)]
    pub audit: AuditFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorPayment {
    pub id: String,
    pub vendor_id: String,
    pub payment_number: String,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
    pub payment_method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[serde(flatten)]
    pub audit: AuditFields,
}
