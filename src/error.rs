// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Error type shared by the procurement engines.
//!
//! Every variant has a stable [`ProcurementError::code`] so a transport layer
//! can map it to a client-facing status without matching on messages.

use crate::models::OrderStatus;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProcurementError>;

/// Coarse classification used by callers to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Domain,
    Transaction,
}

#[derive(Error, Debug)]
pub enum ProcurementError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("vendor '{0}' not found")]
    VendorNotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("can only update purchase orders in draft status (current: {0})")]
    NonDraftUpdate(OrderStatus),

    #[error("can only cancel purchase orders in draft status (current: {0})")]
    NonDraftCancel(OrderStatus),

    #[error("purchase order is not in a receivable status (current: {0})")]
    NotReceivable(OrderStatus),

    #[error("purchase order item '{item_id}' does not belong to order '{order_id}'")]
    ItemNotInOrder { item_id: String, order_id: String },

    #[error(
        "quantity received exceeds quantity ordered for item '{item_id}' (requested {requested}, remaining {remaining})"
    )]
    QuantityExceedsOrdered {
        item_id: String,
        requested: i64,
        remaining: i64,
    },

    #[error("vendor '{vendor_id}' has no outstanding balance")]
    InsufficientBalance { vendor_id: String },

    #[error("payment amount {amount} exceeds vendor balance {balance}")]
    PaymentExceedsBalance { amount: Decimal, balance: Decimal },

    #[error("vendor '{vendor_id}' balance changed concurrently")]
    ConcurrentUpdate { vendor_id: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),
}

impl ProcurementError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        ProcurementError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcurementError::NotFound { .. } | ProcurementError::VendorNotFound(_) => {
                ErrorKind::NotFound
            }
            ProcurementError::Validation(_) => ErrorKind::Validation,
            ProcurementError::NonDraftUpdate(_)
            | ProcurementError::NonDraftCancel(_)
            | ProcurementError::NotReceivable(_)
            | ProcurementError::ItemNotInOrder { .. }
            | ProcurementError::QuantityExceedsOrdered { .. }
            | ProcurementError::InsufficientBalance { .. }
            | ProcurementError::PaymentExceedsBalance { .. } => ErrorKind::Domain,
            ProcurementError::ConcurrentUpdate { .. }
            | ProcurementError::Database(_)
            | ProcurementError::Corrupt(_) => ErrorKind::Transaction,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ProcurementError::NotFound { .. } => "NOT_FOUND",
            ProcurementError::VendorNotFound(_) => "VENDOR_NOT_FOUND",
            ProcurementError::Validation(_) => "VALIDATION_ERROR",
            ProcurementError::NonDraftUpdate(_) => "CANNOT_UPDATE_NON_DRAFT",
            ProcurementError::NonDraftCancel(_) => "CANNOT_CANCEL_NON_DRAFT",
            ProcurementError::NotReceivable(_) => "ORDER_NOT_RECEIVABLE",
            ProcurementError::ItemNotInOrder { .. } => "ORDER_ITEM_NOT_FOUND",
            ProcurementError::QuantityExceedsOrdered { .. } => "QUANTITY_EXCEEDS_ORDERED",
            ProcurementError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ProcurementError::PaymentExceedsBalance { .. } => "PAYMENT_EXCEEDS_BALANCE",
            ProcurementError::ConcurrentUpdate { .. } => "CONCURRENT_UPDATE",
            ProcurementError::Database(_) => "TRANSACTION_ERROR",
            ProcurementError::Corrupt(_) => "CORRUPT_DATA",
        }
    }
}

impl From<validator::ValidationErrors> for ProcurementError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ProcurementError::Validation(errors.to_string())
    }
}
