// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Typed failures raised by the billing engine.
//!
//! Every variant is raised before anything is committed, so a caller that
//! sees an error can assume the store is unchanged.

use crate::models::MeterKind;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BillingError {
    /// Malformed or sign-inconsistent input, rejected before any write.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Current reading below the previous one. Needs human review.
    #[error("meter anomaly on {meter} meter: current {current} is below previous {previous}")]
    MeterAnomaly {
        meter: MeterKind,
        previous: Decimal,
        current: Decimal,
    },

    #[error("invoice already exists for room {room_id} cycle {cycle}")]
    DuplicateInvoice { room_id: i64, cycle: String },

    #[error("contract {contract_id} is already settled")]
    AlreadySettled { contract_id: i64 },

    #[error("payment of {amount} exceeds invoice {invoice_id} total {total}")]
    Overpayment {
        invoice_id: i64,
        total: Decimal,
        amount: Decimal,
    },

    #[error("invoice {invoice_id} is already paid")]
    AlreadyPaid { invoice_id: i64 },

    /// Missing contract, rate snapshot, reading or document.
    #[error("not found: {0}")]
    NotFound(String),

    /// A stored value could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl BillingError {
    /// Idempotence violations mean the work was already done.
    pub fn is_already_done(&self) -> bool {
        matches!(
            self,
            BillingError::DuplicateInvoice { .. } | BillingError::AlreadySettled { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;

/// True when `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}
