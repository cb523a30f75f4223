// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Line item finalization shared by invoices and settlements.
//!
//! `amount = round2(quantity * unit_price)` is computed here and nowhere
//! else. Discounts and refunds must come out `<= 0`, every other kind
//! `>= 0`. Totals are sums of the already-rounded amounts.

use rust_decimal::Decimal;

use super::{BillingError, Result, round2};
use crate::models::{LineDraft, LineItem};

pub fn build_line(draft: &LineDraft) -> Result<LineItem> {
    if draft.description.trim().is_empty() {
        return Err(BillingError::Validation(format!(
            "{} line needs a description",
            draft.kind
        )));
    }
    if draft.quantity < Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "{} line '{}' has negative quantity {}",
            draft.kind, draft.description, draft.quantity
        )));
    }
    let amount = draft
        .quantity
        .checked_mul(draft.unit_price)
        .map(round2)
        .ok_or_else(|| {
            BillingError::Validation(format!(
                "{} line '{}' amount is out of range",
                draft.kind, draft.description
            ))
        })?;
    let sign_ok = if draft.kind.is_credit() {
        amount <= Decimal::ZERO
    } else {
        amount >= Decimal::ZERO
    };
    if !sign_ok {
        return Err(BillingError::Validation(format!(
            "{} line '{}' has amount {} with the wrong sign",
            draft.kind, draft.description, amount
        )));
    }
    Ok(LineItem {
        kind: draft.kind,
        description: draft.description.trim().to_string(),
        quantity: draft.quantity,
        unit_price: draft.unit_price,
        amount,
        ref_invoice_id: draft.ref_invoice_id,
    })
}

/// Finalize every draft, failing on the first invalid one.
pub fn build_lines(drafts: &[LineDraft]) -> Result<Vec<LineItem>> {
    drafts.iter().map(build_line).collect()
}

/// Sum of the rounded line amounts.
pub fn total(lines: &[LineItem]) -> Result<Decimal> {
    lines
        .iter()
        .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.amount))
        .map(round2)
        .ok_or_else(|| BillingError::Validation("line total is out of range".into()))
}
