// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Billing and settlement engine.
//!
//! Pure pieces (`usage`, `lines`) do the arithmetic; `invoices` and
//! `settlement` orchestrate them against the store; `ledger` owns the
//! append-only documents.

pub mod charges;
pub mod contracts;
pub mod invoices;
pub mod ledger;
pub mod lines;
pub mod property;
pub mod rates;
pub mod readings;
pub mod settlement;
pub mod usage;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::BillingCycle;

pub use crate::error::{BillingError, Result};

/// Round to cents, half-up (midpoint away from zero).
pub fn round2(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub(crate) fn parse_dec(s: &str, what: &str) -> Result<Decimal> {
    s.parse::<Decimal>()
        .map_err(|_| BillingError::Corrupt(format!("invalid {} '{}'", what, s)))
}

pub(crate) fn parse_day(s: &str, what: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| BillingError::Corrupt(format!("invalid {} '{}'", what, s)))
}

pub(crate) fn parse_cycle(s: &str) -> Result<BillingCycle> {
    s.parse::<BillingCycle>()
        .map_err(|_| BillingError::Corrupt(format!("invalid billing cycle '{}'", s)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn round2_is_half_up() {
        let d = |s: &str| Decimal::from_str(s).unwrap();
        assert_eq!(round2(d("2.345")), d("2.35"));
        assert_eq!(round2(d("2.344")), d("2.34"));
        assert_eq!(round2(d("-2.345")), d("-2.35"));
        assert_eq!(round2(d("10")), d("10"));
    }
}
