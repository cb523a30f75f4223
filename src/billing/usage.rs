// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rust_decimal::Decimal;

use super::{BillingError, Result};
use crate::models::{MeterKind, MeterReading};

/// Billable units between two readings of the same meter.
///
/// A current value below the previous one is reported as
/// [`BillingError::MeterAnomaly`]; it is never billed as zero or as a
/// wrapped counter.
pub fn usage_units(meter: MeterKind, previous: Decimal, current: Decimal) -> Result<Decimal> {
    if previous < Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "{} reading cannot be negative (previous {})",
            meter, previous
        )));
    }
    if current < Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "{} reading cannot be negative (current {})",
            meter, current
        )));
    }
    if current < previous {
        tracing::warn!(%meter, %previous, %current, "non-monotonic meter reading");
        return Err(BillingError::MeterAnomaly {
            meter,
            previous,
            current,
        });
    }
    Ok(current - previous)
}

pub fn reading_usage(reading: &MeterReading) -> Result<Decimal> {
    usage_units(reading.kind, reading.previous, reading.current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn usage_is_current_minus_previous() {
        assert_eq!(
            usage_units(MeterKind::Water, d("100"), d("115")).unwrap(),
            d("15")
        );
        assert_eq!(
            usage_units(MeterKind::Electricity, d("500.5"), d("540.75")).unwrap(),
            d("40.25")
        );
    }

    #[test]
    fn zero_usage_is_valid() {
        assert!(
            usage_units(MeterKind::Water, d("42"), d("42"))
                .unwrap()
                .is_zero()
        );
    }

    #[test]
    fn rollover_is_an_anomaly() {
        let err = usage_units(MeterKind::Electricity, d("500"), d("480")).unwrap_err();
        match err {
            BillingError::MeterAnomaly {
                meter,
                previous,
                current,
            } => {
                assert_eq!(meter, MeterKind::Electricity);
                assert_eq!(previous, d("500"));
                assert_eq!(current, d("480"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn negative_readings_are_rejected() {
        assert!(matches!(
            usage_units(MeterKind::Water, d("-1"), d("5")),
            Err(BillingError::Validation(_))
        ));
    }
}
