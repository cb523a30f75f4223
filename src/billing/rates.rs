// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Rate snapshots.
//!
//! A contract's prices are copied from its dormitory and room when the
//! contract is created. Billing always reads that copy, so a later price
//! change never alters an invoice for an existing contract.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use super::{BillingError, Result, parse_day, parse_dec};
use crate::models::{Dormitory, RateTable, Room};

/// Per-contract deviations from the dormitory/room list prices.
#[derive(Debug, Clone, Default)]
pub struct RateOverrides {
    pub water_rate: Option<Decimal>,
    pub electricity_rate: Option<Decimal>,
    pub monthly_rent: Option<Decimal>,
    pub deposit: Option<Decimal>,
    pub advance: Option<Decimal>,
}

pub fn snapshot_for_new_contract(
    dorm: &Dormitory,
    room: &Room,
    overrides: &RateOverrides,
    effective_from: NaiveDate,
    effective_to: Option<NaiveDate>,
) -> Result<RateTable> {
    let table = RateTable {
        contract_id: 0,
        water_rate: overrides.water_rate.unwrap_or(dorm.water_rate),
        electricity_rate: overrides.electricity_rate.unwrap_or(dorm.electricity_rate),
        monthly_rent: overrides.monthly_rent.unwrap_or(room.monthly_rent),
        deposit: overrides.deposit.unwrap_or(room.deposit),
        advance: overrides.advance.unwrap_or(room.advance),
        effective_from,
        effective_to,
    };
    let amounts = [
        ("water rate", table.water_rate),
        ("electricity rate", table.electricity_rate),
        ("monthly rent", table.monthly_rent),
        ("deposit", table.deposit),
        ("advance", table.advance),
    ];
    for (what, v) in amounts {
        if v < Decimal::ZERO {
            return Err(BillingError::Validation(format!(
                "{} cannot be negative ({})",
                what, v
            )));
        }
    }
    if let Some(to) = effective_to {
        if to < effective_from {
            return Err(BillingError::Validation(format!(
                "rate period ends {} before it starts {}",
                to, effective_from
            )));
        }
    }
    Ok(table)
}

pub(crate) fn insert_snapshot(
    conn: &Connection,
    contract_id: i64,
    table: &RateTable,
) -> Result<()> {
    conn.execute(
        "INSERT INTO rate_tables(contract_id, water_rate, electricity_rate, monthly_rent, deposit,
                                 advance, effective_from, effective_to)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            contract_id,
            table.water_rate.to_string(),
            table.electricity_rate.to_string(),
            table.monthly_rent.to_string(),
            table.deposit.to_string(),
            table.advance.to_string(),
            table.effective_from.to_string(),
            table.effective_to.map(|d| d.to_string()),
        ],
    )?;
    Ok(())
}

/// The snapshot captured for `contract_id`. A missing snapshot is a data
/// integrity fault and is logged as such.
pub fn resolve(conn: &Connection, contract_id: i64) -> Result<RateTable> {
    type Row = (String, String, String, String, String, String, Option<String>);
    let row: Option<Row> = conn
        .query_row(
            "SELECT water_rate, electricity_rate, monthly_rent, deposit, advance, effective_from,
                    effective_to
             FROM rate_tables WHERE contract_id=?1",
            params![contract_id],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                    r.get(6)?,
                ))
            },
        )
        .optional()?;
    let Some((water, elec, rent, deposit, advance, from, to)) = row else {
        tracing::error!(contract_id, "contract has no rate snapshot");
        return Err(BillingError::NotFound(format!(
            "rate snapshot for contract {}",
            contract_id
        )));
    };
    Ok(RateTable {
        contract_id,
        water_rate: parse_dec(&water, "water rate")?,
        electricity_rate: parse_dec(&elec, "electricity rate")?,
        monthly_rent: parse_dec(&rent, "monthly rent")?,
        deposit: parse_dec(&deposit, "deposit")?,
        advance: parse_dec(&advance, "advance")?,
        effective_from: parse_day(&from, "effective_from")?,
        effective_to: to.as_deref().map(|s| parse_day(s, "effective_to")).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DormPolicy;
    use std::str::FromStr;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn dorm() -> Dormitory {
        Dormitory {
            id: 1,
            name: "North Hall".into(),
            water_rate: d("18"),
            electricity_rate: d("7"),
            policy: DormPolicy::default(),
        }
    }

    fn room() -> Room {
        Room {
            id: 1,
            dormitory_id: 1,
            number: "101".into(),
            monthly_rent: d("3000"),
            deposit: d("3000"),
            advance: d("0"),
        }
    }

    #[test]
    fn snapshot_takes_list_prices_unless_overridden() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let overrides = RateOverrides {
            monthly_rent: Some(d("2800")),
            ..Default::default()
        };
        let t = snapshot_for_new_contract(&dorm(), &room(), &overrides, start, None).unwrap();
        assert_eq!(t.water_rate, d("18"));
        assert_eq!(t.electricity_rate, d("7"));
        assert_eq!(t.monthly_rent, d("2800"));
        assert_eq!(t.held_funds(), d("3000"));
    }

    #[test]
    fn snapshot_rejects_negative_amounts() {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let overrides = RateOverrides {
            deposit: Some(d("-1")),
            ..Default::default()
        };
        assert!(snapshot_for_new_contract(&dorm(), &room(), &overrides, start, None).is_err());
    }
}
