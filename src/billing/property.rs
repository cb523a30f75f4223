// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Dormitories and rooms. List prices here only seed new contracts; a
//! contract bills from its own rate snapshot.

use rusqlite::{Connection, params};
use rust_decimal::Decimal;

use super::{BillingError, Result};
use crate::error::is_unique_violation;
use crate::models::{DormPolicy, Dormitory, Room};

/// Partial update of a dormitory's prices and policy.
#[derive(Debug, Clone, Default)]
pub struct DormUpdate {
    pub water_rate: Option<Decimal>,
    pub electricity_rate: Option<Decimal>,
    pub payment_due_day: Option<u32>,
    pub late_fee_per_day: Option<Decimal>,
    pub auto_apply_late_fee: Option<bool>,
}

fn non_negative(what: &str, v: Decimal) -> Result<()> {
    if v < Decimal::ZERO {
        return Err(BillingError::Validation(format!(
            "{} cannot be negative ({})",
            what, v
        )));
    }
    Ok(())
}

fn check_policy(policy: &DormPolicy) -> Result<()> {
    if !(1..=28).contains(&policy.payment_due_day) {
        return Err(BillingError::Validation(format!(
            "payment due day must be between 1 and 28, got {}",
            policy.payment_due_day
        )));
    }
    non_negative("late fee", policy.late_fee_per_day)
}

pub fn create_dormitory(
    conn: &Connection,
    name: &str,
    water_rate: Decimal,
    electricity_rate: Decimal,
    policy: &DormPolicy,
) -> Result<i64> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BillingError::Validation("dormitory name is required".into()));
    }
    non_negative("water rate", water_rate)?;
    non_negative("electricity rate", electricity_rate)?;
    check_policy(policy)?;
    let inserted = conn.execute(
        "INSERT INTO dormitories(name, water_rate, electricity_rate, payment_due_day,
                                 late_fee_per_day, auto_apply_late_fee)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            name,
            water_rate.to_string(),
            electricity_rate.to_string(),
            policy.payment_due_day,
            policy.late_fee_per_day.to_string(),
            policy.auto_apply_late_fee,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(BillingError::Validation(format!(
                "dormitory '{}' already exists",
                name
            )));
        }
        Err(e) => return Err(e.into()),
    }
    let id = conn.last_insert_rowid();
    tracing::info!(dormitory_id = id, name, "dormitory created");
    Ok(id)
}

/// Apply `update` to dormitory `id`. Existing contracts keep their snapshot.
pub fn update_dormitory(conn: &Connection, id: i64, update: &DormUpdate) -> Result<Dormitory> {
    let current = super::contracts::load_dormitory(conn, id)?;
    let water = update.water_rate.unwrap_or(current.water_rate);
    let elec = update.electricity_rate.unwrap_or(current.electricity_rate);
    let policy = DormPolicy {
        payment_due_day: update
            .payment_due_day
            .unwrap_or(current.policy.payment_due_day),
        late_fee_per_day: update
            .late_fee_per_day
            .unwrap_or(current.policy.late_fee_per_day),
        auto_apply_late_fee: update
            .auto_apply_late_fee
            .unwrap_or(current.policy.auto_apply_late_fee),
    };
    non_negative("water rate", water)?;
    non_negative("electricity rate", elec)?;
    check_policy(&policy)?;
    conn.execute(
        "UPDATE dormitories SET water_rate=?2, electricity_rate=?3, payment_due_day=?4,
             late_fee_per_day=?5, auto_apply_late_fee=?6 WHERE id=?1",
        params![
            id,
            water.to_string(),
            elec.to_string(),
            policy.payment_due_day,
            policy.late_fee_per_day.to_string(),
            policy.auto_apply_late_fee,
        ],
    )?;
    tracing::info!(dormitory_id = id, "dormitory updated");
    super::contracts::load_dormitory(conn, id)
}

pub fn list_dormitories(conn: &Connection) -> Result<Vec<Dormitory>> {
    let mut stmt = conn.prepare("SELECT id FROM dormitories ORDER BY name")?;
    let ids = stmt.query_map([], |r| r.get::<_, i64>(0))?;
    let mut out = Vec::new();
    for id in ids {
        out.push(super::contracts::load_dormitory(conn, id?)?);
    }
    Ok(out)
}

pub fn create_room(
    conn: &Connection,
    dormitory_id: i64,
    number: &str,
    monthly_rent: Decimal,
    deposit: Decimal,
    advance: Decimal,
) -> Result<i64> {
    let number = number.trim();
    if number.is_empty() {
        return Err(BillingError::Validation("room number is required".into()));
    }
    non_negative("monthly rent", monthly_rent)?;
    non_negative("deposit", deposit)?;
    non_negative("advance", advance)?;
    super::contracts::load_dormitory(conn, dormitory_id)?;
    let inserted = conn.execute(
        "INSERT INTO rooms(dormitory_id, number, monthly_rent, deposit, advance)
         VALUES (?1,?2,?3,?4,?5)",
        params![
            dormitory_id,
            number,
            monthly_rent.to_string(),
            deposit.to_string(),
            advance.to_string(),
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(BillingError::Validation(format!(
                "room '{}' already exists",
                number
            )));
        }
        Err(e) => return Err(e.into()),
    }
    let id = conn.last_insert_rowid();
    tracing::info!(room_id = id, dormitory_id, number, "room created");
    Ok(id)
}

pub fn list_rooms(conn: &Connection, dormitory_id: Option<i64>) -> Result<Vec<Room>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM rooms WHERE ?1 IS NULL OR dormitory_id=?1 ORDER BY dormitory_id, number",
    )?;
    let ids = stmt.query_map(params![dormitory_id], |r| r.get::<_, i64>(0))?;
    let mut out = Vec::new();
    for id in ids {
        out.push(super::contracts::load_room(conn, id?)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn due_day_outside_range_is_rejected() {
        let conn = conn();
        let policy = DormPolicy {
            payment_due_day: 31,
            ..Default::default()
        };
        let err =
            create_dormitory(&conn, "North", Decimal::ONE, Decimal::ONE, &policy).unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
    }

    #[test]
    fn duplicate_room_number_is_rejected() {
        let conn = conn();
        let policy = DormPolicy::default();
        let dorm = create_dormitory(&conn, "North", Decimal::ONE, Decimal::ONE, &policy).unwrap();
        create_room(&conn, dorm, "101", Decimal::from(3000), Decimal::ZERO, Decimal::ZERO).unwrap();
        let err = create_room(&conn, dorm, "101", Decimal::from(3000), Decimal::ZERO, Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(err, BillingError::Validation(_)));
        assert_eq!(list_rooms(&conn, Some(dorm)).unwrap().len(), 1);
    }

    #[test]
    fn update_keeps_unset_fields() {
        let conn = conn();
        let (water, elec) = (Decimal::from(18), Decimal::from(7));
        let dorm = create_dormitory(&conn, "North", water, elec, &DormPolicy::default()).unwrap();
        let updated = update_dormitory(
            &conn,
            dorm,
            &DormUpdate {
                water_rate: Some(Decimal::from(20)),
                auto_apply_late_fee: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(updated.water_rate, Decimal::from(20));
        assert_eq!(updated.electricity_rate, Decimal::from(7));
        assert!(updated.policy.auto_apply_late_fee);
        assert_eq!(updated.policy.payment_due_day, 5);
    }
}
