// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use super::rates::{self, RateOverrides};
use super::{BillingError, Result, parse_day, parse_dec};
use crate::error::is_unique_violation;
use crate::models::{Contract, DormPolicy, Dormitory, RateTable, Room};

#[derive(Debug, Clone)]
pub struct NewContract {
    pub room_id: i64,
    pub tenant: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub overrides: RateOverrides,
}

pub fn load_dormitory(conn: &Connection, id: i64) -> Result<Dormitory> {
    type Row = (i64, String, String, String, u32, String, bool);
    let row: Option<Row> = conn
        .query_row(
            "SELECT id, name, water_rate, electricity_rate, payment_due_day, late_fee_per_day,
                    auto_apply_late_fee
             FROM dormitories WHERE id=?1",
            params![id],
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
    let (id, name, water, elec, due_day, late_fee, auto) =
        row.ok_or_else(|| BillingError::NotFound(format!("dormitory {}", id)))?;
    Ok(Dormitory {
        id,
        name,
        water_rate: parse_dec(&water, "water rate")?,
        electricity_rate: parse_dec(&elec, "electricity rate")?,
        policy: DormPolicy {
            payment_due_day: due_day,
            late_fee_per_day: parse_dec(&late_fee, "late fee")?,
            auto_apply_late_fee: auto,
        },
    })
}

pub fn load_room(conn: &Connection, id: i64) -> Result<Room> {
    type Row = (i64, i64, String, String, String, String);
    let row: Option<Row> = conn
        .query_row(
            "SELECT id, dormitory_id, number, monthly_rent, deposit, advance
             FROM rooms WHERE id=?1",
            params![id],
            |r| {
                Ok((
                    r.get(0)?,
                    r.get(1)?,
                    r.get(2)?,
                    r.get(3)?,
                    r.get(4)?,
                    r.get(5)?,
                ))
            },
        )
        .optional()?;
    let (id, dormitory_id, number, rent, deposit, advance) =
        row.ok_or_else(|| BillingError::NotFound(format!("room {}", id)))?;
    Ok(Room {
        id,
        dormitory_id,
        number,
        monthly_rent: parse_dec(&rent, "monthly rent")?,
        deposit: parse_dec(&deposit, "deposit")?,
        advance: parse_dec(&advance, "advance")?,
    })
}

pub fn policy_for_room(conn: &Connection, room_id: i64) -> Result<DormPolicy> {
    let room = load_room(conn, room_id)?;
    Ok(load_dormitory(conn, room.dormitory_id)?.policy)
}

const CONTRACT_COLS: &str =
    "id, room_id, tenant, start_date, status, terminated_on, final_water, final_electricity";

type ContractRow = (
    i64,
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn contract_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ContractRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
    ))
}

fn decode_contract(row: ContractRow) -> Result<Contract> {
    let (id, room_id, tenant, start, status, terminated_on, water, elec) = row;
    Ok(Contract {
        id,
        room_id,
        tenant,
        start_date: parse_day(&start, "start_date")?,
        status: status.parse()?,
        terminated_on: terminated_on
            .as_deref()
            .map(|s| parse_day(s, "terminated_on"))
            .transpose()?,
        final_water: water
            .as_deref()
            .map(|s| parse_dec(s, "final water reading"))
            .transpose()?,
        final_electricity: elec
            .as_deref()
            .map(|s| parse_dec(s, "final electricity reading"))
            .transpose()?,
    })
}

pub fn load_contract(conn: &Connection, id: i64) -> Result<Contract> {
    let row = conn
        .query_row(
            &format!("SELECT {CONTRACT_COLS} FROM contracts WHERE id=?1"),
            params![id],
            contract_row,
        )
        .optional()?;
    match row {
        Some(row) => decode_contract(row),
        None => {
            tracing::error!(contract_id = id, "contract not found");
            Err(BillingError::NotFound(format!("contract {}", id)))
        }
    }
}

pub fn active_contract_for_room(conn: &Connection, room_id: i64) -> Result<Contract> {
    let row = conn
        .query_row(
            &format!("SELECT {CONTRACT_COLS} FROM contracts WHERE room_id=?1 AND status='active'"),
            params![room_id],
            contract_row,
        )
        .optional()?;
    match row {
        Some(row) => decode_contract(row),
        None => Err(BillingError::NotFound(format!(
            "active contract for room {}",
            room_id
        ))),
    }
}

pub fn list_contracts(conn: &Connection, active_only: bool) -> Result<Vec<Contract>> {
    let mut sql = format!("SELECT {CONTRACT_COLS} FROM contracts");
    if active_only {
        sql.push_str(" WHERE status='active'");
    }
    sql.push_str(" ORDER BY room_id, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], contract_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_contract(row?)?);
    }
    Ok(out)
}

/// Rooms that currently have an active contract, in id order.
pub fn occupied_rooms(conn: &Connection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT room_id FROM contracts WHERE status='active' ORDER BY room_id",
    )?;
    let rows = stmt.query_map([], |r| r.get::<_, i64>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Create a contract and its rate snapshot in one transaction.
pub fn create_contract(conn: &mut Connection, new: &NewContract) -> Result<(Contract, RateTable)> {
    if new.tenant.trim().is_empty() {
        return Err(BillingError::Validation("tenant name is required".into()));
    }
    let tx = conn.transaction()?;
    let room = load_room(&tx, new.room_id)?;
    let dorm = load_dormitory(&tx, room.dormitory_id)?;
    let mut table = rates::snapshot_for_new_contract(
        &dorm,
        &room,
        &new.overrides,
        new.start_date,
        new.end_date,
    )?;

    let inserted = tx.execute(
        "INSERT INTO contracts(room_id, tenant, start_date) VALUES (?1,?2,?3)",
        params![new.room_id, new.tenant.trim(), new.start_date.to_string()],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(BillingError::Validation(format!(
                "room {} already has an active contract",
                room.number
            )));
        }
        Err(e) => return Err(e.into()),
    }
    let contract_id = tx.last_insert_rowid();
    table.contract_id = contract_id;
    rates::insert_snapshot(&tx, contract_id, &table)?;
    let contract = load_contract(&tx, contract_id)?;
    tx.commit()?;
    tracing::info!(contract_id, room_id = new.room_id, "contract created");
    Ok((contract, table))
}

/// Mark an active contract terminated. Callers run this inside the
/// settlement transaction.
pub(crate) fn terminate(
    conn: &Connection,
    contract_id: i64,
    on: NaiveDate,
    final_water: Decimal,
    final_electricity: Decimal,
) -> Result<()> {
    let n = conn.execute(
        "UPDATE contracts
         SET status='terminated', terminated_on=?2, final_water=?3, final_electricity=?4
         WHERE id=?1 AND status='active'",
        params![
            contract_id,
            on.to_string(),
            final_water.to_string(),
            final_electricity.to_string()
        ],
    )?;
    if n == 0 {
        return Err(BillingError::Validation(format!(
            "contract {} is not active",
            contract_id
        )));
    }
    Ok(())
}
