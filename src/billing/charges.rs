// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Room-level charges waiting to be folded into a document.
//!
//! Service fees, fines, discounts, late fees and corrections are attached
//! to a room and cycle here. Each one is consumed exactly once, either by
//! the first invoice generated for that room at or after its cycle, or by
//! the settlement of the room's contract.

use rusqlite::{Connection, params};

use super::{Result, lines, parse_cycle, parse_dec};
use crate::models::{BillingCycle, LineDraft, PendingCharge};

pub fn add_charge(
    conn: &Connection,
    room_id: i64,
    cycle: BillingCycle,
    draft: &LineDraft,
) -> Result<i64> {
    // Validate up front so a bad charge never blocks a later invoice.
    lines::build_line(draft)?;
    super::contracts::load_room(conn, room_id)?;
    conn.execute(
        "INSERT INTO pending_charges(room_id, cycle, kind, description, quantity, unit_price,
                                     ref_invoice_id)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            room_id,
            cycle.to_string(),
            draft.kind.as_str(),
            draft.description.trim(),
            draft.quantity.to_string(),
            draft.unit_price.to_string(),
            draft.ref_invoice_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::info!(room_id, %cycle, kind = %draft.kind, charge_id = id, "pending charge added");
    Ok(id)
}

type ChargeRow = (i64, i64, String, String, String, String, String, Option<i64>);

fn query_charges(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> Result<Vec<PendingCharge>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, |r| {
        Ok::<ChargeRow, rusqlite::Error>((
            r.get(0)?,
            r.get(1)?,
            r.get(2)?,
            r.get(3)?,
            r.get(4)?,
            r.get(5)?,
            r.get(6)?,
            r.get(7)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, room_id, cycle, kind, description, qty, price, ref_invoice_id) = row?;
        out.push(PendingCharge {
            id,
            room_id,
            cycle: parse_cycle(&cycle)?,
            line: LineDraft {
                kind: kind.parse()?,
                description,
                quantity: parse_dec(&qty, "charge quantity")?,
                unit_price: parse_dec(&price, "charge unit price")?,
                ref_invoice_id,
            },
        });
    }
    Ok(out)
}

const CHARGE_COLS: &str =
    "id, room_id, cycle, kind, description, quantity, unit_price, ref_invoice_id";

/// Unconsumed charges for `room_id` due on or before `cycle`.
pub fn open_charges_through(
    conn: &Connection,
    room_id: i64,
    cycle: BillingCycle,
) -> Result<Vec<PendingCharge>> {
    query_charges(
        conn,
        &format!(
            "SELECT {CHARGE_COLS} FROM pending_charges
             WHERE room_id=?1 AND cycle<=?2 AND invoice_id IS NULL AND settlement_id IS NULL
             ORDER BY cycle, id"
        ),
        &[&room_id, &cycle.to_string()],
    )
}

/// Every unconsumed charge for `room_id`, whatever its cycle.
pub fn open_charges(conn: &Connection, room_id: i64) -> Result<Vec<PendingCharge>> {
    query_charges(
        conn,
        &format!(
            "SELECT {CHARGE_COLS} FROM pending_charges
             WHERE room_id=?1 AND invoice_id IS NULL AND settlement_id IS NULL
             ORDER BY cycle, id"
        ),
        &[&room_id],
    )
}

pub fn all_open_charges(conn: &Connection) -> Result<Vec<PendingCharge>> {
    query_charges(
        conn,
        &format!(
            "SELECT {CHARGE_COLS} FROM pending_charges
             WHERE invoice_id IS NULL AND settlement_id IS NULL
             ORDER BY room_id, cycle, id"
        ),
        &[],
    )
}

pub(crate) fn mark_invoiced(conn: &Connection, charge_ids: &[i64], invoice_id: i64) -> Result<()> {
    let mut stmt = conn.prepare(
        "UPDATE pending_charges SET invoice_id=?1
         WHERE id=?2 AND invoice_id IS NULL AND settlement_id IS NULL",
    )?;
    for id in charge_ids {
        stmt.execute(params![invoice_id, id])?;
    }
    Ok(())
}

pub(crate) fn mark_settled(
    conn: &Connection,
    charge_ids: &[i64],
    settlement_id: i64,
) -> Result<()> {
    let mut stmt = conn.prepare(
        "UPDATE pending_charges SET settlement_id=?1
         WHERE id=?2 AND invoice_id IS NULL AND settlement_id IS NULL",
    )?;
    for id in charge_ids {
        stmt.execute(params![settlement_id, id])?;
    }
    Ok(())
}
