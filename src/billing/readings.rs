// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use super::{BillingError, Result, parse_cycle, parse_day, parse_dec};
use crate::error::is_unique_violation;
use crate::models::{BillingCycle, MeterKind, MeterReading};

#[derive(Debug, Clone)]
pub struct NewReading {
    pub room_id: i64,
    pub cycle: BillingCycle,
    pub kind: MeterKind,
    pub current: Decimal,
    /// Defaults to the meter's opening value, see [`opening_value`].
    pub previous: Option<Decimal>,
    pub read_on: NaiveDate,
    /// Meter was swapped; `previous` must then be the new meter's start value.
    pub replaced: bool,
}

const READING_COLS: &str = "id, room_id, cycle, kind, previous, current, read_on, replaced";

type ReadingRow = (i64, i64, String, String, String, String, String, bool);

fn reading_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<ReadingRow> {
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

fn decode(row: ReadingRow) -> Result<MeterReading> {
    let (id, room_id, cycle, kind, previous, current, read_on, replaced) = row;
    Ok(MeterReading {
        id,
        room_id,
        cycle: parse_cycle(&cycle)?,
        kind: kind
            .parse()
            .map_err(|_| BillingError::Corrupt(format!("unknown meter kind '{}'", kind)))?,
        previous: parse_dec(&previous, "previous reading")?,
        current: parse_dec(&current, "current reading")?,
        read_on: parse_day(&read_on, "read_on")?,
        replaced,
    })
}

/// Store a reading as given. Non-monotonic values are kept; they surface
/// as anomalies when the reading is billed.
pub fn record_reading(conn: &Connection, new: &NewReading) -> Result<MeterReading> {
    super::contracts::load_room(conn, new.room_id)?;
    if new.replaced && new.previous.is_none() {
        return Err(BillingError::Validation(
            "a replaced meter needs the new meter's starting value as previous".into(),
        ));
    }
    let previous = match new.previous {
        Some(p) => p,
        None => opening_value(conn, new.room_id, new.kind, Some(new.cycle))?.ok_or_else(|| {
            BillingError::Validation(format!(
                "no earlier {} reading for room {}; supply previous",
                new.kind, new.room_id
            ))
        })?,
    };
    if previous < Decimal::ZERO || new.current < Decimal::ZERO {
        return Err(BillingError::Validation("meter readings cannot be negative".into()));
    }
    if new.current < previous {
        tracing::warn!(
            room_id = new.room_id,
            cycle = %new.cycle,
            meter = %new.kind,
            %previous,
            current = %new.current,
            "reading below previous value recorded; billing will need review"
        );
    }
    let inserted = conn.execute(
        "INSERT INTO meter_readings(room_id, cycle, kind, previous, current, read_on, replaced)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            new.room_id,
            new.cycle.to_string(),
            new.kind.as_str(),
            previous.to_string(),
            new.current.to_string(),
            new.read_on.to_string(),
            new.replaced,
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(BillingError::Validation(format!(
                "{} reading for room {} cycle {} already recorded",
                new.kind, new.room_id, new.cycle
            )));
        }
        Err(e) => return Err(e.into()),
    }
    Ok(MeterReading {
        id: conn.last_insert_rowid(),
        room_id: new.room_id,
        cycle: new.cycle,
        kind: new.kind,
        previous,
        current: new.current,
        read_on: new.read_on,
        replaced: new.replaced,
    })
}

pub fn reading_for(
    conn: &Connection,
    room_id: i64,
    cycle: BillingCycle,
    kind: MeterKind,
) -> Result<MeterReading> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {READING_COLS} FROM meter_readings
                 WHERE room_id=?1 AND cycle=?2 AND kind=?3"
            ),
            params![room_id, cycle.to_string(), kind.as_str()],
            reading_row,
        )
        .optional()?;
    match row {
        Some(row) => decode(row),
        None => Err(BillingError::NotFound(format!(
            "{} reading for room {} cycle {}",
            kind, room_id, cycle
        ))),
    }
}

/// Most recent reading for the meter, optionally strictly before `before`.
pub fn latest_reading(
    conn: &Connection,
    room_id: i64,
    kind: MeterKind,
    before: Option<BillingCycle>,
) -> Result<Option<MeterReading>> {
    // "9999-12" sorts after every real cycle.
    let bound = before.map(|c| c.to_string()).unwrap_or_else(|| "9999-12".into());
    let row = conn
        .query_row(
            &format!(
                "SELECT {READING_COLS} FROM meter_readings
                 WHERE room_id=?1 AND kind=?2 AND cycle<?3 ORDER BY cycle DESC LIMIT 1"
            ),
            params![room_id, kind.as_str(), bound],
            reading_row,
        )
        .optional()?;
    row.map(decode).transpose()
}

/// Final value of the meter left by the room's most recently terminated
/// contract, optionally only contracts terminated by the end of `through`.
/// Returns the termination date alongside the value.
fn handover_value(
    conn: &Connection,
    room_id: i64,
    kind: MeterKind,
    through: Option<BillingCycle>,
) -> Result<Option<(NaiveDate, Decimal)>> {
    let column = match kind {
        MeterKind::Water => "final_water",
        MeterKind::Electricity => "final_electricity",
    };
    let bound = through
        .map(|c| c.last_day().to_string())
        .unwrap_or_else(|| "9999-12-31".into());
    let row: Option<(String, String)> = conn
        .query_row(
            &format!(
                "SELECT terminated_on, {column} FROM contracts
                 WHERE room_id=?1 AND status='terminated' AND {column} IS NOT NULL
                   AND terminated_on<=?2
                 ORDER BY terminated_on DESC, id DESC LIMIT 1"
            ),
            params![room_id, bound],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;
    match row {
        Some((on, value)) => {
            let on = parse_day(&on, "terminated_on")?;
            Ok(Some((on, parse_dec(&value, "final reading")?)))
        }
        None => Ok(None),
    }
}

/// The value a new reading of the meter starts from: the latest reading
/// before `cycle`, unless a contract on the room was settled on or after
/// that reading's date, in which case its final value wins.
pub fn opening_value(
    conn: &Connection,
    room_id: i64,
    kind: MeterKind,
    cycle: Option<BillingCycle>,
) -> Result<Option<Decimal>> {
    let reading = latest_reading(conn, room_id, kind, cycle)?;
    let handover = handover_value(conn, room_id, kind, cycle)?;
    Ok(match (reading, handover) {
        (Some(r), Some((settled_on, value))) if settled_on >= r.read_on => Some(value),
        (Some(r), _) => Some(r.current),
        (None, Some((_, value))) => Some(value),
        (None, None) => None,
    })
}

pub fn list_readings(conn: &Connection, room_id: Option<i64>) -> Result<Vec<MeterReading>> {
    let mut sql = format!("SELECT {READING_COLS} FROM meter_readings");
    let rows: Vec<ReadingRow> = if let Some(room) = room_id {
        sql.push_str(" WHERE room_id=?1 ORDER BY cycle DESC, kind");
        let mut stmt = conn.prepare(&sql)?;
        let mapped = stmt.query_map(params![room], reading_row)?;
        mapped.collect::<rusqlite::Result<_>>()?
    } else {
        sql.push_str(" ORDER BY room_id, cycle DESC, kind");
        let mut stmt = conn.prepare(&sql)?;
        let mapped = stmt.query_map([], reading_row)?;
        mapped.collect::<rusqlite::Result<_>>()?
    };
    rows.into_iter().map(decode).collect()
}
