// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

use crate::models::{BillingCycle, LineDraft, LineKind};

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}

pub fn parse_cycle(s: &str) -> Result<BillingCycle> {
    s.trim()
        .parse::<BillingCycle>()
        .with_context(|| format!("Invalid billing cycle '{}', expected YYYY-MM", s))
}

pub fn parse_decimal(s: &str) -> Result<Decimal> {
    s.trim()
        .parse::<Decimal>()
        .with_context(|| format!("Invalid decimal '{}'", s))
}

pub fn parse_id(s: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .with_context(|| format!("Invalid id '{}'", s))
}

/// Required string argument, trimmed.
pub fn arg<'a>(sub: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    sub.get_one::<String>(name)
        .map(|s| s.trim())
        .ok_or_else(|| anyhow!("Missing --{}", name))
}

pub fn opt_arg<'a>(sub: &'a clap::ArgMatches, name: &str) -> Option<&'a str> {
    sub.get_one::<String>(name)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

pub fn opt_decimal(sub: &clap::ArgMatches, name: &str) -> Result<Option<Decimal>> {
    opt_arg(sub, name).map(parse_decimal).transpose()
}

/// `--as-of` or `--date` style argument, defaulting to today.
pub fn date_or_today(sub: &clap::ArgMatches, name: &str) -> Result<NaiveDate> {
    match opt_arg(sub, name) {
        Some(s) => parse_date(s),
        None => Ok(today()),
    }
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Parse `kind:description:amount` (unit price with quantity 1).
pub fn parse_adjustment(s: &str) -> Result<LineDraft> {
    let mut parts = s.splitn(3, ':');
    let (Some(kind), Some(desc), Some(amount)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(anyhow!(
            "Invalid adjustment '{}', expected kind:description:amount",
            s
        ));
    };
    let kind: LineKind = kind.parse()?;
    let amount = parse_decimal(amount)?;
    Ok(LineDraft::flat(kind, desc.trim(), amount))
}

pub fn fmt_money(d: &Decimal) -> String {
    format!("{:.2}", d)
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn id_for_dorm(conn: &Connection, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM dormitories WHERE name=?1")?;
    let id: i64 = stmt
        .query_row(params![name], |r| r.get(0))
        .with_context(|| format!("Dormitory '{}' not found", name))?;
    Ok(id)
}

pub fn id_for_room(conn: &Connection, dorm: &str, number: &str) -> Result<i64> {
    let dorm_id = id_for_dorm(conn, dorm)?;
    let mut stmt = conn.prepare("SELECT id FROM rooms WHERE dormitory_id=?1 AND number=?2")?;
    let id: i64 = stmt
        .query_row(params![dorm_id, number], |r| r.get(0))
        .with_context(|| format!("Room '{}' not found in '{}'", number, dorm))?;
    Ok(id)
}

/// `--dorm` + `--room` pair resolved to a room id.
pub fn room_from_args(conn: &Connection, sub: &clap::ArgMatches) -> Result<i64> {
    id_for_room(conn, arg(sub, "dorm")?, arg(sub, "room")?)
}

/// Display label `Dorm/Number` for a room id.
pub fn room_label(conn: &Connection, room_id: i64) -> Result<String> {
    let label: String = conn
        .query_row(
            "SELECT d.name || '/' || r.number
             FROM rooms r JOIN dormitories d ON r.dormitory_id=d.id WHERE r.id=?1",
            params![room_id],
            |r| r.get(0),
        )
        .with_context(|| format!("Room {} not found", room_id))?;
    Ok(label)
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}
