// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;

use crate::billing::readings::{self, NewReading};
use crate::models::MeterKind;
use crate::utils::{
    arg, date_or_today, id_for_room, maybe_print_json, opt_arg, opt_decimal, parse_cycle,
    parse_decimal, pretty_table, room_from_args, room_label,
};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let room_id = room_from_args(conn, sub)?;
            let kind: MeterKind = arg(sub, "kind")?.parse()?;
            let new = NewReading {
                room_id,
                cycle: parse_cycle(arg(sub, "cycle")?)?,
                kind,
                current: parse_decimal(arg(sub, "current")?)?,
                previous: opt_decimal(sub, "previous")?,
                read_on: date_or_today(sub, "date")?,
                replaced: sub.get_flag("replaced"),
            };
            let r = readings::record_reading(conn, &new)?;
            println!(
                "Recorded {} reading for {} {}: {} -> {}",
                r.kind,
                room_label(conn, room_id)?,
                r.cycle,
                r.previous,
                r.current
            );
            if r.current < r.previous {
                eprintln!(
                    "warning: meter went backwards; invoicing this cycle will fail until corrected"
                );
            }
        }
        Some(("list", sub)) => {
            let room_id = match (opt_arg(sub, "dorm"), opt_arg(sub, "room")) {
                (Some(d), Some(r)) => Some(id_for_room(conn, d, r)?),
                (None, None) => None,
                _ => return Err(anyhow!("--dorm and --room must be given together")),
            };
            let list = readings::list_readings(conn, room_id)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &list)? {
                return Ok(());
            }
            let mut data = Vec::new();
            for r in &list {
                data.push(vec![
                    room_label(conn, r.room_id)?,
                    r.cycle.to_string(),
                    r.kind.to_string(),
                    r.previous.to_string(),
                    r.current.to_string(),
                    r.read_on.to_string(),
                    if r.replaced { "yes".into() } else { String::new() },
                ]);
            }
            println!(
                "{}",
                pretty_table(
                    &["Room", "Cycle", "Meter", "Previous", "Current", "Read on", "Replaced"],
                    data
                )
            );
        }
        _ => {}
    }
    Ok(())
}
