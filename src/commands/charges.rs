// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::billing::charges;
use crate::models::{LineDraft, LineKind};
use crate::utils::{
    arg, maybe_print_json, opt_decimal, parse_cycle, parse_decimal, pretty_table, room_from_args,
    room_label,
};

/// `--kind --description --amount [--quantity]` as a line draft.
pub fn draft_from_args(sub: &clap::ArgMatches) -> Result<LineDraft> {
    let kind: LineKind = arg(sub, "kind")?.parse()?;
    Ok(LineDraft::new(
        kind,
        arg(sub, "description")?,
        opt_decimal(sub, "quantity")?.unwrap_or(Decimal::ONE),
        parse_decimal(arg(sub, "amount")?)?,
    ))
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let room_id = room_from_args(conn, sub)?;
            let cycle = parse_cycle(arg(sub, "cycle")?)?;
            let draft = draft_from_args(sub)?;
            let id = charges::add_charge(conn, room_id, cycle, &draft)?;
            println!(
                "Queued charge #{} '{}' for {} from {}",
                id,
                draft.description,
                room_label(conn, room_id)?,
                cycle
            );
        }
        Some(("list", sub)) => {
            let open = charges::all_open_charges(conn)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &open)? {
                return Ok(());
            }
            let mut data = Vec::new();
            for c in &open {
                data.push(vec![
                    c.id.to_string(),
                    room_label(conn, c.room_id)?,
                    c.cycle.to_string(),
                    c.line.kind.to_string(),
                    c.line.description.clone(),
                    c.line.quantity.to_string(),
                    c.line.unit_price.to_string(),
                ]);
            }
            println!(
                "{}",
                pretty_table(
                    &["Id", "Room", "From cycle", "Kind", "Description", "Qty", "Unit price"],
                    data
                )
            );
        }
        _ => {}
    }
    Ok(())
}
