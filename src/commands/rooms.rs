// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::billing::property;
use crate::utils::{
    arg, fmt_money, id_for_dorm, maybe_print_json, opt_arg, opt_decimal, parse_decimal,
    pretty_table, room_label,
};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let dorm = arg(sub, "dorm")?;
            let number = arg(sub, "room")?;
            let dorm_id = id_for_dorm(conn, dorm)?;
            let rent = parse_decimal(arg(sub, "rent")?)?;
            let deposit = opt_decimal(sub, "deposit")?.unwrap_or(Decimal::ZERO);
            let advance = opt_decimal(sub, "advance")?.unwrap_or(Decimal::ZERO);
            property::create_room(conn, dorm_id, number, rent, deposit, advance)?;
            println!(
                "Added room {}/{} (rent {}, deposit {}, advance {})",
                dorm,
                number,
                fmt_money(&rent),
                fmt_money(&deposit),
                fmt_money(&advance)
            );
        }
        Some(("list", sub)) => {
            let dorm_id = opt_arg(sub, "dorm").map(|d| id_for_dorm(conn, d)).transpose()?;
            let rooms = property::list_rooms(conn, dorm_id)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &rooms)? {
                return Ok(());
            }
            let mut data = Vec::new();
            for r in &rooms {
                data.push(vec![
                    room_label(conn, r.id)?,
                    fmt_money(&r.monthly_rent),
                    fmt_money(&r.deposit),
                    fmt_money(&r.advance),
                ]);
            }
            println!(
                "{}",
                pretty_table(&["Room", "Rent", "Deposit", "Advance"], data)
            );
        }
        _ => {}
    }
    Ok(())
}
