// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;

use crate::billing::property::{self, DormUpdate};
use crate::models::DormPolicy;
use crate::utils::{
    arg, fmt_money, id_for_dorm, maybe_print_json, opt_arg, opt_decimal, parse_decimal,
    pretty_table,
};

fn parse_due_day(s: &str) -> Result<u32> {
    s.parse::<u32>()
        .map_err(|_| anyhow!("Invalid due day '{}', expected 1-28", s))
}

fn parse_bool(s: &str) -> Result<bool> {
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(anyhow!("Invalid boolean '{}'", other)),
    }
}

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let name = arg(sub, "name")?;
            let water = parse_decimal(arg(sub, "water-rate")?)?;
            let elec = parse_decimal(arg(sub, "electricity-rate")?)?;
            let mut policy = DormPolicy::default();
            if let Some(d) = opt_arg(sub, "due-day") {
                policy.payment_due_day = parse_due_day(d)?;
            }
            if let Some(fee) = opt_decimal(sub, "late-fee")? {
                policy.late_fee_per_day = fee;
            }
            policy.auto_apply_late_fee = sub.get_flag("auto-late-fee");
            property::create_dormitory(conn, name, water, elec, &policy)?;
            println!(
                "Added dormitory '{}' (water {}, electricity {}, due day {})",
                name, water, elec, policy.payment_due_day
            );
        }
        Some(("set", sub)) => {
            let name = arg(sub, "name")?;
            let id = id_for_dorm(conn, name)?;
            let update = DormUpdate {
                water_rate: opt_decimal(sub, "water-rate")?,
                electricity_rate: opt_decimal(sub, "electricity-rate")?,
                payment_due_day: opt_arg(sub, "due-day").map(parse_due_day).transpose()?,
                late_fee_per_day: opt_decimal(sub, "late-fee")?,
                auto_apply_late_fee: opt_arg(sub, "auto-late-fee").map(parse_bool).transpose()?,
            };
            let dorm = property::update_dormitory(conn, id, &update)?;
            println!(
                "Updated '{}': water {}, electricity {}, due day {}, late fee {}/day ({})",
                dorm.name,
                dorm.water_rate,
                dorm.electricity_rate,
                dorm.policy.payment_due_day,
                fmt_money(&dorm.policy.late_fee_per_day),
                if dorm.policy.auto_apply_late_fee { "auto" } else { "manual" }
            );
        }
        Some(("list", sub)) => {
            let dorms = property::list_dormitories(conn)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &dorms)? {
                return Ok(());
            }
            let data = dorms
                .iter()
                .map(|d| {
                    vec![
                        d.name.clone(),
                        d.water_rate.to_string(),
                        d.electricity_rate.to_string(),
                        d.policy.payment_due_day.to_string(),
                        fmt_money(&d.policy.late_fee_per_day),
                        d.policy.auto_apply_late_fee.to_string(),
                    ]
                })
                .collect();
            println!(
                "{}",
                pretty_table(
                    &["Name", "Water", "Electricity", "Due day", "Late fee/day", "Auto fee"],
                    data
                )
            );
        }
        _ => {}
    }
    Ok(())
}
