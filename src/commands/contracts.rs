// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use crate::billing::contracts::{self, NewContract};
use crate::billing::rates::{self, RateOverrides};
use crate::utils::{
    arg, fmt_money, maybe_print_json, opt_arg, opt_decimal, parse_date, parse_id, pretty_table,
    room_from_args, room_label,
};

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => {
            let room_id = room_from_args(conn, sub)?;
            let new = NewContract {
                room_id,
                tenant: arg(sub, "tenant")?.to_string(),
                start_date: parse_date(arg(sub, "start")?)?,
                end_date: opt_arg(sub, "end").map(parse_date).transpose()?,
                overrides: RateOverrides {
                    water_rate: opt_decimal(sub, "water-rate")?,
                    electricity_rate: opt_decimal(sub, "electricity-rate")?,
                    monthly_rent: opt_decimal(sub, "rent")?,
                    deposit: opt_decimal(sub, "deposit")?,
                    advance: opt_decimal(sub, "advance")?,
                },
            };
            let (contract, table) = contracts::create_contract(conn, &new)?;
            println!(
                "Contract #{} for {} in {} from {} (rent {}, deposit {}, advance {})",
                contract.id,
                contract.tenant,
                room_label(conn, room_id)?,
                contract.start_date,
                fmt_money(&table.monthly_rent),
                fmt_money(&table.deposit),
                fmt_money(&table.advance)
            );
        }
        Some(("list", sub)) => {
            let list = contracts::list_contracts(conn, sub.get_flag("active"))?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &list)? {
                return Ok(());
            }
            let mut data = Vec::new();
            for c in &list {
                data.push(vec![
                    c.id.to_string(),
                    room_label(conn, c.room_id)?,
                    c.tenant.clone(),
                    c.start_date.to_string(),
                    c.status.as_str().to_string(),
                    c.terminated_on.map(|d| d.to_string()).unwrap_or_default(),
                ]);
            }
            println!(
                "{}",
                pretty_table(&["Id", "Room", "Tenant", "Start", "Status", "Terminated"], data)
            );
        }
        Some(("rates", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let table = rates::resolve(conn, id)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &table)? {
                return Ok(());
            }
            let data = vec![
                vec!["Monthly rent".into(), fmt_money(&table.monthly_rent)],
                vec!["Water / unit".into(), table.water_rate.to_string()],
                vec!["Electricity / unit".into(), table.electricity_rate.to_string()],
                vec!["Deposit".into(), fmt_money(&table.deposit)],
                vec!["Advance".into(), fmt_money(&table.advance)],
                vec!["Effective from".into(), table.effective_from.to_string()],
                vec![
                    "Effective to".into(),
                    table.effective_to.map(|d| d.to_string()).unwrap_or_else(|| "-".into()),
                ],
            ];
            println!("{}", pretty_table(&["Term", "Value"], data));
        }
        _ => {}
    }
    Ok(())
}
