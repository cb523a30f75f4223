// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde_json::json;

use crate::billing::ledger;
use crate::billing::settlement::{self, FinalReading, SettlementRequest};
use crate::models::{LineItem, MeterKind, SettlementOutcome};
use crate::utils::{
    arg, fmt_money, maybe_print_json, opt_decimal, parse_adjustment, parse_date, parse_decimal,
    parse_id, room_label,
};

use super::invoices::print_lines;

fn request_from_args(sub: &clap::ArgMatches) -> Result<SettlementRequest> {
    let adjustments = sub
        .get_many::<String>("adjust")
        .map(|vals| vals.map(|s| parse_adjustment(s)).collect::<Result<Vec<_>>>())
        .transpose()?
        .unwrap_or_default();
    Ok(SettlementRequest {
        termination_date: parse_date(arg(sub, "date")?)?,
        final_readings: vec![
            FinalReading {
                kind: MeterKind::Water,
                current: parse_decimal(arg(sub, "water")?)?,
                previous: opt_decimal(sub, "water-previous")?,
            },
            FinalReading {
                kind: MeterKind::Electricity,
                current: parse_decimal(arg(sub, "electricity")?)?,
                previous: opt_decimal(sub, "electricity-previous")?,
            },
        ],
        adjustments,
    })
}

fn outcome_line(net: Decimal) -> String {
    if net > Decimal::ZERO {
        format!("Tenant owes {}", fmt_money(&net))
    } else if net < Decimal::ZERO {
        format!("Refund due to tenant: {}", fmt_money(&-net))
    } else {
        "Settled even".to_string()
    }
}

fn print_settlement(header: &str, gross: Decimal, held: Decimal, net: Decimal, lines: &[LineItem]) {
    println!("{}", header);
    print_lines(lines);
    println!("Gross charges: {}", fmt_money(&gross));
    println!("Held funds:    {}", fmt_money(&held));
    println!("Net:           {}", fmt_money(&net));
    println!("{}", outcome_line(net));
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("run", sub)) => {
            let contract_id = parse_id(arg(sub, "contract")?)?;
            let req = request_from_args(sub)?;
            let s = settlement::compute_settlement(conn, contract_id, &req)?;
            let header = format!(
                "Settlement #{} for contract #{} ({}) on {}",
                s.id,
                s.contract_id,
                room_label(conn, s.room_id)?,
                s.settled_on
            );
            print_settlement(&header, s.gross_charges, s.held_funds, s.net_amount, &s.lines);
        }
        Some(("preview", sub)) => {
            let contract_id = parse_id(arg(sub, "contract")?)?;
            let req = request_from_args(sub)?;
            let s = settlement::preview_settlement(conn, contract_id, &req)?;
            let payload = json!({
                "contract_id": s.contract_id,
                "room_id": s.room_id,
                "settled_on": s.settled_on,
                "gross_charges": s.gross_charges,
                "held_funds": s.held_funds,
                "net_amount": s.net_amount,
                "lines": s.lines,
            });
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &payload)? {
                return Ok(());
            }
            let header = format!(
                "Preview for contract #{} ({}) on {} (nothing saved)",
                s.contract_id,
                room_label(conn, s.room_id)?,
                s.settled_on
            );
            print_settlement(&header, s.gross_charges, s.held_funds, s.net_amount, &s.lines);
        }
        Some(("show", sub)) => {
            let s = match (sub.get_one::<String>("id"), sub.get_one::<String>("contract")) {
                (Some(id), _) => ledger::get_settlement(conn, parse_id(id)?)?,
                (None, Some(c)) => {
                    let contract_id = parse_id(c)?;
                    ledger::settlement_for_contract(conn, contract_id)?
                        .ok_or_else(|| anyhow!("Contract {} has no settlement", contract_id))?
                }
                (None, None) => return Err(anyhow!("Pass --id or --contract")),
            };
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
                return Ok(());
            }
            let header = format!(
                "Settlement #{} for contract #{} ({}) on {} [{}]",
                s.id,
                s.contract_id,
                room_label(conn, s.room_id)?,
                s.settled_on,
                match s.outcome() {
                    SettlementOutcome::TenantOwes => "tenant owes",
                    SettlementOutcome::RefundDue => "refund due",
                    SettlementOutcome::Even => "even",
                }
            );
            print_settlement(&header, s.gross_charges, s.held_funds, s.net_amount, &s.lines);
        }
        _ => {}
    }
    Ok(())
}
