// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rusqlite::Connection;

use crate::billing::invoices;
use crate::billing::ledger::{self, InvoiceFilter};
use crate::models::{Invoice, InvoiceStatus, LineItem};
use crate::utils::{
    arg, date_or_today, fmt_money, id_for_room, maybe_print_json, opt_arg, parse_cycle,
    parse_decimal, parse_id, pretty_table, room_from_args, room_label,
};

use super::charges::draft_from_args;

pub fn print_lines(lines: &[LineItem]) {
    let data = lines
        .iter()
        .map(|l| {
            vec![
                l.kind.to_string(),
                l.description.clone(),
                l.quantity.normalize().to_string(),
                l.unit_price.to_string(),
                fmt_money(&l.amount),
            ]
        })
        .collect();
    println!(
        "{}",
        pretty_table(&["Kind", "Description", "Qty", "Unit price", "Amount"], data)
    );
}

fn print_invoice(conn: &Connection, inv: &Invoice, as_of: NaiveDate) -> Result<()> {
    println!(
        "Invoice #{}  {}  cycle {}  issued {}  due {}  [{}]",
        inv.id,
        room_label(conn, inv.room_id)?,
        inv.cycle,
        inv.issue_date,
        inv.due_date,
        inv.status_on(as_of)
    );
    print_lines(&inv.lines);
    println!("Total: {}", fmt_money(&inv.total));
    if let Some(p) = &inv.payment {
        println!("Paid {} on {} by {}", fmt_money(&p.amount), p.paid_on, p.method);
    }
    Ok(())
}

fn print_summary(conn: &Connection, list: &[Invoice], as_of: NaiveDate) -> Result<()> {
    let mut data = Vec::new();
    for inv in list {
        data.push(vec![
            inv.id.to_string(),
            room_label(conn, inv.room_id)?,
            inv.cycle.to_string(),
            inv.due_date.to_string(),
            fmt_money(&inv.total),
            inv.status_on(as_of).to_string(),
        ]);
    }
    println!(
        "{}",
        pretty_table(&["Id", "Room", "Cycle", "Due", "Total", "Status"], data)
    );
    Ok(())
}

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("generate", sub)) => {
            let room_id = room_from_args(conn, sub)?;
            let cycle = parse_cycle(arg(sub, "cycle")?)?;
            let issued = date_or_today(sub, "issued")?;
            let inv = invoices::generate_monthly_invoice(conn, room_id, cycle, issued)?;
            print_invoice(conn, &inv, issued)?;
        }
        Some(("run", sub)) => {
            let cycle = parse_cycle(arg(sub, "cycle")?)?;
            let issued = date_or_today(sub, "issued")?;
            let outcomes = invoices::generate_cycle(conn, cycle, issued)?;
            let mut data = Vec::new();
            let mut failed = 0;
            for (room_id, res) in &outcomes {
                let room = room_label(conn, *room_id)?;
                match res {
                    Ok(inv) => data.push(vec![
                        room,
                        format!("#{}", inv.id),
                        fmt_money(&inv.total),
                    ]),
                    Err(e) if e.is_already_done() => {
                        data.push(vec![room, "skipped".into(), e.to_string()])
                    }
                    Err(e) => {
                        failed += 1;
                        data.push(vec![room, "failed".into(), e.to_string()]);
                    }
                }
            }
            println!("{}", pretty_table(&["Room", "Invoice", "Total / reason"], data));
            if failed > 0 {
                return Err(anyhow!("{} room(s) could not be invoiced for {}", failed, cycle));
            }
        }
        Some(("show", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let as_of = date_or_today(sub, "as-of")?;
            let inv = ledger::get_invoice(conn, id)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &inv)? {
                return Ok(());
            }
            print_invoice(conn, &inv, as_of)?;
        }
        Some(("list", sub)) => {
            let as_of = date_or_today(sub, "as-of")?;
            let room_id = match (opt_arg(sub, "dorm"), opt_arg(sub, "room")) {
                (Some(d), Some(r)) => Some(id_for_room(conn, d, r)?),
                (None, None) => None,
                _ => return Err(anyhow!("--dorm and --room must be given together")),
            };
            let filter = InvoiceFilter {
                room_id,
                contract_id: opt_arg(sub, "contract").map(parse_id).transpose()?,
                status: opt_arg(sub, "status")
                    .map(|s| s.parse::<InvoiceStatus>())
                    .transpose()?,
                from: opt_arg(sub, "from").map(parse_cycle).transpose()?,
                to: opt_arg(sub, "to").map(parse_cycle).transpose()?,
            };
            let list = ledger::list_invoices(conn, &filter, as_of)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &list)? {
                return Ok(());
            }
            print_summary(conn, &list, as_of)?;
        }
        Some(("pay", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let amount = parse_decimal(arg(sub, "amount")?)?;
            let method = arg(sub, "method")?;
            let on = date_or_today(sub, "date")?;
            let inv = invoices::record_payment(conn, id, amount, method, on)?;
            println!(
                "Invoice #{} paid ({} via {} on {})",
                inv.id,
                fmt_money(&amount),
                method,
                on
            );
            if on > inv.due_date {
                println!("Paid {} day(s) late", inv.days_overdue(on));
            }
        }
        Some(("correct", sub)) => {
            let id = parse_id(arg(sub, "id")?)?;
            let draft = draft_from_args(sub)?;
            let cycle = opt_arg(sub, "cycle").map(parse_cycle).transpose()?;
            let charge = invoices::add_correction(conn, id, draft, cycle)?;
            println!("Queued correction #{} against invoice #{}", charge, id);
        }
        Some(("overdue", sub)) => {
            let as_of = date_or_today(sub, "as-of")?;
            let list = invoices::overdue_invoices(conn, as_of)?;
            if maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &list)? {
                return Ok(());
            }
            let mut data = Vec::new();
            for inv in &list {
                data.push(vec![
                    inv.id.to_string(),
                    room_label(conn, inv.room_id)?,
                    inv.cycle.to_string(),
                    inv.due_date.to_string(),
                    inv.days_overdue(as_of).to_string(),
                    fmt_money(&inv.total),
                ]);
            }
            println!(
                "{}",
                pretty_table(&["Id", "Room", "Cycle", "Due", "Days late", "Total"], data)
            );
        }
        _ => {}
    }
    Ok(())
}
