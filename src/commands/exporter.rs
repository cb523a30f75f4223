// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use std::path::Path;

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use serde_json::json;

use crate::billing::ledger::{self, InvoiceFilter};
use crate::models::LineItem;
use crate::utils::{arg, room_label, today};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("receipts", sub)) => {
            let fmt = arg(sub, "format")?.to_lowercase();
            let out = arg(sub, "out")?;
            let n = export_receipts(conn, &fmt, Path::new(out))?;
            println!("Exported {} receipt(s) to {}", n, out);
            Ok(())
        }
        _ => Ok(()),
    }
}

const CSV_HEADER: [&str; 12] = [
    "document",
    "document_id",
    "room",
    "period",
    "date",
    "position",
    "kind",
    "description",
    "quantity",
    "unit_price",
    "amount",
    "ref_invoice_id",
];

fn line_record(
    doc: &str,
    id: i64,
    room: &str,
    period: &str,
    date: &str,
    pos: usize,
    l: &LineItem,
) -> [String; 12] {
    [
        doc.to_string(),
        id.to_string(),
        room.to_string(),
        period.to_string(),
        date.to_string(),
        pos.to_string(),
        l.kind.to_string(),
        l.description.clone(),
        l.quantity.to_string(),
        l.unit_price.to_string(),
        l.amount.to_string(),
        l.ref_invoice_id.map(|i| i.to_string()).unwrap_or_default(),
    ]
}

/// Write every invoice and settlement to `out` as `csv` (one row per line
/// item) or `json` (one object per document). Returns the document count.
pub fn export_receipts(conn: &Connection, format: &str, out: &Path) -> Result<usize> {
    let invoices = ledger::list_invoices(conn, &InvoiceFilter::default(), today())?;
    let settlements = ledger::list_settlements(conn)?;
    let count = invoices.len() + settlements.len();

    match format {
        "csv" => {
            let mut wtr = csv::Writer::from_path(out)?;
            wtr.write_record(CSV_HEADER)?;
            for inv in &invoices {
                let room = room_label(conn, inv.room_id)?;
                let period = inv.cycle.to_string();
                let date = inv.issue_date.to_string();
                for (pos, l) in inv.lines.iter().enumerate() {
                    let record = line_record("invoice", inv.id, &room, &period, &date, pos, l);
                    wtr.write_record(record)?;
                }
            }
            for s in &settlements {
                let room = room_label(conn, s.room_id)?;
                let date = s.settled_on.to_string();
                for (pos, l) in s.lines.iter().enumerate() {
                    wtr.write_record(line_record("settlement", s.id, &room, "", &date, pos, l))?;
                }
            }
            wtr.flush()?;
        }
        "json" => {
            let mut items = Vec::with_capacity(count);
            for inv in &invoices {
                items.push(json!({
                    "document": "invoice",
                    "room": room_label(conn, inv.room_id)?,
                    "invoice": inv,
                }));
            }
            for s in &settlements {
                items.push(json!({
                    "document": "settlement",
                    "room": room_label(conn, s.room_id)?,
                    "outcome": s.outcome(),
                    "settlement": s,
                }));
            }
            std::fs::write(out, serde_json::to_string_pretty(&items)?)?;
        }
        other => return Err(anyhow!("Unknown format: {} (use csv|json)", other)),
    }
    tracing::info!(documents = count, path = %out.display(), format, "receipts exported");
    Ok(count)
}
