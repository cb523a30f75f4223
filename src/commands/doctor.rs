// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use rusqlite::Connection;

use crate::billing::ledger::{self, InvoiceFilter};
use crate::billing::{charges, contracts, lines, readings, usage};
use crate::utils::{pretty_table, today};

/// Integrity findings as `(issue, detail)` pairs.
pub fn find_issues(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut issues = Vec::new();

    // 1) Document totals must equal the sum of their lines
    for inv in ledger::list_invoices(conn, &InvoiceFilter::default(), today())? {
        let sum = lines::total(&inv.lines)?;
        if sum != inv.total {
            issues.push((
                "invoice_total_mismatch".into(),
                format!("invoice #{}: total {} vs lines {}", inv.id, inv.total, sum),
            ));
        }
    }
    for s in ledger::list_settlements(conn)? {
        let sum = lines::total(&s.lines)?;
        let balanced = s.gross_charges.checked_sub(s.held_funds) == Some(s.net_amount);
        if sum != s.net_amount || !balanced {
            issues.push((
                "settlement_unbalanced".into(),
                format!(
                    "settlement #{}: gross {} - held {} vs net {} (lines {})",
                    s.id, s.gross_charges, s.held_funds, s.net_amount, sum
                ),
            ));
        }
    }

    // 2) Unbillable readings still waiting for an invoice
    for r in readings::list_readings(conn, None)? {
        if usage::reading_usage(&r).is_err()
            && ledger::invoice_exists(conn, r.room_id, r.cycle)?.is_none()
        {
            issues.push((
                "meter_anomaly".into(),
                format!(
                    "room {} {} {}: {} -> {}",
                    r.room_id, r.cycle, r.kind, r.previous, r.current
                ),
            ));
        }
    }

    // 3) Open charges on rooms nobody occupies
    let occupied = contracts::occupied_rooms(conn)?;
    for c in charges::all_open_charges(conn)? {
        if !occupied.contains(&c.room_id) {
            issues.push((
                "orphan_charge".into(),
                format!(
                    "charge #{} '{}' on vacant room {}",
                    c.id, c.line.description, c.room_id
                ),
            ));
        }
    }
    Ok(issues)
}

pub fn handle(conn: &Connection) -> Result<()> {
    let issues = find_issues(conn)?;
    if issues.is_empty() {
        println!("✅ doctor: no issues found");
    } else {
        let rows = issues.into_iter().map(|(i, d)| vec![i, d]).collect();
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}
