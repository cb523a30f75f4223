// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Receipt ledger: finalized invoices, payments and settlements.
//!
//! There is no update or delete here, and the schema triggers reject both.
//! Corrections are new documents that reference the original by id.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use super::{BillingError, Result, lines, parse_cycle, parse_day, parse_dec};
use crate::error::is_unique_violation;
use crate::models::{BillingCycle, Invoice, InvoiceStatus, LineItem, Payment, Settlement};

#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub contract_id: i64,
    pub room_id: i64,
    pub cycle: BillingCycle,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<LineItem>,
}

#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub contract_id: i64,
    pub room_id: i64,
    pub settled_on: NaiveDate,
    pub gross_charges: Decimal,
    pub held_funds: Decimal,
    pub net_amount: Decimal,
    pub lines: Vec<LineItem>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub room_id: Option<i64>,
    pub contract_id: Option<i64>,
    pub status: Option<InvoiceStatus>,
    pub from: Option<BillingCycle>,
    pub to: Option<BillingCycle>,
}

fn insert_lines(
    conn: &Connection,
    table: &str,
    fk: &str,
    doc_id: i64,
    items: &[LineItem],
) -> Result<()> {
    let mut stmt = conn.prepare(&format!(
        "INSERT INTO {table}({fk}, position, kind, description, quantity, unit_price, amount,
                             ref_invoice_id)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"
    ))?;
    for (pos, l) in items.iter().enumerate() {
        stmt.execute(params![
            doc_id,
            pos as i64,
            l.kind.as_str(),
            l.description,
            l.quantity.to_string(),
            l.unit_price.to_string(),
            l.amount.to_string(),
            l.ref_invoice_id,
        ])?;
    }
    Ok(())
}

fn load_lines(conn: &Connection, table: &str, fk: &str, doc_id: i64) -> Result<Vec<LineItem>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT kind, description, quantity, unit_price, amount, ref_invoice_id
         FROM {table} WHERE {fk}=?1 ORDER BY position"
    ))?;
    let rows = stmt.query_map(params![doc_id], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, Option<i64>>(5)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (kind, description, qty, price, amount, ref_invoice_id) = row?;
        out.push(LineItem {
            kind: kind.parse().map_err(|_| {
                BillingError::Corrupt(format!("unknown line kind '{}' in {}", kind, table))
            })?,
            description,
            quantity: parse_dec(&qty, "quantity")?,
            unit_price: parse_dec(&price, "unit price")?,
            amount: parse_dec(&amount, "amount")?,
            ref_invoice_id,
        });
    }
    Ok(out)
}

/// Append an invoice. The `(room_id, cycle)` uniqueness constraint is
/// the final word on duplicates.
pub fn insert_invoice(conn: &Connection, new: &NewInvoice) -> Result<i64> {
    let total = lines::total(&new.lines)?;
    let inserted = conn.execute(
        "INSERT INTO invoices(contract_id, room_id, cycle, issue_date, due_date, total)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            new.contract_id,
            new.room_id,
            new.cycle.to_string(),
            new.issue_date.to_string(),
            new.due_date.to_string(),
            total.to_string(),
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(BillingError::DuplicateInvoice {
                room_id: new.room_id,
                cycle: new.cycle.to_string(),
            });
        }
        Err(e) => return Err(e.into()),
    }
    let id = conn.last_insert_rowid();
    insert_lines(conn, "invoice_lines", "invoice_id", id, &new.lines)?;
    Ok(id)
}

pub fn invoice_exists(conn: &Connection, room_id: i64, cycle: BillingCycle) -> Result<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM invoices WHERE room_id=?1 AND cycle=?2",
            params![room_id, cycle.to_string()],
            |r| r.get(0),
        )
        .optional()?)
}

const INVOICE_SELECT: &str =
    "SELECT i.id, i.contract_id, i.room_id, i.cycle, i.issue_date, i.due_date, i.total,
            p.amount, p.method, p.paid_on
     FROM invoices i LEFT JOIN payments p ON p.invoice_id=i.id";

type InvoiceRow = (
    i64,
    i64,
    i64,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn invoice_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<InvoiceRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
        r.get(7)?,
        r.get(8)?,
        r.get(9)?,
    ))
}

fn decode_invoice(conn: &Connection, row: InvoiceRow) -> Result<Invoice> {
    let (id, contract_id, room_id, cycle, issue, due, total, p_amount, p_method, p_on) = row;
    let payment = match (p_amount, p_method, p_on) {
        (Some(amount), Some(method), Some(on)) => Some(Payment {
            invoice_id: id,
            amount: parse_dec(&amount, "payment amount")?,
            method,
            paid_on: parse_day(&on, "paid_on")?,
        }),
        _ => None,
    };
    Ok(Invoice {
        id,
        contract_id,
        room_id,
        cycle: parse_cycle(&cycle)?,
        issue_date: parse_day(&issue, "issue_date")?,
        due_date: parse_day(&due, "due_date")?,
        lines: load_lines(conn, "invoice_lines", "invoice_id", id)?,
        total: parse_dec(&total, "invoice total")?,
        payment,
    })
}

pub fn get_invoice(conn: &Connection, id: i64) -> Result<Invoice> {
    let row = conn
        .query_row(
            &format!("{INVOICE_SELECT} WHERE i.id=?1"),
            params![id],
            invoice_row,
        )
        .optional()?
        .ok_or_else(|| BillingError::NotFound(format!("invoice {}", id)))?;
    decode_invoice(conn, row)
}

/// Invoices matching `filter`; status is evaluated as of `today`.
pub fn list_invoices(
    conn: &Connection,
    filter: &InvoiceFilter,
    today: NaiveDate,
) -> Result<Vec<Invoice>> {
    let mut sql = format!("{INVOICE_SELECT} WHERE 1=1");
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
    if let Some(room) = filter.room_id {
        sql.push_str(" AND i.room_id=?");
        args.push(Box::new(room));
    }
    if let Some(contract) = filter.contract_id {
        sql.push_str(" AND i.contract_id=?");
        args.push(Box::new(contract));
    }
    if let Some(from) = filter.from {
        sql.push_str(" AND i.cycle>=?");
        args.push(Box::new(from.to_string()));
    }
    if let Some(to) = filter.to {
        sql.push_str(" AND i.cycle<=?");
        args.push(Box::new(to.to_string()));
    }
    match filter.status {
        Some(InvoiceStatus::Paid) => sql.push_str(" AND p.id IS NOT NULL"),
        Some(_) => sql.push_str(" AND p.id IS NULL"),
        None => {}
    }
    sql.push_str(" ORDER BY i.cycle, i.room_id, i.id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
        invoice_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        let inv = decode_invoice(conn, row?)?;
        if filter.status.is_none_or(|s| inv.status_on(today) == s) {
            out.push(inv);
        }
    }
    Ok(out)
}

pub fn invoices_for_contract(conn: &Connection, contract_id: i64) -> Result<Vec<Invoice>> {
    let mut stmt = conn.prepare(&format!(
        "{INVOICE_SELECT} WHERE i.contract_id=?1 ORDER BY i.cycle, i.id"
    ))?;
    let rows = stmt.query_map(params![contract_id], invoice_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_invoice(conn, row?)?);
    }
    Ok(out)
}

pub fn invoices_for_room(
    conn: &Connection,
    room_id: i64,
    from: BillingCycle,
    to: BillingCycle,
) -> Result<Vec<Invoice>> {
    let mut stmt = conn.prepare(&format!(
        "{INVOICE_SELECT} WHERE i.room_id=?1 AND i.cycle>=?2 AND i.cycle<=?3 ORDER BY i.cycle, i.id"
    ))?;
    let rows = stmt.query_map(
        params![room_id, from.to_string(), to.to_string()],
        invoice_row,
    )?;
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_invoice(conn, row?)?);
    }
    Ok(out)
}

/// Append a payment. One payment per invoice, enforced by the schema.
pub fn insert_payment(conn: &Connection, payment: &Payment) -> Result<()> {
    let inserted = conn.execute(
        "INSERT INTO payments(invoice_id, amount, method, paid_on) VALUES (?1,?2,?3,?4)",
        params![
            payment.invoice_id,
            payment.amount.to_string(),
            payment.method,
            payment.paid_on.to_string(),
        ],
    );
    match inserted {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => Err(BillingError::AlreadyPaid {
            invoice_id: payment.invoice_id,
        }),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_settlement(conn: &Connection, new: &NewSettlement) -> Result<i64> {
    let inserted = conn.execute(
        "INSERT INTO settlements(contract_id, room_id, settled_on, gross_charges, held_funds,
                                 net_amount)
         VALUES (?1,?2,?3,?4,?5,?6)",
        params![
            new.contract_id,
            new.room_id,
            new.settled_on.to_string(),
            new.gross_charges.to_string(),
            new.held_funds.to_string(),
            new.net_amount.to_string(),
        ],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(BillingError::AlreadySettled {
                contract_id: new.contract_id,
            });
        }
        Err(e) => return Err(e.into()),
    }
    let id = conn.last_insert_rowid();
    insert_lines(conn, "settlement_lines", "settlement_id", id, &new.lines)?;
    Ok(id)
}

const SETTLEMENT_SELECT: &str =
    "SELECT id, contract_id, room_id, settled_on, gross_charges, held_funds, net_amount
     FROM settlements";

type SettlementRow = (i64, i64, i64, String, String, String, String);

fn settlement_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SettlementRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
    ))
}

fn decode_settlement(conn: &Connection, row: SettlementRow) -> Result<Settlement> {
    let (id, contract_id, room_id, on, gross, held, net) = row;
    Ok(Settlement {
        id,
        contract_id,
        room_id,
        settled_on: parse_day(&on, "settled_on")?,
        gross_charges: parse_dec(&gross, "gross charges")?,
        held_funds: parse_dec(&held, "held funds")?,
        net_amount: parse_dec(&net, "net amount")?,
        lines: load_lines(conn, "settlement_lines", "settlement_id", id)?,
    })
}

pub fn get_settlement(conn: &Connection, id: i64) -> Result<Settlement> {
    let row = conn
        .query_row(
            &format!("{SETTLEMENT_SELECT} WHERE id=?1"),
            params![id],
            settlement_row,
        )
        .optional()?
        .ok_or_else(|| BillingError::NotFound(format!("settlement {}", id)))?;
    decode_settlement(conn, row)
}

pub fn settlement_for_contract(conn: &Connection, contract_id: i64) -> Result<Option<Settlement>> {
    let row = conn
        .query_row(
            &format!("{SETTLEMENT_SELECT} WHERE contract_id=?1"),
            params![contract_id],
            settlement_row,
        )
        .optional()?;
    row.map(|r| decode_settlement(conn, r)).transpose()
}

pub fn list_settlements(conn: &Connection) -> Result<Vec<Settlement>> {
    let mut stmt = conn.prepare(&format!("{SETTLEMENT_SELECT} ORDER BY settled_on, id"))?;
    let rows = stmt.query_map([], settlement_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(decode_settlement(conn, row?)?);
    }
    Ok(out)
}
