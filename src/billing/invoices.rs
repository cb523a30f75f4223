// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Monthly invoice generation and the invoice lifecycle.
//!
//! Per (room, cycle) the state moves `no invoice -> pending -> paid`, with
//! `overdue` derived at read time from the due date. Issued invoices are
//! never edited: late fees and corrections become pending charges that
//! land on a later document.

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;

use super::ledger::{self, InvoiceFilter, NewInvoice};
use super::{BillingError, Result, charges, contracts, lines, rates, readings, usage};
use crate::models::{
    BillingCycle, DormPolicy, Invoice, InvoiceStatus, LineDraft, LineKind, MeterKind, Payment,
    RateTable,
};

/// Outcome of one room in a batch run.
pub type RoomOutcome = (i64, Result<Invoice>);

/// Payment is due on the policy's due day of the month after the cycle.
pub fn due_date_for(cycle: BillingCycle, policy: &DormPolicy) -> NaiveDate {
    cycle.next().day_clamped(policy.payment_due_day)
}

/// Rent for the part of `cycle` between `from` and `to` (inclusive).
/// Full cycles bill the flat monthly rent; partial ones are prorated by day.
pub fn rent_draft(
    rates: &RateTable,
    cycle: BillingCycle,
    from: NaiveDate,
    to: NaiveDate,
) -> LineDraft {
    let from = from.max(cycle.first_day());
    let to = to.min(cycle.last_day());
    let occupied = ((to - from).num_days() + 1).max(0);
    let period = i64::from(cycle.days());
    if occupied >= period {
        return LineDraft::flat(LineKind::Rent, format!("Rent {}", cycle), rates.monthly_rent);
    }
    LineDraft::new(
        LineKind::Rent,
        format!("Rent {} ({}/{} days)", cycle, occupied, period),
        Decimal::from(occupied) / Decimal::from(period),
        rates.monthly_rent,
    )
}

pub fn late_fee_draft(invoice: &Invoice, days_overdue: i64, fee_per_day: Decimal) -> LineDraft {
    LineDraft::new(
        LineKind::Fine,
        format!(
            "Late fee for invoice #{} ({}, {} days)",
            invoice.id, invoice.cycle, days_overdue
        ),
        Decimal::from(days_overdue),
        fee_per_day,
    )
    .referencing(invoice.id)
}

/// The late fee owed for `invoice` when it is closed on `closed_on`, if the
/// policy applies one.
pub fn late_fee_for(
    invoice: &Invoice,
    closed_on: NaiveDate,
    policy: &DormPolicy,
) -> Option<LineDraft> {
    let days = invoice.days_overdue(closed_on);
    if !policy.auto_apply_late_fee || days == 0 || policy.late_fee_per_day <= Decimal::ZERO {
        return None;
    }
    Some(late_fee_draft(invoice, days, policy.late_fee_per_day))
}

fn meter_draft(
    kind: MeterKind,
    label: &str,
    previous: Decimal,
    current: Decimal,
    rates: &RateTable,
) -> Result<LineDraft> {
    let units = usage::usage_units(kind, previous, current)?;
    Ok(LineDraft::new(
        kind.line_kind(),
        format!("{} {} -> {}", label, previous, current),
        units,
        rates.unit_price(kind),
    ))
}

pub(crate) fn utility_draft(
    kind: MeterKind,
    previous: Decimal,
    current: Decimal,
    rates: &RateTable,
    final_reading: bool,
) -> Result<LineDraft> {
    let label = match (kind, final_reading) {
        (MeterKind::Water, false) => "Water",
        (MeterKind::Electricity, false) => "Electricity",
        (MeterKind::Water, true) => "Final water",
        (MeterKind::Electricity, true) => "Final electricity",
    };
    meter_draft(kind, label, previous, current, rates)
}

/// Generate the invoice for `room_id` and `cycle`.
///
/// Fails with [`BillingError::DuplicateInvoice`] when one already exists and
/// with [`BillingError::MeterAnomaly`] when a reading went backwards. Nothing
/// is written unless every line validates.
pub fn generate_monthly_invoice(
    conn: &mut Connection,
    room_id: i64,
    cycle: BillingCycle,
    issue_date: NaiveDate,
) -> Result<Invoice> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    if let Some(existing) = ledger::invoice_exists(&tx, room_id, cycle)? {
        tracing::warn!(room_id, %cycle, invoice_id = existing, "invoice already generated");
        return Err(BillingError::DuplicateInvoice {
            room_id,
            cycle: cycle.to_string(),
        });
    }
    let contract = contracts::active_contract_for_room(&tx, room_id)?;
    if contract.start_date > cycle.last_day() {
        return Err(BillingError::Validation(format!(
            "contract {} starts {} after cycle {}",
            contract.id, contract.start_date, cycle
        )));
    }
    let rates = rates::resolve(&tx, contract.id)?;
    let policy = contracts::policy_for_room(&tx, room_id)?;

    let mut drafts = vec![rent_draft(&rates, cycle, contract.start_date, cycle.last_day())];
    for kind in MeterKind::ALL {
        let reading = readings::reading_for(&tx, room_id, cycle, kind)?;
        drafts.push(utility_draft(kind, reading.previous, reading.current, &rates, false)?);
    }
    let pending = charges::open_charges_through(&tx, room_id, cycle)?;
    drafts.extend(pending.iter().map(|c| c.line.clone()));

    let items = lines::build_lines(&drafts)?;
    let new = NewInvoice {
        contract_id: contract.id,
        room_id,
        cycle,
        issue_date,
        due_date: due_date_for(cycle, &policy),
        lines: items,
    };
    let id = ledger::insert_invoice(&tx, &new)?;
    let charge_ids: Vec<i64> = pending.iter().map(|c| c.id).collect();
    charges::mark_invoiced(&tx, &charge_ids, id)?;
    let invoice = ledger::get_invoice(&tx, id)?;
    tx.commit()?;
    tracing::info!(invoice_id = id, room_id, %cycle, total = %invoice.total, "invoice generated");
    Ok(invoice)
}

/// Run the generator for every occupied room. One room's failure does not
/// stop the others; each outcome is reported.
pub fn generate_cycle(
    conn: &mut Connection,
    cycle: BillingCycle,
    issue_date: NaiveDate,
) -> Result<Vec<RoomOutcome>> {
    let rooms = contracts::occupied_rooms(conn)?;
    let mut out = Vec::with_capacity(rooms.len());
    for room_id in rooms {
        let res = generate_monthly_invoice(conn, room_id, cycle, issue_date);
        if let Err(e) = &res {
            if !e.is_already_done() {
                tracing::warn!(room_id, %cycle, error = %e, "invoice not generated");
            }
        }
        out.push((room_id, res));
    }
    Ok(out)
}

/// Record the single full payment that closes `invoice_id`.
///
/// Payment after the due date queues a late fee for the cycle following the
/// payment month when the dormitory applies late fees automatically. Once the
/// contract is settled its unpaid invoices are owed through the settlement,
/// so they no longer accept payments.
pub fn record_payment(
    conn: &mut Connection,
    invoice_id: i64,
    amount: Decimal,
    method: &str,
    paid_on: NaiveDate,
) -> Result<Invoice> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let invoice = ledger::get_invoice(&tx, invoice_id)?;
    if invoice.payment.is_some() {
        return Err(BillingError::AlreadyPaid { invoice_id });
    }
    if ledger::settlement_for_contract(&tx, invoice.contract_id)?.is_some() {
        tracing::warn!(
            invoice_id,
            contract_id = invoice.contract_id,
            "payment on settled contract"
        );
        return Err(BillingError::AlreadySettled {
            contract_id: invoice.contract_id,
        });
    }
    if amount > invoice.total {
        return Err(BillingError::Overpayment {
            invoice_id,
            total: invoice.total,
            amount,
        });
    }
    if amount < invoice.total {
        return Err(BillingError::Validation(format!(
            "partial payments are not supported: invoice {} total is {}, got {}",
            invoice_id, invoice.total, amount
        )));
    }
    if method.trim().is_empty() {
        return Err(BillingError::Validation("payment method is required".into()));
    }
    if paid_on < invoice.issue_date {
        return Err(BillingError::Validation(format!(
            "payment date {} precedes issue date {}",
            paid_on, invoice.issue_date
        )));
    }

    ledger::insert_payment(
        &tx,
        &Payment {
            invoice_id,
            amount,
            method: method.trim().to_string(),
            paid_on,
        },
    )?;
    let policy = contracts::policy_for_room(&tx, invoice.room_id)?;
    if let Some(fee) = late_fee_for(&invoice, paid_on, &policy) {
        let target = BillingCycle::containing(paid_on).next();
        charges::add_charge(&tx, invoice.room_id, target, &fee)?;
    }
    let paid = ledger::get_invoice(&tx, invoice_id)?;
    tx.commit()?;
    tracing::info!(invoice_id, %amount, %paid_on, "payment recorded");
    Ok(paid)
}

/// Queue a correction for an issued invoice. It lands on the first invoice
/// generated for `cycle` (default: the cycle after the original) or later.
pub fn add_correction(
    conn: &Connection,
    invoice_id: i64,
    draft: LineDraft,
    cycle: Option<BillingCycle>,
) -> Result<i64> {
    let original = ledger::get_invoice(conn, invoice_id)?;
    let target = cycle.unwrap_or_else(|| original.cycle.next());
    if target <= original.cycle {
        return Err(BillingError::Validation(format!(
            "a correction to invoice {} must land after cycle {}",
            invoice_id, original.cycle
        )));
    }
    charges::add_charge(conn, original.room_id, target, &draft.referencing(invoice_id))
}

/// Read-time overdue sweep.
pub fn overdue_invoices(conn: &Connection, today: NaiveDate) -> Result<Vec<Invoice>> {
    ledger::list_invoices(
        conn,
        &InvoiceFilter {
            status: Some(InvoiceStatus::Overdue),
            ..Default::default()
        },
        today,
    )
}
