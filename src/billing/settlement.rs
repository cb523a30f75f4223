// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Move-out settlement.
//!
//! Charges are the prorated final rent, the final utilities, every unpaid
//! invoice of the contract (plus late fees where the policy applies them),
//! the room's unconsumed pending charges and the manual adjustments. The
//! deposit and advance are then returned as two refund lines, so the lines
//! always add up to the signed net amount.
//!
//! Every cycle before the termination month must already be invoiced; a
//! gap is rejected rather than folded in.

use chrono::NaiveDate;
use rusqlite::{Connection, TransactionBehavior};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ledger::{self, NewSettlement};
use super::{BillingError, Result, charges, contracts, invoices, lines, rates, readings};
use crate::models::{
    BillingCycle, Contract, ContractStatus, Invoice, LineDraft, LineKind, MeterKind, Settlement,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReading {
    pub kind: MeterKind,
    pub current: Decimal,
    /// Defaults to the meter's latest known value.
    pub previous: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub termination_date: NaiveDate,
    pub final_readings: Vec<FinalReading>,
    pub adjustments: Vec<LineDraft>,
}

struct Assembled {
    settlement: NewSettlement,
    charge_ids: Vec<i64>,
    final_water: Decimal,
    final_electricity: Decimal,
}

fn credit(v: Decimal) -> Decimal {
    if v.is_zero() { Decimal::ZERO } else { -v }
}

fn final_reading(
    conn: &Connection,
    contract: &Contract,
    req: &SettlementRequest,
    kind: MeterKind,
) -> Result<(Decimal, Decimal)> {
    let fr = req
        .final_readings
        .iter()
        .find(|r| r.kind == kind)
        .ok_or_else(|| BillingError::Validation(format!("final {} reading is required", kind)))?;
    let previous = match fr.previous {
        Some(p) => p,
        None => readings::opening_value(conn, contract.room_id, kind, None)?
            .ok_or_else(|| {
                BillingError::Validation(format!(
                    "no recorded {} reading for room {}; supply previous",
                    kind, contract.room_id
                ))
            })?,
    };
    Ok((previous, fr.current))
}

/// Cycles from the contract start up to, not including, `period` that have
/// no invoice.
fn unbilled_cycles(
    contract: &Contract,
    billed: &[Invoice],
    period: BillingCycle,
) -> Vec<BillingCycle> {
    let mut missing = Vec::new();
    let mut c = BillingCycle::containing(contract.start_date);
    while c < period {
        if !billed.iter().any(|inv| inv.cycle == c) {
            missing.push(c);
        }
        c = c.next();
    }
    missing
}

fn assemble(conn: &Connection, contract: &Contract, req: &SettlementRequest) -> Result<Assembled> {
    let end = req.termination_date;
    if end < contract.start_date {
        return Err(BillingError::Validation(format!(
            "termination date {} precedes contract start {}",
            end, contract.start_date
        )));
    }
    let rates = rates::resolve(conn, contract.id)?;
    let policy = contracts::policy_for_room(conn, contract.room_id)?;
    let period = BillingCycle::containing(end);
    let billed = ledger::invoices_for_contract(conn, contract.id)?;
    let missing = unbilled_cycles(contract, &billed, period);
    if !missing.is_empty() {
        let cycles: Vec<String> = missing.iter().map(|c| c.to_string()).collect();
        return Err(BillingError::Validation(format!(
            "contract {} has uninvoiced cycles {}; invoice them before settling",
            contract.id,
            cycles.join(", ")
        )));
    }

    let mut drafts = Vec::new();
    // Final month is prorated unless it was already invoiced.
    if !billed.iter().any(|inv| inv.cycle == period) {
        drafts.push(invoices::rent_draft(&rates, period, contract.start_date, end));
    }

    // An anomaly here aborts the whole settlement.
    let (water_prev, water_now) = final_reading(conn, contract, req, MeterKind::Water)?;
    let (elec_prev, elec_now) = final_reading(conn, contract, req, MeterKind::Electricity)?;
    drafts.push(invoices::utility_draft(MeterKind::Water, water_prev, water_now, &rates, true)?);
    drafts.push(invoices::utility_draft(
        MeterKind::Electricity,
        elec_prev,
        elec_now,
        &rates,
        true,
    )?);

    // Unpaid invoices are read inside the caller's transaction.
    for inv in billed.iter().filter(|inv| inv.payment.is_none()) {
        let description = format!("Unpaid invoice #{} ({})", inv.id, inv.cycle);
        let draft = if inv.total < Decimal::ZERO {
            LineDraft::flat(LineKind::Discount, description, inv.total)
        } else {
            LineDraft::flat(LineKind::CarryOver, description, inv.total)
        };
        drafts.push(draft.referencing(inv.id));
        if let Some(fee) = invoices::late_fee_for(inv, end, &policy) {
            drafts.push(fee);
        }
    }
    let pending = charges::open_charges(conn, contract.room_id)?;
    drafts.extend(pending.iter().map(|c| c.line.clone()));

    drafts.extend(req.adjustments.iter().cloned());

    let mut items = lines::build_lines(&drafts)?;
    let gross_charges = lines::total(&items)?;

    let offsets = lines::build_lines(&[
        LineDraft::flat(LineKind::Refund, "Security deposit returned", credit(rates.deposit)),
        LineDraft::flat(LineKind::Refund, "Advance payment returned", credit(rates.advance)),
    ])?;
    let held_funds = credit(lines::total(&offsets)?);
    items.extend(offsets);
    let net_amount = lines::total(&items)?;
    debug_assert_eq!(Some(net_amount), gross_charges.checked_sub(held_funds));

    Ok(Assembled {
        settlement: NewSettlement {
            contract_id: contract.id,
            room_id: contract.room_id,
            settled_on: end,
            gross_charges,
            held_funds,
            net_amount,
            lines: items,
        },
        charge_ids: pending.iter().map(|c| c.id).collect(),
        final_water: water_now,
        final_electricity: elec_now,
    })
}

fn ensure_settleable(conn: &Connection, contract_id: i64) -> Result<Contract> {
    if ledger::settlement_for_contract(conn, contract_id)?.is_some() {
        tracing::warn!(contract_id, "settlement already exists");
        return Err(BillingError::AlreadySettled { contract_id });
    }
    let contract = contracts::load_contract(conn, contract_id)?;
    if contract.status != ContractStatus::Active {
        return Err(BillingError::Validation(format!(
            "contract {} is {} without a settlement",
            contract_id,
            contract.status.as_str()
        )));
    }
    Ok(contract)
}

/// Compute the settlement without writing anything.
pub fn preview_settlement(
    conn: &Connection,
    contract_id: i64,
    req: &SettlementRequest,
) -> Result<NewSettlement> {
    let contract = ensure_settleable(conn, contract_id)?;
    Ok(assemble(conn, &contract, req)?.settlement)
}

/// Settle and terminate `contract_id`. Write-once: a second call fails with
/// [`BillingError::AlreadySettled`]. Either everything is stored (settlement,
/// lines, contract termination, consumed charges) or nothing is.
pub fn compute_settlement(
    conn: &mut Connection,
    contract_id: i64,
    req: &SettlementRequest,
) -> Result<Settlement> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let contract = ensure_settleable(&tx, contract_id)?;
    let assembled = assemble(&tx, &contract, req)?;

    contracts::terminate(
        &tx,
        contract_id,
        req.termination_date,
        assembled.final_water,
        assembled.final_electricity,
    )?;
    let id = ledger::insert_settlement(&tx, &assembled.settlement)?;
    charges::mark_settled(&tx, &assembled.charge_ids, id)?;
    let settlement = ledger::get_settlement(&tx, id)?;
    tx.commit()?;
    tracing::info!(
        settlement_id = id,
        contract_id,
        net = %settlement.net_amount,
        "contract settled"
    );
    Ok(settlement)
}
