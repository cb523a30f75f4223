// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use dormbill::billing::contracts::{self, NewContract};
use dormbill::billing::rates::RateOverrides;
use dormbill::billing::readings::{self, NewReading};
use dormbill::billing::settlement::{self, FinalReading, SettlementRequest};
use dormbill::billing::{BillingError, charges, invoices, ledger, property};
use dormbill::db;
use dormbill::models::{
    BillingCycle, ContractStatus, DormPolicy, Invoice, LineDraft, LineKind, MeterKind,
    SettlementOutcome,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn day(y: i32, m: u32, dd: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, dd).unwrap()
}

fn cycle(s: &str) -> BillingCycle {
    s.parse().unwrap()
}

/// Dorm with water 20/unit and electricity 10/unit; returns (conn, room, contract).
fn setup(rent: &str, deposit: &str, start: NaiveDate) -> (Connection, i64, i64) {
    setup_with(rent, deposit, "0", start, DormPolicy::default())
}

fn setup_with(
    rent: &str,
    deposit: &str,
    advance: &str,
    start: NaiveDate,
    policy: DormPolicy,
) -> (Connection, i64, i64) {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let dorm = property::create_dormitory(&conn, "South", d("20"), d("10"), &policy).unwrap();
    let room = property::create_room(&conn, dorm, "201", d(rent), d(deposit), d(advance)).unwrap();
    let contract = sign(&mut conn, room, "Eli", start);
    (conn, room, contract)
}

fn sign(conn: &mut Connection, room: i64, tenant: &str, start: NaiveDate) -> i64 {
    let (contract, _) = contracts::create_contract(
        conn,
        &NewContract {
            room_id: room,
            tenant: tenant.into(),
            start_date: start,
            end_date: None,
            overrides: RateOverrides::default(),
        },
    )
    .unwrap();
    contract.id
}

fn read(conn: &Connection, room: i64, c: &str, kind: MeterKind, prev: Option<&str>, cur: &str) {
    let cycle = cycle(c);
    readings::record_reading(
        conn,
        &NewReading {
            room_id: room,
            cycle,
            kind,
            current: d(cur),
            previous: prev.map(d),
            read_on: cycle.last_day(),
            replaced: false,
        },
    )
    .unwrap();
}

/// October invoiced at flat rent with no usage, issued 2025-11-01.
fn invoiced_october(conn: &mut Connection, room: i64) -> Invoice {
    read(conn, room, "2025-10", MeterKind::Water, Some("100"), "100");
    read(conn, room, "2025-10", MeterKind::Electricity, Some("500"), "500");
    invoices::generate_monthly_invoice(conn, room, cycle("2025-10"), day(2025, 11, 1)).unwrap()
}

fn measured_finals(water: &str, elec: &str) -> Vec<FinalReading> {
    vec![
        FinalReading {
            kind: MeterKind::Water,
            previous: None,
            current: d(water),
        },
        FinalReading {
            kind: MeterKind::Electricity,
            previous: None,
            current: d(elec),
        },
    ]
}

fn finals(water: (&str, &str), elec: (&str, &str)) -> Vec<FinalReading> {
    vec![
        FinalReading {
            kind: MeterKind::Water,
            previous: Some(d(water.0)),
            current: d(water.1),
        },
        FinalReading {
            kind: MeterKind::Electricity,
            previous: Some(d(elec.0)),
            current: d(elec.1),
        },
    ]
}

fn settlement_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM settlements", [], |r| r.get(0))
        .unwrap()
}

#[test]
fn refund_when_deposit_exceeds_charges() {
    let (mut conn, _room, contract) = setup("3100", "3000", day(2025, 10, 1));
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: finals(("100", "105"), ("500", "520")),
        adjustments: vec![],
    };
    let s = settlement::compute_settlement(&mut conn, contract, &req).unwrap();

    assert_eq!(s.gross_charges, d("1300"));
    assert_eq!(s.held_funds, d("3000"));
    assert_eq!(s.net_amount, d("-1700"));
    assert_eq!(s.outcome(), SettlementOutcome::RefundDue);
    let sum: Decimal = s.lines.iter().map(|l| l.amount).sum();
    assert_eq!(sum, d("-1700"));
    let rent = s.lines.iter().find(|l| l.kind == LineKind::Rent).unwrap();
    assert_eq!(rent.amount, d("1000"));

    let c = contracts::load_contract(&conn, contract).unwrap();
    assert_eq!(c.status, ContractStatus::Terminated);
    assert_eq!(c.terminated_on, Some(day(2025, 10, 10)));
    assert_eq!(c.final_water, Some(d("105")));
    assert_eq!(c.final_electricity, Some(d("520")));
}

#[test]
fn tenant_owes_with_carry_over_and_damages() {
    let (mut conn, room, contract) = setup("3000", "2000", day(2025, 10, 1));
    let promo = LineDraft::flat(LineKind::Discount, "Move-in promo", d("-500"));
    charges::add_charge(&conn, room, cycle("2025-10"), &promo).unwrap();
    let oct = invoiced_october(&mut conn, room);
    assert_eq!(oct.total, d("2500"));

    let req = SettlementRequest {
        termination_date: day(2025, 11, 15),
        final_readings: measured_finals("110", "520"),
        adjustments: vec![LineDraft::flat(LineKind::Fine, "Damaged desk", d("500"))],
    };
    let s = settlement::compute_settlement(&mut conn, contract, &req).unwrap();

    assert_eq!(s.gross_charges, d("4900"));
    assert_eq!(s.held_funds, d("2000"));
    assert_eq!(s.net_amount, d("2900"));
    assert_eq!(s.outcome(), SettlementOutcome::TenantOwes);
    let carry = s.lines.iter().find(|l| l.kind == LineKind::CarryOver).unwrap();
    assert_eq!(carry.amount, d("2500"));
    assert_eq!(carry.ref_invoice_id, Some(oct.id));
    let rent = s.lines.iter().find(|l| l.kind == LineKind::Rent).unwrap();
    assert_eq!(rent.amount, d("1500"));
    let sum: Decimal = s.lines.iter().map(|l| l.amount).sum();
    assert_eq!(sum, s.net_amount);
    assert!(s.lines.iter().all(|l| !l.kind.is_credit() || l.amount <= Decimal::ZERO));

    // the carried invoice itself is left as issued
    assert!(ledger::get_invoice(&conn, oct.id).unwrap().payment.is_none());
}

#[test]
fn settlement_is_write_once() {
    let (mut conn, _room, contract) = setup("3100", "3000", day(2025, 10, 1));
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: finals(("100", "105"), ("500", "520")),
        adjustments: vec![],
    };
    let first = settlement::compute_settlement(&mut conn, contract, &req).unwrap();
    let err = settlement::compute_settlement(&mut conn, contract, &req).unwrap_err();
    assert!(matches!(err, BillingError::AlreadySettled { contract_id } if contract_id == contract));
    assert!(err.is_already_done());
    assert_eq!(settlement_count(&conn), 1);
    assert_eq!(
        ledger::settlement_for_contract(&conn, contract).unwrap().unwrap(),
        first
    );
}

#[test]
fn backwards_final_reading_leaves_contract_active() {
    let (mut conn, _room, contract) = setup("3100", "3000", day(2025, 10, 1));
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: finals(("100", "105"), ("500", "480")),
        adjustments: vec![],
    };
    let err = settlement::compute_settlement(&mut conn, contract, &req).unwrap_err();
    assert!(matches!(err, BillingError::MeterAnomaly { meter: MeterKind::Electricity, .. }));
    assert_eq!(settlement_count(&conn), 0);
    let c = contracts::load_contract(&conn, contract).unwrap();
    assert_eq!(c.status, ContractStatus::Active);
}

#[test]
fn missing_final_reading_is_rejected() {
    let (mut conn, _room, contract) = setup("3100", "3000", day(2025, 10, 1));
    let mut readings = finals(("100", "105"), ("500", "520"));
    readings.pop();
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: readings,
        adjustments: vec![],
    };
    let err = settlement::compute_settlement(&mut conn, contract, &req).unwrap_err();
    assert!(matches!(err, BillingError::Validation(_)));
    assert_eq!(settlement_count(&conn), 0);
}

#[test]
fn preview_writes_nothing() {
    let (conn, room, contract) = setup("3100", "3000", day(2025, 10, 1));
    let key = LineDraft::flat(LineKind::Service, "Key copy", d("40"));
    charges::add_charge(&conn, room, cycle("2025-10"), &key).unwrap();
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: finals(("100", "105"), ("500", "520")),
        adjustments: vec![],
    };
    let preview = settlement::preview_settlement(&conn, contract, &req).unwrap();
    assert_eq!(preview.net_amount, d("-1660"));
    assert_eq!(settlement_count(&conn), 0);
    assert_eq!(charges::open_charges(&conn, room).unwrap().len(), 1);
    assert_eq!(
        contracts::load_contract(&conn, contract).unwrap().status,
        ContractStatus::Active
    );
}

#[test]
fn open_charges_are_consumed_by_the_settlement() {
    let (mut conn, room, contract) = setup("3100", "3000", day(2025, 10, 1));
    let key = LineDraft::flat(LineKind::Service, "Key copy", d("40"));
    charges::add_charge(&conn, room, cycle("2025-12"), &key).unwrap();
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: finals(("100", "105"), ("500", "520")),
        adjustments: vec![LineDraft::flat(LineKind::Discount, "Goodwill", d("-60"))],
    };
    let s = settlement::compute_settlement(&mut conn, contract, &req).unwrap();
    assert_eq!(s.gross_charges, d("1280"));
    assert_eq!(s.net_amount, d("-1720"));
    assert!(charges::open_charges(&conn, room).unwrap().is_empty());
}

#[test]
fn invoicing_stops_after_settlement() {
    let (mut conn, room, contract) = setup("3100", "3000", day(2025, 10, 1));
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: finals(("100", "105"), ("500", "520")),
        adjustments: vec![],
    };
    settlement::compute_settlement(&mut conn, contract, &req).unwrap();
    let err =
        invoices::generate_monthly_invoice(&mut conn, room, cycle("2025-10"), day(2025, 11, 1))
            .unwrap_err();
    assert!(matches!(err, BillingError::NotFound(_)));
}

#[test]
fn advance_is_returned_as_its_own_refund_line() {
    let (mut conn, _room, contract) =
        setup_with("3100", "3000", "500", day(2025, 10, 1), DormPolicy::default());
    let req = SettlementRequest {
        termination_date: day(2025, 10, 10),
        final_readings: finals(("100", "105"), ("500", "520")),
        adjustments: vec![],
    };
    let s = settlement::compute_settlement(&mut conn, contract, &req).unwrap();

    assert_eq!(s.gross_charges, d("1300"));
    assert_eq!(s.held_funds, d("3500"));
    assert_eq!(s.net_amount, d("-2200"));
    let refunds: Vec<Decimal> = s
        .lines
        .iter()
        .filter(|l| l.kind == LineKind::Refund)
        .map(|l| l.amount)
        .collect();
    assert_eq!(refunds, vec![d("-3000"), d("-500")]);
    let sum: Decimal = s.lines.iter().map(|l| l.amount).sum();
    assert_eq!(sum, s.net_amount);
}

#[test]
fn overdue_carry_over_gets_a_late_fee() {
    let policy = DormPolicy {
        payment_due_day: 5,
        late_fee_per_day: d("50"),
        auto_apply_late_fee: true,
    };
    let (mut conn, room, contract) = setup_with("3000", "2000", "0", day(2025, 10, 1), policy);
    let oct = invoiced_october(&mut conn, room);
    assert_eq!(oct.due_date, day(2025, 11, 5));

    let req = SettlementRequest {
        termination_date: day(2025, 11, 15),
        final_readings: measured_finals("110", "520"),
        adjustments: vec![],
    };
    let s = settlement::compute_settlement(&mut conn, contract, &req).unwrap();

    let fee = s.lines.iter().find(|l| l.kind == LineKind::Fine).unwrap();
    assert_eq!(fee.quantity, d("10"));
    assert_eq!(fee.amount, d("500"));
    assert_eq!(fee.ref_invoice_id, Some(oct.id));
    // 1500 rent + 200 water + 200 electricity + 3000 carried + 500 fee
    assert_eq!(s.gross_charges, d("5400"));
    assert_eq!(s.net_amount, d("3400"));
    let sum: Decimal = s.lines.iter().map(|l| l.amount).sum();
    assert_eq!(sum, s.net_amount);
}

#[test]
fn carried_invoice_refuses_payment_after_settlement() {
    let policy = DormPolicy {
        payment_due_day: 5,
        late_fee_per_day: d("50"),
        auto_apply_late_fee: true,
    };
    let (mut conn, room, contract) = setup_with("3000", "2000", "0", day(2025, 10, 1), policy);
    let oct = invoiced_october(&mut conn, room);
    let req = SettlementRequest {
        termination_date: day(2025, 11, 15),
        final_readings: measured_finals("110", "520"),
        adjustments: vec![],
    };
    settlement::compute_settlement(&mut conn, contract, &req).unwrap();

    let err =
        invoices::record_payment(&mut conn, oct.id, d("3000"), "cash", day(2025, 11, 20))
            .unwrap_err();
    assert!(matches!(err, BillingError::AlreadySettled { contract_id } if contract_id == contract));
    assert!(ledger::get_invoice(&conn, oct.id).unwrap().payment.is_none());
    assert!(charges::open_charges(&conn, room).unwrap().is_empty());
}

#[test]
fn uninvoiced_month_blocks_settlement() {
    let (mut conn, room, contract) = setup("3100", "3000", day(2025, 7, 1));
    read(&conn, room, "2025-07", MeterKind::Water, Some("100"), "115");
    read(&conn, room, "2025-07", MeterKind::Electricity, Some("500"), "540");
    let req = SettlementRequest {
        termination_date: day(2025, 8, 10),
        final_readings: measured_finals("125", "560"),
        adjustments: vec![],
    };

    let err = settlement::preview_settlement(&conn, contract, &req).unwrap_err();
    assert!(matches!(&err, BillingError::Validation(msg) if msg.contains("2025-07")));
    let err = settlement::compute_settlement(&mut conn, contract, &req).unwrap_err();
    assert!(matches!(err, BillingError::Validation(_)));
    assert_eq!(settlement_count(&conn), 0);
    assert_eq!(
        contracts::load_contract(&conn, contract).unwrap().status,
        ContractStatus::Active
    );

    invoices::generate_monthly_invoice(&mut conn, room, cycle("2025-07"), day(2025, 8, 1)).unwrap();
    assert!(settlement::compute_settlement(&mut conn, contract, &req).is_ok());
}

#[test]
fn next_tenant_starts_from_the_settled_meter_values() {
    let (mut conn, room, first) = setup("3100", "3000", day(2025, 7, 1));
    read(&conn, room, "2025-07", MeterKind::Water, Some("100"), "115");
    read(&conn, room, "2025-07", MeterKind::Electricity, Some("500"), "540");
    invoices::generate_monthly_invoice(&mut conn, room, cycle("2025-07"), day(2025, 8, 1)).unwrap();
    let req = SettlementRequest {
        termination_date: day(2025, 8, 10),
        final_readings: measured_finals("125", "560"),
        adjustments: vec![],
    };
    let s = settlement::compute_settlement(&mut conn, first, &req).unwrap();
    let water = s.lines.iter().find(|l| l.kind == LineKind::Water).unwrap();
    assert_eq!(water.quantity, d("10"));

    sign(&mut conn, room, "Noa", day(2025, 8, 11));
    read(&conn, room, "2025-08", MeterKind::Water, None, "130");
    read(&conn, room, "2025-08", MeterKind::Electricity, None, "570");
    let aug = readings::reading_for(&conn, room, cycle("2025-08"), MeterKind::Water).unwrap();
    assert_eq!(aug.previous, d("125"));

    let invoice =
        invoices::generate_monthly_invoice(&mut conn, room, cycle("2025-08"), day(2025, 9, 1))
            .unwrap();
    let water = invoice.lines.iter().find(|l| l.kind == LineKind::Water).unwrap();
    assert_eq!(water.quantity, d("5"));
    let elec = invoice.lines.iter().find(|l| l.kind == LineKind::Electricity).unwrap();
    assert_eq!(elec.quantity, d("10"));

    // the new tenant's own reading now supersedes the handover value
    let opening = readings::opening_value(&conn, room, MeterKind::Water, None).unwrap();
    assert_eq!(opening, Some(d("130")));
}
