// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use dormbill::billing::contracts::{self, NewContract};
use dormbill::billing::ledger::{self, InvoiceFilter};
use dormbill::billing::rates::RateOverrides;
use dormbill::billing::readings::{self, NewReading};
use dormbill::billing::{invoices, property};
use dormbill::db;
use dormbill::models::{BillingCycle, DormPolicy, InvoiceStatus, MeterKind};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tempfile::tempdir;

fn day(y: i32, m: u32, dd: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, dd).unwrap()
}

fn billed_room(conn: &mut Connection, number: &str, c: &str) -> i64 {
    let dorm = match dormbill::utils::id_for_dorm(conn, "West") {
        Ok(id) => id,
        Err(_) => {
            let (water, elec) = (Decimal::from(18), Decimal::from(7));
            property::create_dormitory(conn, "West", water, elec, &DormPolicy::default()).unwrap()
        }
    };
    let rent = Decimal::from(3000);
    let room =
        property::create_room(conn, dorm, number, rent, Decimal::ZERO, Decimal::ZERO).unwrap();
    contracts::create_contract(
        conn,
        &NewContract {
            room_id: room,
            tenant: format!("Tenant {}", number),
            start_date: day(2025, 1, 1),
            end_date: None,
            overrides: RateOverrides::default(),
        },
    )
    .unwrap();
    let cycle: BillingCycle = c.parse().unwrap();
    for kind in MeterKind::ALL {
        readings::record_reading(
            conn,
            &NewReading {
                room_id: room,
                cycle,
                kind,
                current: Decimal::from(10),
                previous: Some(Decimal::ZERO),
                read_on: cycle.last_day(),
                replaced: false,
            },
        )
        .unwrap();
    }
    invoices::generate_monthly_invoice(conn, room, cycle, cycle.next().first_day()).unwrap();
    room
}

#[test]
fn issued_documents_cannot_be_edited_or_deleted() {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    billed_room(&mut conn, "1", "2025-03");

    assert!(conn.execute("UPDATE invoices SET total='0'", []).is_err());
    assert!(conn.execute("DELETE FROM invoices", []).is_err());
    assert!(conn.execute("UPDATE invoice_lines SET amount='0'", []).is_err());
    assert!(conn.execute("DELETE FROM invoice_lines", []).is_err());

    let total: String = conn
        .query_row("SELECT total FROM invoices", [], |r| r.get(0))
        .unwrap();
    assert_eq!(total, "3250");
}

#[test]
fn rate_snapshots_are_frozen() {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    billed_room(&mut conn, "1", "2025-03");
    assert!(conn
        .execute("UPDATE rate_tables SET monthly_rent='1'", [])
        .is_err());
}

#[test]
fn filters_by_room_cycle_and_status() {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let a = billed_room(&mut conn, "1", "2025-03");
    let b = billed_room(&mut conn, "2", "2025-04");

    let all = ledger::list_invoices(&conn, &InvoiceFilter::default(), day(2025, 4, 1)).unwrap();
    assert_eq!(all.len(), 2);

    let only_a = ledger::list_invoices(
        &conn,
        &InvoiceFilter {
            room_id: Some(a),
            ..Default::default()
        },
        day(2025, 4, 1),
    )
    .unwrap();
    assert_eq!(only_a.len(), 1);
    assert_eq!(only_a[0].room_id, a);

    // March is due 2025-04-05, April 2025-05-05
    let overdue = ledger::list_invoices(
        &conn,
        &InvoiceFilter {
            status: Some(InvoiceStatus::Overdue),
            ..Default::default()
        },
        day(2025, 4, 20),
    )
    .unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].room_id, a);

    let april: BillingCycle = "2025-04".parse().unwrap();
    let april = ledger::invoices_for_room(&conn, b, april, april).unwrap();
    assert_eq!(april.len(), 1);
}

#[test]
fn file_database_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dormbill.sqlite");
    {
        let mut conn = db::open_at(&path).unwrap();
        billed_room(&mut conn, "7", "2025-05");
    }
    let conn = db::open_at(&path).unwrap();
    let invoices =
        ledger::list_invoices(&conn, &InvoiceFilter::default(), day(2025, 6, 1)).unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].total, Decimal::from(3250));
}
