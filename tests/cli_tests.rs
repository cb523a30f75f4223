// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use dormbill::billing::{charges, ledger, property};
use dormbill::commands::{
    charges as charge_cmd, contracts, doctor, dorms, exporter, invoices, readings, rooms,
    settlements,
};
use dormbill::models::{BillingCycle, LineDraft, LineKind};
use dormbill::{cli, db};
use rusqlite::Connection;
use rust_decimal::Decimal;
use tempfile::tempdir;

fn run(conn: &mut Connection, args: &[&str]) -> Result<()> {
    let mut argv = vec!["dormbill"];
    argv.extend_from_slice(args);
    let matches = cli::build_cli().try_get_matches_from(argv)?;
    match matches.subcommand() {
        Some(("dorm", m)) => dorms::handle(conn, m),
        Some(("room", m)) => rooms::handle(conn, m),
        Some(("contract", m)) => contracts::handle(conn, m),
        Some(("reading", m)) => readings::handle(conn, m),
        Some(("charge", m)) => charge_cmd::handle(conn, m),
        Some(("invoice", m)) => invoices::handle(conn, m),
        Some(("settle", m)) => settlements::handle(conn, m),
        Some(("export", m)) => exporter::handle(conn, m),
        Some(("doctor", _)) => doctor::handle(conn),
        other => panic!("unexpected command {:?}", other.map(|(n, _)| n)),
    }
}

/// One dorm, one room, one contract and a July invoice of 3550.
fn seeded() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    db::init_schema(&conn).unwrap();
    let steps: &[&[&str]] = &[
        &["dorm", "add", "--name", "North", "--water-rate", "18", "--electricity-rate", "7"],
        &["room", "add", "--dorm", "North", "--room", "101", "--rent", "3000", "--deposit", "3000"],
        &[
            "contract", "add", "--dorm", "North", "--room", "101", "--tenant", "Ana", "--start",
            "2025-07-01",
        ],
        &[
            "reading", "add", "--dorm", "North", "--room", "101", "--cycle", "2025-07", "--kind",
            "water", "--previous", "100", "--current", "115", "--date", "2025-07-31",
        ],
        &[
            "reading", "add", "--dorm", "North", "--room", "101", "--cycle", "2025-07", "--kind",
            "electricity", "--previous", "500", "--current", "540", "--date", "2025-07-31",
        ],
        &[
            "invoice", "generate", "--dorm", "North", "--room", "101", "--cycle", "2025-07",
            "--issued", "2025-08-01",
        ],
    ];
    for step in steps {
        run(&mut conn, step).unwrap();
    }
    conn
}

#[test]
fn cli_flow_generates_the_monthly_invoice() {
    let conn = seeded();
    let on = "2025-08-01".parse().unwrap();
    let list = ledger::list_invoices(&conn, &Default::default(), on).unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].total, Decimal::from(3550));
}

#[test]
fn cli_duplicate_generation_fails() {
    let mut conn = seeded();
    let err = run(
        &mut conn,
        &["invoice", "generate", "--dorm", "North", "--room", "101", "--cycle", "2025-07"],
    )
    .unwrap_err();
    assert!(err.to_string().contains("already exists"));
}

#[test]
fn cli_pay_and_settle() {
    let mut conn = seeded();
    run(
        &mut conn,
        &[
            "invoice", "pay", "--id", "1", "--amount", "3550", "--method", "transfer", "--date",
            "2025-08-03",
        ],
    )
    .unwrap();
    run(
        &mut conn,
        &[
            "settle", "run", "--contract", "1", "--date", "2025-08-31", "--water", "120",
            "--electricity", "560", "--adjust", "fine:Broken lamp:150",
        ],
    )
    .unwrap();
    let s = ledger::settlement_for_contract(&conn, 1).unwrap().unwrap();
    // 3000 rent + 90 water + 140 electricity + 150 fine - 3000 deposit
    assert_eq!(s.gross_charges, Decimal::from(3380));
    assert_eq!(s.net_amount, Decimal::from(380));
    run(&mut conn, &["settle", "show", "--contract", "1", "--json"]).unwrap();
}

#[test]
fn settle_args_collect_repeated_adjustments() {
    let matches = cli::build_cli().get_matches_from([
        "dormbill",
        "settle",
        "preview",
        "--contract",
        "3",
        "--date",
        "2025-10-10",
        "--water",
        "105",
        "--electricity",
        "520",
        "--adjust",
        "fine:Damages:500",
        "--adjust",
        "discount:Goodwill:-50",
    ]);
    let (_, settle) = matches.subcommand().unwrap();
    let (name, preview) = settle.subcommand().unwrap();
    assert_eq!(name, "preview");
    let adjust: Vec<&String> = preview.get_many::<String>("adjust").unwrap().collect();
    assert_eq!(adjust.len(), 2);
    let draft = dormbill::utils::parse_adjustment(adjust[1]).unwrap();
    assert_eq!(draft.kind, LineKind::Discount);
    assert_eq!(draft.unit_price, Decimal::from(-50));
}

#[test]
fn export_receipts_as_csv_and_json() {
    let mut conn = seeded();
    let dir = tempdir().unwrap();

    let csv_path = dir.path().join("receipts.csv");
    let csv_str = csv_path.to_string_lossy().to_string();
    run(&mut conn, &["export", "receipts", "--format", "csv", "--out", &csv_str]).unwrap();
    let mut rdr = csv::Reader::from_path(&csv_path).unwrap();
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][0], "invoice");
    assert_eq!(&rows[0][2], "North/101");
    assert_eq!(&rows[1][6], "water");
    assert_eq!(&rows[1][10], "270");

    let json_path = dir.path().join("receipts.json");
    let n = exporter::export_receipts(&conn, "json", &json_path).unwrap();
    assert_eq!(n, 1);
    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed[0]["document"], "invoice");
    assert_eq!(parsed[0]["invoice"]["total"], "3550");
    assert_eq!(parsed[0]["invoice"]["lines"].as_array().unwrap().len(), 3);

    assert!(exporter::export_receipts(&conn, "xml", &dir.path().join("x")).is_err());
}

#[test]
fn doctor_flags_anomalies_and_orphans() {
    let mut conn = seeded();
    assert!(doctor::find_issues(&conn).unwrap().is_empty());

    run(
        &mut conn,
        &[
            "reading", "add", "--dorm", "North", "--room", "101", "--cycle", "2025-08", "--kind",
            "water", "--current", "90",
        ],
    )
    .unwrap();
    let dorm = dormbill::utils::id_for_dorm(&conn, "North").unwrap();
    let vacant =
        property::create_room(&conn, dorm, "102", Decimal::from(2800), Decimal::ZERO, Decimal::ZERO)
            .unwrap();
    let cycle: BillingCycle = "2025-08".parse().unwrap();
    let repaint = LineDraft::flat(LineKind::Service, "Repaint", Decimal::from(200));
    charges::add_charge(&conn, vacant, cycle, &repaint).unwrap();

    let issues: Vec<String> = doctor::find_issues(&conn)
        .unwrap()
        .into_iter()
        .map(|(i, _)| i)
        .collect();
    assert_eq!(issues, vec!["meter_anomaly".to_string(), "orphan_charge".to_string()]);
}

#[test]
fn bad_arguments_are_reported() {
    let mut conn = seeded();
    let bad_cycle =
        ["invoice", "generate", "--dorm", "North", "--room", "101", "--cycle", "2025-13"];
    assert!(run(&mut conn, &bad_cycle).is_err());
    let bad_amount = ["invoice", "pay", "--id", "1", "--amount", "abc", "--method", "cash"];
    assert!(run(&mut conn, &bad_amount).is_err());
    let unknown_room = [
        "reading", "add", "--dorm", "North", "--room", "999", "--cycle", "2025-08", "--kind",
        "water", "--current", "1",
    ];
    assert!(run(&mut conn, &unknown_room).is_err());
    let missing_amount = ["dormbill", "invoice", "pay", "--id", "1"];
    assert!(cli::build_cli().try_get_matches_from(missing_amount).is_err());
}
