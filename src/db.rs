// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Dormbill", "dormbill"));

/// Environment variable that overrides the platform data dir location.
pub const DB_ENV: &str = "DORMBILL_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os(DB_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(p));
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("dormbill.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    open_at(&db_path()?)
}

pub fn open_at(path: &Path) -> Result<Connection> {
    let conn =
        Connection::open(path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    tracing::debug!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS dormitories(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        water_rate TEXT NOT NULL,
        electricity_rate TEXT NOT NULL,
        payment_due_day INTEGER NOT NULL DEFAULT 5 CHECK(payment_due_day BETWEEN 1 AND 28),
        late_fee_per_day TEXT NOT NULL DEFAULT '0',
        auto_apply_late_fee INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS rooms(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        dormitory_id INTEGER NOT NULL,
        number TEXT NOT NULL,
        monthly_rent TEXT NOT NULL,
        deposit TEXT NOT NULL DEFAULT '0',
        advance TEXT NOT NULL DEFAULT '0',
        UNIQUE(dormitory_id, number),
        FOREIGN KEY(dormitory_id) REFERENCES dormitories(id)
    );

    CREATE TABLE IF NOT EXISTS contracts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id INTEGER NOT NULL,
        tenant TEXT NOT NULL,
        start_date TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active','terminated')),
        terminated_on TEXT,
        final_water TEXT,
        final_electricity TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(room_id) REFERENCES rooms(id)
    );
    CREATE UNIQUE INDEX IF NOT EXISTS idx_contracts_active_room
        ON contracts(room_id) WHERE status='active';

    -- Snapshot of the terms at contract creation; never updated.
    CREATE TABLE IF NOT EXISTS rate_tables(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contract_id INTEGER NOT NULL UNIQUE,
        water_rate TEXT NOT NULL,
        electricity_rate TEXT NOT NULL,
        monthly_rent TEXT NOT NULL,
        deposit TEXT NOT NULL,
        advance TEXT NOT NULL,
        effective_from TEXT NOT NULL,
        effective_to TEXT,
        FOREIGN KEY(contract_id) REFERENCES contracts(id)
    );

    CREATE TABLE IF NOT EXISTS meter_readings(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id INTEGER NOT NULL,
        cycle TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('water','electricity')),
        previous TEXT NOT NULL,
        current TEXT NOT NULL,
        read_on TEXT NOT NULL,
        replaced INTEGER NOT NULL DEFAULT 0,
        UNIQUE(room_id, cycle, kind),
        FOREIGN KEY(room_id) REFERENCES rooms(id)
    );

    CREATE TABLE IF NOT EXISTS pending_charges(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        room_id INTEGER NOT NULL,
        cycle TEXT NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        quantity TEXT NOT NULL,
        unit_price TEXT NOT NULL,
        ref_invoice_id INTEGER,
        invoice_id INTEGER,
        settlement_id INTEGER,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(room_id) REFERENCES rooms(id)
    );
    CREATE INDEX IF NOT EXISTS idx_pending_charges_room ON pending_charges(room_id, cycle);

    CREATE TABLE IF NOT EXISTS invoices(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contract_id INTEGER NOT NULL,
        room_id INTEGER NOT NULL,
        cycle TEXT NOT NULL,
        issue_date TEXT NOT NULL,
        due_date TEXT NOT NULL,
        total TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        UNIQUE(room_id, cycle),
        FOREIGN KEY(contract_id) REFERENCES contracts(id)
    );
    CREATE INDEX IF NOT EXISTS idx_invoices_contract ON invoices(contract_id);

    CREATE TABLE IF NOT EXISTS invoice_lines(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        quantity TEXT NOT NULL,
        unit_price TEXT NOT NULL,
        amount TEXT NOT NULL,
        ref_invoice_id INTEGER,
        UNIQUE(invoice_id, position),
        FOREIGN KEY(invoice_id) REFERENCES invoices(id)
    );

    CREATE TABLE IF NOT EXISTS payments(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        invoice_id INTEGER NOT NULL UNIQUE,
        amount TEXT NOT NULL,
        method TEXT NOT NULL,
        paid_on TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(invoice_id) REFERENCES invoices(id)
    );

    CREATE TABLE IF NOT EXISTS settlements(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        contract_id INTEGER NOT NULL UNIQUE,
        room_id INTEGER NOT NULL,
        settled_on TEXT NOT NULL,
        gross_charges TEXT NOT NULL,
        held_funds TEXT NOT NULL,
        net_amount TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(contract_id) REFERENCES contracts(id)
    );

    CREATE TABLE IF NOT EXISTS settlement_lines(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        settlement_id INTEGER NOT NULL,
        position INTEGER NOT NULL,
        kind TEXT NOT NULL,
        description TEXT NOT NULL,
        quantity TEXT NOT NULL,
        unit_price TEXT NOT NULL,
        amount TEXT NOT NULL,
        ref_invoice_id INTEGER,
        UNIQUE(settlement_id, position),
        FOREIGN KEY(settlement_id) REFERENCES settlements(id)
    );

    -- Ledger tables are append-only.
    CREATE TRIGGER IF NOT EXISTS trg_invoices_no_update BEFORE UPDATE ON invoices
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_invoices_no_delete BEFORE DELETE ON invoices
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_invoice_lines_no_update BEFORE UPDATE ON invoice_lines
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_invoice_lines_no_delete BEFORE DELETE ON invoice_lines
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_payments_no_update BEFORE UPDATE ON payments
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_payments_no_delete BEFORE DELETE ON payments
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_settlements_no_update BEFORE UPDATE ON settlements
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_settlements_no_delete BEFORE DELETE ON settlements
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_settlement_lines_no_update BEFORE UPDATE ON settlement_lines
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_settlement_lines_no_delete BEFORE DELETE ON settlement_lines
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;
    CREATE TRIGGER IF NOT EXISTS trg_rate_tables_no_update BEFORE UPDATE ON rate_tables
        BEGIN SELECT RAISE(ABORT, 'rate snapshots are immutable'); END;
    "#,
    )?;
    Ok(())
}
