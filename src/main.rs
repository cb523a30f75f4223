// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;

use dormbill::{cli, commands, db};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::build_cli();
    let matches = cli.get_matches();

    let mut conn = db::open_or_init()?;

    match matches.subcommand() {
        Some(("init", _)) => {
            println!("Database initialized at {}", db::db_path()?.display());
        }
        Some(("dorm", sub)) => commands::dorms::handle(&conn, sub)?,
        Some(("room", sub)) => commands::rooms::handle(&conn, sub)?,
        Some(("contract", sub)) => commands::contracts::handle(&mut conn, sub)?,
        Some(("reading", sub)) => commands::readings::handle(&conn, sub)?,
        Some(("charge", sub)) => commands::charges::handle(&conn, sub)?,
        Some(("invoice", sub)) => commands::invoices::handle(&mut conn, sub)?,
        Some(("settle", sub)) => commands::settlements::handle(&mut conn, sub)?,
        Some(("export", sub)) => commands::exporter::handle(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
