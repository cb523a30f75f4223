// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{Arg, ArgAction, Command};

fn req(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).required(true).help(help)
}

fn opt(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).required(false).help(help)
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn output_flags(cmd: Command) -> Command {
    cmd.arg(flag("json", "Print pretty JSON"))
        .arg(flag("jsonl", "Print one JSON object per line"))
}

fn room_args(cmd: Command) -> Command {
    cmd.arg(req("dorm", "Dormitory name"))
        .arg(req("room", "Room number"))
}

fn settle_args(cmd: Command) -> Command {
    cmd.arg(req("contract", "Contract id"))
        .arg(req("date", "Termination date YYYY-MM-DD"))
        .arg(req("water", "Final water meter value"))
        .arg(req("electricity", "Final electricity meter value"))
        .arg(opt("water-previous", "Water value to bill from (default: last reading)"))
        .arg(opt(
            "electricity-previous",
            "Electricity value to bill from (default: last reading)",
        ))
        .arg(
            Arg::new("adjust")
                .long("adjust")
                .action(ArgAction::Append)
                .help("Manual adjustment kind:description:amount (repeatable)"),
        )
}

pub fn build_cli() -> Command {
    Command::new("dormbill")
        .about("Dormitory billing: meter usage, monthly invoices, move-out settlements")
        .version(clap::crate_version!())
        .subcommand(Command::new("init").about("Create the database"))
        .subcommand(
            Command::new("dorm")
                .about("Dormitories, utility prices and billing policy")
                .subcommand(
                    Command::new("add")
                        .arg(req("name", "Dormitory name"))
                        .arg(req("water-rate", "Price per water unit"))
                        .arg(req("electricity-rate", "Price per electricity unit"))
                        .arg(opt("due-day", "Payment due day of month (1-28)"))
                        .arg(opt("late-fee", "Late fee per day"))
                        .arg(flag("auto-late-fee", "Apply late fees automatically")),
                )
                .subcommand(
                    Command::new("set")
                        .about("Change prices (new contracts only) or policy")
                        .arg(req("name", "Dormitory name"))
                        .arg(opt("water-rate", "Price per water unit"))
                        .arg(opt("electricity-rate", "Price per electricity unit"))
                        .arg(opt("due-day", "Payment due day of month (1-28)"))
                        .arg(opt("late-fee", "Late fee per day"))
                        .arg(opt("auto-late-fee", "true|false")),
                )
                .subcommand(output_flags(Command::new("list"))),
        )
        .subcommand(
            Command::new("room")
                .about("Rooms and their list prices")
                .subcommand(
                    room_args(Command::new("add"))
                        .arg(req("rent", "Monthly rent"))
                        .arg(opt("deposit", "Security deposit"))
                        .arg(opt("advance", "Advance payment")),
                )
                .subcommand(output_flags(
                    Command::new("list").arg(opt("dorm", "Dormitory name")),
                )),
        )
        .subcommand(
            Command::new("contract")
                .about("Tenancy contracts and their rate snapshots")
                .subcommand(
                    room_args(Command::new("add"))
                        .arg(req("tenant", "Tenant name"))
                        .arg(req("start", "Start date YYYY-MM-DD"))
                        .arg(opt("end", "Planned end date YYYY-MM-DD"))
                        .arg(opt("rent", "Override monthly rent"))
                        .arg(opt("deposit", "Override deposit"))
                        .arg(opt("advance", "Override advance"))
                        .arg(opt("water-rate", "Override water price"))
                        .arg(opt("electricity-rate", "Override electricity price")),
                )
                .subcommand(output_flags(
                    Command::new("list").arg(flag("active", "Only active contracts")),
                ))
                .subcommand(output_flags(
                    Command::new("rates").arg(req("id", "Contract id")),
                )),
        )
        .subcommand(
            Command::new("reading")
                .about("Meter readings")
                .subcommand(
                    room_args(Command::new("add"))
                        .arg(req("cycle", "Billing cycle YYYY-MM"))
                        .arg(req("kind", "water|electricity"))
                        .arg(req("current", "Current meter value"))
                        .arg(opt("previous", "Previous value (default: last reading)"))
                        .arg(opt("date", "Reading date YYYY-MM-DD (default: today)"))
                        .arg(flag("replaced", "Meter was replaced this cycle")),
                )
                .subcommand(output_flags(
                    Command::new("list")
                        .arg(opt("dorm", "Dormitory name"))
                        .arg(opt("room", "Room number")),
                )),
        )
        .subcommand(
            Command::new("charge")
                .about("Service fees, fines and discounts for the next invoice")
                .subcommand(
                    room_args(Command::new("add"))
                        .arg(req("cycle", "Billing cycle YYYY-MM"))
                        .arg(req("kind", "service|fine|discount|..."))
                        .arg(req("description", "Line description"))
                        .arg(req("amount", "Unit price (negative for discounts)"))
                        .arg(opt("quantity", "Quantity (default 1)")),
                )
                .subcommand(output_flags(Command::new("list"))),
        )
        .subcommand(
            Command::new("invoice")
                .about("Monthly invoices and payments")
                .subcommand(
                    room_args(Command::new("generate"))
                        .arg(req("cycle", "Billing cycle YYYY-MM"))
                        .arg(opt("issued", "Issue date (default: today)")),
                )
                .subcommand(
                    Command::new("run")
                        .about("Generate invoices for every occupied room")
                        .arg(req("cycle", "Billing cycle YYYY-MM"))
                        .arg(opt("issued", "Issue date (default: today)")),
                )
                .subcommand(output_flags(
                    Command::new("show")
                        .arg(req("id", "Invoice id"))
                        .arg(opt("as-of", "Evaluate status on this date")),
                ))
                .subcommand(output_flags(
                    Command::new("list")
                        .arg(opt("dorm", "Dormitory name"))
                        .arg(opt("room", "Room number"))
                        .arg(opt("contract", "Contract id"))
                        .arg(opt("status", "pending|paid|overdue"))
                        .arg(opt("from", "First cycle YYYY-MM"))
                        .arg(opt("to", "Last cycle YYYY-MM"))
                        .arg(opt("as-of", "Evaluate status on this date")),
                ))
                .subcommand(
                    Command::new("pay")
                        .arg(req("id", "Invoice id"))
                        .arg(req("amount", "Amount paid"))
                        .arg(req("method", "Payment method"))
                        .arg(opt("date", "Payment date (default: today)")),
                )
                .subcommand(
                    Command::new("correct")
                        .about("Queue a correction for a later invoice")
                        .arg(req("id", "Original invoice id"))
                        .arg(req("kind", "discount|fine|service|..."))
                        .arg(req("description", "Line description"))
                        .arg(req("amount", "Unit price (negative for discounts)"))
                        .arg(opt("quantity", "Quantity (default 1)"))
                        .arg(opt("cycle", "Target cycle (default: the next one)")),
                )
                .subcommand(output_flags(
                    Command::new("overdue").arg(opt("as-of", "Evaluate on this date")),
                )),
        )
        .subcommand(
            Command::new("settle")
                .about("Move-out settlements")
                .subcommand(settle_args(Command::new("run")))
                .subcommand(output_flags(settle_args(Command::new("preview"))))
                .subcommand(output_flags(
                    Command::new("show")
                        .arg(opt("contract", "Contract id"))
                        .arg(opt("id", "Settlement id")),
                )),
        )
        .subcommand(
            Command::new("export").about("Export ledger documents").subcommand(
                Command::new("receipts")
                    .arg(req("format", "csv|json"))
                    .arg(req("out", "Output file")),
            ),
        )
        .subcommand(Command::new("doctor").about("Check ledger and data integrity"))
}
