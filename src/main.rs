// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use pocketfolio::{cli, commands, db};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
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
        Some(("account", sub)) => commands::accounts::handle(&conn, sub)?,
        Some(("tx", sub)) => commands::transactions::handle(&conn, sub)?,
        Some(("portfolio", sub)) => commands::portfolio::handle(&mut conn, sub)?,
        Some(("report", sub)) => commands::reports::handle(&conn, sub)?,
        Some(("fx", sub)) => commands::fx::handle(&conn, sub)?,
        Some(("doctor", _)) => commands::doctor::handle(&conn)?,
        _ => {
            cli::build_cli().print_help()?;
            println!();
        }
    }
    Ok(())
}
