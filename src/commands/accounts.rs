// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::AccountType;
use crate::store::load_ledger;
use crate::utils::{arg_str, fmt_money, maybe_print_json, parse_decimal, pretty_table};
use anyhow::{Result, bail};
use rusqlite::{Connection, params};

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add", sub)) => add(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("rm", sub)) => {
            let name = arg_str(sub, "name")?;
            let n = conn.execute("DELETE FROM accounts WHERE name=?1", params![name])?;
            if n == 0 {
                bail!("Account '{}' not found", name);
            }
            println!("Removed account '{}'", name);
        }
        _ => {}
    }
    Ok(())
}

fn add(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let name = arg_str(sub, "name")?;
    let typ: AccountType = arg_str(sub, "type")?.parse()?;
    let ccy = arg_str(sub, "currency")?.to_uppercase();
    let initial = parse_decimal(&arg_str(sub, "initial-balance")?)?;
    let order = match sub.get_one::<i64>("order") {
        Some(o) => *o,
        None => conn.query_row(
            "SELECT IFNULL(MAX(display_order), -1) + 1 FROM accounts",
            [],
            |r| r.get(0),
        )?,
    };
    conn.execute(
        "INSERT INTO accounts(name, type, currency, initial_balance, display_order)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, typ.as_str(), ccy, initial.to_string(), order],
    )?;
    println!("Added account '{}' ({}, {})", name, typ.as_str(), ccy);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let ledger = load_ledger(conn)?;
    let accounts = ledger.accounts();
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &accounts)? {
        let rows = accounts
            .iter()
            .map(|a| {
                vec![
                    a.display_order.to_string(),
                    a.name.clone(),
                    a.account_type.as_str().to_string(),
                    a.currency.clone(),
                    fmt_money(&a.initial_balance, &a.currency),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["#", "Name", "Type", "CCY", "Initial balance"], rows)
        );
    }
    Ok(())
}
