// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::fx::RateTable;
use crate::utils::{
    arg_str, get_base_currency, http_client, parse_date, parse_decimal, pretty_table,
    set_base_currency,
};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("set-base", sub)) => {
            let ccy = arg_str(sub, "currency")?.to_uppercase();
            set_base_currency(conn, &ccy)?;
            println!("Base currency set to {}", ccy);
        }
        Some(("set-rate", sub)) => set_rate(conn, sub)?,
        Some(("fetch", sub)) => {
            let days: usize = *sub.get_one::<usize>("days").unwrap_or(&120);
            fetch_rates(conn, days)?;
        }
        Some(("list", _)) => list_rates(conn)?,
        Some(("convert", sub)) => convert_amount(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn set_rate(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(&arg_str(sub, "date")?)?;
    let base = arg_str(sub, "base")?.to_uppercase();
    let quote = arg_str(sub, "quote")?.to_uppercase();
    let rate = parse_decimal(&arg_str(sub, "rate")?)?;
    if rate <= Decimal::ZERO {
        bail!("Rate must be greater than zero");
    }
    conn.execute(
        "INSERT INTO fx_rates(date, base, quote, rate) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(date, base, quote) DO UPDATE SET rate=excluded.rate",
        params![date.to_string(), base, quote, rate.to_string()],
    )?;
    println!("{}: 1 {} = {} {}", date, base, rate, quote);
    Ok(())
}

fn distinct_currencies(conn: &Connection) -> Result<Vec<String>> {
    let mut out = Vec::<String>::new();
    for sql in [
        "SELECT DISTINCT currency FROM accounts",
        "SELECT DISTINCT currency FROM holdings",
    ] {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        for row in rows {
            let c = row?.to_uppercase();
            if !c.is_empty() && !out.contains(&c) {
                out.push(c);
            }
        }
    }
    Ok(out)
}

// Rates are stored as the shortest text that round-trips the published value.
#[derive(Debug, Deserialize)]
struct Series {
    rates: HashMap<String, HashMap<String, serde_json::Number>>,
}

fn fetch_rates(conn: &Connection, days: usize) -> Result<()> {
    let base = get_base_currency(conn)?;
    let today = Utc::now().date_naive();
    let start = today - chrono::Duration::days(days as i64);
    let targets: Vec<String> = distinct_currencies(conn)?
        .into_iter()
        .filter(|c| c != &base)
        .collect();
    if targets.is_empty() {
        println!("No non-base currencies found; nothing to fetch.");
        return Ok(());
    }
    let url = format!(
        "https://api.frankfurter.dev/v1/{start}..{today}?base={base}&symbols={}",
        targets.join(",")
    );
    let client = http_client(30)?;
    let resp = client.get(url).send()?.error_for_status()?;
    let s: Series = resp.json().context("Unexpected FX response")?;
    let mut n = 0usize;
    for (date, mp) in s.rates {
        for (quote, rate) in mp {
            n += conn.execute(
                "INSERT OR IGNORE INTO fx_rates(date, base, quote, rate) VALUES (?1, ?2, ?3, ?4)",
                params![date, base, quote, rate.to_string()],
            )?;
        }
    }
    println!("Stored {} FX rates via Frankfurter (ECB).", n);
    Ok(())
}

fn list_rates(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT date, base, quote, rate FROM fx_rates ORDER BY date DESC, base, quote LIMIT 50",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, String>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
        ))
    })?;
    let mut data = Vec::new();
    for row in rows {
        let (d, b, q, r) = row?;
        data.push(vec![d, b, q, r]);
    }
    println!("{}", pretty_table(&["Date", "Base", "Quote", "Rate"], data));
    Ok(())
}

fn convert_amount(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(&arg_str(sub, "date")?)?;
    let amount = parse_decimal(&arg_str(sub, "amount")?)?;
    let from = arg_str(sub, "from")?.to_uppercase();
    let to = arg_str(sub, "to")?.to_uppercase();
    let table = RateTable::load(conn)?;
    let res = table
        .try_convert(amount, &from, &to, date)
        .with_context(|| format!("No {}/{} rate on or before {}", from, to, date))?;
    println!("{} {} -> {:.4} {}", amount, from, res, to);
    Ok(())
}
