// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use comfy_table::{Cell, Table, presets::UTF8_FULL};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;

use crate::error::ReportError;
use crate::models::MonthId;

pub const DEFAULT_BASE_CURRENCY: &str = "EUR";

const UA: &str = concat!(
    "pocketfolio/",
    env!("CARGO_PKG_VERSION"),
    " (+https://github.com/alphavelocity/pocketfolio)"
);

pub fn http_client(timeout_secs: u64) -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(UA)
        .build()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, ReportError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        ReportError::input(format!("Invalid date '{}', expected YYYY-MM-DD", s))
    })
}

pub fn parse_month(s: &str) -> Result<MonthId, ReportError> {
    s.trim().parse()
}

pub fn parse_decimal(s: &str) -> Result<Decimal, ReportError> {
    s.trim()
        .parse::<Decimal>()
        .map_err(|_| ReportError::input(format!("Invalid decimal '{}'", s)))
}

pub fn parse_optional_decimal(s: Option<String>) -> Result<Option<Decimal>, ReportError> {
    s.map(|v| parse_decimal(&v)).transpose()
}

/// Required clap argument, trimmed.
pub fn arg_str(m: &clap::ArgMatches, name: &str) -> Result<String> {
    m.get_one::<String>(name)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("Missing required argument --{}", name))
}

pub fn opt_str(m: &clap::ArgMatches, name: &str) -> Option<String> {
    m.get_one::<String>(name)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn fmt_money(d: &Decimal, ccy: &str) -> String {
    format!("{} {:.2}", ccy, d.round_dp(2))
}

pub fn fmt_pct(d: &Decimal) -> String {
    format!("{:.2}%", d.round_dp(2))
}

pub fn pretty_table(headers: &[&str], rows: Vec<Vec<String>>) -> Table {
    let mut t = Table::new();
    t.load_preset(UTF8_FULL);
    t.set_header(headers.iter().map(|h| Cell::new(*h)));
    for r in rows {
        t.add_row(r.into_iter().map(Cell::new));
    }
    t
}

pub fn id_for_account(conn: &Connection, name: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM accounts WHERE name=?1")?;
    let id: i64 = stmt
        .query_row(params![name], |r| r.get(0))
        .with_context(|| format!("Account '{}' not found", name))?;
    Ok(id)
}

pub fn id_for_holding(conn: &Connection, ticker: &str) -> Result<i64> {
    let mut stmt = conn.prepare("SELECT id FROM holdings WHERE ticker=?1")?;
    let id: i64 = stmt
        .query_row(params![ticker.to_uppercase()], |r| r.get(0))
        .with_context(|| format!("Holding '{}' not found", ticker))?;
    Ok(id)
}

// Base (reporting) currency settings
pub fn get_base_currency(conn: &Connection) -> Result<String, ReportError> {
    Ok(get_setting(conn, "base_currency")?.unwrap_or_else(|| DEFAULT_BASE_CURRENCY.to_string()))
}

pub fn set_base_currency(conn: &Connection, ccy: &str) -> Result<(), ReportError> {
    set_setting(conn, "base_currency", &ccy.to_uppercase())
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, ReportError> {
    let v: Option<String> = conn
        .query_row("SELECT value FROM settings WHERE key=?1", params![key], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(v)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), ReportError> {
    conn.execute(
        "INSERT INTO settings(key, value) VALUES(?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![key, value],
    )?;
    Ok(())
}

pub fn maybe_print_json<T: serde::Serialize>(
    json_flag: bool,
    jsonl_flag: bool,
    v: &T,
) -> Result<bool> {
    if json_flag {
        println!("{}", serde_json::to_string_pretty(v)?);
        return Ok(true);
    }
    if jsonl_flag {
        // If v is an array, stream each element; else stream single line
        let val = serde_json::to_value(v)?;
        if let Some(arr) = val.as_array() {
            for item in arr {
                println!("{}", serde_json::to_string(item)?);
            }
        } else {
            println!("{}", serde_json::to_string(&val)?);
        }
        return Ok(true);
    }
    Ok(false)
}
