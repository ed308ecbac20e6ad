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
use std::path::PathBuf;

static APP: Lazy<(&str, &str, &str)> =
    Lazy::new(|| ("com.alphavelocity", "Pocketfolio", "pocketfolio"));

pub const DB_ENV: &str = "POCKETFOLIO_DB";

pub fn db_path() -> Result<PathBuf> {
    if let Some(p) = std::env::var_os(DB_ENV) {
        return Ok(PathBuf::from(p));
    }
    let proj = ProjectDirs::from(APP.0, APP.1, APP.2)
        .context("Could not determine platform-specific data dir")?;
    let data_dir = proj.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data dir")?;
    Ok(data_dir.join("pocketfolio.sqlite"))
}

pub fn open_or_init() -> Result<Connection> {
    let path = db_path()?;
    let conn =
        Connection::open(&path).with_context(|| format!("Open DB at {}", path.display()))?;
    init_schema(&conn)?;
    tracing::debug!("database ready at {}", path.display());
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS settings(
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS accounts(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        type TEXT NOT NULL,
        currency TEXT NOT NULL,
        initial_balance TEXT NOT NULL DEFAULT '0',
        display_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    -- account_id is the source for transfers; to_account_id is set only for them
    CREATE TABLE IF NOT EXISTS transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('income','cost','transfer')),
        amount TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        account_id INTEGER NOT NULL,
        to_account_id INTEGER,
        income_type TEXT,
        category TEXT,
        subcategory TEXT,
        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE,
        FOREIGN KEY(to_account_id) REFERENCES accounts(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);

    CREATE TABLE IF NOT EXISTS holdings(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ticker TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        investment_type TEXT NOT NULL CHECK(investment_type IN ('stock','etf','crypto')),
        currency TEXT NOT NULL,
        current_price TEXT,
        isin TEXT,
        isin_verified INTEGER NOT NULL DEFAULT 0,
        price_updated TEXT,
        needs_review INTEGER NOT NULL DEFAULT 0
    );

    CREATE TABLE IF NOT EXISTS investment_transactions(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        holding_id INTEGER NOT NULL,
        kind TEXT NOT NULL CHECK(kind IN ('buy','sell','dividend')),
        date TEXT NOT NULL,
        quantity TEXT NOT NULL DEFAULT '0',
        price_per_unit TEXT NOT NULL DEFAULT '0',
        total_amount TEXT NOT NULL,
        account_id INTEGER NOT NULL,
        FOREIGN KEY(holding_id) REFERENCES holdings(id) ON DELETE CASCADE,
        FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS idx_investment_transactions_date ON investment_transactions(date);

    -- FX rates: store base->quote rate (1 base = rate quote) per day
    CREATE TABLE IF NOT EXISTS fx_rates(
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        base TEXT NOT NULL,
        quote TEXT NOT NULL,
        rate TEXT NOT NULL,
        UNIQUE(date, base, quote)
    );

    -- Monthly snapshots keyed by YYYY-MM; data is the serialized report
    CREATE TABLE IF NOT EXISTS reports(
        id TEXT PRIMARY KEY,
        year INTEGER NOT NULL,
        month INTEGER NOT NULL,
        data TEXT NOT NULL,
        generated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
    "#,
    )
}
