// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::error::ReportError;
use crate::ledger::Ledger;
use crate::models::{
    Account, InvestmentHolding, InvestmentTransaction, ReportData, Transaction, TransactionKind,
};
use crate::utils::parse_date;

/// Saved monthly summaries keyed by `YYYY-MM`. A saved entry is a snapshot:
/// later reports read it instead of recomputing, and only an explicit
/// refresh overwrites it.
pub trait SummaryStore {
    fn get(&self, id: &str) -> Result<Option<ReportData>, ReportError>;
    fn put(&mut self, report: &ReportData) -> Result<(), ReportError>;
    fn list(&self) -> Result<Vec<ReportData>, ReportError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemorySummaryStore {
    reports: BTreeMap<String, ReportData>,
}

impl MemorySummaryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SummaryStore for MemorySummaryStore {
    fn get(&self, id: &str) -> Result<Option<ReportData>, ReportError> {
        Ok(self.reports.get(id).cloned())
    }

    fn put(&mut self, report: &ReportData) -> Result<(), ReportError> {
        self.reports.insert(report.id.clone(), report.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<ReportData>, ReportError> {
        Ok(self.reports.values().cloned().collect())
    }
}

pub struct SqliteSummaryStore<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteSummaryStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl SummaryStore for SqliteSummaryStore<'_> {
    fn get(&self, id: &str) -> Result<Option<ReportData>, ReportError> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM reports WHERE id=?1", params![id], |r| {
                r.get(0)
            })
            .optional()?;
        data.map(|s| serde_json::from_str(&s).map_err(ReportError::from))
            .transpose()
    }

    // Last write wins for concurrent generations of the same month.
    fn put(&mut self, report: &ReportData) -> Result<(), ReportError> {
        let data = serde_json::to_string(report)?;
        self.conn.execute(
            "INSERT INTO reports(id, year, month, data) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET year=excluded.year, month=excluded.month,
                 data=excluded.data, generated_at=datetime('now')",
            params![report.id, report.year, report.month, data],
        )?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<ReportData>, ReportError> {
        let mut stmt = self.conn.prepare("SELECT data FROM reports ORDER BY id")?;
        let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }
}

fn decimal_col(raw: &str, what: &str, id: i64) -> Result<Decimal, ReportError> {
    Decimal::from_str_exact(raw.trim())
        .map_err(|_| ReportError::input(format!("Invalid {} '{}' on record {}", what, raw, id)))
}

fn load_accounts(conn: &Connection) -> Result<Vec<Account>, ReportError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, type, currency, initial_balance, display_order FROM accounts",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, i64>(5)?,
        ))
    })?;
    let mut accounts = Vec::new();
    for row in rows {
        let (id, name, typ, currency, initial, display_order) = row?;
        accounts.push(Account {
            id,
            name,
            account_type: typ.parse()?,
            currency: currency.to_uppercase(),
            initial_balance: decimal_col(&initial, "initial balance", id)?,
            display_order,
        });
    }
    Ok(accounts)
}

fn load_transactions(conn: &Connection) -> Result<Vec<Transaction>, ReportError> {
    let mut stmt = conn.prepare(
        "SELECT id, date, kind, amount, description, account_id, to_account_id,
                income_type, category, subcategory
         FROM transactions ORDER BY date, id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, i64>(5)?,
            r.get::<_, Option<i64>>(6)?,
            r.get::<_, Option<String>>(7)?,
            r.get::<_, Option<String>>(8)?,
            r.get::<_, Option<String>>(9)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, date_s, kind, amount_s, description, account_id, to_account, income, cat, sub) =
            row?;
        let missing = |what: &str| ReportError::input(format!("Transaction {} is missing {}", id, what));
        let kind = match kind.as_str() {
            "income" => TransactionKind::Income {
                account_id,
                income_type: income.ok_or_else(|| missing("an income type"))?.parse()?,
            },
            "cost" => TransactionKind::Cost {
                account_id,
                category: cat.ok_or_else(|| missing("a cost category"))?.parse()?,
                subcategory: sub.unwrap_or_default(),
            },
            "transfer" => TransactionKind::Transfer {
                from_account_id: account_id,
                to_account_id: to_account.ok_or_else(|| missing("a destination account"))?,
            },
            other => {
                return Err(ReportError::input(format!(
                    "Transaction {} has unknown kind '{}'",
                    id, other
                )));
            }
        };
        out.push(Transaction {
            id,
            date: parse_date(&date_s)?,
            amount: decimal_col(&amount_s, "amount", id)?,
            description,
            kind,
        });
    }
    Ok(out)
}

fn load_holdings(conn: &Connection) -> Result<Vec<InvestmentHolding>, ReportError> {
    let mut stmt = conn.prepare(
        "SELECT id, ticker, name, investment_type, currency, current_price, isin,
                isin_verified, price_updated, needs_review
         FROM holdings ORDER BY ticker",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, String>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, Option<String>>(5)?,
            r.get::<_, Option<String>>(6)?,
            r.get::<_, bool>(7)?,
            r.get::<_, Option<String>>(8)?,
            r.get::<_, bool>(9)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, ticker, name, typ, currency, price, isin, verified, updated, review) = row?;
        out.push(InvestmentHolding {
            id,
            ticker: ticker.to_uppercase(),
            name,
            investment_type: typ.parse()?,
            currency: currency.to_uppercase(),
            current_price: price
                .map(|p| decimal_col(&p, "current price", id))
                .transpose()?,
            isin: isin.filter(|s| !s.trim().is_empty()),
            isin_verified: verified,
            price_updated: updated.map(|d| parse_date(&d)).transpose()?,
            needs_review: review,
        });
    }
    Ok(out)
}

fn load_investment_transactions(conn: &Connection) -> Result<Vec<InvestmentTransaction>, ReportError> {
    let mut stmt = conn.prepare(
        "SELECT id, holding_id, kind, date, quantity, price_per_unit, total_amount, account_id
         FROM investment_transactions ORDER BY date, id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i64>(0)?,
            r.get::<_, i64>(1)?,
            r.get::<_, String>(2)?,
            r.get::<_, String>(3)?,
            r.get::<_, String>(4)?,
            r.get::<_, String>(5)?,
            r.get::<_, String>(6)?,
            r.get::<_, i64>(7)?,
        ))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (id, holding_id, kind, date_s, qty, price, total, account_id) = row?;
        out.push(InvestmentTransaction {
            id,
            holding_id,
            kind: kind.parse()?,
            date: parse_date(&date_s)?,
            quantity: decimal_col(&qty, "quantity", id)?,
            price_per_unit: decimal_col(&price, "price", id)?,
            total_amount: decimal_col(&total, "total amount", id)?,
            account_id,
        });
    }
    Ok(out)
}

/// Snapshot of everything the reporting core reads. Malformed rows reject the
/// whole load.
pub fn load_ledger(conn: &Connection) -> Result<Ledger, ReportError> {
    Ledger::new(
        load_accounts(conn)?,
        load_transactions(conn)?,
        load_holdings(conn)?,
        load_investment_transactions(conn)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO accounts(id, name, type, currency, initial_balance) VALUES (1, 'Main', 'bank', 'eur', '10.50')",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn loads_typed_rows() {
        let conn = conn();
        conn.execute(
            "INSERT INTO transactions(date, kind, amount, account_id, category, subcategory)
             VALUES ('2024-01-05', 'cost', '3.25', 1, 'must', 'Groceries')",
            [],
        )
        .unwrap();
        let ledger = load_ledger(&conn).unwrap();
        assert_eq!(ledger.accounts()[0].currency, "EUR");
        assert_eq!(ledger.transactions().len(), 1);
        assert_eq!(
            ledger
                .account_balance(1, parse_date("2024-01-31").unwrap())
                .unwrap(),
            Decimal::from_str_exact("7.25").unwrap()
        );
    }

    #[test]
    fn malformed_dates_reject_the_load() {
        let conn = conn();
        conn.execute(
            "INSERT INTO transactions(date, kind, amount, account_id, income_type)
             VALUES ('05/01/2024', 'income', '1', 1, 'work')",
            [],
        )
        .unwrap();
        let err = load_ledger(&conn).unwrap_err();
        assert!(matches!(err, ReportError::Input(_)));
    }

    #[test]
    fn transfers_need_a_destination() {
        let conn = conn();
        conn.execute(
            "INSERT INTO transactions(date, kind, amount, account_id) VALUES ('2024-01-05', 'transfer', '1', 1)",
            [],
        )
        .unwrap();
        assert!(load_ledger(&conn).unwrap_err().to_string().contains("destination"));
    }
}
