// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::ledger::Ledger;
use crate::models::{
    CostCategory, IncomeType, InvestmentTransactionType, MonthId, TransactionKind,
};
use crate::store::load_ledger;
use crate::utils::{
    arg_str, id_for_account, maybe_print_json, opt_str, parse_date, parse_decimal, parse_month,
    pretty_table,
};
use anyhow::{Result, bail};
use rust_decimal::Decimal;
use rusqlite::{Connection, params};
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("income", sub)) => income(conn, sub)?,
        Some(("cost", sub)) => cost(conn, sub)?,
        Some(("transfer", sub)) => transfer(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn positive_amount(sub: &clap::ArgMatches) -> Result<Decimal> {
    let amount = parse_decimal(&arg_str(sub, "amount")?)?;
    if amount <= Decimal::ZERO {
        bail!("Amount must be greater than zero");
    }
    Ok(amount)
}

fn income(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(&arg_str(sub, "date")?)?;
    let account = arg_str(sub, "account")?;
    let amount = positive_amount(sub)?;
    let income_type: IncomeType = arg_str(sub, "type")?.parse()?;
    let description = opt_str(sub, "description").unwrap_or_default();
    let account_id = id_for_account(conn, &account)?;
    conn.execute(
        "INSERT INTO transactions(date, kind, amount, description, account_id, income_type)
         VALUES (?1, 'income', ?2, ?3, ?4, ?5)",
        params![
            date.to_string(),
            amount.to_string(),
            description,
            account_id,
            income_type.as_str()
        ],
    )?;
    println!(
        "Recorded {} income of {} on {} (acct: {})",
        income_type.as_str(),
        amount,
        date,
        account
    );
    Ok(())
}

fn cost(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(&arg_str(sub, "date")?)?;
    let account = arg_str(sub, "account")?;
    let amount = positive_amount(sub)?;
    let category: CostCategory = arg_str(sub, "category")?.parse()?;
    let subcategory = opt_str(sub, "subcategory").unwrap_or_default();
    let description = opt_str(sub, "description").unwrap_or_default();
    let account_id = id_for_account(conn, &account)?;
    conn.execute(
        "INSERT INTO transactions(date, kind, amount, description, account_id, category, subcategory)
         VALUES (?1, 'cost', ?2, ?3, ?4, ?5, ?6)",
        params![
            date.to_string(),
            amount.to_string(),
            description,
            account_id,
            category.as_str(),
            subcategory
        ],
    )?;
    println!(
        "Recorded {} cost of {} on {} (acct: {})",
        category.as_str(),
        amount,
        date,
        account
    );
    Ok(())
}

fn transfer(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(&arg_str(sub, "date")?)?;
    let from = arg_str(sub, "from")?;
    let to = arg_str(sub, "to")?;
    let amount = positive_amount(sub)?;
    let description = opt_str(sub, "description").unwrap_or_default();
    let from_id = id_for_account(conn, &from)?;
    let to_id = id_for_account(conn, &to)?;
    if from_id == to_id {
        bail!("Transfer needs two different accounts");
    }
    conn.execute(
        "INSERT INTO transactions(date, kind, amount, description, account_id, to_account_id)
         VALUES (?1, 'transfer', ?2, ?3, ?4, ?5)",
        params![date.to_string(), amount.to_string(), description, from_id, to_id],
    )?;
    println!("Transferred {} from '{}' to '{}' on {}", amount, from, to, date);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRow {
    pub date: String,
    pub kind: String,
    pub account: String,
    /// Signed from the account's point of view.
    pub amount: Decimal,
    pub currency: String,
    pub details: String,
    pub description: String,
}

/// Cash and investment activity merged, newest first.
pub fn activity(
    ledger: &Ledger,
    month: Option<MonthId>,
    account_id: Option<i64>,
) -> anyhow::Result<Vec<ActivityRow>> {
    let in_month = |d: chrono::NaiveDate| month.is_none_or(|m| m.contains(d));
    let touches = |ids: &[i64]| account_id.is_none_or(|a| ids.contains(&a));
    let mut rows: Vec<(chrono::NaiveDate, ActivityRow)> = Vec::new();

    for t in ledger.transactions().iter().filter(|t| in_month(t.date)) {
        let (ids, amount, details) = match &t.kind {
            TransactionKind::Income {
                account_id,
                income_type,
            } => (vec![*account_id], t.amount, income_type.as_str().to_string()),
            TransactionKind::Cost {
                account_id,
                category,
                subcategory,
            } => {
                let details = if subcategory.is_empty() {
                    category.as_str().to_string()
                } else {
                    format!("{} > {}", category.as_str(), subcategory)
                };
                (vec![*account_id], -t.amount, details)
            }
            TransactionKind::Transfer {
                from_account_id,
                to_account_id,
            } => {
                let to = ledger.account(*to_account_id)?;
                (
                    vec![*from_account_id, *to_account_id],
                    -t.amount,
                    format!("-> {}", to.name),
                )
            }
        };
        if !touches(&ids) {
            continue;
        }
        let account = ledger.account(t.kind.source_account())?;
        rows.push((
            t.date,
            ActivityRow {
                date: t.date.to_string(),
                kind: t.kind.as_str().to_string(),
                account: account.name.clone(),
                amount,
                currency: account.currency.clone(),
                details,
                description: t.description.clone(),
            },
        ));
    }

    for t in ledger
        .investment_transactions()
        .iter()
        .filter(|t| in_month(t.date) && touches(&[t.account_id]))
    {
        let account = ledger.account(t.account_id)?;
        let holding = ledger.holding(t.holding_id)?;
        let (amount, details) = match t.kind {
            InvestmentTransactionType::Buy => (
                -t.total_amount,
                format!("{} @ {}", t.quantity.normalize(), t.price_per_unit.normalize()),
            ),
            InvestmentTransactionType::Sell => (
                t.total_amount,
                format!("{} @ {}", t.quantity.normalize(), t.price_per_unit.normalize()),
            ),
            InvestmentTransactionType::Dividend => (t.total_amount, "dividend income".to_string()),
        };
        rows.push((
            t.date,
            ActivityRow {
                date: t.date.to_string(),
                kind: t.kind.as_str().to_string(),
                account: account.name.clone(),
                amount,
                currency: account.currency.clone(),
                details,
                description: holding.ticker.clone(),
            },
        ));
    }

    // Stable: same-day entries keep insertion order.
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(rows.into_iter().map(|(_, r)| r).collect())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let ledger = load_ledger(conn)?;
    let month = opt_str(sub, "month").map(|s| parse_month(&s)).transpose()?;
    let account_id = opt_str(sub, "account")
        .map(|a| id_for_account(conn, &a))
        .transpose()?;
    let mut data = activity(&ledger, month, account_id)?;
    if let Some(limit) = sub.get_one::<usize>("limit") {
        data.truncate(*limit);
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.date.clone(),
                    r.kind.clone(),
                    r.account.clone(),
                    format!("{:.2}", r.amount),
                    r.currency.clone(),
                    r.details.clone(),
                    r.description.clone(),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Date", "Kind", "Account", "Amount", "CCY", "Details", "Description"],
                rows,
            )
        );
    }
    Ok(())
}
