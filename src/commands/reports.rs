// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::DeferredLookup;
use crate::fx::{CurrencyConverter, RateTable};
use crate::models::ReportData;
use crate::performance::ytd_performance;
use crate::report::{ReportBuilder, ReportOutcome};
use crate::store::{SqliteSummaryStore, SummaryStore, load_ledger};
use crate::utils::{
    arg_str, fmt_money, fmt_pct, get_base_currency, maybe_print_json, opt_str, parse_date,
    parse_month, pretty_table,
};
use crate::valuation::PriceTable;
use anyhow::Result;
use chrono::{Datelike, NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("monthly", sub)) => monthly(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("ytd", sub)) => ytd(conn, sub)?,
        Some(("balances", sub)) => balances(conn, sub)?,
        _ => {}
    }
    Ok(())
}

fn as_of(sub: &clap::ArgMatches) -> Result<NaiveDate> {
    Ok(match opt_str(sub, "as-of") {
        Some(raw) => parse_date(&raw)?,
        None => Utc::now().date_naive(),
    })
}

fn monthly(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let month = parse_month(&arg_str(sub, "month")?)?;
    let refresh = sub.get_flag("refresh");
    let ledger = load_ledger(conn)?;
    let fx = RateTable::load(conn)?;
    let ccy = get_base_currency(conn)?;
    let lookup = DeferredLookup::new(conn)?;
    let mut store = SqliteSummaryStore::new(conn);

    let outcome = ReportBuilder::new(&ledger, &mut store, &lookup, &fx, &ccy).generate(month, refresh)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &outcome)? {
        print_report(&outcome);
    }
    Ok(())
}

fn print_report(outcome: &ReportOutcome) {
    let r = &outcome.report;
    let c = r.currency.as_str();
    let s = &r.summary;
    println!(
        "Report {}{}",
        r.id,
        if outcome.cached { " (saved)" } else { "" }
    );
    let summary = vec![
        vec!["Income".into(), fmt_money(&s.total_income, c)],
        vec!["  work".into(), fmt_money(&r.income.work_income, c)],
        vec!["  extra".into(), fmt_money(&r.income.extra_income, c)],
        vec!["  dividends".into(), fmt_money(&r.income.dividends, c)],
        vec!["Spending".into(), fmt_money(&s.total_spending, c)],
        vec!["  must".into(), fmt_money(&r.expenses.must_spending, c)],
        vec!["  wants".into(), fmt_money(&r.expenses.wants_spending, c)],
        vec!["Net savings".into(), fmt_money(&s.net_savings, c)],
        vec!["Savings rate".into(), fmt_pct(&s.savings_rate)],
        vec!["Net investments".into(), fmt_money(&s.net_investments, c)],
        vec!["Investment rate".into(), fmt_pct(&s.investment_rate)],
        vec!["Cash flow".into(), fmt_money(&s.cash_flow, c)],
        vec!["Cash at month end".into(), fmt_money(&s.end_of_month_cash, c)],
        vec!["Investments at month end".into(), fmt_money(&s.end_of_month_investments, c)],
    ];
    println!("{}", pretty_table(&["Summary", "Value"], summary));

    if !r.expenses.by_subcategory.is_empty() {
        let mut subs: Vec<_> = r.expenses.by_subcategory.iter().collect();
        subs.sort_by(|a, b| b.1.total.cmp(&a.1.total));
        let rows = subs
            .into_iter()
            .map(|(name, t)| {
                vec![
                    name.clone(),
                    t.category.as_str().to_string(),
                    fmt_money(&t.total, c),
                ]
            })
            .collect();
        println!("{}", pretty_table(&["Subcategory", "Category", "Spent"], rows));
    }

    let inv = &r.investments;
    let p = &inv.performance;
    let perf = vec![
        vec![
            "Total".into(),
            fmt_money(&inv.start_value, c),
            fmt_money(&inv.end_value, c),
            fmt_money(&inv.net_inflows, c),
            fmt_pct(&p.total),
        ],
        vec![
            "Stocks".into(),
            String::new(),
            fmt_money(&s.end_of_month_investments_stocks, c),
            String::new(),
            fmt_pct(&p.stocks),
        ],
        vec![
            "ETFs".into(),
            String::new(),
            fmt_money(&s.end_of_month_investments_etfs, c),
            String::new(),
            fmt_pct(&p.etfs),
        ],
        vec![
            "Crypto".into(),
            String::new(),
            fmt_money(&s.end_of_month_investments_crypto, c),
            String::new(),
            fmt_pct(&p.crypto),
        ],
    ];
    println!(
        "{}",
        pretty_table(&["Portfolio", "Start", "End", "Net inflows", "Return"], perf)
    );
    for gap in &outcome.gaps {
        println!("note: {}", gap);
    }
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let store = SqliteSummaryStore::new(conn);
    let reports: Vec<ReportData> = store.list()?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &reports)? {
        let rows = reports
            .iter()
            .rev()
            .map(|r| {
                let c = r.currency.as_str();
                vec![
                    r.id.clone(),
                    fmt_money(&r.summary.total_income, c),
                    fmt_money(&r.summary.total_spending, c),
                    fmt_pct(&r.summary.savings_rate),
                    fmt_money(&r.summary.end_of_month_investments, c),
                    fmt_pct(&r.investments.performance.total),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Month", "Income", "Spending", "Savings rate", "Investments", "Return"],
                rows,
            )
        );
    }
    Ok(())
}

fn ytd(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = as_of(sub)?;
    let ledger = load_ledger(conn)?;
    let fx = RateTable::load(conn)?;
    let ccy = get_base_currency(conn)?;
    let store = SqliteSummaryStore::new(conn);
    let prices = PriceTable::from_current_prices(ledger.holdings(), date);
    let result = ytd_performance(&ledger, &store, date, &prices, &fx, &ccy)?;

    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &result)? {
        match result {
            Some(y) => {
                let rows = vec![
                    vec!["Start value".into(), fmt_money(&y.start_value, &ccy)],
                    vec!["End value".into(), fmt_money(&y.end_value, &ccy)],
                    vec!["Buys".into(), fmt_money(&y.buys, &ccy)],
                    vec!["Sells".into(), fmt_money(&y.sells, &ccy)],
                    vec!["Dividends".into(), fmt_money(&y.dividends, &ccy)],
                    vec!["Return".into(), fmt_money(&y.return_amount, &ccy)],
                    vec!["Return %".into(), fmt_pct(&y.return_pct)],
                ];
                println!("YTD {} as of {}", y.year, y.as_of);
                println!("{}", pretty_table(&["Metric", "Value"], rows));
            }
            None => println!(
                "YTD: N/A (generate the report for {}-12 first)",
                date.year() - 1
            ),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct BalanceRow {
    account: String,
    currency: String,
    balance: Decimal,
    converted: Decimal,
}

fn balances(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = as_of(sub)?;
    let ledger = load_ledger(conn)?;
    let fx = RateTable::load(conn)?;
    let ccy = get_base_currency(conn)?;
    let mut data = Vec::new();
    for a in ledger.accounts() {
        let balance = ledger.account_balance(a.id, date)?;
        data.push(BalanceRow {
            account: a.name.clone(),
            currency: a.currency.clone(),
            balance,
            converted: fx.convert(balance, &a.currency, &ccy, date),
        });
    }
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let total: Decimal = data.iter().map(|r| r.converted).sum();
        let mut rows: Vec<Vec<String>> = data
            .iter()
            .map(|r| {
                vec![
                    r.account.clone(),
                    fmt_money(&r.balance, &r.currency),
                    fmt_money(&r.converted, &ccy),
                ]
            })
            .collect();
        rows.push(vec!["Total".into(), String::new(), fmt_money(&total, &ccy)]);
        println!(
            "{}",
            pretty_table(&["Account", "Balance", &format!("In {}", ccy)], rows)
        );
    }
    Ok(())
}
