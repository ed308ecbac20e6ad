// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::commands::lookup_client;
use crate::fx::RateTable;
use crate::holdings::{apply_instrument_quotes, holding_summaries, instrument_queries, portfolio_stats};
use crate::lookup::PriceLookup;
use crate::models::{InvestmentHolding, InvestmentTransactionType, InvestmentType};
use crate::store::{SqliteSummaryStore, load_ledger};
use crate::utils::{
    arg_str, fmt_money, fmt_pct, get_base_currency, id_for_account, id_for_holding,
    maybe_print_json, opt_str, parse_date, parse_decimal, parse_optional_decimal, pretty_table,
};
use crate::valuation::{PriceTable, portfolio_value, value_holding};
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn handle(conn: &mut Connection, m: &clap::ArgMatches) -> Result<()> {
    match m.subcommand() {
        Some(("add-holding", sub)) => add_holding(conn, sub)?,
        Some(("list", sub)) => list(conn, sub)?,
        Some(("buy", sub)) => record_trade(conn, sub, InvestmentTransactionType::Buy)?,
        Some(("sell", sub)) => record_trade(conn, sub, InvestmentTransactionType::Sell)?,
        Some(("dividend", sub)) => dividend(conn, sub)?,
        Some(("set-price", sub)) => set_price(conn, sub)?,
        Some(("value", sub)) => value(conn, sub)?,
        Some(("stats", sub)) => stats(conn, sub)?,
        Some(("refresh-prices", _)) => refresh_prices(conn)?,
        Some(("isin", sub)) => {
            let isin = arg_str(sub, "isin")?.to_uppercase();
            match lookup_client(conn)?.resolve_isin(&isin)? {
                Some(found) => println!("{}: {} ({})", isin, found.name, found.ticker),
                None => println!("{}: no match found", isin),
            }
        }
        _ => {}
    }
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn date_or_today(sub: &clap::ArgMatches, name: &str) -> Result<NaiveDate> {
    Ok(match opt_str(sub, name) {
        Some(raw) => parse_date(&raw)?,
        None => today(),
    })
}

fn add_holding(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let typ: InvestmentType = arg_str(sub, "type")?.parse()?;
    let currency = arg_str(sub, "currency")?.to_uppercase();
    let isin = opt_str(sub, "isin").map(|s| s.to_uppercase());
    let mut ticker = opt_str(sub, "ticker").map(|s| s.to_uppercase());
    let mut name = opt_str(sub, "name");
    let mut verified = false;

    if sub.get_flag("resolve") || ticker.is_none() {
        let Some(isin) = isin.as_deref() else {
            bail!("Provide --ticker or --isin");
        };
        let found = lookup_client(conn)?
            .resolve_isin(isin)?
            .with_context(|| format!("No instrument found for ISIN {}", isin))?;
        println!("Resolved {} to {} ({})", isin, found.name, found.ticker);
        ticker = Some(found.ticker);
        name = name.or(Some(found.name));
        verified = true;
    }

    let Some(ticker) = ticker else {
        bail!("Provide --ticker or --isin");
    };
    let name = name.unwrap_or_else(|| ticker.clone());
    conn.execute(
        "INSERT INTO holdings(ticker, name, investment_type, currency, isin, isin_verified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![ticker, name, typ.as_str(), currency, isin, verified],
    )?;
    println!("Added holding {} ({}) {} {}", ticker, name, typ.as_str(), currency);
    Ok(())
}

fn list(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let as_of = date_or_today(sub, "as-of")?;
    let ledger = load_ledger(conn)?;
    let fx = RateTable::load(conn)?;
    let ccy = get_base_currency(conn)?;
    let data = holding_summaries(&ledger, as_of, &fx, &ccy)?;
    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &data)? {
        let rows = data
            .iter()
            .map(|h| {
                vec![
                    format!("{}{}", h.ticker, if h.needs_review { " (!)" } else { "" }),
                    h.investment_type.as_str().to_string(),
                    format!("{:.4}", h.quantity),
                    format!("{:.2}", h.price),
                    fmt_money(&h.market_value, &h.currency),
                    fmt_money(&h.market_value_reporting, &ccy),
                    fmt_money(&h.total_return, &h.currency),
                    fmt_pct(&h.return_pct),
                    fmt_pct(&h.allocation_pct),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(
                &["Ticker", "Type", "Qty", "Price", "Value", "Value (base)", "Return", "Return %", "Alloc"],
                rows,
            )
        );
    }
    Ok(())
}

fn record_trade(conn: &Connection, sub: &clap::ArgMatches, kind: InvestmentTransactionType) -> Result<()> {
    let date = parse_date(&arg_str(sub, "date")?)?;
    let ticker = arg_str(sub, "ticker")?;
    let account = arg_str(sub, "account")?;
    let qty = parse_decimal(&arg_str(sub, "quantity")?)?;
    let price = parse_decimal(&arg_str(sub, "price")?)?;
    if qty <= Decimal::ZERO || price < Decimal::ZERO {
        bail!("Quantity must be positive and price non-negative");
    }

    let holding_id = id_for_holding(conn, &ticker)?;
    let account_id = id_for_account(conn, &account)?;
    if kind == InvestmentTransactionType::Sell {
        let held = load_ledger(conn)?.holding_quantity(holding_id, date)?;
        if qty > held {
            bail!("Cannot sell {} {}: only {} held on {}", qty, ticker, held, date);
        }
    }

    let total = qty * price;
    conn.execute(
        "INSERT INTO investment_transactions(holding_id, kind, date, quantity, price_per_unit, total_amount, account_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            holding_id,
            kind.as_str(),
            date.to_string(),
            qty.to_string(),
            price.to_string(),
            total.to_string(),
            account_id
        ],
    )?;
    println!(
        "Recorded {} {} x {} @ {} (total {})",
        kind.as_str(),
        qty,
        ticker.to_uppercase(),
        price,
        total
    );
    Ok(())
}

fn dividend(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = parse_date(&arg_str(sub, "date")?)?;
    let ticker = arg_str(sub, "ticker")?;
    let account = arg_str(sub, "account")?;
    let amount = parse_decimal(&arg_str(sub, "amount")?)?;
    if amount <= Decimal::ZERO {
        bail!("Dividend amount must be greater than zero");
    }
    let holding_id = id_for_holding(conn, &ticker)?;
    let account_id = id_for_account(conn, &account)?;
    conn.execute(
        "INSERT INTO investment_transactions(holding_id, kind, date, total_amount, account_id)
         VALUES (?1, 'dividend', ?2, ?3, ?4)",
        params![holding_id, date.to_string(), amount.to_string(), account_id],
    )?;
    println!("Recorded dividend of {} from {}", amount, ticker.to_uppercase());
    Ok(())
}

fn set_price(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let ticker = arg_str(sub, "ticker")?;
    let price = parse_optional_decimal(opt_str(sub, "price"))?;
    if price.is_some_and(|p| p < Decimal::ZERO) {
        bail!("Price must not be negative");
    }
    let id = id_for_holding(conn, &ticker)?;
    conn.execute(
        "UPDATE holdings SET current_price=?1, price_updated=?2 WHERE id=?3",
        params![
            price.map(|p| p.to_string()),
            price.map(|_| today().to_string()),
            id
        ],
    )?;
    match price {
        Some(p) => println!("{} price set to {}", ticker.to_uppercase(), p),
        None => println!("{} price cleared", ticker.to_uppercase()),
    }
    Ok(())
}

#[derive(Serialize)]
struct ValueRow {
    ticker: String,
    quantity: Decimal,
    price: Decimal,
    source: String,
    market_value: Decimal,
    currency: String,
}

#[derive(Serialize)]
struct ValueReport {
    date: NaiveDate,
    currency: String,
    total: Decimal,
    holdings: Vec<ValueRow>,
}

fn value(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let date = date_or_today(sub, "date")?;
    let class = opt_str(sub, "type")
        .map(|s| s.parse::<InvestmentType>())
        .transpose()?;
    let ledger = load_ledger(conn)?;
    let fx = RateTable::load(conn)?;
    let ccy = get_base_currency(conn)?;
    // Stored prices are "current", so they only count as market prices today.
    let prices = if date == today() {
        PriceTable::from_current_prices(ledger.holdings(), date)
    } else {
        PriceTable::new()
    };

    let total = portfolio_value(&ledger, date, &prices, class, &fx, &ccy)?;
    let mut holdings = Vec::new();
    for h in ledger
        .holdings()
        .iter()
        .filter(|h| class.is_none_or(|c| h.investment_type == c))
    {
        let v = value_holding(&ledger, h, date, &prices)?;
        if v.quantity <= Decimal::ZERO {
            continue;
        }
        holdings.push(ValueRow {
            ticker: h.ticker.clone(),
            quantity: v.quantity,
            price: v.price,
            source: v.source.as_str().to_string(),
            market_value: v.market_value,
            currency: h.currency.clone(),
        });
    }
    let report = ValueReport {
        date,
        currency: ccy.clone(),
        total: total.total,
        holdings,
    };

    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &report)? {
        let rows = report
            .holdings
            .iter()
            .map(|r| {
                vec![
                    r.ticker.clone(),
                    format!("{:.4}", r.quantity),
                    format!("{:.2}", r.price),
                    r.source.clone(),
                    fmt_money(&r.market_value, &r.currency),
                ]
            })
            .collect();
        println!(
            "{}",
            pretty_table(&["Ticker", "Qty", "Price", "Price source", "Value"], rows)
        );
        println!("Total on {}: {}", date, fmt_money(&report.total, &ccy));
    }
    Ok(())
}

fn stats(conn: &Connection, sub: &clap::ArgMatches) -> Result<()> {
    let as_of = date_or_today(sub, "as-of")?;
    let ledger = load_ledger(conn)?;
    let fx = RateTable::load(conn)?;
    let ccy = get_base_currency(conn)?;
    let store = SqliteSummaryStore::new(conn);
    let s = portfolio_stats(&ledger, &store, as_of, &fx, &ccy)?;

    if !maybe_print_json(sub.get_flag("json"), sub.get_flag("jsonl"), &s)? {
        let ytd = match &s.ytd {
            Some(y) => format!(
                "{} ({})",
                fmt_money(&y.return_amount, &ccy),
                fmt_pct(&y.return_pct)
            ),
            None => "N/A".to_string(),
        };
        let rows = vec![
            vec!["Total value".into(), fmt_money(&s.total_value, &ccy)],
            vec!["Stocks".into(), fmt_money(&s.stocks_value, &ccy)],
            vec!["ETFs".into(), fmt_money(&s.etfs_value, &ccy)],
            vec!["Crypto".into(), fmt_money(&s.crypto_value, &ccy)],
            vec![
                "Total P/L".into(),
                format!(
                    "{} ({})",
                    fmt_money(&s.total_return, &ccy),
                    fmt_pct(&s.total_return_pct)
                ),
            ],
            vec!["YTD P/L".into(), ytd],
            vec!["YTD dividends".into(), fmt_money(&s.ytd_dividends, &ccy)],
            vec!["Lifetime dividends".into(), fmt_money(&s.lifetime_dividends, &ccy)],
            vec!["Dividend yield (12m)".into(), fmt_pct(&s.dividend_yield_pct)],
        ];
        println!("{}", pretty_table(&["Metric", "Value"], rows));
    }
    Ok(())
}

fn write_holding(tx: &rusqlite::Transaction<'_>, h: &InvestmentHolding) -> Result<()> {
    tx.execute(
        "UPDATE holdings SET ticker=?1, name=?2, current_price=?3, isin_verified=?4,
                price_updated=?5, needs_review=?6
         WHERE id=?7",
        params![
            h.ticker,
            h.name,
            h.current_price.map(|p| p.to_string()),
            h.isin_verified,
            h.price_updated.map(|d| d.to_string()),
            h.needs_review,
            h.id
        ],
    )
    .with_context(|| format!("Updating holding {}", h.ticker))?;
    Ok(())
}

fn refresh_prices(conn: &mut Connection) -> Result<()> {
    let ledger = load_ledger(conn)?;
    if ledger.holdings().is_empty() {
        println!("No holdings to refresh.");
        return Ok(());
    }
    let fx = RateTable::load(conn)?;
    let lookup = lookup_client(conn)?;
    let quotes = lookup.instrument_quotes(&instrument_queries(ledger.holdings()))?;
    let applied = apply_instrument_quotes(ledger.holdings(), &quotes, &fx, today());

    let tx = conn.transaction()?;
    for h in &applied.updated {
        write_holding(&tx, h)?;
    }
    tx.commit()?;

    println!(
        "Updated {} of {} holdings",
        applied.updated.len(),
        ledger.holdings().len()
    );
    for gap in &applied.gaps {
        println!("  {}", gap);
    }
    for h in applied.updated.iter().filter(|h| h.needs_review) {
        println!("  {} needs review: the lookup returned a different ticker", h.ticker);
    }
    Ok(())
}
