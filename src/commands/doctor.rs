// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::fx::RateTable;
use crate::ledger::Ledger;
use crate::store::load_ledger;
use crate::utils::{get_base_currency, pretty_table};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

pub fn handle(conn: &Connection) -> Result<()> {
    let ledger = load_ledger(conn)?;
    let fx = RateTable::load(conn)?;
    let base = get_base_currency(conn)?;
    let rows = diagnose(&ledger, &fx, &base, Utc::now().date_naive())?;

    if rows.is_empty() {
        println!("doctor: no issues found");
    } else {
        println!("{}", pretty_table(&["Issue", "Detail"], rows));
    }
    Ok(())
}

/// Issue rows: FX coverage gaps, open positions with no price source, and
/// holdings flagged for review.
pub fn diagnose(
    ledger: &Ledger,
    fx: &RateTable,
    base: &str,
    today: NaiveDate,
) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();

    // (currency, date) pairs that need a rate into the base currency
    let mut needed = BTreeSet::<(String, NaiveDate)>::new();
    for a in ledger.accounts() {
        needed.insert((a.currency.clone(), today));
    }
    for h in ledger.holdings() {
        needed.insert((h.currency.clone(), today));
    }
    for t in ledger.transactions() {
        let ccy = ledger.account_currency(t.kind.source_account())?;
        needed.insert((ccy.to_string(), t.date));
    }
    for t in ledger.investment_transactions() {
        needed.insert((ledger.account_currency(t.account_id)?.to_string(), t.date));
        needed.insert((ledger.holding(t.holding_id)?.currency.clone(), t.date));
    }
    for (ccy, date) in needed {
        if let Some(gap) = fx.coverage_gap(&ccy, base, date) {
            rows.push(vec!["missing_fx".into(), gap.to_string()]);
        }
    }

    for h in ledger.holdings() {
        let qty = ledger.holding_quantity(h.id, today)?;
        if qty > Decimal::ZERO
            && h.current_price.is_none()
            && ledger.last_trade_price(h.id, today).is_none()
        {
            rows.push(vec!["no_price".into(), h.ticker.clone()]);
        }
        if h.needs_review {
            rows.push(vec![
                "needs_review".into(),
                format!("{} ({})", h.ticker, h.name),
            ]);
        }
    }
    Ok(rows)
}
