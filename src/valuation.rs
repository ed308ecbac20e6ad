// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Market value of holdings at a date.
//!
//! Price resolution order, which historical reports depend on:
//! 1. the price table entry for `(date, ticker)`
//! 2. the unit price of the latest BUY/SELL on or before the date
//! 3. the holding's stored current price
//! 4. zero

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

use crate::error::{DataGap, ReportError};
use crate::fx::CurrencyConverter;
use crate::ledger::Ledger;
use crate::models::{InvestmentHolding, InvestmentType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Market,
    LastTrade,
    StoredPrice,
    Unpriced,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::Market => "market price",
            PriceSource::LastTrade => "last trade price",
            PriceSource::StoredPrice => "stored current price",
            PriceSource::Unpriced => "zero",
        }
    }
}

/// Prices keyed by `(date, TICKER)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    prices: HashMap<(NaiveDate, String), Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `date` with every holding's stored current price.
    pub fn from_current_prices(holdings: &[InvestmentHolding], date: NaiveDate) -> Self {
        let mut table = Self::new();
        for h in holdings {
            if let Some(price) = h.current_price {
                table.insert(date, &h.ticker, price);
            }
        }
        table
    }

    pub fn insert(&mut self, date: NaiveDate, ticker: &str, price: Decimal) {
        self.prices
            .insert((date, ticker.trim().to_uppercase()), price);
    }

    pub fn get(&self, date: NaiveDate, ticker: &str) -> Option<Decimal> {
        self.prices
            .get(&(date, ticker.trim().to_uppercase()))
            .copied()
    }

    pub fn dates(&self) -> BTreeSet<NaiveDate> {
        self.prices.keys().map(|(d, _)| *d).collect()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub holding_id: i64,
    pub quantity: Decimal,
    pub price: Decimal,
    pub source: PriceSource,
    /// In the holding's own currency.
    pub market_value: Decimal,
}

pub fn resolve_price(
    ledger: &Ledger,
    holding: &InvestmentHolding,
    date: NaiveDate,
    prices: &PriceTable,
) -> (Decimal, PriceSource) {
    if let Some(p) = prices.get(date, &holding.ticker) {
        return (p, PriceSource::Market);
    }
    if let Some(p) = ledger.last_trade_price(holding.id, date) {
        return (p, PriceSource::LastTrade);
    }
    if let Some(p) = holding.current_price {
        return (p, PriceSource::StoredPrice);
    }
    (Decimal::ZERO, PriceSource::Unpriced)
}

pub fn value_holding(
    ledger: &Ledger,
    holding: &InvestmentHolding,
    date: NaiveDate,
    prices: &PriceTable,
) -> Result<Valuation, ReportError> {
    let quantity = ledger.holding_quantity(holding.id, date)?;
    if quantity <= Decimal::ZERO {
        return Ok(Valuation {
            holding_id: holding.id,
            quantity,
            price: Decimal::ZERO,
            source: PriceSource::Unpriced,
            market_value: Decimal::ZERO,
        });
    }
    let (price, source) = resolve_price(ledger, holding, date, prices);
    Ok(Valuation {
        holding_id: holding.id,
        quantity,
        price,
        source,
        market_value: quantity * price,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioValue {
    pub total: Decimal,
    pub gaps: Vec<DataGap>,
}

/// Sum of market values at `date`, converted into `currency`, for one asset
/// class or the whole portfolio.
pub fn portfolio_value(
    ledger: &Ledger,
    date: NaiveDate,
    prices: &PriceTable,
    class: Option<InvestmentType>,
    converter: &dyn CurrencyConverter,
    currency: &str,
) -> Result<PortfolioValue, ReportError> {
    let mut out = PortfolioValue::default();
    for holding in ledger
        .holdings()
        .iter()
        .filter(|h| class.is_none_or(|c| h.investment_type == c))
    {
        let valuation = value_holding(ledger, holding, date, prices)?;
        if valuation.quantity <= Decimal::ZERO {
            continue;
        }
        if valuation.source != PriceSource::Market {
            let gap = DataGap::MissingPrice {
                ticker: holding.ticker.to_uppercase(),
                date,
                fallback: valuation.source,
            };
            warn!("{}", gap);
            out.gaps.push(gap);
        }
        out.total += converter.convert(valuation.market_value, &holding.currency, currency, date);
    }
    Ok(out)
}
