// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Boundary to the external price and instrument metadata service.
//!
//! Implementations return typed, best-effort results: entries the service
//! could not resolve are simply absent. Free-text responses never leave
//! this module.

pub mod gemini;
pub mod parse;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::valuation::PriceTable;

pub use gemini::GeminiLookup;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("lookup request failed: {0}")]
    Transport(String),

    #[error("lookup service returned HTTP {0}: {1}")]
    Status(u16, String),

    #[error("lookup returned unparseable data: {0}")]
    Unparseable(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        LookupError::Transport(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalPrice {
    pub ticker: String,
    pub date: NaiveDate,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstrumentQuery {
    pub id: i64,
    pub ticker: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isin: Option<String>,
    pub isin_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstrumentQuote {
    pub id: i64,
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub current_price: Option<Decimal>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsinMatch {
    pub name: String,
    pub ticker: String,
}

pub trait PriceLookup {
    /// Closing prices for each ticker on each date; non-trading days resolve
    /// to the previous close.
    fn historical_prices(
        &self,
        tickers: &[String],
        dates: &[NaiveDate],
    ) -> Result<Vec<HistoricalPrice>, LookupError>;

    /// Current price, currency and (for unverified ISINs) name/ticker.
    fn instrument_quotes(
        &self,
        instruments: &[InstrumentQuery],
    ) -> Result<Vec<InstrumentQuote>, LookupError>;

    fn resolve_isin(&self, isin: &str) -> Result<Option<IsinMatch>, LookupError>;
}

/// Keeps only prices for the requested dates, keyed by upper-case ticker.
pub fn into_price_table(prices: &[HistoricalPrice], dates: &[NaiveDate]) -> PriceTable {
    let wanted: BTreeSet<NaiveDate> = dates.iter().copied().collect();
    let mut table = PriceTable::new();
    for p in prices.iter().filter(|p| wanted.contains(&p.date)) {
        table.insert(p.date, &p.ticker, p.price);
    }
    table
}
