// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod accounts;
pub mod transactions;
pub mod reports;
pub mod portfolio;
pub mod fx;
pub mod doctor;

use crate::lookup::{
    GeminiLookup, HistoricalPrice, InstrumentQuery, InstrumentQuote, IsinMatch, LookupError,
    PriceLookup,
};
use crate::utils::get_setting;
use anyhow::Result;
use chrono::NaiveDate;
use once_cell::unsync::OnceCell;
use rusqlite::Connection;

/// Lookup client configured from `GEMINI_API_KEY` and the `lookup_model`
/// setting.
pub(crate) fn lookup_client(conn: &Connection) -> Result<GeminiLookup> {
    let model = get_setting(conn, "lookup_model")?;
    Ok(GeminiLookup::from_env(model)?)
}

/// Builds the client on first use, so cached reports and portfolios without
/// open positions work offline and without an API key.
pub(crate) struct DeferredLookup {
    model: Option<String>,
    client: OnceCell<GeminiLookup>,
}

impl DeferredLookup {
    pub(crate) fn new(conn: &Connection) -> Result<Self> {
        Ok(Self {
            model: get_setting(conn, "lookup_model")?,
            client: OnceCell::new(),
        })
    }

    fn client(&self) -> Result<&GeminiLookup, LookupError> {
        self.client
            .get_or_try_init(|| GeminiLookup::from_env(self.model.clone()))
    }
}

impl PriceLookup for DeferredLookup {
    fn historical_prices(
        &self,
        tickers: &[String],
        dates: &[NaiveDate],
    ) -> Result<Vec<HistoricalPrice>, LookupError> {
        self.client()?.historical_prices(tickers, dates)
    }

    fn instrument_quotes(
        &self,
        instruments: &[InstrumentQuery],
    ) -> Result<Vec<InstrumentQuote>, LookupError> {
        self.client()?.instrument_quotes(instruments)
    }

    fn resolve_isin(&self, isin: &str) -> Result<Option<IsinMatch>, LookupError> {
        self.client()?.resolve_isin(isin)
    }
}
