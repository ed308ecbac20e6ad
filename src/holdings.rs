// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Per-holding summaries, portfolio statistics, and applying quotes from the
//! lookup service to stored holdings.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{DataGap, ReportError};
use crate::fx::CurrencyConverter;
use crate::ledger::Ledger;
use crate::lookup::{InstrumentQuery, InstrumentQuote};
use crate::models::{InvestmentHolding, InvestmentTransactionType, InvestmentType, MonthId};
use crate::performance::{YtdPerformance, ytd_performance};
use crate::store::SummaryStore;
use crate::valuation::{PriceSource, PriceTable, value_holding};

/// Cost basis, proceeds, dividends and market value are in the holding's
/// currency; `market_value_reporting` is converted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingSummary {
    pub holding_id: i64,
    pub ticker: String,
    pub name: String,
    pub investment_type: InvestmentType,
    pub currency: String,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub dividends: Decimal,
    pub price: Decimal,
    pub price_source: PriceSource,
    pub market_value: Decimal,
    pub market_value_reporting: Decimal,
    pub total_return: Decimal,
    pub return_pct: Decimal,
    pub allocation_pct: Decimal,
    pub transaction_count: usize,
    pub needs_review: bool,
}

fn pct(part: Decimal, whole: Decimal) -> Decimal {
    if whole > Decimal::ZERO {
        part / whole * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

/// Summaries of open positions as of `as_of`, sorted by ticker. Closed
/// positions are hidden; holdings with no transactions yet are kept.
pub fn holding_summaries(
    ledger: &Ledger,
    as_of: NaiveDate,
    converter: &dyn CurrencyConverter,
    currency: &str,
) -> Result<Vec<HoldingSummary>, ReportError> {
    let prices = PriceTable::from_current_prices(ledger.holdings(), as_of);
    let mut out = Vec::new();
    for h in ledger.holdings() {
        let totals = ledger.holding_totals(h.id, as_of)?;
        if totals.quantity <= Decimal::ZERO && totals.transaction_count > 0 {
            continue;
        }
        let valuation = value_holding(ledger, h, as_of, &prices)?;
        let total_return =
            valuation.market_value + totals.proceeds + totals.dividends - totals.cost_basis;
        out.push(HoldingSummary {
            holding_id: h.id,
            ticker: h.ticker.clone(),
            name: h.name.clone(),
            investment_type: h.investment_type,
            currency: h.currency.clone(),
            quantity: totals.quantity,
            cost_basis: totals.cost_basis,
            proceeds: totals.proceeds,
            dividends: totals.dividends,
            price: valuation.price,
            price_source: valuation.source,
            market_value: valuation.market_value,
            market_value_reporting: converter.convert(
                valuation.market_value,
                &h.currency,
                currency,
                as_of,
            ),
            total_return,
            return_pct: pct(total_return, totals.cost_basis),
            allocation_pct: Decimal::ZERO,
            transaction_count: totals.transaction_count,
            needs_review: h.needs_review,
        });
    }

    let total: Decimal = out.iter().map(|s| s.market_value_reporting).sum();
    for s in &mut out {
        s.allocation_pct = pct(s.market_value_reporting, total);
    }
    out.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioStats {
    pub as_of: NaiveDate,
    pub currency: String,
    pub total_value: Decimal,
    pub stocks_value: Decimal,
    pub etfs_value: Decimal,
    pub crypto_value: Decimal,
    pub total_cost_basis: Decimal,
    pub total_return: Decimal,
    pub total_return_pct: Decimal,
    /// `None` when last December's summary is missing.
    pub ytd: Option<YtdPerformance>,
    pub ytd_dividends: Decimal,
    pub lifetime_dividends: Decimal,
    pub trailing_dividends: Decimal,
    pub dividend_yield_pct: Decimal,
}

pub fn portfolio_stats(
    ledger: &Ledger,
    store: &dyn SummaryStore,
    as_of: NaiveDate,
    converter: &dyn CurrencyConverter,
    currency: &str,
) -> Result<PortfolioStats, ReportError> {
    let summaries = holding_summaries(ledger, as_of, converter, currency)?;

    let mut stats = PortfolioStats {
        as_of,
        currency: currency.to_uppercase(),
        total_value: Decimal::ZERO,
        stocks_value: Decimal::ZERO,
        etfs_value: Decimal::ZERO,
        crypto_value: Decimal::ZERO,
        total_cost_basis: Decimal::ZERO,
        total_return: Decimal::ZERO,
        total_return_pct: Decimal::ZERO,
        ytd: None,
        ytd_dividends: Decimal::ZERO,
        lifetime_dividends: Decimal::ZERO,
        trailing_dividends: Decimal::ZERO,
        dividend_yield_pct: Decimal::ZERO,
    };

    for s in &summaries {
        stats.total_value += s.market_value_reporting;
        match s.investment_type {
            InvestmentType::Stock => stats.stocks_value += s.market_value_reporting,
            InvestmentType::Etf => stats.etfs_value += s.market_value_reporting,
            InvestmentType::Crypto => stats.crypto_value += s.market_value_reporting,
        }
        stats.total_cost_basis += converter.convert(s.cost_basis, &s.currency, currency, as_of);
        stats.total_return += converter.convert(s.total_return, &s.currency, currency, as_of);
    }
    stats.total_return_pct = pct(stats.total_return, stats.total_cost_basis);

    let year_start = MonthId::new(as_of.year(), 1)?.first_day();
    let trailing_start = as_of
        .checked_sub_months(Months::new(12))
        .unwrap_or(NaiveDate::MIN);
    for t in ledger
        .investment_transactions()
        .iter()
        .filter(|t| t.kind == InvestmentTransactionType::Dividend && t.date <= as_of)
    {
        let h = ledger.holding(t.holding_id)?;
        let amount = converter.convert(t.total_amount, &h.currency, currency, t.date);
        stats.lifetime_dividends += amount;
        if t.date >= year_start {
            stats.ytd_dividends += amount;
        }
        if t.date >= trailing_start {
            stats.trailing_dividends += amount;
        }
    }
    stats.dividend_yield_pct = pct(stats.trailing_dividends, stats.total_value);

    let prices = PriceTable::from_current_prices(ledger.holdings(), as_of);
    stats.ytd = ytd_performance(ledger, store, as_of, &prices, converter, currency)?;
    Ok(stats)
}

pub fn instrument_queries(holdings: &[InvestmentHolding]) -> Vec<InstrumentQuery> {
    holdings
        .iter()
        .map(|h| InstrumentQuery {
            id: h.id,
            ticker: h.ticker.to_uppercase(),
            isin: h.isin.clone(),
            isin_verified: h.isin_verified,
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteApplication {
    /// Holdings that changed, ready to be written back.
    pub updated: Vec<InvestmentHolding>,
    pub gaps: Vec<DataGap>,
}

/// Merges lookup results into holdings.
///
/// An unverified ISIN adopts the returned name and ticker and becomes
/// verified. A crypto holding whose returned ticker disagrees keeps its
/// ticker and is flagged for review. Prices are converted into the holding's
/// currency and stamped with `today`.
pub fn apply_instrument_quotes(
    holdings: &[InvestmentHolding],
    quotes: &[InstrumentQuote],
    converter: &dyn CurrencyConverter,
    today: NaiveDate,
) -> QuoteApplication {
    let by_id: HashMap<i64, &InstrumentQuote> = quotes.iter().map(|q| (q.id, q)).collect();
    let mut out = QuoteApplication::default();

    for h in holdings {
        let Some(q) = by_id.get(&h.id) else {
            let gap = DataGap::MissingQuote {
                ticker: h.ticker.clone(),
            };
            warn!("{}", gap);
            out.gaps.push(gap);
            continue;
        };

        let mut next = h.clone();
        let returned_ticker = q.ticker.as_deref().map(str::to_uppercase);

        if h.investment_type == InvestmentType::Crypto {
            if let Some(t) = &returned_ticker {
                if *t != h.ticker.to_uppercase() && !h.needs_review {
                    warn!("{} came back as {}; flagged for review", h.ticker, t);
                    next.needs_review = true;
                }
            }
        } else if h.isin.is_some() && !h.isin_verified {
            if let (Some(name), Some(ticker)) = (&q.name, &returned_ticker) {
                next.name = name.clone();
                next.ticker = ticker.clone();
                next.isin_verified = true;
            }
        }

        // A price without a currency is taken to be in the holding's currency.
        match q.current_price {
            Some(price) => {
                let ccy = q.currency.as_deref().unwrap_or(&h.currency);
                next.current_price = Some(converter.convert(price, ccy, &h.currency, today));
                next.price_updated = Some(today);
            }
            None => debug!("no usable price for {}", h.ticker),
        }

        if next != *h {
            out.updated.push(next);
        }
    }
    out
}
