// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Period returns using the Simple Dietz approximation: every cash flow in
//! the period is treated as happening at its midpoint.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::error::{DataGap, ReportError};
use crate::fx::CurrencyConverter;
use crate::ledger::Ledger;
use crate::models::{InvestmentTransactionType, InvestmentType, MonthId};
use crate::store::SummaryStore;
use crate::valuation::{PriceTable, portfolio_value};

/// `(end - start - inflows) / (start + inflows / 2) * 100`, zero when the
/// denominator is zero. A negative denominator is not guarded.
pub fn simple_dietz(end_value: Decimal, start_value: Decimal, net_inflows: Decimal) -> Decimal {
    dietz_percentage(end_value - start_value - net_inflows, start_value, net_inflows)
}

pub fn dietz_percentage(gain: Decimal, start_value: Decimal, net_inflows: Decimal) -> Decimal {
    let denominator = start_value + net_inflows / Decimal::TWO;
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    gain / denominator * Decimal::ONE_HUNDRED
}

/// Which currency an investment transaction's `total_amount` is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowCurrency {
    /// The paying or receiving account's currency (monthly reports).
    Account,
    /// The holding's currency (YTD and portfolio statistics).
    Holding,
}

/// Investment cash flows in a window, converted into the reporting currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvestmentFlows {
    pub buys: Decimal,
    pub sells: Decimal,
    pub dividends: Decimal,
}

impl InvestmentFlows {
    pub fn net_inflows(&self) -> Decimal {
        self.buys - self.sells
    }
}

pub fn investment_flows(
    ledger: &Ledger,
    from: NaiveDate,
    to: NaiveDate,
    class: Option<InvestmentType>,
    flow_currency: FlowCurrency,
    converter: &dyn CurrencyConverter,
    currency: &str,
) -> Result<InvestmentFlows, ReportError> {
    let ids = ledger.holding_ids(class);
    let mut flows = InvestmentFlows::default();
    for t in ledger
        .investment_transactions_between(from, to)
        .filter(|t| ids.contains(&t.holding_id))
    {
        let ccy = match flow_currency {
            FlowCurrency::Account => ledger.account_currency(t.account_id)?,
            FlowCurrency::Holding => ledger.holding(t.holding_id)?.currency.as_str(),
        };
        let amount = converter.convert(t.total_amount, ccy, currency, t.date);
        match t.kind {
            InvestmentTransactionType::Buy => flows.buys += amount,
            InvestmentTransactionType::Sell => flows.sells += amount,
            InvestmentTransactionType::Dividend => flows.dividends += amount,
        }
    }
    Ok(flows)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YtdPerformance {
    pub year: i32,
    pub as_of: NaiveDate,
    pub start_value: Decimal,
    pub end_value: Decimal,
    pub buys: Decimal,
    pub sells: Decimal,
    pub dividends: Decimal,
    pub return_amount: Decimal,
    pub return_pct: Decimal,
}

/// Year-to-date return anchored on the saved December snapshot of the
/// previous year, with flows read in each holding's currency. `Ok(None)`
/// means the anchor is missing and YTD is unavailable; it is never reported
/// as zero.
pub fn ytd_performance(
    ledger: &Ledger,
    store: &dyn SummaryStore,
    as_of: NaiveDate,
    prices: &PriceTable,
    converter: &dyn CurrencyConverter,
    currency: &str,
) -> Result<Option<YtdPerformance>, ReportError> {
    let year = as_of.year();
    let anchor_id = MonthId::prior_december(year).to_string();
    let Some(anchor) = store.get(&anchor_id)? else {
        warn!("{}", DataGap::YtdUnavailable { year });
        return Ok(None);
    };

    let start_value = anchor.summary.end_of_month_investments;
    let year_start = MonthId::new(year, 1)?.first_day();
    let flows = investment_flows(
        ledger,
        year_start,
        as_of,
        None,
        FlowCurrency::Holding,
        converter,
        currency,
    )?;
    let end_value = portfolio_value(ledger, as_of, prices, None, converter, currency)?.total;

    let return_amount = end_value + flows.sells + flows.dividends - start_value - flows.buys;
    // Unlike the monthly figure, a non-positive denominator reads as 0 here.
    let denominator = start_value + flows.net_inflows() / Decimal::TWO;
    let return_pct = if denominator > Decimal::ZERO {
        return_amount / denominator * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    Ok(Some(YtdPerformance {
        year,
        as_of,
        start_value,
        end_value,
        buys: flows.buys,
        sells: flows.sells,
        dividends: flows.dividends,
        return_amount,
        return_pct,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_period_has_zero_return() {
        assert_eq!(simple_dietz(dec!(100), dec!(100), dec!(0)), dec!(0));
    }

    #[test]
    fn growth_without_flows() {
        assert_eq!(simple_dietz(dec!(150), dec!(100), dec!(0)), dec!(50));
    }

    #[test]
    fn deposits_are_weighted_at_midpoint() {
        // (100 - 0 - 100) / (0 + 50)
        assert_eq!(simple_dietz(dec!(100), dec!(0), dec!(100)), dec!(0));
        // (230 - 100 - 100) / (100 + 50) * 100 = 20
        assert_eq!(simple_dietz(dec!(230), dec!(100), dec!(100)), dec!(20));
    }

    #[test]
    fn zero_denominator_yields_zero() {
        assert_eq!(simple_dietz(dec!(10), dec!(0), dec!(0)), dec!(0));
        assert_eq!(simple_dietz(dec!(10), dec!(50), dec!(-100)), dec!(0));
    }

    #[test]
    fn negative_denominator_is_left_as_is() {
        // start 10, net outflow 100: denominator 10 - 50 = -40, gain 0 - 10 + 100 = 90
        assert_eq!(simple_dietz(dec!(0), dec!(10), dec!(-100)), dec!(-225));
    }
}
