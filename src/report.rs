// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Monthly report generation on top of the summary cache.
//!
//! A saved month is returned as-is unless a refresh is asked for. Saved
//! end-of-month investment values are never recomputed: a refresh keeps the
//! month's own stored values, and the start value of every asset class comes
//! from the previous month's saved summary if there is one. Income, spending
//! and cash are rebuilt on refresh. Nothing is written unless every step,
//! including the price lookup, succeeds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::error::{DataGap, ReportError};
use crate::fx::CurrencyConverter;
use crate::ledger::Ledger;
use crate::lookup::{PriceLookup, into_price_table};
use crate::models::{
    CostCategory, ExpenseDetails, IncomeDetails, IncomeType, InvestmentDetails, InvestmentType,
    MonthId, PerformanceBreakdown, ReportData, ReportSummary, SubcategoryTotal, TransactionKind,
};
use crate::performance::{FlowCurrency, investment_flows, simple_dietz};
use crate::store::SummaryStore;
use crate::valuation::{PriceTable, portfolio_value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportOutcome {
    pub report: ReportData,
    /// True when the saved summary was returned without recomputation.
    pub cached: bool,
    pub gaps: Vec<DataGap>,
}

pub struct ReportBuilder<'a> {
    ledger: &'a Ledger,
    store: &'a mut dyn SummaryStore,
    lookup: &'a dyn PriceLookup,
    converter: &'a dyn CurrencyConverter,
    currency: String,
}

/// End-of-month values for the whole portfolio and each asset class.
#[derive(Debug, Clone, Default, PartialEq)]
struct ClassValues {
    total: Decimal,
    stocks: Decimal,
    etfs: Decimal,
    crypto: Decimal,
}

impl ClassValues {
    fn from_summary(s: &ReportSummary) -> Self {
        Self {
            total: s.end_of_month_value(None),
            stocks: s.end_of_month_value(Some(InvestmentType::Stock)),
            etfs: s.end_of_month_value(Some(InvestmentType::Etf)),
            crypto: s.end_of_month_value(Some(InvestmentType::Crypto)),
        }
    }

    fn get(&self, class: Option<InvestmentType>) -> Decimal {
        match class {
            None => self.total,
            Some(InvestmentType::Stock) => self.stocks,
            Some(InvestmentType::Etf) => self.etfs,
            Some(InvestmentType::Crypto) => self.crypto,
        }
    }

    fn set(&mut self, class: Option<InvestmentType>, value: Decimal) {
        match class {
            None => self.total = value,
            Some(InvestmentType::Stock) => self.stocks = value,
            Some(InvestmentType::Etf) => self.etfs = value,
            Some(InvestmentType::Crypto) => self.crypto = value,
        }
    }
}

const CLASSES: [Option<InvestmentType>; 4] = [
    None,
    Some(InvestmentType::Stock),
    Some(InvestmentType::Etf),
    Some(InvestmentType::Crypto),
];

fn rate(part: Decimal, whole: Decimal) -> Decimal {
    if whole > Decimal::ZERO {
        part / whole * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    }
}

impl<'a> ReportBuilder<'a> {
    pub fn new(
        ledger: &'a Ledger,
        store: &'a mut dyn SummaryStore,
        lookup: &'a dyn PriceLookup,
        converter: &'a dyn CurrencyConverter,
        currency: &str,
    ) -> Self {
        Self {
            ledger,
            store,
            lookup,
            converter,
            currency: currency.to_uppercase(),
        }
    }

    pub fn generate(&mut self, month: MonthId, refresh: bool) -> Result<ReportOutcome, ReportError> {
        let id = month.to_string();
        let existing = self.store.get(&id)?;
        if !refresh {
            if let Some(saved) = existing {
                debug!(month = %id, "returning saved summary");
                return Ok(ReportOutcome {
                    report: saved,
                    cached: true,
                    gaps: Vec::new(),
                });
            }
        }

        let start_date = month.previous().last_day();
        let end_date = month.last_day();
        let previous = self.store.get(&month.previous().to_string())?;
        if let Some(p) = &previous {
            if p.currency != self.currency {
                warn!(
                    "summary {} is in {}, reusing its values for a {} report",
                    p.id, p.currency, self.currency
                );
            }
        }

        let mut dates = Vec::new();
        if previous.is_none() {
            dates.push(start_date);
        }
        if existing.is_none() {
            dates.push(end_date);
        }
        let prices = self.fetch_prices(&dates)?;

        let mut gaps = Vec::new();
        let end_values = match &existing {
            Some(saved) => ClassValues::from_summary(&saved.summary),
            None => self.values_at(end_date, &prices, &mut gaps)?,
        };
        let start_values = match &previous {
            Some(p) => ClassValues::from_summary(&p.summary),
            None => self.values_at(start_date, &prices, &mut gaps)?,
        };

        let report = self.assemble(month, &start_values, &end_values)?;
        self.store.put(&report)?;
        info!(month = %id, refresh, "report saved");

        Ok(ReportOutcome {
            report,
            cached: false,
            gaps,
        })
    }

    /// One lookup for every ticker held on any of `dates`. Lookup failures
    /// abort the generation.
    fn fetch_prices(&self, dates: &[NaiveDate]) -> Result<PriceTable, ReportError> {
        let mut tickers = BTreeSet::new();
        for h in self.ledger.holdings() {
            for d in dates {
                if self.ledger.holding_quantity(h.id, *d)? > Decimal::ZERO {
                    tickers.insert(h.ticker.to_uppercase());
                }
            }
        }
        if tickers.is_empty() {
            return Ok(PriceTable::new());
        }
        let tickers: Vec<String> = tickers.into_iter().collect();
        debug!(?tickers, ?dates, "requesting historical prices");
        let quotes = self.lookup.historical_prices(&tickers, dates)?;
        Ok(into_price_table(&quotes, dates))
    }

    fn values_at(
        &self,
        date: NaiveDate,
        prices: &PriceTable,
        gaps: &mut Vec<DataGap>,
    ) -> Result<ClassValues, ReportError> {
        let mut values = ClassValues::default();
        for class in CLASSES {
            let v = portfolio_value(self.ledger, date, prices, class, self.converter, &self.currency)?;
            if class.is_none() {
                gaps.extend(v.gaps);
            }
            values.set(class, v.total);
        }
        Ok(values)
    }

    fn to_reporting(&self, amount: Decimal, account_id: i64, on: NaiveDate) -> Result<Decimal, ReportError> {
        let ccy = self.ledger.account_currency(account_id)?;
        Ok(self.converter.convert(amount, ccy, &self.currency, on))
    }

    fn assemble(
        &self,
        month: MonthId,
        start: &ClassValues,
        end: &ClassValues,
    ) -> Result<ReportData, ReportError> {
        let from = month.first_day();
        let to = month.last_day();

        let mut work_income = Decimal::ZERO;
        let mut extra_income = Decimal::ZERO;
        let mut must_spending = Decimal::ZERO;
        let mut wants_spending = Decimal::ZERO;
        let mut by_subcategory: BTreeMap<String, SubcategoryTotal> = BTreeMap::new();
        let mut cost_ids = Vec::new();

        for t in self.ledger.transactions_between(from, to) {
            match &t.kind {
                TransactionKind::Income {
                    account_id,
                    income_type,
                } => {
                    let amount = self.to_reporting(t.amount, *account_id, t.date)?;
                    match income_type {
                        IncomeType::Work => work_income += amount,
                        IncomeType::Extra => extra_income += amount,
                    }
                }
                TransactionKind::Cost {
                    account_id,
                    category,
                    subcategory,
                } => {
                    let amount = self.to_reporting(t.amount, *account_id, t.date)?;
                    match category {
                        CostCategory::Must => must_spending += amount,
                        CostCategory::Wants => wants_spending += amount,
                    }
                    cost_ids.push(t.id);
                    let sub = subcategory.trim();
                    if !sub.is_empty() {
                        by_subcategory
                            .entry(sub.to_string())
                            .or_insert(SubcategoryTotal {
                                category: *category,
                                total: Decimal::ZERO,
                            })
                            .total += amount;
                    }
                }
                // Transfers move money between accounts; not income or spending.
                TransactionKind::Transfer { .. } => {}
            }
        }

        let flows = investment_flows(
            self.ledger,
            from,
            to,
            None,
            FlowCurrency::Account,
            self.converter,
            &self.currency,
        )?;
        let total_income = work_income + extra_income + flows.dividends;
        let total_spending = must_spending + wants_spending;
        let net_savings = total_income - total_spending;
        let net_investments = flows.net_inflows();

        let mut end_of_month_cash = Decimal::ZERO;
        for account in self.ledger.accounts() {
            let balance = self.ledger.account_balance(account.id, to)?;
            end_of_month_cash += self
                .converter
                .convert(balance, &account.currency, &self.currency, to);
        }

        let mut performance = PerformanceBreakdown {
            total: Decimal::ZERO,
            stocks: Decimal::ZERO,
            etfs: Decimal::ZERO,
            crypto: Decimal::ZERO,
        };
        for class in CLASSES {
            let inflows = if class.is_none() {
                net_investments
            } else {
                investment_flows(
                    self.ledger,
                    from,
                    to,
                    class,
                    FlowCurrency::Account,
                    self.converter,
                    &self.currency,
                )?
                .net_inflows()
            };
            let pct = simple_dietz(end.get(class), start.get(class), inflows);
            match class {
                None => performance.total = pct,
                Some(InvestmentType::Stock) => performance.stocks = pct,
                Some(InvestmentType::Etf) => performance.etfs = pct,
                Some(InvestmentType::Crypto) => performance.crypto = pct,
            }
        }

        Ok(ReportData {
            id: month.to_string(),
            year: month.year(),
            month: month.month(),
            currency: self.currency.clone(),
            summary: ReportSummary {
                total_income,
                total_spending,
                net_savings,
                net_investments,
                savings_rate: rate(net_savings, total_income),
                investment_rate: rate(net_investments, total_income),
                cash_flow: total_income - total_spending - net_investments,
                end_of_month_cash,
                end_of_month_investments: end.total,
                end_of_month_investments_stocks: end.stocks,
                end_of_month_investments_etfs: end.etfs,
                end_of_month_investments_crypto: end.crypto,
            },
            income: IncomeDetails {
                work_income,
                extra_income,
                dividends: flows.dividends,
            },
            expenses: ExpenseDetails {
                must_spending,
                wants_spending,
                by_subcategory,
                transaction_ids: cost_ids,
            },
            investments: InvestmentDetails {
                total_buys: flows.buys,
                total_sells: flows.sells,
                start_value: start.total,
                end_value: end.total,
                net_inflows: net_investments,
                performance,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rates_are_zero_without_income() {
        assert_eq!(rate(dec!(-50), Decimal::ZERO), Decimal::ZERO);
        assert_eq!(rate(dec!(25), dec!(100)), dec!(25));
    }

    #[test]
    fn class_values_round_trip_through_a_summary() {
        let mut v = ClassValues::default();
        v.set(None, dec!(10));
        v.set(Some(InvestmentType::Crypto), dec!(4));
        assert_eq!(v.get(None), dec!(10));
        assert_eq!(v.get(Some(InvestmentType::Crypto)), dec!(4));
        assert_eq!(v.get(Some(InvestmentType::Etf)), Decimal::ZERO);
    }
}
