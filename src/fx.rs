// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use rusqlite::Connection;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::error::{DataGap, ReportError};
use crate::utils::get_base_currency;

pub trait CurrencyConverter {
    /// Converts `amount` from one currency into another as of `on`.
    fn convert(&self, amount: Decimal, from: &str, to: &str, on: NaiveDate) -> Decimal;
}

/// Dated `base -> quote` rates (1 base = rate quote) with a hub currency used
/// for triangulation.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    hub: String,
    rates: HashMap<(String, String), BTreeMap<NaiveDate, Decimal>>,
}

impl RateTable {
    pub fn new(hub: &str) -> Self {
        Self {
            hub: hub.to_uppercase(),
            rates: HashMap::new(),
        }
    }

    /// Undated rates, valid for every conversion date.
    pub fn fixed(hub: &str, rates: &[(&str, &str, Decimal)]) -> Self {
        let mut table = Self::new(hub);
        for (base, quote, rate) in rates {
            table.insert(NaiveDate::MIN, base, quote, *rate);
        }
        table
    }

    pub fn load(conn: &Connection) -> Result<Self, ReportError> {
        let hub = get_base_currency(conn)?;
        let mut table = Self::new(&hub);
        let mut stmt = conn.prepare("SELECT date, base, quote, rate FROM fx_rates")?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (date_s, base, quote, rate_s) = row?;
            let date = crate::utils::parse_date(&date_s)?;
            let rate = rate_s.parse::<Decimal>().map_err(|_| {
                ReportError::input(format!("Invalid rate '{}' for {}/{}", rate_s, base, quote))
            })?;
            table.insert(date, &base, &quote, rate);
        }
        Ok(table)
    }

    pub fn hub(&self) -> &str {
        &self.hub
    }

    pub fn insert(&mut self, date: NaiveDate, base: &str, quote: &str, rate: Decimal) {
        self.rates
            .entry((base.to_uppercase(), quote.to_uppercase()))
            .or_default()
            .insert(date, rate);
    }

    fn rate_on(&self, base: &str, quote: &str, date: NaiveDate) -> Option<Decimal> {
        self.rates
            .get(&(base.to_string(), quote.to_string()))
            .and_then(|series| series.range(..=date).next_back())
            .map(|(_, rate)| *rate)
    }

    /// `None` when no combination of stored rates covers the pair.
    pub fn try_convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        on: NaiveDate,
    ) -> Option<Decimal> {
        let from = from.to_uppercase();
        let to = to.to_uppercase();
        if from == to {
            return Some(amount);
        }
        let hub = self.hub.as_str();

        if to == hub {
            if let Some(r) = self.rate_on(hub, &from, on) {
                return Some(if r.is_zero() { amount } else { amount / r });
            }
        } else if from == hub {
            if let Some(r) = self.rate_on(hub, &to, on) {
                return Some(amount * r);
            }
        } else if let Some(via_hub) = self.try_convert(amount, &from, hub, on) {
            if let Some(out) = self.try_convert(via_hub, hub, &to, on) {
                return Some(out);
            }
        }

        if let Some(r) = self.rate_on(&from, &to, on) {
            return Some(amount * r);
        }
        // Reciprocal last
        if let Some(r) = self.rate_on(&to, &from, on) {
            return Some(if r.is_zero() { amount } else { amount / r });
        }
        None
    }

    pub fn coverage_gap(&self, from: &str, to: &str, on: NaiveDate) -> Option<DataGap> {
        match self.try_convert(Decimal::ONE, from, to, on) {
            Some(_) => None,
            None => Some(DataGap::MissingFxRate {
                from: from.to_uppercase(),
                to: to.to_uppercase(),
                date: on,
            }),
        }
    }
}

impl CurrencyConverter for RateTable {
    fn convert(&self, amount: Decimal, from: &str, to: &str, on: NaiveDate) -> Decimal {
        match self.try_convert(amount, from, to, on) {
            Some(converted) => converted,
            None => {
                if let Some(gap) = self.coverage_gap(from, to, on) {
                    warn!("{}; amount left unconverted", gap);
                }
                amount
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn uses_closest_rate_on_or_before_date() {
        let mut table = RateTable::new("EUR");
        table.insert(day(2024, 1, 1), "EUR", "USD", dec!(1.10));
        table.insert(day(2024, 2, 1), "EUR", "USD", dec!(1.25));

        assert_eq!(
            table.convert(dec!(110), "USD", "EUR", day(2024, 1, 31)),
            dec!(100)
        );
        assert_eq!(
            table.convert(dec!(125), "USD", "EUR", day(2024, 2, 15)),
            dec!(100)
        );
    }

    #[test]
    fn triangulates_through_hub() {
        let table = RateTable::fixed("EUR", &[("EUR", "USD", dec!(1.25)), ("EUR", "GBP", dec!(0.5))]);
        // 125 USD -> 100 EUR -> 50 GBP
        assert_eq!(
            table.convert(dec!(125), "USD", "GBP", day(2024, 5, 1)),
            dec!(50)
        );
    }

    #[test]
    fn falls_back_to_direct_and_reciprocal_pairs() {
        let table = RateTable::fixed("EUR", &[("USD", "GBP", dec!(0.8))]);
        assert_eq!(table.convert(dec!(10), "USD", "GBP", day(2024, 1, 1)), dec!(8));
        assert_eq!(table.convert(dec!(8), "GBP", "USD", day(2024, 1, 1)), dec!(10));
    }

    #[test]
    fn unknown_pairs_pass_through_and_report_a_gap() {
        let table = RateTable::new("EUR");
        assert_eq!(table.convert(dec!(42), "JPY", "EUR", day(2024, 1, 1)), dec!(42));
        assert!(matches!(
            table.coverage_gap("JPY", "EUR", day(2024, 1, 1)),
            Some(DataGap::MissingFxRate { .. })
        ));
        assert!(table.coverage_gap("eur", "EUR", day(2024, 1, 1)).is_none());
    }

    #[test]
    fn rates_dated_after_conversion_are_ignored() {
        let mut table = RateTable::new("EUR");
        table.insert(day(2024, 6, 1), "EUR", "USD", dec!(2));
        assert!(table.try_convert(dec!(1), "USD", "EUR", day(2024, 5, 31)).is_none());
    }
}
