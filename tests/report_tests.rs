// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketfolio::db::init_schema;
use pocketfolio::error::ReportError;
use pocketfolio::fx::RateTable;
use pocketfolio::ledger::Ledger;
use pocketfolio::lookup::{
    HistoricalPrice, InstrumentQuery, InstrumentQuote, IsinMatch, LookupError, PriceLookup,
};
use pocketfolio::models::{
    Account, AccountType, CostCategory, IncomeType, InvestmentHolding, InvestmentTransaction,
    InvestmentTransactionType, InvestmentType, MonthId, Transaction, TransactionKind,
};
use pocketfolio::report::{ReportBuilder, ReportOutcome};
use pocketfolio::store::{MemorySummaryStore, SqliteSummaryStore, SummaryStore, load_ledger};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cell::RefCell;

/// Serves canned prices and records every request.
#[derive(Default)]
struct FakeLookup {
    prices: Vec<HistoricalPrice>,
    fail: bool,
    calls: RefCell<Vec<(Vec<String>, Vec<NaiveDate>)>>,
}

impl FakeLookup {
    fn with_prices(prices: &[(&str, NaiveDate, Decimal)]) -> Self {
        Self {
            prices: prices
                .iter()
                .map(|(t, d, p)| HistoricalPrice {
                    ticker: t.to_string(),
                    date: *d,
                    price: *p,
                })
                .collect(),
            ..Self::default()
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

impl PriceLookup for FakeLookup {
    fn historical_prices(
        &self,
        tickers: &[String],
        dates: &[NaiveDate],
    ) -> Result<Vec<HistoricalPrice>, LookupError> {
        self.calls
            .borrow_mut()
            .push((tickers.to_vec(), dates.to_vec()));
        if self.fail {
            return Err(LookupError::Unparseable("I could not find that".into()));
        }
        Ok(self.prices.clone())
    }

    fn instrument_quotes(&self, _: &[InstrumentQuery]) -> Result<Vec<InstrumentQuote>, LookupError> {
        Ok(Vec::new())
    }

    fn resolve_isin(&self, _: &str) -> Result<Option<IsinMatch>, LookupError> {
        Ok(None)
    }
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn month(s: &str) -> MonthId {
    s.parse().unwrap()
}

fn account(id: i64, name: &str, currency: &str, initial: Decimal) -> Account {
    Account {
        id,
        name: name.into(),
        account_type: AccountType::Bank,
        currency: currency.into(),
        initial_balance: initial,
        display_order: id,
    }
}

fn income(id: i64, date: NaiveDate, amount: Decimal, account_id: i64, kind: IncomeType) -> Transaction {
    Transaction {
        id,
        date,
        amount,
        description: String::new(),
        kind: TransactionKind::Income {
            account_id,
            income_type: kind,
        },
    }
}

fn cost(id: i64, date: NaiveDate, amount: Decimal, account_id: i64, sub: &str) -> Transaction {
    Transaction {
        id,
        date,
        amount,
        description: String::new(),
        kind: TransactionKind::Cost {
            account_id,
            category: CostCategory::Must,
            subcategory: sub.into(),
        },
    }
}

fn stock(id: i64, ticker: &str) -> InvestmentHolding {
    InvestmentHolding {
        id,
        ticker: ticker.into(),
        name: format!("{} Inc", ticker),
        investment_type: InvestmentType::Stock,
        currency: "EUR".into(),
        current_price: None,
        isin: None,
        isin_verified: false,
        price_updated: None,
        needs_review: false,
    }
}

fn trade(
    id: i64,
    kind: InvestmentTransactionType,
    date: NaiveDate,
    qty: Decimal,
    price: Decimal,
    total: Decimal,
) -> InvestmentTransaction {
    InvestmentTransaction {
        id,
        holding_id: 1,
        kind,
        date,
        quantity: qty,
        price_per_unit: price,
        total_amount: total,
        account_id: 1,
    }
}

fn generate(
    ledger: &Ledger,
    store: &mut dyn SummaryStore,
    lookup: &dyn PriceLookup,
    fx: &RateTable,
    id: &str,
    refresh: bool,
) -> Result<ReportOutcome, ReportError> {
    ReportBuilder::new(ledger, store, lookup, fx, "EUR").generate(month(id), refresh)
}

/// Broker account holding ABC bought 10 @ 10 on 2024-03-05.
fn broker_ledger() -> Ledger {
    Ledger::new(
        vec![account(1, "Broker", "EUR", dec!(1000))],
        vec![],
        vec![stock(1, "ABC")],
        vec![trade(
            1,
            InvestmentTransactionType::Buy,
            day(2024, 3, 5),
            dec!(10),
            dec!(10),
            dec!(100),
        )],
    )
    .unwrap()
}

#[test]
fn zero_income_month_has_zero_rates() {
    let ledger = Ledger::new(
        vec![account(1, "Main", "EUR", dec!(100))],
        vec![cost(1, day(2024, 3, 4), dec!(30), 1, "Rent")],
        vec![],
        vec![],
    )
    .unwrap();
    let mut store = MemorySummaryStore::new();
    let lookup = FakeLookup::default();
    let fx = RateTable::new("EUR");

    let out = generate(&ledger, &mut store, &lookup, &fx, "2024-03", false).unwrap();
    let s = &out.report.summary;
    assert_eq!(s.total_income, dec!(0));
    assert_eq!(s.savings_rate, dec!(0));
    assert_eq!(s.investment_rate, dec!(0));
    assert_eq!(s.net_savings, dec!(-30));
    assert_eq!(s.cash_flow, dec!(-30));
    assert_eq!(s.end_of_month_cash, dec!(70));
    assert_eq!(out.report.expenses.by_subcategory["Rent"].total, dec!(30));
    assert_eq!(out.report.expenses.transaction_ids, vec![1]);
    // Nothing held, nothing to price
    assert!(lookup.calls.borrow().is_empty());
}

#[test]
fn saved_summary_is_returned_without_a_lookup() {
    let ledger = broker_ledger();
    let mut store = MemorySummaryStore::new();
    let fx = RateTable::new("EUR");
    let good = FakeLookup::with_prices(&[("ABC", day(2024, 3, 31), dec!(12))]);
    let first = generate(&ledger, &mut store, &good, &fx, "2024-03", false).unwrap();
    assert!(!first.cached);

    let broken = FakeLookup::failing();
    let again = generate(&ledger, &mut store, &broken, &fx, "2024-03", false).unwrap();
    assert!(again.cached);
    assert_eq!(again.report, first.report);
    assert!(broken.calls.borrow().is_empty());
}

#[test]
fn previous_month_summary_is_reused_verbatim() {
    let ledger = broker_ledger();
    let mut store = MemorySummaryStore::new();
    let fx = RateTable::new("EUR");

    let march = FakeLookup::with_prices(&[("ABC", day(2024, 3, 31), dec!(12))]);
    let out = generate(&ledger, &mut store, &march, &fx, "2024-03", false).unwrap();
    let inv = &out.report.investments;
    assert_eq!(inv.start_value, dec!(0));
    assert_eq!(inv.end_value, dec!(120));
    assert_eq!(inv.net_inflows, dec!(100));
    // (120 - 0 - 100) / (0 + 50) * 100
    assert_eq!(inv.performance.total, dec!(40));
    assert_eq!(inv.performance.stocks, dec!(40));
    assert_eq!(inv.performance.etfs, dec!(0));
    {
        let calls = march.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, vec!["ABC".to_string()]);
        assert_eq!(calls[0].1, vec![day(2024, 2, 29), day(2024, 3, 31)]);
    }

    // Pretend March was saved when prices looked different
    let mut saved = store.get("2024-03").unwrap().unwrap();
    saved.summary.end_of_month_investments = dec!(150);
    saved.summary.end_of_month_investments_stocks = dec!(150);
    store.put(&saved).unwrap();

    let april = FakeLookup::with_prices(&[("ABC", day(2024, 4, 30), dec!(15))]);
    let out = generate(&ledger, &mut store, &april, &fx, "2024-04", false).unwrap();
    let inv = &out.report.investments;
    assert_eq!(inv.start_value, dec!(150));
    assert_eq!(inv.end_value, dec!(150));
    assert_eq!(inv.performance.total, dec!(0));
    assert_eq!(april.calls.borrow()[0].1, vec![day(2024, 4, 30)]);
    assert_eq!(store.get("2024-03").unwrap().unwrap(), saved);
}

#[test]
fn refresh_keeps_the_stored_month_end_values() {
    let mut store = MemorySummaryStore::new();
    let fx = RateTable::new("EUR");
    let march = FakeLookup::with_prices(&[("ABC", day(2024, 3, 31), dec!(12))]);
    generate(&broker_ledger(), &mut store, &march, &fx, "2024-03", false).unwrap();

    let mut saved = store.get("2024-03").unwrap().unwrap();
    saved.summary.end_of_month_investments = dec!(150);
    saved.summary.end_of_month_investments_stocks = dec!(150);
    store.put(&saved).unwrap();

    // A late salary entry, and prices that moved since the first run
    let base = broker_ledger();
    let ledger = Ledger::new(
        base.accounts().to_vec(),
        vec![income(1, day(2024, 3, 20), dec!(500), 1, IncomeType::Work)],
        base.holdings().to_vec(),
        base.investment_transactions().to_vec(),
    )
    .unwrap();
    let moved = FakeLookup::with_prices(&[("ABC", day(2024, 3, 31), dec!(30))]);
    let out = generate(&ledger, &mut store, &moved, &fx, "2024-03", true).unwrap();

    let s = &out.report.summary;
    assert!(!out.cached);
    assert_eq!(s.end_of_month_investments, dec!(150));
    assert_eq!(s.end_of_month_investments_stocks, dec!(150));
    assert_eq!(s.total_income, dec!(500));
    // (150 - 0 - 100) / (0 + 50) * 100
    assert_eq!(out.report.investments.performance.total, dec!(100));
    // Only the uncovered start date was left, and nothing was held then
    assert!(moved.calls.borrow().is_empty());
    assert_eq!(store.get("2024-03").unwrap().unwrap().summary.end_of_month_investments, dec!(150));
}

#[test]
fn lookup_failure_leaves_saved_summaries_untouched() {
    let ledger = broker_ledger();
    let mut store = MemorySummaryStore::new();
    let fx = RateTable::new("EUR");
    let good = FakeLookup::with_prices(&[("ABC", day(2024, 3, 31), dec!(12))]);
    let saved = generate(&ledger, &mut store, &good, &fx, "2024-04", false)
        .unwrap()
        .report;

    // The start value of April still needs a March close
    let broken = FakeLookup::failing();
    let err = generate(&ledger, &mut store, &broken, &fx, "2024-04", true).unwrap_err();
    assert!(matches!(err, ReportError::Collaborator(_)));
    assert_eq!(broken.calls.borrow()[0].1, vec![day(2024, 3, 31)]);
    assert_eq!(store.get("2024-04").unwrap(), Some(saved));

    let err = generate(&ledger, &mut store, &broken, &fx, "2024-05", false).unwrap_err();
    assert!(matches!(err, ReportError::Collaborator(_)));
    assert_eq!(store.get("2024-05").unwrap(), None);
}

#[test]
fn missing_prices_fall_back_and_are_reported() {
    let ledger = broker_ledger();
    let mut store = MemorySummaryStore::new();
    let fx = RateTable::new("EUR");
    let empty = FakeLookup::default();
    let out = generate(&ledger, &mut store, &empty, &fx, "2024-03", false).unwrap();
    // Last trade price stands in for the month-end close
    assert_eq!(out.report.investments.end_value, dec!(100));
    assert_eq!(out.gaps.len(), 1);
    assert!(out.gaps[0].to_string().contains("last trade price"));
}

#[test]
fn amounts_are_converted_per_account_currency() {
    let ledger = Ledger::new(
        vec![
            account(1, "Main", "EUR", dec!(0)),
            account(2, "US", "USD", dec!(0)),
        ],
        vec![
            income(1, day(2024, 3, 1), dec!(125), 2, IncomeType::Work),
            income(2, day(2024, 3, 2), dec!(50), 1, IncomeType::Extra),
            cost(3, day(2024, 3, 3), dec!(30), 1, ""),
        ],
        vec![],
        vec![],
    )
    .unwrap();
    let mut store = MemorySummaryStore::new();
    let fx = RateTable::fixed("EUR", &[("EUR", "USD", dec!(1.25))]);
    let out = generate(&ledger, &mut store, &FakeLookup::default(), &fx, "2024-03", false).unwrap();
    let r = &out.report;
    assert_eq!(r.income.work_income, dec!(100));
    assert_eq!(r.income.extra_income, dec!(50));
    assert_eq!(r.summary.total_income, dec!(150));
    assert_eq!(r.summary.savings_rate, dec!(80));
    assert_eq!(r.summary.end_of_month_cash, dec!(120));
    // Costs without a subcategory are not broken down
    assert!(r.expenses.by_subcategory.is_empty());
}

#[test]
fn round_trip_within_a_month_is_a_net_outflow() {
    let ledger = Ledger::new(
        vec![account(1, "Broker", "EUR", dec!(0))],
        vec![],
        vec![stock(1, "ABC")],
        vec![
            trade(1, InvestmentTransactionType::Buy, day(2024, 3, 1), dec!(10), dec!(10), dec!(100)),
            trade(2, InvestmentTransactionType::Sell, day(2024, 3, 5), dec!(10), dec!(12), dec!(120)),
            trade(3, InvestmentTransactionType::Dividend, day(2024, 3, 6), dec!(0), dec!(0), dec!(2)),
        ],
    )
    .unwrap();
    let mut store = MemorySummaryStore::new();
    let lookup = FakeLookup::default();
    let out = generate(&ledger, &mut store, &lookup, &RateTable::new("EUR"), "2024-03", false).unwrap();
    let r = &out.report;
    assert_eq!(r.investments.total_buys, dec!(100));
    assert_eq!(r.investments.total_sells, dec!(120));
    assert_eq!(r.summary.net_investments, dec!(-20));
    assert_eq!(r.income.dividends, dec!(2));
    assert_eq!(r.summary.cash_flow, dec!(22));
    assert_eq!(r.investments.end_value, dec!(0));
    // Denominator 0 + (-20 / 2) is negative and kept as-is
    assert_eq!(r.investments.performance.total, dec!(-200));
    assert!(lookup.calls.borrow().is_empty());
}

#[test]
fn sqlite_store_round_trips_reports() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pocketfolio.sqlite");
    let saved = {
        let conn = Connection::open(&path).unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO accounts(id,name,type,currency,initial_balance) VALUES (1,'Main','bank','EUR','10')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transactions(date,kind,amount,account_id,category,subcategory)
             VALUES ('2024-03-02','cost','3.33',1,'wants','Coffee')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transactions(date,kind,amount,account_id,income_type)
             VALUES ('2024-03-01','income','1000.10',1,'work')",
            [],
        )
        .unwrap();
        let ledger = load_ledger(&conn).unwrap();
        let mut store = SqliteSummaryStore::new(&conn);
        generate(&ledger, &mut store, &FakeLookup::default(), &RateTable::new("EUR"), "2024-03", false)
            .unwrap()
            .report
    };

    let conn = Connection::open(&path).unwrap();
    let store = SqliteSummaryStore::new(&conn);
    assert_eq!(store.get("2024-03").unwrap(), Some(saved.clone()));
    assert_eq!(store.list().unwrap(), vec![saved]);
    assert_eq!(store.get("2024-04").unwrap(), None);
}
