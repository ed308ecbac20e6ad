// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketfolio::fx::RateTable;
use pocketfolio::ledger::Ledger;
use pocketfolio::models::{
    Account, AccountType, CostCategory, IncomeType, InvestmentHolding, InvestmentTransaction,
    InvestmentTransactionType, InvestmentType, Transaction, TransactionKind,
};
use pocketfolio::valuation::{PriceSource, PriceTable, portfolio_value, value_holding};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn day(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn account(id: i64, name: &str, initial: Decimal) -> Account {
    Account {
        id,
        name: name.into(),
        account_type: AccountType::Bank,
        currency: "EUR".into(),
        initial_balance: initial,
        display_order: id,
    }
}

fn tx(id: i64, date: NaiveDate, amount: Decimal, kind: TransactionKind) -> Transaction {
    Transaction {
        id,
        date,
        amount,
        description: String::new(),
        kind,
    }
}

fn holding(current_price: Option<Decimal>) -> InvestmentHolding {
    InvestmentHolding {
        id: 1,
        ticker: "ABC".into(),
        name: "Abc Corp".into(),
        investment_type: InvestmentType::Stock,
        currency: "EUR".into(),
        current_price,
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
) -> InvestmentTransaction {
    InvestmentTransaction {
        id,
        holding_id: 1,
        kind,
        date,
        quantity: qty,
        price_per_unit: price,
        total_amount: qty * price,
        account_id: 1,
    }
}

#[test]
fn untouched_accounts_keep_their_initial_balance() {
    let ledger = Ledger::new(
        vec![account(1, "Main", dec!(250.75)), account(2, "Spare", dec!(0))],
        vec![tx(
            1,
            day(3, 1),
            dec!(10),
            TransactionKind::Income {
                account_id: 1,
                income_type: IncomeType::Work,
            },
        )],
        vec![],
        vec![],
    )
    .unwrap();
    for cutoff in [day(1, 1), day(3, 31), day(12, 31)] {
        assert_eq!(ledger.account_balance(2, cutoff).unwrap(), dec!(0));
    }
    assert_eq!(ledger.account_balance(1, day(2, 28)).unwrap(), dec!(250.75));
    assert_eq!(ledger.account_balance(1, day(3, 1)).unwrap(), dec!(260.75));
}

#[test]
fn transfers_conserve_the_combined_balance() {
    let transactions = vec![
        tx(
            1,
            day(3, 2),
            dec!(40),
            TransactionKind::Cost {
                account_id: 1,
                category: CostCategory::Wants,
                subcategory: "Books".into(),
            },
        ),
        tx(
            2,
            day(3, 10),
            dec!(300),
            TransactionKind::Transfer {
                from_account_id: 1,
                to_account_id: 2,
            },
        ),
    ];
    let ledger = Ledger::new(
        vec![account(1, "Main", dec!(1000)), account(2, "Savings", dec!(50))],
        transactions,
        vec![],
        vec![],
    )
    .unwrap();
    let combined = |d| ledger.account_balance(1, d).unwrap() + ledger.account_balance(2, d).unwrap();
    assert_eq!(combined(day(3, 9)), combined(day(3, 10)));
    assert_eq!(ledger.account_balance(1, day(3, 10)).unwrap(), dec!(660));
    assert_eq!(ledger.account_balance(2, day(3, 10)).unwrap(), dec!(350));
}

#[test]
fn transfers_to_the_same_account_are_rejected() {
    let err = Ledger::new(
        vec![account(1, "Main", dec!(0))],
        vec![tx(
            1,
            day(3, 1),
            dec!(5),
            TransactionKind::Transfer {
                from_account_id: 1,
                to_account_id: 1,
            },
        )],
        vec![],
        vec![],
    )
    .unwrap_err();
    assert!(err.to_string().contains("distinct"));
}

#[test]
fn closed_positions_are_worth_nothing() {
    let ledger = Ledger::new(
        vec![account(1, "Broker", dec!(0))],
        vec![],
        vec![holding(Some(dec!(99)))],
        vec![
            trade(1, InvestmentTransactionType::Buy, day(3, 1), dec!(10), dec!(10)),
            trade(2, InvestmentTransactionType::Sell, day(3, 5), dec!(10), dec!(12)),
        ],
    )
    .unwrap();
    let h = &ledger.holdings()[0];
    assert_eq!(ledger.holding_quantity(1, day(3, 10)).unwrap(), dec!(0));

    let mut prices = PriceTable::new();
    prices.insert(day(3, 10), "ABC", dec!(50));
    let v = value_holding(&ledger, h, day(3, 10), &prices).unwrap();
    assert_eq!(v.market_value, dec!(0));
    assert_eq!(v.source, PriceSource::Unpriced);

    let total = portfolio_value(&ledger, day(3, 10), &prices, None, &RateTable::new("EUR"), "EUR")
        .unwrap();
    assert_eq!(total.total, dec!(0));
    assert!(total.gaps.is_empty());

    // Cash moved: -100 on the buy, +120 on the sell
    assert_eq!(ledger.account_balance(1, day(3, 10)).unwrap(), dec!(20));
}

#[test]
fn price_fallback_follows_the_documented_order() {
    let ledger = Ledger::new(
        vec![account(1, "Broker", dec!(0))],
        vec![],
        vec![holding(Some(dec!(7)))],
        vec![trade(1, InvestmentTransactionType::Buy, day(3, 1), dec!(2), dec!(5))],
    )
    .unwrap();
    let h = &ledger.holdings()[0];

    let mut prices = PriceTable::new();
    prices.insert(day(3, 31), "abc", dec!(6));
    let market = value_holding(&ledger, h, day(3, 31), &prices).unwrap();
    assert_eq!((market.price, market.source), (dec!(6), PriceSource::Market));

    let last_trade = value_holding(&ledger, h, day(3, 30), &prices).unwrap();
    assert_eq!((last_trade.price, last_trade.source), (dec!(5), PriceSource::LastTrade));
    assert_eq!(last_trade.market_value, dec!(10));
}
