// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::NaiveDate;
use pocketfolio::db::init_schema;
use pocketfolio::fx::{CurrencyConverter, RateTable};
use rusqlite::{Connection, params};
use rust_decimal::Decimal;

fn setup() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn.execute(
        "INSERT INTO settings(key,value) VALUES('base_currency','USD')",
        [],
    )
    .unwrap();
    conn
}

#[test]
fn fx_triangulation_and_reciprocal() {
    let conn = setup();
    // USD->INR and USD->EUR available
    conn.execute(
        "INSERT INTO fx_rates(date,base,quote,rate) VALUES (?1,?2,?3,?4)",
        params!["2025-08-01", "USD", "INR", "83"],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO fx_rates(date,base,quote,rate) VALUES (?1,?2,?3,?4)",
        params!["2025-08-01", "USD", "EUR", "0.90"],
    )
    .unwrap();
    let table = RateTable::load(&conn).unwrap();
    assert_eq!(table.hub(), "USD");
    let on = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();

    // EUR 90 -> INR ? via USD hub
    let res = table.convert(Decimal::new(9000, 2), "EUR", "INR", on);
    // 90 EUR -> USD = 90 / 0.90 = 100 USD; -> INR = 100 * 83 = 8300
    assert_eq!(format!("{:.2}", res.round_dp(2)), "8300.00");

    // Reciprocal: INR -> USD using only USD->INR
    let res2 = table.convert(Decimal::new(16600, 2), "INR", "USD", on);
    assert_eq!(format!("{:.2}", res2.round_dp(2)), "2.00");
}

#[test]
fn rates_before_the_first_quote_are_a_gap() {
    let conn = setup();
    conn.execute(
        "INSERT INTO fx_rates(date,base,quote,rate) VALUES ('2025-08-01','USD','EUR','0.90')",
        [],
    )
    .unwrap();
    let table = RateTable::load(&conn).unwrap();
    let before = NaiveDate::from_ymd_opt(2025, 7, 31).unwrap();
    assert!(table.try_convert(Decimal::ONE, "EUR", "USD", before).is_none());
    assert!(table.coverage_gap("EUR", "USD", before).is_some());
    // Unknown pairs pass through unchanged
    assert_eq!(table.convert(Decimal::TEN, "EUR", "USD", before), Decimal::TEN);
}

#[test]
fn malformed_rates_reject_the_load() {
    let conn = setup();
    conn.execute(
        "INSERT INTO fx_rates(date,base,quote,rate) VALUES ('2025-08-01','USD','EUR','abc')",
        [],
    )
    .unwrap();
    assert!(RateTable::load(&conn).is_err());
}
