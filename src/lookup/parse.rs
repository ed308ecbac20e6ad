// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Turns model text into typed lookup results.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::{debug, warn};

use super::{HistoricalPrice, InstrumentQuote, IsinMatch, LookupError};
use crate::utils::parse_date;

static FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?(.*?)```").expect("code fence pattern is valid")
});

/// Body of the first fenced block, or the whole text when there is none.
pub fn strip_code_fence(text: &str) -> &str {
    match FENCE.captures(text).and_then(|c| c.get(1)) {
        Some(body) if !body.as_str().trim().is_empty() => body.as_str().trim(),
        _ => text.trim(),
    }
}

fn parse_json(text: &str) -> Result<Value, LookupError> {
    let body = strip_code_fence(text);
    serde_json::from_str(body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        LookupError::Unparseable(format!("{} (response: {})", e, preview))
    })
}

fn decimal_value(v: &Value) -> Option<Decimal> {
    let n = v.as_number()?;
    let s = n.to_string();
    Decimal::from_str_exact(&s)
        .or_else(|_| Decimal::from_scientific(&s))
        .ok()
}

fn string_value(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `[{"ticker", "date", "price"}]`. Valid JSON that is not an array yields no
/// prices; malformed entries are skipped.
pub fn parse_historical_prices(text: &str) -> Result<Vec<HistoricalPrice>, LookupError> {
    let value = parse_json(text)?;
    let Some(items) = value.as_array() else {
        warn!("historical price response is JSON but not an array; treating as empty");
        return Ok(Vec::new());
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let ticker = string_value(item.get("ticker"));
        let date = string_value(item.get("date")).and_then(|d| parse_date(&d).ok());
        let price = item.get("price").and_then(decimal_value);
        match (ticker, date, price) {
            (Some(ticker), Some(date), Some(price)) => out.push(HistoricalPrice {
                ticker: ticker.to_uppercase(),
                date,
                price,
            }),
            _ => debug!("skipping malformed price entry {}", item),
        }
    }
    Ok(out)
}

/// `[{"id", "name"?, "ticker"?, "currentPrice"?, "currency"?}]`. Anything but
/// an array is rejected.
pub fn parse_instrument_quotes(text: &str) -> Result<Vec<InstrumentQuote>, LookupError> {
    let value = parse_json(text)?;
    let items = value
        .as_array()
        .ok_or_else(|| LookupError::Unparseable("expected a JSON array of instruments".into()))?;
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let id = match item.get("id") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        let Some(id) = id else {
            debug!("skipping instrument entry without id {}", item);
            continue;
        };
        out.push(InstrumentQuote {
            id,
            name: string_value(item.get("name")),
            ticker: string_value(item.get("ticker")).map(|t| t.to_uppercase()),
            current_price: item.get("currentPrice").and_then(decimal_value),
            currency: string_value(item.get("currency")).map(|c| c.to_uppercase()),
        });
    }
    Ok(out)
}

/// `{"name", "ticker"}`, or `{}` when the ISIN is unknown.
pub fn parse_isin_match(text: &str) -> Result<Option<IsinMatch>, LookupError> {
    let value = parse_json(text)?;
    let name = string_value(value.get("name"));
    let ticker = string_value(value.get("ticker"));
    Ok(match (name, ticker) {
        (Some(name), Some(ticker)) => Some(IsinMatch {
            name,
            ticker: ticker.to_uppercase(),
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn strips_fenced_json() {
        let raw = "Here you go:\n```json\n[1, 2]\n```\nanything else?";
        assert_eq!(strip_code_fence(raw), "[1, 2]");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  [] "), "[]");
    }

    #[test]
    fn historical_prices_keep_exact_decimals_and_skip_junk() {
        let raw = r#"```json
[{"ticker": "aapl", "date": "2024-03-31", "price": 171.48},
 {"ticker": "BTC", "date": "2024-03-31", "price": "n/a"},
 {"ticker": "MSFT", "date": "31/03/2024", "price": 420.72},
 {"date": "2024-03-31", "price": 1}]
```"#;
        let prices = parse_historical_prices(raw).unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices[0].ticker, "AAPL");
        assert_eq!(prices[0].date, NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
        assert_eq!(prices[0].price, dec!(171.48));
    }

    #[test]
    fn non_array_price_payload_is_empty_not_fatal() {
        assert!(parse_historical_prices(r#"{"error": "none"}"#).unwrap().is_empty());
    }

    #[test]
    fn prose_is_unparseable() {
        let err = parse_historical_prices("I could not find those prices.").unwrap_err();
        assert!(matches!(err, LookupError::Unparseable(_)));
    }

    #[test]
    fn instrument_quotes_require_an_array() {
        assert!(parse_instrument_quotes("{}").is_err());
        let quotes = parse_instrument_quotes(
            r#"[{"id": 3, "name": "Apple Inc.", "ticker": "aapl", "currentPrice": 170.12, "currency": "usd"},
                {"id": "4", "currentPrice": 6.5e4}, {"ticker": "NOID"}]"#,
        )
        .unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(quotes[0].ticker.as_deref(), Some("AAPL"));
        assert_eq!(quotes[0].currency.as_deref(), Some("USD"));
        assert_eq!(quotes[1].id, 4);
        assert_eq!(quotes[1].current_price, Some(dec!(65000)));
    }

    #[test]
    fn isin_match_needs_both_fields() {
        assert_eq!(parse_isin_match("{}").unwrap(), None);
        assert_eq!(parse_isin_match(r#"{"name": "Apple Inc."}"#).unwrap(), None);
        let m = parse_isin_match(r#"{"name": "Apple Inc.", "ticker": "aapl"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(m.ticker, "AAPL");
    }
}
