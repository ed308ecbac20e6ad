// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Price lookup backed by Gemini `generateContent` with Google Search
//! grounding.

use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::parse::{parse_historical_prices, parse_instrument_quotes, parse_isin_match};
use super::{HistoricalPrice, InstrumentQuery, InstrumentQuote, IsinMatch, LookupError, PriceLookup};
use crate::utils::http_client;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const REQUEST_TIMEOUT_SECS: u64 = 60;
const MAX_RETRIES: u32 = 2;
const BASE_RETRY_DELAY_MS: u64 = 1000;

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    tools: Vec<Tool>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Serialize)]
struct GoogleSearch {}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Option<Vec<ResponsePart>>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

fn api_url(model: &str) -> String {
    format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
        model
    )
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_RETRY_DELAY_MS * 2u64.pow(attempt))
}

fn is_retryable(err: &LookupError) -> bool {
    match err {
        LookupError::Transport(_) => true,
        LookupError::Status(code, _) => *code == 429 || *code >= 500,
        _ => false,
    }
}

pub struct GeminiLookup {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiLookup {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LookupError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LookupError::MissingApiKey(API_KEY_ENV));
        }
        Ok(Self {
            client: http_client(REQUEST_TIMEOUT_SECS)?,
            api_key,
            model: model.into(),
        })
    }

    pub fn from_env(model: Option<String>) -> Result<Self, LookupError> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| LookupError::MissingApiKey(API_KEY_ENV))?;
        Self::new(key, model.unwrap_or_else(|| DEFAULT_MODEL.to_string()))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn send_once(&self, body: &GenerateContentRequest) -> Result<String, LookupError> {
        let resp = self
            .client
            .post(api_url(&self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            let preview: String = text.chars().take(200).collect();
            return Err(LookupError::Status(status.as_u16(), preview));
        }
        let data: GenerateContentResponse = resp
            .json()
            .map_err(|e| LookupError::Unparseable(format!("response envelope: {}", e)))?;
        let text = data
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts)
            .map(|parts| {
                parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(text)
    }

    fn generate(&self, prompt: String) -> Result<String, LookupError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part { text: prompt }],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&body) {
                Ok(text) => {
                    debug!(model = %self.model, chars = text.len(), "lookup response received");
                    return Ok(text);
                }
                Err(e) if attempt < MAX_RETRIES && is_retryable(&e) => {
                    warn!("lookup attempt {} failed: {}; retrying", attempt + 1, e);
                    std::thread::sleep(backoff_delay(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn historical_prompt(tickers: &[String], dates: &[NaiveDate]) -> String {
    let dates: Vec<String> = dates.iter().map(|d| d.to_string()).collect();
    let example_date = dates.first().cloned().unwrap_or_default();
    format!(
        "Use Google Search to find the historical closing prices for these tickers on these dates: {dates}. \
Tickers: {tickers}.\n\
Respond with ONLY a valid JSON array of objects. Each object must have \"ticker\" (string, uppercase), \
\"date\" (string, YYYY-MM-DD), and \"price\" (number).\n\
- For stocks and ETFs, use the price in their primary trading currency.\n\
- For cryptocurrencies, use the price in USD.\n\
- If a date is a non-trading day, use the closing price of the last trading day before it.\n\
- If you cannot find a price, omit that ticker-date entry.\n\
- If no prices can be found at all, return an empty array [].\n\
Example response: [{{\"ticker\": \"AAPL\", \"date\": \"{example_date}\", \"price\": 170.33}}]",
        dates = dates.join(", "),
        tickers = tickers.join(", "),
    )
}

fn quotes_prompt(instruments: &[InstrumentQuery]) -> Result<String, LookupError> {
    let payload = serde_json::to_string(instruments)
        .map_err(|e| LookupError::Unparseable(format!("request payload: {}", e)))?;
    Ok(format!(
        "Use Google Search to find data for the following financial instruments.\n\
- For each instrument, return an object containing the original \"id\".\n\
- If an \"isin\" is given and \"isinVerified\" is false, identify the instrument by ISIN and return its official \"name\" and \"ticker\".\n\
- Find the \"currentPrice\" and the primary trading \"currency\" (ISO code) of each instrument.\n\
- Respond with ONLY a valid JSON array. Each object must contain \"id\" and may contain \"name\", \"ticker\", \"currentPrice\" and \"currency\".\n\
- Omit instruments you cannot find.\n\n\
Instruments: {payload}\n\n\
Example response: [{{\"id\": 1, \"name\": \"Apple Inc.\", \"ticker\": \"AAPL\", \"currentPrice\": 170.12, \"currency\": \"USD\"}}]"
    ))
}

fn isin_prompt(isin: &str) -> String {
    format!(
        "Given the ISIN \"{isin}\", find its official name and a common ticker. \
Respond with ONLY a valid JSON object containing \"name\" and \"ticker\" keys. \
If you cannot find the information, respond with an empty JSON object {{}}. \
Example: {{\"name\": \"Apple Inc.\", \"ticker\": \"AAPL\"}}"
    )
}

impl PriceLookup for GeminiLookup {
    fn historical_prices(
        &self,
        tickers: &[String],
        dates: &[NaiveDate],
    ) -> Result<Vec<HistoricalPrice>, LookupError> {
        if tickers.is_empty() || dates.is_empty() {
            return Ok(Vec::new());
        }
        let text = self.generate(historical_prompt(tickers, dates))?;
        parse_historical_prices(&text)
    }

    fn instrument_quotes(
        &self,
        instruments: &[InstrumentQuery],
    ) -> Result<Vec<InstrumentQuote>, LookupError> {
        if instruments.is_empty() {
            return Ok(Vec::new());
        }
        let text = self.generate(quotes_prompt(instruments)?)?;
        parse_instrument_quotes(&text)
    }

    fn resolve_isin(&self, isin: &str) -> Result<Option<IsinMatch>, LookupError> {
        let text = self.generate(isin_prompt(isin.trim()))?;
        parse_isin_match(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_rejected_up_front() {
        assert!(matches!(
            GeminiLookup::new("  ", DEFAULT_MODEL),
            Err(LookupError::MissingApiKey(API_KEY_ENV))
        ));
    }

    #[test]
    fn only_transient_failures_are_retried() {
        assert!(is_retryable(&LookupError::Transport("reset".into())));
        assert!(is_retryable(&LookupError::Status(503, String::new())));
        assert!(is_retryable(&LookupError::Status(429, String::new())));
        assert!(!is_retryable(&LookupError::Status(401, String::new())));
        assert!(!is_retryable(&LookupError::Unparseable(String::new())));
    }

    #[test]
    fn request_serializes_search_tool() {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part { text: "hi".into() }],
            }],
            tools: vec![Tool {
                google_search: GoogleSearch {},
            }],
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["tools"][0]["google_search"], serde_json::json!({}));
        assert_eq!(v["contents"][0]["parts"][0]["text"], "hi");
    }

    #[test]
    fn prompts_carry_every_ticker_and_date() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        let p = historical_prompt(&["AAPL".into(), "BTC".into()], &[d]);
        assert!(p.contains("AAPL, BTC"));
        assert!(p.contains("2024-03-31"));
        let q = quotes_prompt(&[InstrumentQuery {
            id: 7,
            ticker: "AAPL".into(),
            isin: None,
            isin_verified: false,
        }])
        .unwrap();
        assert!(q.contains(r#"{"id":7,"ticker":"AAPL","isinVerified":false}"#));
    }
}
