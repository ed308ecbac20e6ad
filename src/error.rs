// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Error and data-gap types shared by the reporting core.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::lookup::LookupError;
use crate::valuation::PriceSource;

#[derive(Debug, Error)]
pub enum ReportError {
    /// Malformed or inconsistent input. Nothing is written.
    #[error("invalid input: {0}")]
    Input(String),

    /// The price/metadata collaborator failed; any saved summary is untouched.
    #[error("report generation failed: {0}")]
    Collaborator(#[from] LookupError),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ReportError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}

/// Missing data that lowers accuracy without stopping the computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "gap", rename_all = "snake_case")]
pub enum DataGap {
    MissingPrice {
        ticker: String,
        date: NaiveDate,
        fallback: PriceSource,
    },
    MissingFxRate {
        from: String,
        to: String,
        date: NaiveDate,
    },
    MissingQuote {
        ticker: String,
    },
    YtdUnavailable {
        year: i32,
    },
}

impl fmt::Display for DataGap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataGap::MissingPrice {
                ticker,
                date,
                fallback,
            } => write!(
                f,
                "no market price for {} on {}, using {}",
                ticker,
                date,
                fallback.as_str()
            ),
            DataGap::MissingFxRate { from, to, date } => {
                write!(f, "no {}/{} rate on or before {}", from, to, date)
            }
            DataGap::MissingQuote { ticker } => write!(f, "lookup returned nothing for {}", ticker),
            DataGap::YtdUnavailable { year } => {
                write!(f, "no saved summary for {}-12, YTD unavailable", year - 1)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_read_naturally() {
        let err = ReportError::input("Account 7 not found");
        assert_eq!(err.to_string(), "invalid input: Account 7 not found");
    }

    #[test]
    fn collaborator_errors_surface_as_generation_failures() {
        let err = ReportError::from(LookupError::Unparseable("not json".into()));
        assert!(err.to_string().starts_with("report generation failed"));
    }

    #[test]
    fn ytd_gap_names_the_missing_snapshot() {
        let gap = DataGap::YtdUnavailable { year: 2025 };
        assert_eq!(gap.to_string(), "no saved summary for 2024-12, YTD unavailable");
    }
}
