// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ReportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Bank,
    Cash,
    Savings,
    Investment,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Bank => "bank",
            AccountType::Cash => "cash",
            AccountType::Savings => "savings",
            AccountType::Investment => "investment",
        }
    }
}

impl FromStr for AccountType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bank" => Ok(AccountType::Bank),
            "cash" => Ok(AccountType::Cash),
            "savings" => Ok(AccountType::Savings),
            "investment" | "broker" => Ok(AccountType::Investment),
            other => Err(ReportError::input(format!("Unknown account type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub account_type: AccountType,
    pub currency: String,
    pub initial_balance: Decimal,
    pub display_order: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncomeType {
    Work,
    Extra,
}

impl IncomeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeType::Work => "work",
            IncomeType::Extra => "extra",
        }
    }
}

impl FromStr for IncomeType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(IncomeType::Work),
            "extra" => Ok(IncomeType::Extra),
            other => Err(ReportError::input(format!("Unknown income type '{}'", other))),
        }
    }
}

/// Spending buckets: necessities versus discretionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostCategory {
    Must,
    Wants,
}

impl CostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostCategory::Must => "must",
            CostCategory::Wants => "wants",
        }
    }
}

impl FromStr for CostCategory {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "must" => Ok(CostCategory::Must),
            "wants" => Ok(CostCategory::Wants),
            other => Err(ReportError::input(format!("Unknown cost category '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKind {
    Income {
        account_id: i64,
        income_type: IncomeType,
    },
    Cost {
        account_id: i64,
        category: CostCategory,
        subcategory: String,
    },
    Transfer {
        from_account_id: i64,
        to_account_id: i64,
    },
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income { .. } => "income",
            TransactionKind::Cost { .. } => "cost",
            TransactionKind::Transfer { .. } => "transfer",
        }
    }

    /// The account whose currency denominates the amount.
    pub fn source_account(&self) -> i64 {
        match self {
            TransactionKind::Income { account_id, .. } | TransactionKind::Cost { account_id, .. } => {
                *account_id
            }
            TransactionKind::Transfer {
                from_account_id, ..
            } => *from_account_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
    pub kind: TransactionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum InvestmentType {
    Stock,
    #[serde(rename = "ETF")]
    Etf,
    Crypto,
}

impl InvestmentType {
    pub const ALL: [InvestmentType; 3] =
        [InvestmentType::Stock, InvestmentType::Etf, InvestmentType::Crypto];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentType::Stock => "stock",
            InvestmentType::Etf => "etf",
            InvestmentType::Crypto => "crypto",
        }
    }
}

impl FromStr for InvestmentType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stock" => Ok(InvestmentType::Stock),
            "etf" => Ok(InvestmentType::Etf),
            "crypto" => Ok(InvestmentType::Crypto),
            other => Err(ReportError::input(format!("Unknown investment type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentHolding {
    pub id: i64,
    pub ticker: String,
    pub name: String,
    pub investment_type: InvestmentType,
    pub currency: String,
    pub current_price: Option<Decimal>,
    pub isin: Option<String>,
    pub isin_verified: bool,
    pub price_updated: Option<NaiveDate>,
    pub needs_review: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InvestmentTransactionType {
    Buy,
    Sell,
    Dividend,
}

impl InvestmentTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvestmentTransactionType::Buy => "buy",
            InvestmentTransactionType::Sell => "sell",
            InvestmentTransactionType::Dividend => "dividend",
        }
    }
}

impl FromStr for InvestmentTransactionType {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(InvestmentTransactionType::Buy),
            "sell" => Ok(InvestmentTransactionType::Sell),
            "dividend" => Ok(InvestmentTransactionType::Dividend),
            other => Err(ReportError::input(format!(
                "Unknown investment transaction type '{}'",
                other
            ))),
        }
    }
}

/// For dividends `quantity` and `price_per_unit` are zero and `total_amount`
/// carries the cash received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentTransaction {
    pub id: i64,
    pub holding_id: i64,
    pub kind: InvestmentTransactionType,
    pub date: NaiveDate,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub total_amount: Decimal,
    pub account_id: i64,
}

/// A calendar month, rendered as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthId {
    year: i32,
    month: u32,
}

impl MonthId {
    pub fn new(year: i32, month: u32) -> Result<Self, ReportError> {
        if !(1..=12).contains(&month) || NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(ReportError::input(format!(
                "Invalid month {}-{:02}",
                year, month
            )));
        }
        Ok(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn last_day(&self) -> NaiveDate {
        self.next()
            .first_day()
            .pred_opt()
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// December of the year before; its snapshot anchors year-to-date figures.
    pub fn prior_december(year: i32) -> Self {
        Self {
            year: year - 1,
            month: 12,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthId {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReportError::input(format!("Invalid month '{}', expected YYYY-MM", s));
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        MonthId::new(year, month).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_income: Decimal,
    pub total_spending: Decimal,
    pub net_savings: Decimal,
    pub net_investments: Decimal,
    pub savings_rate: Decimal,
    pub investment_rate: Decimal,
    pub cash_flow: Decimal,
    pub end_of_month_cash: Decimal,
    pub end_of_month_investments: Decimal,
    pub end_of_month_investments_stocks: Decimal,
    pub end_of_month_investments_etfs: Decimal,
    pub end_of_month_investments_crypto: Decimal,
}

impl ReportSummary {
    pub fn end_of_month_value(&self, class: Option<InvestmentType>) -> Decimal {
        match class {
            None => self.end_of_month_investments,
            Some(InvestmentType::Stock) => self.end_of_month_investments_stocks,
            Some(InvestmentType::Etf) => self.end_of_month_investments_etfs,
            Some(InvestmentType::Crypto) => self.end_of_month_investments_crypto,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeDetails {
    pub work_income: Decimal,
    pub extra_income: Decimal,
    pub dividends: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubcategoryTotal {
    pub category: CostCategory,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub must_spending: Decimal,
    pub wants_spending: Decimal,
    pub by_subcategory: BTreeMap<String, SubcategoryTotal>,
    pub transaction_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceBreakdown {
    pub total: Decimal,
    pub stocks: Decimal,
    pub etfs: Decimal,
    pub crypto: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvestmentDetails {
    pub total_buys: Decimal,
    pub total_sells: Decimal,
    pub start_value: Decimal,
    pub end_value: Decimal,
    pub net_inflows: Decimal,
    pub performance: PerformanceBreakdown,
}

/// Saved monthly snapshot, keyed by `YYYY-MM`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportData {
    pub id: String,
    pub year: i32,
    pub month: u32,
    pub currency: String,
    pub summary: ReportSummary,
    pub income: IncomeDetails,
    pub expenses: ExpenseDetails,
    pub investments: InvestmentDetails,
}
