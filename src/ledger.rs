// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Read-only view over accounts, transactions and holdings.
//!
//! Balances and quantities are never stored; they are replayed from the
//! transaction streams up to an inclusive cutoff date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};

use crate::error::ReportError;
use crate::models::{
    Account, InvestmentHolding, InvestmentTransaction, InvestmentTransactionType,
    InvestmentType, Transaction, TransactionKind,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HoldingTotals {
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub proceeds: Decimal,
    pub dividends: Decimal,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    accounts: Vec<Account>,
    transactions: Vec<Transaction>,
    holdings: Vec<InvestmentHolding>,
    investment_transactions: Vec<InvestmentTransaction>,
    account_index: HashMap<i64, usize>,
    holding_index: HashMap<i64, usize>,
}

impl Ledger {
    pub fn new(
        mut accounts: Vec<Account>,
        transactions: Vec<Transaction>,
        holdings: Vec<InvestmentHolding>,
        investment_transactions: Vec<InvestmentTransaction>,
    ) -> Result<Self, ReportError> {
        accounts.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
        });
        let account_index = accounts
            .iter()
            .enumerate()
            .map(|(idx, a)| (a.id, idx))
            .collect::<HashMap<_, _>>();
        let holding_index = holdings
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.id, idx))
            .collect::<HashMap<_, _>>();

        let known_account = |id: i64, txn: i64| -> Result<(), ReportError> {
            if account_index.contains_key(&id) {
                Ok(())
            } else {
                Err(ReportError::input(format!(
                    "Transaction {} references unknown account {}",
                    txn, id
                )))
            }
        };

        for t in &transactions {
            if t.amount.is_sign_negative() {
                return Err(ReportError::input(format!(
                    "Transaction {} has negative amount {}",
                    t.id, t.amount
                )));
            }
            match &t.kind {
                TransactionKind::Income { account_id, .. }
                | TransactionKind::Cost { account_id, .. } => known_account(*account_id, t.id)?,
                TransactionKind::Transfer {
                    from_account_id,
                    to_account_id,
                } => {
                    known_account(*from_account_id, t.id)?;
                    known_account(*to_account_id, t.id)?;
                    if from_account_id == to_account_id {
                        return Err(ReportError::input(format!(
                            "Transfer {} must move funds between two distinct accounts",
                            t.id
                        )));
                    }
                    if t.amount.is_zero() {
                        return Err(ReportError::input(format!(
                            "Transfer {} must have a positive amount",
                            t.id
                        )));
                    }
                }
            }
        }

        for t in &investment_transactions {
            known_account(t.account_id, t.id)?;
            if !holding_index.contains_key(&t.holding_id) {
                return Err(ReportError::input(format!(
                    "Investment transaction {} references unknown holding {}",
                    t.id, t.holding_id
                )));
            }
            if t.quantity.is_sign_negative() || t.total_amount.is_sign_negative() {
                return Err(ReportError::input(format!(
                    "Investment transaction {} has negative quantity or amount",
                    t.id
                )));
            }
        }

        Ok(Self {
            accounts,
            transactions,
            holdings,
            investment_transactions,
            account_index,
            holding_index,
        })
    }

    /// Accounts in display order.
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn holdings(&self) -> &[InvestmentHolding] {
        &self.holdings
    }

    pub fn investment_transactions(&self) -> &[InvestmentTransaction] {
        &self.investment_transactions
    }

    pub fn account(&self, id: i64) -> Result<&Account, ReportError> {
        self.account_index
            .get(&id)
            .map(|&idx| &self.accounts[idx])
            .ok_or_else(|| ReportError::input(format!("Account {} not found", id)))
    }

    pub fn holding(&self, id: i64) -> Result<&InvestmentHolding, ReportError> {
        self.holding_index
            .get(&id)
            .map(|&idx| &self.holdings[idx])
            .ok_or_else(|| ReportError::input(format!("Holding {} not found", id)))
    }

    pub fn account_currency(&self, id: i64) -> Result<&str, ReportError> {
        self.account(id).map(|a| a.currency.as_str())
    }

    /// Currency-native balance of an account, replaying everything dated on or
    /// before `cutoff` against the initial balance.
    pub fn account_balance(&self, account_id: i64, cutoff: NaiveDate) -> Result<Decimal, ReportError> {
        let account = self.account(account_id)?;
        let mut balance = account.initial_balance;

        for t in self.transactions.iter().filter(|t| t.date <= cutoff) {
            match &t.kind {
                TransactionKind::Income { account_id: a, .. } if *a == account_id => {
                    balance += t.amount
                }
                TransactionKind::Cost { account_id: a, .. } if *a == account_id => {
                    balance -= t.amount
                }
                TransactionKind::Transfer {
                    from_account_id,
                    to_account_id,
                } => {
                    if *from_account_id == account_id {
                        balance -= t.amount;
                    }
                    if *to_account_id == account_id {
                        balance += t.amount;
                    }
                }
                _ => {}
            }
        }

        for t in self
            .investment_transactions
            .iter()
            .filter(|t| t.account_id == account_id && t.date <= cutoff)
        {
            match t.kind {
                InvestmentTransactionType::Buy => balance -= t.total_amount,
                InvestmentTransactionType::Sell | InvestmentTransactionType::Dividend => {
                    balance += t.total_amount
                }
            }
        }

        Ok(balance)
    }

    /// Units held: buys minus sells on or before `cutoff`.
    pub fn holding_quantity(&self, holding_id: i64, cutoff: NaiveDate) -> Result<Decimal, ReportError> {
        self.holding(holding_id)?;
        Ok(self
            .holding_transactions(holding_id, cutoff)
            .fold(Decimal::ZERO, |qty, t| match t.kind {
                InvestmentTransactionType::Buy => qty + t.quantity,
                InvestmentTransactionType::Sell => qty - t.quantity,
                InvestmentTransactionType::Dividend => qty,
            }))
    }

    pub fn holding_totals(&self, holding_id: i64, cutoff: NaiveDate) -> Result<HoldingTotals, ReportError> {
        self.holding(holding_id)?;
        let mut totals = HoldingTotals::default();
        for t in self.holding_transactions(holding_id, cutoff) {
            totals.transaction_count += 1;
            match t.kind {
                InvestmentTransactionType::Buy => {
                    totals.quantity += t.quantity;
                    totals.cost_basis += t.total_amount;
                }
                InvestmentTransactionType::Sell => {
                    totals.quantity -= t.quantity;
                    totals.proceeds += t.total_amount;
                }
                InvestmentTransactionType::Dividend => totals.dividends += t.total_amount,
            }
        }
        Ok(totals)
    }

    /// Unit price of the latest BUY or SELL on or before `cutoff`; same-day
    /// trades resolve to the one recorded last.
    pub fn last_trade_price(&self, holding_id: i64, cutoff: NaiveDate) -> Option<Decimal> {
        self.holding_transactions(holding_id, cutoff)
            .filter(|t| t.kind != InvestmentTransactionType::Dividend)
            .max_by_key(|t| (t.date, t.id))
            .map(|t| t.price_per_unit)
    }

    fn holding_transactions(
        &self,
        holding_id: i64,
        cutoff: NaiveDate,
    ) -> impl Iterator<Item = &InvestmentTransaction> {
        self.investment_transactions
            .iter()
            .filter(move |t| t.holding_id == holding_id && t.date <= cutoff)
    }

    pub fn transactions_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &Transaction> {
        self.transactions
            .iter()
            .filter(move |t| t.date >= from && t.date <= to)
    }

    pub fn investment_transactions_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Iterator<Item = &InvestmentTransaction> {
        self.investment_transactions
            .iter()
            .filter(move |t| t.date >= from && t.date <= to)
    }

    /// Ids of holdings in one asset class, or all holdings.
    pub fn holding_ids(&self, class: Option<InvestmentType>) -> HashSet<i64> {
        self.holdings
            .iter()
            .filter(|h| class.is_none_or(|c| h.investment_type == c))
            .map(|h| h.id)
            .collect()
    }
}
