// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

pub mod cli;
pub mod commands;
pub mod db;
pub mod error;
pub mod fx;
pub mod holdings;
pub mod ledger;
pub mod lookup;
pub mod models;
pub mod performance;
pub mod report;
pub mod store;
pub mod utils;
pub mod valuation;
