// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit accounting for upstream agent usage.
//!
//! This crate provides:
//! - **Usage accountant**: converts reported tokens into a marked-up credit charge
//!   and debits it through an injected [`tms_core::CreditsLedger`]
//! - **SQLite ledger**: a reference ledger with atomic debit + transaction insert

pub mod ledger;
pub mod usage;

pub use ledger::{CreditTransaction, SqliteCreditsLedger};
pub use usage::{DEFAULT_MARKUP, DeductionInput, DeductionResult, UsageAccountant, charge_for};
