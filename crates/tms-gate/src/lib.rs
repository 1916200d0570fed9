// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credit-gated access to the upstream agent.
//!
//! This crate provides:
//! - [`CreditGate`]: pre-flight balance check, event relay, post-stream charge
//! - [`UsageSettlement`]: the outcome reported once the charge was attempted

pub mod gate;
pub mod settlement;

pub use gate::{CreditGate, GatedStream, REQUEST_ID_KEY};
pub use settlement::UsageSettlement;
