// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability traits for the collaborators the pipeline is built on.
//!
//! Concrete implementations are injected at construction and shared as
//! `Arc<dyn Trait>`. All traits use `#[async_trait]` for dynamic dispatch.

pub mod brand;
pub mod knowledge;
pub mod ledger;
pub mod transport;

pub use brand::BrandSettingsSource;
pub use knowledge::KnowledgeSearch;
pub use ledger::CreditsLedger;
pub use transport::{AgentStream, AgentTransport};
