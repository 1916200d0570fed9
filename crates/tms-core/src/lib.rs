// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the TMS support pipeline.
//!
//! This crate provides the error types, the wire types exchanged with the
//! upstream agent and knowledge search, and the capability traits every
//! collaborator implements.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AccountingError, BoxError, TmsError};
pub use types::{
    AgentEvent, AgentEventKind, BrandInfo, ChatRequest, HealthStatus, KnowledgeChunk,
    KnowledgeSearchRequest, KnowledgeSearchResponse, KnowledgeSourceKind, LedgerTransaction,
    TokenUsage, TransactionKind,
};

pub use traits::{AgentStream, AgentTransport, BrandSettingsSource, CreditsLedger, KnowledgeSearch};
