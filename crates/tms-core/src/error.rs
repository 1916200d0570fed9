// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the TMS support pipeline.

use thiserror::Error;
use uuid::Uuid;

/// Boxed error cause carried by transport and storage failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across the pipeline components.
#[derive(Debug, Error)]
pub enum TmsError {
    /// Configuration errors (invalid TOML, out-of-range thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// The request was rejected before any I/O was attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// A required collaborator was not injected at construction.
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Connecting to or sending a request to the agent service failed.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<BoxError>,
    },

    /// The agent service answered with a non-200 status.
    #[error("agent service returned status {status}: {body}")]
    AgentHttpStatus { status: u16, body: String },

    /// Reading the agent event stream failed mid-way.
    #[error("failed to read agent stream: {source}")]
    AgentStreamRead { source: BoxError },

    /// The agent health endpoint could not be reached.
    #[error("agent service unreachable: {source}")]
    Unreachable { source: BoxError },

    /// Knowledge search or brand settings lookup failed.
    #[error("lookup error: {message}")]
    Lookup {
        message: String,
        source: Option<BoxError>,
    },

    /// Credit accounting failures.
    #[error(transparent)]
    Accounting(#[from] AccountingError),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TmsError {
    /// Wrap an arbitrary lookup failure.
    pub fn lookup(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Lookup {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors raised while converting token usage into a ledger debit.
#[derive(Debug, Error)]
pub enum AccountingError {
    /// No credits ledger was injected.
    #[error("credits ledger is not configured")]
    NotConfigured,

    /// The usage report carried no tokens.
    #[error("no token usage reported")]
    NoUsageReported,

    /// The computed charge rounded down to zero credits.
    #[error("calculated credit charge is zero")]
    ZeroCharge,

    /// The tenant balance cannot cover the debit.
    #[error("insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits { balance: i64, required: i64 },

    /// The tenant has no credits account.
    #[error("no credits account for tenant {tenant_id}")]
    NoAccount { tenant_id: Uuid },

    /// The ledger backend failed.
    #[error("ledger error: {source}")]
    Ledger { source: BoxError },
}
