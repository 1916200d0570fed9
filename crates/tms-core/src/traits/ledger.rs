// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credits ledger capability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AccountingError;
use crate::types::{LedgerTransaction, TransactionKind};

/// The single point of mutation for tenant balances.
///
/// `deduct_credits` must debit the balance and record the transaction
/// atomically, failing with [`AccountingError::InsufficientCredits`] rather
/// than letting the balance go negative.
#[async_trait]
pub trait CreditsLedger: Send + Sync {
    async fn deduct_credits(
        &self,
        tenant_id: Uuid,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<LedgerTransaction, AccountingError>;

    /// Current balance in credits.
    async fn balance(&self, tenant_id: Uuid) -> Result<i64, AccountingError>;
}
