// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credits ledger backed by SQLite.
//!
//! Balances live in `credits`, one row per tenant. Every balance change is
//! mirrored by a row in `credit_transactions` written in the same SQLite
//! transaction. All operations go through the single tokio-rusqlite
//! background thread, which serialises debits per database.

use async_trait::async_trait;
use rusqlite::{OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tms_core::{AccountingError, CreditsLedger, LedgerTransaction, TmsError, TransactionKind};
use tracing::{debug, info};
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credits (
    tenant_id TEXT PRIMARY KEY NOT NULL,
    balance INTEGER NOT NULL DEFAULT 0 CHECK (balance >= 0),
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS credit_transactions (
    id TEXT PRIMARY KEY NOT NULL,
    tenant_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    amount INTEGER NOT NULL,
    balance_before INTEGER NOT NULL,
    balance_after INTEGER NOT NULL,
    description TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_credit_transactions_tenant
    ON credit_transactions(tenant_id, created_at);";

/// A persisted balance change. Debits carry a negative amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: String,
    pub tenant_id: String,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub created_at: String,
}

enum DebitOutcome {
    Committed(LedgerTransaction),
    Insufficient { balance: i64 },
    NoAccount,
}

fn now() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Convert a tokio-rusqlite error into a ledger failure.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> AccountingError {
    AccountingError::Ledger {
        source: Box::new(e),
    }
}

/// Reference [`CreditsLedger`] on a local SQLite file.
pub struct SqliteCreditsLedger {
    conn: tokio_rusqlite::Connection,
}

impl SqliteCreditsLedger {
    pub fn new(conn: tokio_rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Open the database at `path` and create the schema if missing.
    pub async fn open(path: &str) -> Result<Self, AccountingError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| AccountingError::Ledger {
                source: Box::new(e),
            })?;
        let ledger = Self::new(conn);
        ledger.initialize().await?;
        Ok(ledger)
    }

    /// Create tables and indexes. Idempotent.
    pub async fn initialize(&self) -> Result<(), AccountingError> {
        self.conn
            .call(|conn| -> rusqlite::Result<()> { conn.execute_batch(SCHEMA) })
            .await
            .map_err(map_tr_err)
    }

    /// Credit a tenant, creating the account on first top-up.
    pub async fn add_credits(
        &self,
        tenant_id: Uuid,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<LedgerTransaction, TmsError> {
        if amount <= 0 {
            return Err(TmsError::Validation(format!(
                "credit amount must be positive, got {amount}"
            )));
        }

        let tenant = tenant_id.to_string();
        let kind_str = kind.to_string();
        let description = description.to_string();
        let tx_id = Uuid::new_v4().to_string();

        let result = self
            .conn
            .call(move |conn| -> rusqlite::Result<Option<LedgerTransaction>> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let created_at = now();
                let before: i64 = tx
                    .query_row(
                        "SELECT balance FROM credits WHERE tenant_id = ?1",
                        rusqlite::params![tenant],
                        |row| row.get(0),
                    )
                    .optional()?
                    .unwrap_or(0);
                let Some(after) = before.checked_add(amount) else {
                    return Ok(None);
                };
                tx.execute(
                    "INSERT INTO credits (tenant_id, balance, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(tenant_id) DO UPDATE SET balance = ?2, updated_at = ?3",
                    rusqlite::params![tenant, after, created_at],
                )?;
                tx.execute(
                    "INSERT INTO credit_transactions (id, tenant_id, kind, amount, \
                     balance_before, balance_after, description, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        tx_id,
                        tenant,
                        kind_str,
                        amount,
                        before,
                        after,
                        description,
                        created_at
                    ],
                )?;
                tx.commit()?;
                Ok(Some(LedgerTransaction {
                    id: tx_id,
                    balance_after: after,
                }))
            })
            .await
            .map_err(map_tr_err)?;

        let Some(result) = result else {
            return Err(TmsError::Validation(format!(
                "adding {amount} credits would overflow the balance of tenant {tenant_id}"
            )));
        };

        info!(
            tenant_id = %tenant_id,
            amount,
            kind = %kind,
            balance_after = result.balance_after,
            "credits added"
        );
        Ok(result)
    }

    /// Most recent transactions first.
    pub async fn transactions(
        &self,
        tenant_id: Uuid,
        limit: usize,
    ) -> Result<Vec<CreditTransaction>, AccountingError> {
        let tenant = tenant_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> rusqlite::Result<Vec<CreditTransaction>> {
                let mut stmt = conn.prepare(
                    "SELECT id, tenant_id, kind, amount, balance_before, balance_after, \
                     description, created_at FROM credit_transactions \
                     WHERE tenant_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(rusqlite::params![tenant, limit], |row| {
                    let kind: String = row.get(2)?;
                    let kind = kind.parse::<TransactionKind>().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(CreditTransaction {
                        id: row.get(0)?,
                        tenant_id: row.get(1)?,
                        kind,
                        amount: row.get(3)?,
                        balance_before: row.get(4)?,
                        balance_after: row.get(5)?,
                        description: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl CreditsLedger for SqliteCreditsLedger {
    async fn deduct_credits(
        &self,
        tenant_id: Uuid,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<LedgerTransaction, AccountingError> {
        let tenant = tenant_id.to_string();
        let kind_str = kind.to_string();
        let description = description.to_string();
        let tx_id = Uuid::new_v4().to_string();

        let outcome = self
            .conn
            .call(move |conn| -> rusqlite::Result<DebitOutcome> {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                let balance: Option<i64> = tx
                    .query_row(
                        "SELECT balance FROM credits WHERE tenant_id = ?1",
                        rusqlite::params![tenant],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(before) = balance else {
                    return Ok(DebitOutcome::NoAccount);
                };
                if before < amount {
                    return Ok(DebitOutcome::Insufficient { balance: before });
                }

                let after = before - amount;
                let created_at = now();
                tx.execute(
                    "UPDATE credits SET balance = ?2, updated_at = ?3 WHERE tenant_id = ?1",
                    rusqlite::params![tenant, after, created_at],
                )?;
                tx.execute(
                    "INSERT INTO credit_transactions (id, tenant_id, kind, amount, \
                     balance_before, balance_after, description, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        tx_id,
                        tenant,
                        kind_str,
                        -amount,
                        before,
                        after,
                        description,
                        created_at
                    ],
                )?;
                tx.commit()?;
                Ok(DebitOutcome::Committed(LedgerTransaction {
                    id: tx_id,
                    balance_after: after,
                }))
            })
            .await
            .map_err(map_tr_err)?;

        match outcome {
            DebitOutcome::Committed(tx) => {
                debug!(tenant_id = %tenant_id, amount, balance_after = tx.balance_after, "credits deducted");
                Ok(tx)
            }
            DebitOutcome::Insufficient { balance } => Err(AccountingError::InsufficientCredits {
                balance,
                required: amount,
            }),
            DebitOutcome::NoAccount => Err(AccountingError::NoAccount { tenant_id }),
        }
    }

    async fn balance(&self, tenant_id: Uuid) -> Result<i64, AccountingError> {
        let tenant = tenant_id.to_string();
        let balance = self
            .conn
            .call(move |conn| -> rusqlite::Result<Option<i64>> {
                conn.query_row(
                    "SELECT balance FROM credits WHERE tenant_id = ?1",
                    rusqlite::params![tenant],
                    |row| row.get(0),
                )
                .optional()
            })
            .await
            .map_err(map_tr_err)?;
        balance.ok_or(AccountingError::NoAccount { tenant_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::usage::{DeductionInput, UsageAccountant};
    use tms_core::TokenUsage;

    async fn test_ledger() -> SqliteCreditsLedger {
        let conn = tokio_rusqlite::Connection::open_in_memory().await.unwrap();
        let ledger = SqliteCreditsLedger::new(conn);
        ledger.initialize().await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn top_up_creates_account() {
        let ledger = test_ledger().await;
        let tenant = Uuid::new_v4();

        let tx = ledger
            .add_credits(tenant, 500, TransactionKind::Bonus, "welcome")
            .await
            .unwrap();

        assert_eq!(tx.balance_after, 500);
        assert_eq!(ledger.balance(tenant).await.unwrap(), 500);
    }

    #[tokio::test]
    async fn top_up_past_the_maximum_balance_is_rejected() {
        let ledger = test_ledger().await;
        let tenant = Uuid::new_v4();
        ledger
            .add_credits(tenant, i64::MAX - 10, TransactionKind::Payment, "bulk")
            .await
            .unwrap();

        let err = ledger
            .add_credits(tenant, 11, TransactionKind::Bonus, "one too many")
            .await
            .unwrap_err();
        assert!(matches!(err, TmsError::Validation(_)));
        assert_eq!(ledger.balance(tenant).await.unwrap(), i64::MAX - 10);
        assert_eq!(ledger.transactions(tenant, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deduct_debits_and_records_transaction() {
        let ledger = test_ledger().await;
        let tenant = Uuid::new_v4();
        ledger
            .add_credits(tenant, 1_000, TransactionKind::Payment, "top-up")
            .await
            .unwrap();

        let tx = ledger
            .deduct_credits(tenant, 121, TransactionKind::AiUsage, "AI usage")
            .await
            .unwrap();

        assert_eq!(tx.balance_after, 879);
        assert_eq!(ledger.balance(tenant).await.unwrap(), 879);

        let history = ledger.transactions(tenant, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, tx.id);
        assert_eq!(history[0].kind, TransactionKind::AiUsage);
        assert_eq!(history[0].amount, -121);
        assert_eq!(history[0].balance_before, 1_000);
        assert_eq!(history[1].kind, TransactionKind::Payment);
    }

    #[tokio::test]
    async fn insufficient_balance_leaves_ledger_untouched() {
        let ledger = test_ledger().await;
        let tenant = Uuid::new_v4();
        ledger
            .add_credits(tenant, 10, TransactionKind::Bonus, "trial")
            .await
            .unwrap();

        let err = ledger
            .deduct_credits(tenant, 11, TransactionKind::AiUsage, "too much")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AccountingError::InsufficientCredits {
                balance: 10,
                required: 11
            }
        ));
        assert_eq!(ledger.balance(tenant).await.unwrap(), 10);
        assert_eq!(ledger.transactions(tenant, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_tenant_has_no_account() {
        let ledger = test_ledger().await;
        let tenant = Uuid::new_v4();
        assert!(matches!(
            ledger.balance(tenant).await,
            Err(AccountingError::NoAccount { .. })
        ));
        assert!(matches!(
            ledger
                .deduct_credits(tenant, 1, TransactionKind::AiUsage, "x")
                .await,
            Err(AccountingError::NoAccount { .. })
        ));
    }

    #[tokio::test]
    async fn non_positive_top_up_is_rejected() {
        let ledger = test_ledger().await;
        let err = ledger
            .add_credits(Uuid::new_v4(), 0, TransactionKind::Bonus, "nothing")
            .await
            .unwrap_err();
        assert!(matches!(err, TmsError::Validation(_)));
    }

    #[tokio::test]
    async fn accountant_charges_sqlite_ledger() {
        let ledger = Arc::new(test_ledger().await);
        let tenant = Uuid::new_v4();
        ledger
            .add_credits(tenant, 200, TransactionKind::Payment, "top-up")
            .await
            .unwrap();
        let accountant = UsageAccountant::new(Some(ledger.clone()));

        let result = accountant
            .deduct(DeductionInput {
                tenant_id: tenant,
                project_id: Uuid::new_v4(),
                model: "gpt-4".into(),
                session_id: Some("s-1".into()),
                request_id: None,
                usage: TokenUsage {
                    prompt_tokens: 60,
                    completion_tokens: 40,
                    total_tokens: 100,
                },
            })
            .await
            .unwrap();

        assert_eq!(result.charged_credits, 121);
        assert_eq!(result.balance_after, 79);
        let history = ledger.transactions(tenant, 1).await.unwrap();
        assert_eq!(
            history[0].description,
            "AI usage for model gpt-4 (prompt=60, completion=40, total=100, markup=21%) | session=s-1"
        );
    }

    #[tokio::test]
    async fn file_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credits.db");
        let path = path.to_str().unwrap();
        let tenant = Uuid::new_v4();

        {
            let ledger = SqliteCreditsLedger::open(path).await.unwrap();
            ledger
                .add_credits(tenant, 42, TransactionKind::Adjustment, "seed")
                .await
                .unwrap();
        }

        let reopened = SqliteCreditsLedger::open(path).await.unwrap();
        assert_eq!(reopened.balance(tenant).await.unwrap(), 42);
    }
}
