// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tms credits` command implementation.

use std::path::Path;

use tms_config::TmsConfig;
use tms_core::{CreditsLedger, TmsError};
use tms_credits::SqliteCreditsLedger;

use crate::CreditsCommand;

/// Open the ledger at the configured path, creating its directory first.
pub async fn open_ledger(config: &TmsConfig) -> Result<SqliteCreditsLedger, TmsError> {
    let path = &config.credits.database_path;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TmsError::Internal(format!(
                    "failed to create ledger directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(SqliteCreditsLedger::open(path).await?)
}

/// Run a `tms credits` subcommand.
pub async fn run_credits(config: &TmsConfig, action: CreditsCommand) -> Result<(), TmsError> {
    let ledger = open_ledger(config).await?;
    match action {
        CreditsCommand::Balance { tenant } => {
            let balance = ledger.balance(tenant).await?;
            println!("{tenant}: {balance} credits");
        }
        CreditsCommand::TopUp {
            tenant,
            amount,
            kind,
            description,
        } => {
            let tx = ledger.add_credits(tenant, amount, kind, &description).await?;
            println!(
                "{tenant}: +{amount} credits ({kind}), balance {} [tx {}]",
                tx.balance_after, tx.id
            );
        }
        CreditsCommand::History { tenant, limit } => {
            let history = ledger.transactions(tenant, limit).await?;
            if history.is_empty() {
                println!("{tenant}: no transactions");
                return Ok(());
            }
            println!(
                "  {:<24}  {:<10}  {:>8}  {:>8}  description",
                "created", "kind", "amount", "balance"
            );
            for tx in history {
                println!(
                    "  {:<24}  {:<10}  {:>8}  {:>8}  {}",
                    tx.created_at,
                    tx.kind.to_string(),
                    tx.amount,
                    tx.balance_after,
                    tx.description
                );
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tms_core::TransactionKind;
    use uuid::Uuid;

    fn config_in(dir: &Path) -> TmsConfig {
        let mut config = TmsConfig::default();
        config.credits.database_path = dir.join("nested").join("credits.db").display().to_string();
        config
    }

    #[tokio::test]
    async fn open_ledger_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let ledger = open_ledger(&config).await.unwrap();
        assert!(dir.path().join("nested").is_dir());

        let tenant = Uuid::new_v4();
        ledger
            .add_credits(tenant, 250, TransactionKind::Bonus, "welcome")
            .await
            .unwrap();
        assert_eq!(ledger.balance(tenant).await.unwrap(), 250);
    }

    #[tokio::test]
    async fn top_up_then_history() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let tenant = Uuid::new_v4();

        run_credits(
            &config,
            CreditsCommand::TopUp {
                tenant,
                amount: 100,
                kind: TransactionKind::Payment,
                description: "manual top-up".into(),
            },
        )
        .await
        .unwrap();
        run_credits(&config, CreditsCommand::History { tenant, limit: 5 })
            .await
            .unwrap();

        let ledger = open_ledger(&config).await.unwrap();
        let history = ledger.transactions(tenant, 5).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].amount, 100);
    }

    #[tokio::test]
    async fn balance_of_unknown_tenant_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_credits(
            &config_in(dir.path()),
            CreditsCommand::Balance {
                tenant: Uuid::new_v4(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TmsError::Accounting(_)));
    }
}
