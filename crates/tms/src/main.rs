// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! tms - operator CLI for the TMS support pipeline.
//!
//! Runs the auto-response decision engine, credit-gated agent calls and
//! ledger maintenance against the layered configuration.

mod ask;
mod brand;
mod credits;
mod decide;
mod health;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tms_config::TmsConfig;
use tms_core::{TmsError, TransactionKind};
use uuid::Uuid;

/// tms - operator CLI for the TMS support pipeline.
#[derive(Parser, Debug)]
#[command(name = "tms", version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the default search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the auto-response decision engine on one message.
    Decide {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        project: Uuid,
        /// Print the decision as JSON.
        #[arg(long)]
        json: bool,
        message: String,
    },
    /// Send a message to the agent through the credit gate.
    Ask {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        project: Uuid,
        #[arg(long, default_value = "cli")]
        session: String,
        /// Model requested from the agent and charged when usage names none.
        #[arg(long)]
        model: Option<String>,
        message: String,
    },
    /// Check the agent service health endpoint.
    Health {
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Inspect and top up tenant credits.
    Credits {
        #[command(subcommand)]
        action: CreditsCommand,
    },
    /// Print the effective configuration.
    Config,
}

#[derive(Subcommand, Debug)]
enum CreditsCommand {
    /// Show the current balance.
    Balance {
        #[arg(long)]
        tenant: Uuid,
    },
    /// Add credits to a tenant, creating the account if needed.
    TopUp {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        amount: i64,
        #[arg(long, default_value = "payment")]
        kind: TransactionKind,
        #[arg(long, default_value = "manual top-up")]
        description: String,
    },
    /// List recent transactions, newest first.
    History {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => tms_config::load_and_validate_path(path),
        None => tms_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            tms_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log.level);

    if let Err(e) = run(cli.command, &config).await {
        eprintln!("tms: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Option<Commands>, config: &TmsConfig) -> Result<(), TmsError> {
    match command {
        Some(Commands::Decide {
            tenant,
            project,
            json,
            message,
        }) => decide::run_decide(config, tenant, project, &message, json).await,
        Some(Commands::Ask {
            tenant,
            project,
            session,
            model,
            message,
        }) => ask::run_ask(config, tenant, project, session, model, message).await,
        Some(Commands::Health { json, plain }) => health::run_health(config, json, plain).await,
        Some(Commands::Credits { action }) => credits::run_credits(config, action).await,
        Some(Commands::Config) => {
            let rendered = tms_config::to_toml(config)
                .map_err(|e| TmsError::Internal(format!("failed to render config: {e}")))?;
            print!("{rendered}");
            Ok(())
        }
        None => {
            println!("tms: use --help for available commands");
            Ok(())
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tms={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    const TENANT: &str = "6f1c1b7e-2f4a-4c1e-9a43-1d2b3c4d5e6f";
    const PROJECT: &str = "0b9d8c7a-6e5f-4a3b-8c2d-1e0f9a8b7c6d";

    #[test]
    fn binary_loads_config_defaults() {
        let config = tms_config::load_and_validate_str("").expect("default config should be valid");
        assert_eq!(config.agent.base_url, "http://localhost:8000");
        assert_eq!(config.credits.min_balance, 1);
    }

    #[test]
    fn parses_decide() {
        let cli = Cli::try_parse_from([
            "tms", "decide", "--tenant", TENANT, "--project", PROJECT, "--json", "hello there",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Decide { json, message, .. }) => {
                assert!(json);
                assert_eq!(message, "hello there");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_top_up_kind() {
        let cli = Cli::try_parse_from([
            "tms", "credits", "top-up", "--tenant", TENANT, "--amount", "500", "--kind", "bonus",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Credits {
                action: CreditsCommand::TopUp { amount, kind, .. },
            }) => {
                assert_eq!(amount, 500);
                assert_eq!(kind, TransactionKind::Bonus);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ask_defaults_session() {
        let cli = Cli::try_parse_from([
            "tms", "ask", "--tenant", TENANT, "--project", PROJECT, "what is my plan?",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Ask { session, model, .. }) => {
                assert_eq!(session, "cli");
                assert!(model.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_tenant() {
        let result = Cli::try_parse_from([
            "tms", "credits", "balance", "--tenant", "not-a-uuid",
        ]);
        assert!(result.is_err());
    }
}
