// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tms health` command implementation.
//!
//! Calls the agent service health endpoint and reports whether it is up.

use std::io::IsTerminal;
use std::time::Duration;

use serde::Serialize;
use tms_agent_client::AgentClient;
use tms_config::TmsConfig;
use tms_core::{AgentTransport, HealthStatus, TmsError};

/// Structured health output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub base_url: String,
    pub healthy: bool,
    pub status: String,
}

impl HealthReport {
    fn from_outcome(base_url: &str, outcome: &Result<HealthStatus, TmsError>) -> Self {
        let (healthy, status) = match outcome {
            Ok(HealthStatus::Healthy) => (true, HealthStatus::Healthy.to_string()),
            Ok(status) => (false, status.to_string()),
            Err(e) => (false, e.to_string()),
        };
        Self {
            base_url: base_url.to_string(),
            healthy,
            status,
        }
    }
}

/// Run the `tms health` command. Fails when the agent is not healthy.
pub async fn run_health(config: &TmsConfig, json: bool, plain: bool) -> Result<(), TmsError> {
    let client = AgentClient::new(
        &config.agent.base_url,
        Duration::from_secs(config.agent.timeout_secs),
    )?;
    let cancel = crate::shutdown::install_signal_handler();
    let outcome = client.health_check(&cancel).await;
    let report = HealthReport::from_outcome(client.base_url(), &outcome);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(&report, use_color);
    }

    match outcome {
        Ok(HealthStatus::Healthy) => Ok(()),
        Ok(status) => Err(TmsError::Internal(format!("agent service is {status}"))),
        Err(e) => Err(e),
    }
}

fn print_report(report: &HealthReport, use_color: bool) {
    println!();
    println!("  tms health");
    println!("  {}", "-".repeat(35));

    if use_color {
        use colored::Colorize;
        if report.healthy {
            println!("    Agent:    {} {}", "✓".green(), report.status.green());
        } else {
            println!("    Agent:    {} {}", "✗".red(), report.status.red());
        }
    } else if report.healthy {
        println!("    Agent:    [OK] {}", report.status);
    } else {
        println!("    Agent:    [FAIL] {}", report.status);
    }

    println!("    Endpoint: {}/chat/health", report.base_url);
    println!();
}
