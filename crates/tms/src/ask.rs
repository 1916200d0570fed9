// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tms ask` command implementation.
//!
//! Opens a credit-gated agent stream, prints message content as it arrives
//! and reports the usage settlement once the stream has closed.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tms_agent_client::AgentClient;
use tms_config::TmsConfig;
use tms_core::{AgentEvent, AgentEventKind, ChatRequest, TmsError};
use tms_credits::UsageAccountant;
use tms_gate::{CreditGate, UsageSettlement};
use tracing::debug;
use uuid::Uuid;

use crate::credits::open_ledger;
use crate::shutdown;

/// Gate over the configured agent and ledger.
async fn build_gate(config: &TmsConfig, model: Option<&str>) -> Result<CreditGate, TmsError> {
    let client = AgentClient::new(
        &config.agent.base_url,
        Duration::from_secs(config.agent.timeout_secs),
    )?
    .with_event_buffer(config.agent.event_buffer);

    let ledger = open_ledger(config).await?;
    let accountant =
        UsageAccountant::new(Some(Arc::new(ledger))).with_markup(config.credits.markup_percent);

    Ok(CreditGate::new(Arc::new(client), accountant)
        .with_preflight(config.credits.preflight_check, config.credits.min_balance)
        .with_default_model(model.unwrap_or(config.agent.default_model.as_str()))
        .with_event_buffer(config.agent.event_buffer))
}

/// Text to print for one relayed event, if any.
fn render_event(event: &AgentEvent) -> Option<String> {
    match event.known_kind() {
        Some(AgentEventKind::Message) => event.content.clone(),
        Some(AgentEventKind::Error) => Some(format!(
            "\n[agent error] {}\n",
            event.content.as_deref().unwrap_or("unknown error")
        )),
        _ => None,
    }
}

fn render_settlement(settlement: &UsageSettlement) -> String {
    let partial = if settlement.partial { " (partial)" } else { "" };
    match (&settlement.deduction, &settlement.error) {
        (Some(deduction), _) => format!(
            "charged {} credits for {} tokens on {}{partial}, balance {}",
            deduction.charged_credits,
            deduction.usage.total_tokens,
            settlement.model,
            deduction.balance_after
        ),
        (None, Some(error)) => format!(
            "usage not charged for {}{partial}: {error}",
            settlement.model
        ),
        (None, None) => format!("usage not charged for {}{partial}", settlement.model),
    }
}

/// Run the `tms ask` command.
pub async fn run_ask(
    config: &TmsConfig,
    tenant: Uuid,
    project: Uuid,
    session: String,
    model: Option<String>,
    message: String,
) -> Result<(), TmsError> {
    let gate = build_gate(config, model.as_deref()).await?;

    let mut request = ChatRequest::new(message, tenant, project, session);
    if let Some(model) = model {
        request.metadata.insert("model".into(), Value::String(model));
    }

    let cancel = shutdown::install_signal_handler();
    let mut stream = gate.open(request, cancel).await?;
    debug!(request_id = %stream.request_id, "agent stream opened");

    let mut stdout = std::io::stdout();
    while let Some(event) = stream.events.recv().await {
        if let Some(text) = render_event(&event) {
            let _ = write!(stdout, "{text}");
            let _ = stdout.flush();
        } else {
            debug!(kind = %event.kind, "agent event");
        }
    }
    println!();

    let upstream_error = stream.errors.recv().await;
    if let Some(settlement) = stream.settlements.recv().await {
        eprintln!("tms: {}", render_settlement(&settlement));
    }

    match upstream_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
