// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tms decide` command implementation.

use std::sync::Arc;

use tms_agentic::{AutoResponseDecision, BrandGreeter, DecisionOrchestrator};
use tms_config::TmsConfig;
use tms_core::TmsError;
use uuid::Uuid;

use crate::brand::StaticBrandSettings;
use crate::shutdown;

/// Orchestrator wired to the `[brand]` section. No knowledge search backend
/// is attached, so knowledge answers use the development placeholder.
fn build_orchestrator(config: &TmsConfig) -> DecisionOrchestrator {
    let settings = Arc::new(StaticBrandSettings::from_config(&config.brand));
    DecisionOrchestrator::new(&config.agentic).with_brand_greeter(BrandGreeter::new(settings))
}

async fn decide(
    config: &TmsConfig,
    tenant: Uuid,
    project: Uuid,
    message: &str,
) -> Result<AutoResponseDecision, TmsError> {
    let cancel = shutdown::install_signal_handler();
    build_orchestrator(config)
        .decide(tenant, project, message, &config.brand.company_name, &cancel)
        .await
}

/// Run the `tms decide` command.
pub async fn run_decide(
    config: &TmsConfig,
    tenant: Uuid,
    project: Uuid,
    message: &str,
    json: bool,
) -> Result<(), TmsError> {
    let decision = decide(config, tenant, project, message).await?;
    if json {
        let rendered = serde_json::to_string_pretty(&decision)
            .map_err(|e| TmsError::Internal(format!("failed to serialize decision: {e}")))?;
        println!("{rendered}");
    } else {
        println!("{}", decision.summary());
    }
    Ok(())
}
