// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token usage to credit conversion.
//!
//! The markup is held in basis points so that `ceil(total * (1 + markup))`
//! is computed exactly in integers. A 0.21 markup is 2100 bp.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tms_core::{AccountingError, CreditsLedger, TokenUsage, TransactionKind};
use tracing::info;
use uuid::Uuid;

/// Service-wide markup applied to raw token counts.
pub const DEFAULT_MARKUP: f64 = 0.21;

const BASIS_POINTS: i128 = 10_000;

/// One chargeable agent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionInput {
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub model: String,
    pub session_id: Option<String>,
    pub request_id: Option<String>,
    pub usage: TokenUsage,
}

/// Outcome of a committed deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionResult {
    pub transaction_id: String,
    pub charged_credits: i64,
    /// Markup as a percentage (21.0 for a 0.21 markup).
    pub markup_percent: f64,
    /// Usage with the total derived when it was not reported.
    pub usage: TokenUsage,
    pub balance_after: i64,
}

fn markup_to_bps(markup: f64) -> i64 {
    (markup * BASIS_POINTS as f64).round() as i64
}

/// Credits charged for `total_tokens` at `markup`, never less than 1.
pub fn charge_for(total_tokens: i64, markup: f64) -> i64 {
    charge_for_bps(total_tokens, markup_to_bps(markup))
}

fn charge_for_bps(total_tokens: i64, markup_bps: i64) -> i64 {
    let scaled = i128::from(total_tokens) * (BASIS_POINTS + i128::from(markup_bps));
    let charged = (scaled + BASIS_POINTS - 1).div_euclid(BASIS_POINTS);
    i64::try_from(charged).unwrap_or(i64::MAX).max(1)
}

/// Converts token usage into ledger debits.
///
/// Holds no state beyond the injected ledger. Nothing is retried.
#[derive(Clone)]
pub struct UsageAccountant {
    ledger: Option<Arc<dyn CreditsLedger>>,
    markup_bps: i64,
}

impl std::fmt::Debug for UsageAccountant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsageAccountant")
            .field("configured", &self.ledger.is_some())
            .field("markup_bps", &self.markup_bps)
            .finish()
    }
}

impl UsageAccountant {
    pub fn new(ledger: Option<Arc<dyn CreditsLedger>>) -> Self {
        Self {
            ledger,
            markup_bps: markup_to_bps(DEFAULT_MARKUP),
        }
    }

    /// Override the markup (0.21 = 21%).
    pub fn with_markup(mut self, markup: f64) -> Self {
        self.markup_bps = markup_to_bps(markup);
        self
    }

    /// Markup as a percentage.
    pub fn markup_percent(&self) -> f64 {
        self.markup_bps as f64 / 100.0
    }

    pub fn ledger(&self) -> Option<&Arc<dyn CreditsLedger>> {
        self.ledger.as_ref()
    }

    /// Charge the tenant for one call's token usage.
    pub async fn deduct(&self, input: DeductionInput) -> Result<DeductionResult, AccountingError> {
        let ledger = self.ledger.as_ref().ok_or(AccountingError::NotConfigured)?;

        let mut usage = input.usage;
        usage.total_tokens = usage.effective_total();
        if usage.total_tokens <= 0 {
            return Err(AccountingError::NoUsageReported);
        }

        let charged = charge_for_bps(usage.total_tokens, self.markup_bps);
        if charged <= 0 {
            return Err(AccountingError::ZeroCharge);
        }

        let description = self.describe(&input, &usage);
        let tx = ledger
            .deduct_credits(input.tenant_id, charged, TransactionKind::AiUsage, &description)
            .await?;

        info!(
            tenant_id = %input.tenant_id,
            project_id = %input.project_id,
            model = %input.model,
            total_tokens = usage.total_tokens,
            charged_credits = charged,
            balance_after = tx.balance_after,
            "usage deducted"
        );

        Ok(DeductionResult {
            transaction_id: tx.id,
            charged_credits: charged,
            markup_percent: self.markup_percent(),
            usage,
            balance_after: tx.balance_after,
        })
    }

    fn describe(&self, input: &DeductionInput, usage: &TokenUsage) -> String {
        let mut description = format!(
            "AI usage for model {} (prompt={}, completion={}, total={}, markup={:.0}%)",
            input.model,
            usage.prompt_tokens,
            usage.completion_tokens,
            usage.total_tokens,
            self.markup_percent()
        );
        if let Some(session) = input.session_id.as_deref().filter(|s| !s.is_empty()) {
            description.push_str(&format!(" | session={session}"));
        }
        if let Some(request) = input.request_id.as_deref().filter(|r| !r.is_empty()) {
            description.push_str(&format!(" | request={request}"));
        }
        description
    }
}
