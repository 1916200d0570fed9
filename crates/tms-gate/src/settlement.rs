// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Usage settlement reported after an agent stream closes.

use serde::Serialize;
use serde_json::Value;
use tms_core::{AccountingError, AgentEvent, AgentEventKind, TokenUsage};
use tms_credits::{DeductionInput, DeductionResult, UsageAccountant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of charging one agent call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSettlement {
    pub request_id: String,
    pub model: String,
    pub usage: TokenUsage,
    /// The stream was cancelled or failed before it finished.
    pub partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deduction: Option<DeductionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsageSettlement {
    pub fn is_settled(&self) -> bool {
        self.deduction.is_some()
    }

    /// The settlement as a `usage_settled` event, for callers that relay
    /// everything on one event channel.
    pub fn to_event(&self) -> AgentEvent {
        let metadata = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        };
        AgentEvent {
            kind: AgentEventKind::UsageSettled.to_string(),
            content: None,
            metadata,
        }
    }
}

/// Everything needed to charge a call once its stream has closed.
pub(crate) struct SettlementJob {
    pub accountant: UsageAccountant,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub session_id: String,
    pub request_id: String,
    pub default_model: String,
}

impl SettlementJob {
    pub async fn settle(
        self,
        usage: TokenUsage,
        model: Option<String>,
        partial: bool,
    ) -> UsageSettlement {
        let model = model
            .filter(|m| !m.is_empty())
            .unwrap_or(self.default_model);
        let session_id = Some(self.session_id).filter(|s| !s.is_empty());

        let input = DeductionInput {
            tenant_id: self.tenant_id,
            project_id: self.project_id,
            model: model.clone(),
            session_id,
            request_id: Some(self.request_id.clone()),
            usage,
        };

        let mut settlement = UsageSettlement {
            request_id: self.request_id,
            model,
            usage,
            partial,
            deduction: None,
            error: None,
        };

        match self.accountant.deduct(input).await {
            Ok(result) => {
                info!(
                    tenant_id = %self.tenant_id,
                    request_id = %settlement.request_id,
                    charged_credits = result.charged_credits,
                    partial,
                    "usage settled"
                );
                settlement.usage = result.usage;
                settlement.deduction = Some(result);
            }
            Err(AccountingError::NoUsageReported) => {
                warn!(
                    tenant_id = %self.tenant_id,
                    request_id = %settlement.request_id,
                    "usage event carried no tokens, nothing charged"
                );
                settlement.error = Some(AccountingError::NoUsageReported.to_string());
            }
            Err(e) => {
                error!(
                    tenant_id = %self.tenant_id,
                    request_id = %settlement.request_id,
                    total_tokens = usage.effective_total(),
                    error = %e,
                    "usage settlement failed"
                );
                settlement.error = Some(e.to_string());
            }
        }
        settlement
    }
}
