// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire and domain types shared by the pipeline components.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::TmsError;

/// One chat message forwarded to the upstream agent.
///
/// Serialises to the `POST /chat/process` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub tenant_id: Uuid,
    pub project_id: Uuid,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl ChatRequest {
    /// Build a request with no user id and empty metadata.
    pub fn new(
        message: impl Into<String>,
        tenant_id: Uuid,
        project_id: Uuid,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            tenant_id,
            project_id,
            session_id: session_id.into(),
            user_id: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Reject requests that must never reach the network.
    pub fn validate(&self) -> Result<(), TmsError> {
        if self.message.trim().is_empty() {
            return Err(TmsError::Validation("message must not be empty".into()));
        }
        if self.tenant_id.is_nil() {
            return Err(TmsError::Validation("tenant_id must be set".into()));
        }
        if self.project_id.is_nil() {
            return Err(TmsError::Validation("project_id must be set".into()));
        }
        Ok(())
    }
}

/// Event kinds with meaning to the pipeline. Other kinds are passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum AgentEventKind {
    Message,
    Meta,
    Usage,
    Done,
    Error,
    UsageSettled,
}

/// A single event decoded from a `data:` line of the agent stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl AgentEvent {
    pub fn new(kind: AgentEventKind, content: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            content,
            metadata: None,
        }
    }

    /// Known kind of this event, `None` for vocabulary the pipeline ignores.
    pub fn known_kind(&self) -> Option<AgentEventKind> {
        self.kind.parse().ok()
    }

    /// Token usage carried by a `usage` event.
    ///
    /// Counters are read from `metadata`, falling back to a nested
    /// `metadata.usage` object. Missing counters read as zero.
    pub fn token_usage(&self) -> Option<TokenUsage> {
        if self.known_kind() != Some(AgentEventKind::Usage) {
            return None;
        }
        let metadata = self.metadata.as_ref()?;
        let fields = match metadata.get("usage") {
            Some(Value::Object(nested)) => nested,
            _ => metadata,
        };
        let read = |key: &str| fields.get(key).and_then(Value::as_i64).unwrap_or(0);
        Some(TokenUsage {
            prompt_tokens: read("prompt_tokens"),
            completion_tokens: read("completion_tokens"),
            total_tokens: read("total_tokens"),
        })
    }

    /// Model id reported alongside usage, if any.
    pub fn model(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("model")?.as_str()
    }
}

/// Token counters reported by the agent for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

impl TokenUsage {
    /// Reported total, derived from the parts when the agent sent none.
    ///
    /// Parts whose sum does not fit an `i64` count as no usage.
    pub fn effective_total(&self) -> i64 {
        if self.total_tokens > 0 {
            self.total_tokens
        } else {
            self.prompt_tokens
                .checked_add(self.completion_tokens)
                .unwrap_or(0)
        }
    }
}

/// Health status reported by the agent health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// Endpoint answered with a non-200 status.
    Unhealthy(u16),
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => f.write_str("healthy"),
            Self::Unhealthy(status) => write!(f, "unhealthy (status {status})"),
        }
    }
}

/// Query sent to the external knowledge search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSearchRequest {
    pub query: String,
    pub max_results: usize,
    pub similarity_score: f64,
    pub include_documents: bool,
    pub include_pages: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum KnowledgeSourceKind {
    Document,
    Webpage,
}

/// One chunk returned by the knowledge search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    #[serde(default)]
    pub id: Option<String>,
    pub score: f64,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: KnowledgeSourceKind,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: String,
}

impl KnowledgeChunk {
    /// Human readable citation label.
    pub fn citation(&self) -> String {
        let title = self.title.as_deref().filter(|t| !t.is_empty());
        match (self.kind, title) {
            (KnowledgeSourceKind::Document, Some(title)) => format!("Document: {title}"),
            (KnowledgeSourceKind::Webpage, Some(title)) => {
                format!("Page: {title} ({})", self.source)
            }
            _ => format!("Source: {}", self.source),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSearchResponse {
    #[serde(default)]
    pub results: Vec<KnowledgeChunk>,
}

/// Brand fields read from the `branding_settings` setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandInfo {
    pub company_name: String,
    pub about: String,
    pub support_url: String,
}

impl BrandInfo {
    /// Extract the recognised keys; non-string values are ignored.
    pub fn from_settings(settings: &Map<String, Value>) -> Self {
        let read = |key: &str| {
            settings
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            company_name: read("company_name"),
            about: read("about"),
            support_url: read("support_url"),
        }
    }
}

/// Ledger transaction kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    Payment,
    Usage,
    AiUsage,
    Refund,
    Bonus,
    Adjustment,
}

/// Result of a committed ledger debit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTransaction {
    pub id: String,
    pub balance_after: i64,
}
