// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the TMS support pipeline.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Every section is optional and defaults to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TmsConfig {
    /// Logging settings.
    #[serde(default)]
    pub log: LogConfig,

    /// Auto-response decision engine settings.
    #[serde(default)]
    pub agentic: AgenticConfig,

    /// Upstream agent connection settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Credit accounting settings.
    #[serde(default)]
    pub credits: CreditsConfig,

    /// Static brand settings served to the greeting generator.
    #[serde(default)]
    pub brand: BrandConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Auto-response decision engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgenticConfig {
    /// Master switch. When false every message yields a `disabled` decision.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Run the greeting stage.
    #[serde(default = "default_true")]
    pub greeting_detection: bool,

    /// Minimum greeting confidence for `is_greeting`.
    #[serde(default = "default_greeting_confidence")]
    pub greeting_confidence: f64,

    /// Greeting keywords. Empty uses the built-in list.
    #[serde(default)]
    pub greeting_keywords: Vec<String>,

    /// Keywords that dampen greeting confidence. Empty uses the built-in list.
    #[serde(default)]
    pub negative_keywords: Vec<String>,

    /// Run the classification and knowledge stages.
    #[serde(default = "default_true")]
    pub knowledge_responses: bool,

    /// Minimum confidence for answering from the knowledge base.
    #[serde(default = "default_knowledge_confidence")]
    pub knowledge_confidence: f64,
}

impl Default for AgenticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            greeting_detection: true,
            greeting_confidence: default_greeting_confidence(),
            greeting_keywords: Vec::new(),
            negative_keywords: Vec::new(),
            knowledge_responses: true,
            knowledge_confidence: default_knowledge_confidence(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_greeting_confidence() -> f64 {
    0.4
}

fn default_knowledge_confidence() -> f64 {
    0.7
}

/// Upstream agent configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Base URL of the agent service; `/chat/process` is appended.
    #[serde(default = "default_agent_base_url")]
    pub base_url: String,

    /// Per-call HTTP timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Capacity of the per-call events channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Model id charged when the usage event does not name one.
    #[serde(default = "default_model")]
    pub default_model: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: default_agent_base_url(),
            timeout_secs: default_timeout_secs(),
            event_buffer: default_event_buffer(),
            default_model: default_model(),
        }
    }
}

fn default_agent_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_event_buffer() -> usize {
    100
}

fn default_model() -> String {
    "default".to_string()
}

/// Credit accounting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreditsConfig {
    /// Surcharge applied to raw token counts (0.21 = 21%).
    #[serde(default = "default_markup_percent")]
    pub markup_percent: f64,

    /// SQLite file backing the credits ledger.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Check the balance before opening an agent stream.
    #[serde(default = "default_true")]
    pub preflight_check: bool,

    /// Minimum balance required by the pre-flight check.
    #[serde(default = "default_min_balance")]
    pub min_balance: i64,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            markup_percent: default_markup_percent(),
            database_path: default_database_path(),
            preflight_check: true,
            min_balance: default_min_balance(),
        }
    }
}

fn default_markup_percent() -> f64 {
    0.21
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("tms").join("credits.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("credits.db"))
        .display()
        .to_string()
}

fn default_min_balance() -> i64 {
    1
}

/// Brand settings used when no settings store is attached.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BrandConfig {
    #[serde(default)]
    pub company_name: String,

    #[serde(default)]
    pub about: String,

    #[serde(default)]
    pub support_url: String,
}
