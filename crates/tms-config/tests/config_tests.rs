// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use tms_config::diagnostic::ConfigError;
use tms_config::model::TmsConfig;
use tms_config::{load_and_validate_str, load_config_from_str, to_toml};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[log]
level = "debug"

[agentic]
enabled = true
greeting_detection = false
greeting_confidence = 0.5
greeting_keywords = ["ahoy"]
knowledge_responses = true
knowledge_confidence = 0.8

[agent]
base_url = "https://agent.internal:9000"
timeout_secs = 10
event_buffer = 16
default_model = "gpt-4"

[credits]
markup_percent = 0.3
database_path = "/tmp/credits.db"
preflight_check = false
min_balance = 5

[brand]
company_name = "Acme"
about = "We make anvils."
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.log.level, "debug");
    assert!(!config.agentic.greeting_detection);
    assert_eq!(config.agentic.greeting_keywords, vec!["ahoy"]);
    assert!(config.agentic.negative_keywords.is_empty());
    assert_eq!(config.agentic.knowledge_confidence, 0.8);
    assert_eq!(config.agent.base_url, "https://agent.internal:9000");
    assert_eq!(config.agent.event_buffer, 16);
    assert_eq!(config.credits.markup_percent, 0.3);
    assert!(!config.credits.preflight_check);
    assert_eq!(config.brand.company_name, "Acme");
    assert!(config.brand.support_url.is_empty());
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert!(config.agentic.enabled);
    assert_eq!(config.agentic.greeting_confidence, 0.4);
    assert_eq!(config.agentic.knowledge_confidence, 0.7);
    assert_eq!(config.agent.timeout_secs, 30);
    assert_eq!(config.agent.event_buffer, 100);
    assert_eq!(config.credits.markup_percent, 0.21);
    assert_eq!(config.credits.min_balance, 1);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[agentic]
greting_confidence = 0.5
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "greting_confidence");
            assert_eq!(suggestion.as_deref(), Some("greeting_confidence"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported() {
    let toml = r#"
[agent]
timeout_secs = "thirty"
"#;
    let errors = load_and_validate_str(toml).expect_err("wrong type must be rejected");
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn out_of_range_threshold_fails_validation() {
    let toml = r#"
[agentic]
knowledge_confidence = 1.2
"#;
    let errors = load_and_validate_str(toml).expect_err("threshold above 1 must fail");
    assert!(
        errors
            .iter()
            .any(|e| e.to_string().contains("agentic.knowledge_confidence"))
    );
}

#[test]
fn effective_config_renders_back_to_toml() {
    let rendered = to_toml(&TmsConfig::default()).unwrap();
    assert!(rendered.contains("[agentic]"));
    assert!(rendered.contains("markup_percent = 0.21"));
    let reparsed = load_config_from_str(&rendered).unwrap();
    assert_eq!(reparsed.agent.base_url, TmsConfig::default().agent.base_url);
}

#[test]
fn env_override_maps_underscored_keys() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("tms.toml", "[agent]\ntimeout_secs = 5\n")?;
        jail.set_env("TMS_AGENT_BASE_URL", "http://override:1234");
        jail.set_env("TMS_AGENTIC_GREETING_CONFIDENCE", "0.6");
        let config = tms_config::load_config_from_path(std::path::Path::new("tms.toml"))?;
        assert_eq!(config.agent.base_url, "http://override:1234");
        assert_eq!(config.agent.timeout_secs, 5);
        assert_eq!(config.agentic.greeting_confidence, 0.6);
        Ok(())
    });
}
