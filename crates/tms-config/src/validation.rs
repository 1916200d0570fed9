// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::TmsConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate semantic constraints, collecting every failure.
pub fn validate_config(config: &TmsConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        errors.push(
            ConfigError::invalid("log.level", format!("unknown level `{}`", config.log.level))
                .with_hint(format!("use one of {}", LOG_LEVELS.join(", "))),
        );
    }

    check_threshold(
        &mut errors,
        "agentic.greeting_confidence",
        config.agentic.greeting_confidence,
    );
    check_threshold(
        &mut errors,
        "agentic.knowledge_confidence",
        config.agentic.knowledge_confidence,
    );

    let base_url = config.agent.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(
            ConfigError::invalid("agent.base_url", format!("`{base_url}` is not an http(s) URL"))
                .with_hint("for example http://localhost:8000"),
        );
    }

    if config.agent.timeout_secs == 0 {
        errors.push(ConfigError::invalid("agent.timeout_secs", "must be positive"));
    }
    if config.agent.event_buffer == 0 {
        errors.push(ConfigError::invalid("agent.event_buffer", "must be positive"));
    }

    let markup = config.credits.markup_percent;
    if !markup.is_finite() || markup < 0.0 {
        errors.push(
            ConfigError::invalid("credits.markup_percent", format!("{markup} is negative or not a number"))
                .with_hint("the markup is a fraction: 0.21 charges 21% on top of raw tokens"),
        );
    }

    if config.credits.database_path.trim().is_empty() {
        errors.push(ConfigError::invalid("credits.database_path", "must not be empty"));
    }

    if config.credits.min_balance < 0 {
        errors.push(ConfigError::invalid(
            "credits.min_balance",
            format!("{} is negative", config.credits.min_balance),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_threshold(errors: &mut Vec<ConfigError>, key: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(
            ConfigError::invalid(key, format!("{value} is outside [0, 1]"))
                .with_hint("confidence thresholds are fractions between 0 and 1"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&TmsConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = TmsConfig::default();
        config.agentic.greeting_confidence = 1.5;
        config.agent.base_url = "ftp://agent".into();
        config.credits.markup_percent = -0.1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn errors_name_the_offending_key() {
        let mut config = TmsConfig::default();
        config.log.level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors[0].to_string(),
            "invalid value for `log.level`: unknown level `loud`"
        );
    }
}
