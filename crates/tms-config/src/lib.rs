// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the TMS support pipeline.
//!
//! Provides TOML configuration parsing with strict validation (`deny_unknown_fields`),
//! XDG file hierarchy lookup, `TMS_` environment overrides, and miette diagnostics
//! with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use tms_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("agent: {}", config.agent.base_url);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, SourceIndex, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::TmsConfig;

/// Validate a loaded config, or explain why loading failed.
fn finish(
    loaded: Result<TmsConfig, figment::Error>,
    sources: impl FnOnce() -> SourceIndex,
) -> Result<TmsConfig, Vec<ConfigError>> {
    let config = loaded.map_err(|err| sources().diagnose(err))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from the standard hierarchy and validate it.
pub fn load_and_validate() -> Result<TmsConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || read_sources(search_path()))
}

/// Load a single config file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<TmsConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_sources(vec![path.to_path_buf()])
    })
}

/// Load inline TOML over the defaults and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<TmsConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        SourceIndex::new(vec![("<inline>".to_string(), toml_content.to_string())])
    })
}

/// Render the effective configuration as TOML.
pub fn to_toml(config: &TmsConfig) -> Result<String, ConfigError> {
    toml::to_string_pretty(config).map_err(|e| ConfigError::Other(e.to_string()))
}

fn search_path() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(loader::SYSTEM_CONFIG_PATH)];
    paths.extend(loader::user_config_path());
    if let Ok(dir) = std::env::current_dir() {
        paths.push(dir.join(loader::LOCAL_CONFIG_FILE));
    }
    paths
}

fn read_sources(paths: Vec<PathBuf>) -> SourceIndex {
    let files = paths
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            Some((path.display().to_string(), content))
        })
        .collect();
    SourceIndex::new(files)
}
