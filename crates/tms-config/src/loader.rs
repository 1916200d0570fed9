// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./tms.toml` > `~/.config/tms/tms.toml` > `/etc/tms/tms.toml`,
//! with environment variable overrides via the `TMS_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TmsConfig;

/// Top-level sections, longest first so `agentic_` wins over `agent_`.
const SECTIONS: &[&str] = &["agentic", "credits", "agent", "brand", "log"];

/// Path of the system-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/tms/tms.toml";

/// Name of the config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "tms.toml";

/// Path of the per-user config file, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tms").join("tms.toml"))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tms/tms.toml`
/// 3. `~/.config/tms/tms.toml`
/// 4. `./tms.toml`
/// 5. `TMS_*` environment variables
pub fn load_config() -> Result<TmsConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<TmsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TmsConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TmsConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TmsConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the layered Figment before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(TmsConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Map `TMS_<SECTION>_<KEY>` onto `section.key`.
///
/// Keys contain underscores themselves (`TMS_AGENT_BASE_URL` is
/// `agent.base_url`), so only the section prefix is split off.
pub fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

fn env_provider() -> Env {
    Env::prefixed("TMS_").map(|key| map_env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("agent_base_url"), "agent.base_url");
        assert_eq!(map_env_key("agentic_knowledge_confidence"), "agentic.knowledge_confidence");
        assert_eq!(map_env_key("credits_markup_percent"), "credits.markup_percent");
        assert_eq!(map_env_key("log_level"), "log.level");
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}
