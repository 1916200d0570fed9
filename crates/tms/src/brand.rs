// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Brand settings served from the `[brand]` config section.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tms_agentic::brand::BRANDING_SETTINGS_KEY;
use tms_config::model::BrandConfig;
use tms_core::{BrandSettingsSource, TmsError};
use uuid::Uuid;

/// The same branding document for every tenant and project.
#[derive(Debug, Clone, Default)]
pub struct StaticBrandSettings {
    branding: Map<String, Value>,
}

impl StaticBrandSettings {
    pub fn from_config(config: &BrandConfig) -> Self {
        let mut branding = Map::new();
        for (key, value) in [
            ("company_name", &config.company_name),
            ("about", &config.about),
            ("support_url", &config.support_url),
        ] {
            if !value.is_empty() {
                branding.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        Self { branding }
    }
}

#[async_trait]
impl BrandSettingsSource for StaticBrandSettings {
    async fn get_setting(
        &self,
        _tenant_id: Uuid,
        _project_id: Uuid,
        key: &str,
    ) -> Result<Map<String, Value>, TmsError> {
        if key == BRANDING_SETTINGS_KEY {
            Ok(self.branding.clone())
        } else {
            Ok(Map::new())
        }
    }
}
