// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tenant settings lookup used for brand greetings.

use async_trait::async_trait;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::TmsError;

/// Read-through access to per-project settings documents.
#[async_trait]
pub trait BrandSettingsSource: Send + Sync {
    /// Fetch the settings document stored under `key`.
    async fn get_setting(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        key: &str,
    ) -> Result<Map<String, Value>, TmsError>;
}
