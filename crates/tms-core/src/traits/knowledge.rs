// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge search capability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::TmsError;
use crate::types::{KnowledgeSearchRequest, KnowledgeSearchResponse};

/// External similarity search over a project's documents and crawled pages.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn search(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        request: &KnowledgeSearchRequest,
    ) -> Result<KnowledgeSearchResponse, TmsError>;
}
