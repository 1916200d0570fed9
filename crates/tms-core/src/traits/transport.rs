// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream agent transport capability.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::TmsError;
use crate::types::{AgentEvent, ChatRequest, HealthStatus};

/// The receiving halves of one agent call.
///
/// Events arrive in upstream order. At most one error is delivered, after
/// which both channels close. Both channels always close eventually.
#[derive(Debug)]
pub struct AgentStream {
    pub events: mpsc::Receiver<AgentEvent>,
    pub errors: mpsc::Receiver<TmsError>,
}

impl AgentStream {
    /// A stream that yields no events and a single error.
    pub fn failed(err: TmsError) -> Self {
        let (_events_tx, events) = mpsc::channel(1);
        let (errors_tx, errors) = mpsc::channel(1);
        // Capacity is 1 and the receiver is alive, so this cannot fail.
        let _ = errors_tx.try_send(err);
        Self { events, errors }
    }
}

/// Streaming access to the upstream AI agent.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Start one call. The producer runs in the background until the body
    /// ends, an error occurs, or `cancel` fires.
    fn process_message_stream(&self, request: ChatRequest, cancel: CancellationToken)
    -> AgentStream;

    async fn health_check(&self, cancel: &CancellationToken) -> Result<HealthStatus, TmsError>;
}
