// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Streaming client for the upstream AI agent.
//!
//! [`AgentClient`] posts one chat request to `/chat/process` and relays the
//! server-sent-events reply as [`tms_core::AgentEvent`]s over a bounded
//! channel, with a separate single-slot error channel.

pub mod client;
pub mod sse;

pub use client::{AgentClient, DEFAULT_EVENT_BUFFER, DEFAULT_TIMEOUT};
