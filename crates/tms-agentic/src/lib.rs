// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-response decision engine for inbound support messages.
//!
//! This crate provides:
//! - [`GreetingDetector`]: lexical greeting scoring
//! - [`QuestionClassifier`]: question type, intent, domain and complexity
//! - [`KnowledgeResponder`]: knowledge search, answer synthesis and grading
//! - [`BrandGreeter`]: deterministic brand-aware greeting templates
//! - [`DecisionOrchestrator`]: routes a message through the stages above
//!
//! Everything except the knowledge search and the brand settings read is a
//! pure function of the message and the `[agentic]` config section.

pub mod brand;
pub mod classifier;
pub mod decision;
pub mod greeting;
pub mod knowledge;

pub use brand::{BrandGreeter, GreetingResponse, TemplateFamily, compose_greeting, time_of_day};
pub use classifier::{
    ClassificationResult, Complexity, Domain, Intent, QuestionClassifier, QuestionType,
};
pub use decision::{AutoResponseDecision, DecisionOrchestrator, ResponseType};
pub use greeting::{GreetingDetector, GreetingResult, GreetingType};
pub use knowledge::{KnowledgeResponder, KnowledgeResult, ResponseQuality};
