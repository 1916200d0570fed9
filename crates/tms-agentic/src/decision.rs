// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-response decisions.
//!
//! Runs one message through the greeting, classification and knowledge
//! stages and settles on a single [`AutoResponseDecision`]: answer it, ask
//! for clarification, hand it to a human, or stay quiet. Upstream failures
//! become escalations; only validation errors and cancellation are returned
//! as errors.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Value, json};
use strum::{Display, EnumString};
use tms_config::model::AgenticConfig;
use tms_core::{KnowledgeSearch, TmsError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::brand::BrandGreeter;
use crate::classifier::{ClassificationResult, Complexity, Domain, Intent, QuestionClassifier, QuestionType};
use crate::greeting::{GreetingDetector, GreetingResult};
use crate::knowledge::{KnowledgeResponder, KnowledgeResult};

const MEDIUM_CONFIDENCE: f64 = 0.6;
const LOW_CONFIDENCE: f64 = 0.4;

pub const FALLBACK_GENERIC: &str = "Thank you for your message. I'm here to help! Could you please provide a bit more detail about what you're looking for?";
pub const FALLBACK_TECHNICAL: &str = "I understand you have a technical question. Let me connect you with one of our technical support specialists who can provide detailed assistance.";
pub const FALLBACK_BILLING: &str = "I see you have a billing-related inquiry. For billing matters, I'll connect you with our billing support team who can help resolve this for you.";
pub const FALLBACK_COMPLEX: &str = "This seems like a complex question that would benefit from human expertise. Let me connect you with one of our support specialists.";

const SPECIALIST_SUFFIX: &str = "\n\nIf this doesn't fully answer your question, I can connect you with a specialist for more detailed assistance.";

/// Phrases that mark a message as a request for help even when it is not
/// phrased as a question.
const SUPPORT_INDICATORS: &[&str] = &[
    "help", "support", "issue", "problem", "error", "bug",
    "not working", "broken", "fix", "solve", "assistance",
    "need", "want", "please", "can you", "could you",
    "trouble", "difficulty", "stuck", "confused",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseType {
    Disabled,
    Greeting,
    Knowledge,
    Generic,
    Clarification,
    OutOfDomain,
    Escalation,
    None,
}

/// The outcome for one inbound message.
#[derive(Debug, Clone, Serialize)]
pub struct AutoResponseDecision {
    pub should_respond: bool,
    pub response_type: ResponseType,
    pub response: String,
    pub confidence: f64,
    /// One short sentence per stage visited, in order.
    pub reasoning_steps: Vec<String>,
    pub requires_escalation: bool,
    pub escalation_reason: Option<String>,
    pub processing_time: Duration,
    pub classification: Option<ClassificationResult>,
    pub knowledge: Option<KnowledgeResult>,
    pub greeting: Option<GreetingResult>,
    pub brand_response: Option<String>,
    pub citations: Vec<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl AutoResponseDecision {
    fn new() -> Self {
        Self {
            should_respond: false,
            response_type: ResponseType::None,
            response: String::new(),
            confidence: 0.0,
            reasoning_steps: Vec::new(),
            requires_escalation: false,
            escalation_reason: None,
            processing_time: Duration::ZERO,
            classification: None,
            knowledge: None,
            greeting: None,
            brand_response: None,
            citations: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    fn reason(&mut self, step: impl Into<String>) {
        self.reasoning_steps.push(step.into());
    }

    fn respond(&mut self, kind: ResponseType, response: impl Into<String>, confidence: f64) {
        self.should_respond = true;
        self.response_type = kind;
        self.response = response.into();
        self.confidence = confidence;
    }

    fn escalate(&mut self, response: &str, reason: impl Into<String>, confidence: f64) {
        self.respond(ResponseType::Escalation, response, confidence);
        self.requires_escalation = true;
        self.escalation_reason = Some(reason.into());
    }

    fn finish(mut self, started: Instant) -> Self {
        self.processing_time = started.elapsed();
        self
    }

    /// Multi-line, human-readable rendering for logs and the CLI.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Decision: {} (Confidence: {:.2})",
            self.response_type, self.confidence
        );
        let _ = writeln!(out, "Should Respond: {}", self.should_respond);
        let _ = writeln!(out, "Processing Time: {:?}", self.processing_time);
        if self.requires_escalation {
            let _ = writeln!(
                out,
                "Escalation Required: {}",
                self.escalation_reason.as_deref().unwrap_or_default()
            );
        }
        if !self.reasoning_steps.is_empty() {
            out.push_str("\nReasoning Steps:\n");
            for (i, step) in self.reasoning_steps.iter().enumerate() {
                let _ = writeln!(out, "{}. {step}", i + 1);
            }
        }
        out
    }
}

/// Routes messages through the greeting, classification and knowledge
/// stages.
#[derive(Clone)]
pub struct DecisionOrchestrator {
    config: AgenticConfig,
    greeting: GreetingDetector,
    classifier: QuestionClassifier,
    knowledge: KnowledgeResponder,
    brand: Option<BrandGreeter>,
}

impl DecisionOrchestrator {
    pub fn new(config: &AgenticConfig) -> Self {
        Self {
            config: config.clone(),
            greeting: GreetingDetector::new(config),
            classifier: QuestionClassifier::new(config),
            knowledge: KnowledgeResponder::new(config, None),
            brand: None,
        }
    }

    pub fn with_knowledge_search(mut self, search: Arc<dyn KnowledgeSearch>) -> Self {
        self.knowledge = KnowledgeResponder::new(&self.config, Some(search));
        self
    }

    pub fn with_brand_greeter(mut self, greeter: BrandGreeter) -> Self {
        self.brand = Some(greeter);
        self
    }

    /// Decide how to answer `message`.
    ///
    /// `company_name` is only used for the greeting when no brand greeter
    /// is configured.
    pub async fn decide(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        message: &str,
        company_name: &str,
        cancel: &CancellationToken,
    ) -> Result<AutoResponseDecision, TmsError> {
        let started = Instant::now();
        let mut decision = AutoResponseDecision::new();

        if !self.config.enabled {
            decision.reason("Agentic behavior is disabled");
            decision.response_type = ResponseType::Disabled;
            return Ok(decision.finish(started));
        }
        if message.trim().is_empty() {
            return Err(TmsError::Validation("message must not be empty".into()));
        }
        if cancel.is_cancelled() {
            return Err(TmsError::Cancelled);
        }
        decision.reason("Agentic behavior is enabled");

        if self.config.greeting_detection {
            let greeting = self.greeting.detect(message);
            debug!(
                %tenant_id,
                confidence = greeting.confidence,
                message_type = %greeting.message_type,
                "greeting stage"
            );
            if greeting.is_greeting {
                decision.reason(format!(
                    "Detected greeting with confidence {:.2}",
                    greeting.confidence
                ));
                let text = self
                    .greeting_text(tenant_id, project_id, company_name, cancel)
                    .await?;
                decision.respond(ResponseType::Greeting, text.clone(), greeting.confidence);
                decision.brand_response = Some(text);
                decision.metadata.insert(
                    "message_type".into(),
                    json!(greeting.message_type.to_string()),
                );
                decision.reason("Generated branded greeting response");
                decision.greeting = Some(greeting);
                return Ok(decision.finish(started));
            }
            if !greeting.matched_terms.is_empty() {
                decision.reason(format!(
                    "Detected low-confidence greeting ({:.2} < {:.2})",
                    greeting.confidence,
                    self.greeting.min_confidence()
                ));
            }
            decision.greeting = Some(greeting);
        }

        if self.config.knowledge_responses {
            let classification = self.classifier.classify(message);
            decision.reason(format!(
                "Question classification: question={}, type={}, domain={}",
                classification.is_question, classification.question_type, classification.domain
            ));
            debug!(
                %tenant_id,
                question_type = %classification.question_type,
                domain = %classification.domain,
                confidence = classification.confidence,
                "classification stage"
            );

            if classification.is_question && classification.requires_knowledge {
                decision.reason("Question requires knowledge base lookup");
                let lookup = self
                    .knowledge
                    .respond(tenant_id, project_id, message, &classification, cancel)
                    .await;
                let knowledge = match lookup {
                    Ok(knowledge) => knowledge,
                    Err(TmsError::Cancelled) => return Err(TmsError::Cancelled),
                    Err(e) => {
                        warn!(%tenant_id, %project_id, error = %e, "knowledge lookup failed, escalating");
                        decision.reason(format!("Knowledge lookup failed: {e}"));
                        decision.escalate(FALLBACK_TECHNICAL, "Knowledge lookup error", 0.3);
                        decision.classification = Some(classification);
                        return Ok(decision.finish(started));
                    }
                };
                decision.reason(format!(
                    "Knowledge lookup completed: has_response={}, confidence={:.2}",
                    knowledge.has_response, knowledge.confidence
                ));
                self.apply_knowledge(&mut decision, &classification, &knowledge);
                decision.classification = Some(classification);
                decision.knowledge = Some(knowledge);
                return Ok(decision.finish(started));
            }

            if classification.is_question {
                decision.reason("Question detected but doesn't require knowledge base");
                if classification.domain == Domain::General
                    && classification.complexity == Complexity::Simple
                {
                    decision.respond(ResponseType::Generic, FALLBACK_GENERIC, 0.5);
                    decision.classification = Some(classification);
                    return Ok(decision.finish(started));
                }
            }
            decision.classification = Some(classification);
        }

        decision.reason("Message is not a clear question or greeting");
        if contains_support_indicators(message) {
            decision.reason("Detected support request indicators");
            decision.escalate(FALLBACK_GENERIC, "Support request detected", 0.4);
            return Ok(decision.finish(started));
        }

        decision.reason("No automatic response criteria met");
        Ok(decision.finish(started))
    }

    async fn greeting_text(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        company_name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, TmsError> {
        let fallback = || format!("Hello! Welcome to {company_name}. How can I help you today?");
        let Some(greeter) = &self.brand else {
            return Ok(fallback());
        };
        match greeter.generate(tenant_id, project_id, cancel).await {
            Ok(greeting) => Ok(greeting.message),
            Err(TmsError::Cancelled) => Err(TmsError::Cancelled),
            Err(e) => {
                warn!(%tenant_id, error = %e, "brand greeting failed");
                Ok(fallback())
            }
        }
    }

    fn apply_knowledge(
        &self,
        decision: &mut AutoResponseDecision,
        classification: &ClassificationResult,
        knowledge: &KnowledgeResult,
    ) {
        if knowledge.is_out_of_domain {
            decision.reason("Question is out of domain");
            decision.respond(ResponseType::OutOfDomain, &knowledge.response, knowledge.confidence);
            return;
        }

        if knowledge.needs_more_info {
            decision.reason("Knowledge response indicates more information needed");
            decision.respond(ResponseType::Clarification, &knowledge.response, knowledge.confidence);
            return;
        }

        if knowledge.should_escalate {
            decision.reason("Knowledge response recommends escalation");
            decision.escalate(
                escalation_response(classification),
                escalation_reason(classification, knowledge),
                0.7,
            );
            return;
        }

        let threshold = self.config.knowledge_confidence;
        if knowledge.has_response && knowledge.confidence >= threshold {
            decision.reason(format!(
                "High-confidence knowledge response ({:.2} >= {:.2})",
                knowledge.confidence, threshold
            ));
            decision.respond(ResponseType::Knowledge, &knowledge.response, knowledge.confidence);
            decision.citations = knowledge.citations.clone();
            decision
                .metadata
                .insert("response_quality".into(), json!(knowledge.quality.to_string()));
            decision
                .metadata
                .insert("chunks_found".into(), json!(knowledge.chunks_found));
            return;
        }

        if knowledge.has_response && knowledge.confidence >= MEDIUM_CONFIDENCE {
            decision.reason(format!(
                "Medium-confidence knowledge response ({:.2} >= {:.2})",
                knowledge.confidence, MEDIUM_CONFIDENCE
            ));
            decision.respond(
                ResponseType::Knowledge,
                format!("{}{SPECIALIST_SUFFIX}", knowledge.response),
                knowledge.confidence,
            );
            decision.citations = knowledge.citations.clone();
            return;
        }

        decision.reason(format!(
            "Low-confidence or no knowledge response (confidence: {:.2})",
            knowledge.confidence
        ));
        decision.escalate(
            escalation_response(classification),
            "Low confidence knowledge response",
            0.4,
        );
    }
}

fn contains_support_indicators(message: &str) -> bool {
    let lowered = message.to_lowercase();
    SUPPORT_INDICATORS.iter().any(|i| lowered.contains(i))
}

fn escalation_reason(classification: &ClassificationResult, knowledge: &KnowledgeResult) -> String {
    let complex = classification.complexity == Complexity::Complex;
    let reason = if classification.domain == Domain::Billing
        && classification.intent == Intent::Complaint
    {
        "Billing complaint requires human attention"
    } else if classification.question_type == QuestionType::Troubleshooting && complex {
        "Complex troubleshooting requires specialist expertise"
    } else if classification.domain == Domain::Technical && complex {
        "Complex technical question requires specialist assistance"
    } else if knowledge.confidence < LOW_CONFIDENCE {
        "Low confidence in available knowledge"
    } else {
        "Human expertise recommended for better assistance"
    };
    reason.to_string()
}

fn escalation_response(classification: &ClassificationResult) -> &'static str {
    match classification.domain {
        Domain::Technical => FALLBACK_TECHNICAL,
        Domain::Billing => FALLBACK_BILLING,
        _ if classification.complexity == Complexity::Complex => FALLBACK_COMPLEX,
        _ => FALLBACK_GENERIC,
    }
}
