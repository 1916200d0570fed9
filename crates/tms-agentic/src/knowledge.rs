// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge-backed answers.
//!
//! Turns a classified question into a knowledge search, then grades what
//! came back: a synthesized answer with citations, a request for more
//! detail, or an out-of-domain redirection.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use strum::{Display, EnumString};
use tms_config::model::AgenticConfig;
use tms_core::{KnowledgeChunk, KnowledgeSearch, KnowledgeSearchRequest, TmsError};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::classifier::{ClassificationResult, Complexity, Domain, Intent, QuestionType};

pub const OUT_OF_DOMAIN_TEMPLATE: &str = "I'm sorry, but that question seems to be outside of my area of expertise. I'm here to help with questions related to our products and services. Is there something specific about our platform I can help you with?";

pub const MORE_INFO_TEMPLATE: &str = "I found some relevant information, but I might need a bit more context to give you the most helpful answer. Could you provide more details about what specifically you're looking for?";

/// Topics the support knowledge base never covers.
const OUT_OF_DOMAIN_KEYWORDS: &[&str] = &[
    "weather", "sports", "politics", "news", "cooking", "recipes",
    "travel", "entertainment", "movies", "music", "celebrities",
    "personal", "relationship", "health", "medical", "legal",
    "homework", "assignment", "school", "university",
];

/// Leading phrases dropped from a how-to question before it is echoed back.
const HOW_TO_PREFIXES: &[&str] = &["how do i ", "how to ", "how can i ", "how should i "];

const MAX_RESULTS: usize = 10;
const SEARCH_SIMILARITY: f64 = 0.6;
const RELEVANT_SCORE: f64 = 0.7;
const MAX_CITATIONS: usize = 3;

/// Grade of a knowledge answer, ordered from worst to best.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumString, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResponseQuality {
    Poor,
    Adequate,
    Good,
    Excellent,
}

/// Outcome of a knowledge lookup for one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeResult {
    pub has_response: bool,
    pub response: String,
    pub confidence: f64,
    /// Relevant chunks, highest score first.
    pub source_chunks: Vec<KnowledgeChunk>,
    pub citations: Vec<String>,
    pub quality: ResponseQuality,
    pub is_out_of_domain: bool,
    pub needs_more_info: bool,
    pub should_escalate: bool,
    pub top_score: f64,
    pub chunks_found: usize,
    pub search_query: String,
    pub processing_time: Duration,
}

impl KnowledgeResult {
    fn none() -> Self {
        Self {
            has_response: false,
            response: String::new(),
            confidence: 0.0,
            source_chunks: Vec::new(),
            citations: Vec::new(),
            quality: ResponseQuality::Poor,
            is_out_of_domain: false,
            needs_more_info: false,
            should_escalate: false,
            top_score: 0.0,
            chunks_found: 0,
            search_query: String::new(),
            processing_time: Duration::ZERO,
        }
    }

    fn canned(response: &str, confidence: f64, quality: ResponseQuality) -> Self {
        Self {
            has_response: true,
            response: response.to_string(),
            confidence,
            quality,
            ..Self::none()
        }
    }
}

/// Answers classified questions from an injected [`KnowledgeSearch`].
#[derive(Clone)]
pub struct KnowledgeResponder {
    enabled: bool,
    search: Option<Arc<dyn KnowledgeSearch>>,
}

impl KnowledgeResponder {
    /// Without a search backend the responder still runs and answers with a
    /// placeholder naming the query it would have sent.
    pub fn new(config: &AgenticConfig, search: Option<Arc<dyn KnowledgeSearch>>) -> Self {
        Self {
            enabled: config.enabled && config.knowledge_responses,
            search,
        }
    }

    pub fn has_search(&self) -> bool {
        self.search.is_some()
    }

    /// Look up an answer for `question`.
    ///
    /// Search failures come back as [`TmsError::Lookup`]; cancellation of
    /// `cancel` as [`TmsError::Cancelled`]. Weak or missing results are
    /// reported through the result flags, never as errors.
    pub async fn respond(
        &self,
        tenant_id: Uuid,
        project_id: Uuid,
        question: &str,
        classification: &ClassificationResult,
        cancel: &CancellationToken,
    ) -> Result<KnowledgeResult, TmsError> {
        let started = Instant::now();

        if !self.enabled || !classification.is_question || !classification.requires_knowledge {
            return Ok(KnowledgeResult {
                processing_time: started.elapsed(),
                ..KnowledgeResult::none()
            });
        }

        if is_out_of_domain(question, classification) {
            return Ok(KnowledgeResult {
                is_out_of_domain: true,
                search_query: question.to_string(),
                processing_time: started.elapsed(),
                ..KnowledgeResult::canned(OUT_OF_DOMAIN_TEMPLATE, 0.8, ResponseQuality::Good)
            });
        }

        let query = build_search_query(classification);

        let Some(search) = &self.search else {
            let placeholder =
                format!("I would search the knowledge base for information related to: {query}");
            return Ok(KnowledgeResult {
                search_query: query,
                processing_time: started.elapsed(),
                ..KnowledgeResult::canned(&placeholder, 0.5, ResponseQuality::Adequate)
            });
        };

        let request = KnowledgeSearchRequest {
            query: query.clone(),
            max_results: MAX_RESULTS,
            similarity_score: SEARCH_SIMILARITY,
            include_documents: true,
            include_pages: true,
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TmsError::Cancelled),
            res = search.search(tenant_id, project_id, &request) => res,
        };
        let response = match response {
            Ok(response) => response,
            Err(TmsError::Cancelled) => return Err(TmsError::Cancelled),
            Err(err) => {
                return Err(TmsError::Lookup {
                    message: format!("knowledge search failed: {err}"),
                    source: Some(Box::new(err)),
                });
            }
        };

        debug!(
            %tenant_id,
            %project_id,
            query = %query,
            chunks = response.results.len(),
            "knowledge search returned"
        );

        let mut result = analyze(response.results, classification, question);
        result.search_query = query;
        result.processing_time = started.elapsed();
        Ok(result)
    }
}

fn is_out_of_domain(question: &str, classification: &ClassificationResult) -> bool {
    let lowered = question.to_lowercase();
    if OUT_OF_DOMAIN_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        return true;
    }
    classification.domain == Domain::General
        && classification.confidence < 0.5
        && classification.keywords.len() < 2
}

/// Search query for a classified question: its keywords plus domain and
/// question-type terms.
pub fn build_search_query(classification: &ClassificationResult) -> String {
    let mut query = classification.keywords.join(" ");

    let domain_terms = match classification.domain {
        Domain::Technical => Some((["api", "technical"], " technical integration")),
        Domain::Pricing => Some((["price", "cost"], " pricing cost")),
        Domain::Account => Some((["account", "user"], " account user")),
        Domain::Billing => Some((["billing", "payment"], " billing payment")),
        _ => None,
    };
    if let Some((present, extra)) = domain_terms {
        if !present.iter().any(|t| query.contains(t)) {
            query.push_str(extra);
        }
    }

    match classification.question_type {
        QuestionType::HowTo => query.push_str(" guide tutorial steps"),
        QuestionType::Troubleshooting => query.push_str(" troubleshoot fix solution"),
        QuestionType::WhatIs => query.push_str(" overview explanation"),
        _ => {}
    }

    query.trim().to_string()
}

fn analyze(
    results: Vec<KnowledgeChunk>,
    classification: &ClassificationResult,
    question: &str,
) -> KnowledgeResult {
    let chunks_found = results.len();
    if results.is_empty() {
        return KnowledgeResult {
            needs_more_info: true,
            ..KnowledgeResult::canned(MORE_INFO_TEMPLATE, 0.3, ResponseQuality::Poor)
        };
    }

    let top_score = results.iter().map(|c| c.score).fold(0.0, f64::max);
    let mut relevant: Vec<KnowledgeChunk> = results
        .into_iter()
        .filter(|c| c.score >= RELEVANT_SCORE)
        .collect();
    relevant.sort_by(|a, b| b.score.total_cmp(&a.score));

    if relevant.is_empty() {
        let base = if top_score < 0.5 {
            KnowledgeResult {
                is_out_of_domain: true,
                ..KnowledgeResult::canned(OUT_OF_DOMAIN_TEMPLATE, 0.6, ResponseQuality::Adequate)
            }
        } else {
            KnowledgeResult {
                needs_more_info: true,
                ..KnowledgeResult::canned(MORE_INFO_TEMPLATE, 0.4, ResponseQuality::Poor)
            }
        };
        return KnowledgeResult {
            top_score,
            chunks_found,
            ..base
        };
    }

    let (response, confidence) = synthesize(&relevant, classification.question_type, question);

    KnowledgeResult {
        has_response: true,
        response,
        confidence,
        citations: citations(&relevant),
        quality: assess_quality(confidence, relevant.len(), top_score),
        should_escalate: should_escalate(classification, confidence, top_score),
        source_chunks: relevant,
        top_score,
        chunks_found,
        ..KnowledgeResult::none()
    }
}

/// Answer from the best chunk; every extra relevant chunk adds 0.1 confidence.
fn synthesize(relevant: &[KnowledgeChunk], kind: QuestionType, question: &str) -> (String, f64) {
    let Some(primary) = relevant.first() else {
        return (String::new(), 0.0);
    };

    let extra = relevant.len().saturating_sub(1) as f64;
    let confidence = (primary.score + 0.1 * extra).min(1.0);

    let body = primary.content.clone();
    let lowered = body.to_lowercase();
    let response = match kind {
        QuestionType::HowTo if !lowered.contains("step") && !lowered.contains("follow") => {
            match how_to_subject(question) {
                Some(subject) => format!("Here's how to {subject}:\n\n{body}"),
                None => body,
            }
        }
        QuestionType::Troubleshooting
            if !lowered.contains("solution") && !lowered.contains("fix") =>
        {
            format!("To resolve this issue:\n\n{body}")
        }
        _ => body,
    };

    (response, confidence)
}

/// "How do I reset my password?" becomes "reset my password".
fn how_to_subject(question: &str) -> Option<String> {
    let lowered = question.trim().to_lowercase();
    let stripped = HOW_TO_PREFIXES
        .iter()
        .find_map(|p| lowered.strip_prefix(p))
        .unwrap_or(&lowered);
    let subject = stripped.trim_end_matches('?').trim();
    (!subject.is_empty()).then(|| subject.to_string())
}

/// Distinct citation labels, at most three.
pub fn citations(chunks: &[KnowledgeChunk]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for chunk in chunks {
        let label = chunk.citation();
        if !labels.contains(&label) {
            labels.push(label);
        }
        if labels.len() >= MAX_CITATIONS {
            break;
        }
    }
    labels
}

pub fn assess_quality(confidence: f64, chunk_count: usize, top_score: f64) -> ResponseQuality {
    if confidence >= 0.9 && chunk_count >= 2 && top_score >= 0.9 {
        ResponseQuality::Excellent
    } else if confidence >= 0.8 && top_score >= 0.8 {
        ResponseQuality::Good
    } else if confidence >= 0.7 {
        ResponseQuality::Adequate
    } else {
        ResponseQuality::Poor
    }
}

pub fn should_escalate(
    classification: &ClassificationResult,
    confidence: f64,
    top_score: f64,
) -> bool {
    (classification.domain == Domain::Technical
        && classification.complexity == Complexity::Complex
        && confidence < 0.7)
        || (classification.domain == Domain::Billing && classification.intent == Intent::Complaint)
        || (confidence < 0.5 && top_score < 0.7)
        || (classification.question_type == QuestionType::Troubleshooting && confidence < 0.6)
}
