// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic question classification.
//!
//! Decides whether a message is a question and, if so, what kind: its type,
//! intent, domain and complexity, plus the keywords used to build a knowledge
//! search query. Every signal is a keyword list checked by substring against
//! the normalized message; the first matching group wins unless noted.

use serde::Serialize;
use strum::{Display, EnumString};
use tms_config::model::AgenticConfig;

/// Words that mark a question when they open the message.
const QUESTION_WORDS: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "which", "can", "could",
    "would", "should", "is", "are", "do", "does", "did", "will", "won't",
    "?", "help", "explain", "tell", "show",
];

/// Phrases that mark a question anywhere in the message.
const QUESTION_PATTERNS: &[&str] = &[
    "can you", "could you", "would you", "will you",
    "how do", "how to", "what is", "what are",
    "where is", "when is", "why is", "who is",
    "tell me", "show me", "explain", "help me",
];

const HOW_TO_KEYWORDS: &[&str] = &[
    "how to", "how do", "how can", "how should", "steps", "guide",
    "tutorial", "instructions", "process", "procedure", "way to",
];

const WHAT_IS_KEYWORDS: &[&str] = &[
    "what is", "what are", "what does", "define", "definition",
    "meaning", "explain", "describe", "tell me about",
];

const TROUBLESHOOTING_KEYWORDS: &[&str] = &[
    "problem", "issue", "error", "bug", "broken", "not working",
    "fix", "solve", "troubleshoot", "help", "wrong", "failed",
    "doesn't work", "can't", "unable", "trouble",
];

const PRICING_KEYWORDS: &[&str] = &[
    "price", "cost", "pricing", "fee", "charge", "payment", "plan",
    "subscription", "how much", "expensive", "cheap", "discount",
];

const REQUEST_KEYWORDS: &[&str] = &[
    "please", "can you", "could you", "would you", "i need", "i want",
    "i would like", "help me", "assist", "support", "do this",
];

const ACTION_PATTERNS: &[&str] = &[
    "please", "can you", "could you", "would you", "help me",
    "i need", "i want", "i would like", "assist", "do this",
    "create", "make", "setup", "configure", "fix", "solve",
];

const COMPLAINT_PATTERNS: &[&str] = &[
    "problem", "issue", "broken", "not working", "doesn't work",
    "frustrated", "angry", "disappointed", "terrible", "awful",
];

const TECHNICAL_KEYWORDS: &[&str] = &[
    "api", "code", "programming", "technical", "development", "integration",
    "database", "server", "error", "bug", "configuration", "setup",
    "install", "deployment", "authentication", "security",
];

const PRICING_DOMAIN_KEYWORDS: &[&str] = &[
    "price", "cost", "pricing", "plan", "subscription", "billing",
    "payment", "fee", "charge", "discount", "upgrade", "downgrade",
];

const SUPPORT_KEYWORDS: &[&str] = &[
    "help", "support", "assistance", "problem", "issue", "question",
    "contact", "service", "customer", "agent", "representative",
];

const PRODUCT_KEYWORDS: &[&str] = &[
    "product", "feature", "functionality", "capability", "service",
    "tool", "platform", "application", "software", "system",
];

const BILLING_KEYWORDS: &[&str] = &[
    "bill", "billing", "invoice", "payment", "charge", "subscription",
    "refund", "credit", "debit", "account", "transaction",
];

const ACCOUNT_KEYWORDS: &[&str] = &[
    "account", "profile", "login", "password", "username", "email",
    "settings", "preferences", "access", "permissions", "user",
];

const SIMPLE_INDICATORS: &[&str] = &[
    "what is", "how much", "when", "where", "who", "yes", "no",
];

const COMPLEX_INDICATORS: &[&str] = &[
    "integration", "configuration", "troubleshoot", "multiple",
    "complex", "advanced", "enterprise", "custom", "api", "development",
];

/// Words never reported as keywords.
pub const STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to",
    "for", "of", "with", "by", "is", "are", "was", "were", "be", "been",
    "have", "has", "had", "do", "does", "did", "will", "would", "could", "should",
    "can", "i", "you", "he", "she", "it", "we", "they", "this", "that",
    "these", "those", "my", "your", "his", "her", "its", "our", "their",
];

/// Maximum number of keywords extracted from one message.
pub const MAX_KEYWORDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum QuestionType {
    HowTo,
    WhatIs,
    Troubleshooting,
    Pricing,
    General,
    Greeting,
    Request,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Intent {
    SeekingInfo,
    RequestingAction,
    Greeting,
    Complaint,
}

/// Subject area of a message. Declaration order breaks scoring ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Technical,
    Pricing,
    Support,
    Product,
    Billing,
    Account,
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// Result of classifying one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub is_question: bool,
    pub question_type: QuestionType,
    pub intent: Intent,
    pub domain: Domain,
    pub complexity: Complexity,
    /// At most [`MAX_KEYWORDS`] distinct tokens in first-occurrence order.
    pub keywords: Vec<String>,
    pub confidence: f64,
    pub requires_knowledge: bool,
    pub can_auto_respond: bool,
}

impl ClassificationResult {
    fn inactive() -> Self {
        Self {
            is_question: false,
            question_type: QuestionType::General,
            intent: Intent::SeekingInfo,
            domain: Domain::General,
            complexity: Complexity::Simple,
            keywords: Vec::new(),
            confidence: 0.0,
            requires_knowledge: false,
            can_auto_respond: false,
        }
    }
}

/// Lexical question classifier.
#[derive(Debug, Clone)]
pub struct QuestionClassifier {
    enabled: bool,
    knowledge_confidence: f64,
}

impl QuestionClassifier {
    pub fn new(config: &AgenticConfig) -> Self {
        Self {
            enabled: config.enabled && config.knowledge_responses,
            knowledge_confidence: config.knowledge_confidence,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Classify a message.
    pub fn classify(&self, message: &str) -> ClassificationResult {
        if !self.enabled {
            return ClassificationResult::inactive();
        }

        let normalized = normalize(message);

        if !is_question(&normalized) {
            return ClassificationResult {
                intent: detect_intent(&normalized),
                domain: detect_domain(&normalized),
                confidence: 0.1,
                ..ClassificationResult::inactive()
            };
        }

        let question_type = classify_type(&normalized);
        let intent = detect_intent(&normalized);
        let domain = detect_domain(&normalized);
        let complexity = assess_complexity(&normalized);
        let keywords = extract_keywords(&normalized);
        let confidence = confidence(&normalized, question_type, intent, domain);
        let requires_knowledge = requires_knowledge(question_type, domain, complexity);

        ClassificationResult {
            is_question: true,
            question_type,
            intent,
            domain,
            complexity,
            keywords,
            confidence,
            requires_knowledge,
            can_auto_respond: requires_knowledge && confidence >= self.knowledge_confidence,
        }
    }
}

fn contains_any(text: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| text.contains(p))
}

/// Lowercase and keep only letters, whitespace, `?` and `'`.
fn normalize(message: &str) -> String {
    message
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphabetic() || c.is_whitespace() || *c == '?' || *c == '\'')
        .collect()
}

fn is_question(normalized: &str) -> bool {
    if normalized.contains('?') {
        return true;
    }
    let Some(first) = normalized.split_whitespace().next() else {
        return false;
    };
    QUESTION_WORDS.contains(&first) || contains_any(normalized, QUESTION_PATTERNS)
}

fn classify_type(normalized: &str) -> QuestionType {
    let groups = [
        (HOW_TO_KEYWORDS, QuestionType::HowTo),
        (WHAT_IS_KEYWORDS, QuestionType::WhatIs),
        (TROUBLESHOOTING_KEYWORDS, QuestionType::Troubleshooting),
        (PRICING_KEYWORDS, QuestionType::Pricing),
        (REQUEST_KEYWORDS, QuestionType::Request),
    ];
    groups
        .iter()
        .find(|(keywords, _)| contains_any(normalized, keywords))
        .map_or(QuestionType::General, |(_, kind)| *kind)
}

fn detect_intent(normalized: &str) -> Intent {
    if contains_any(normalized, ACTION_PATTERNS) {
        Intent::RequestingAction
    } else if contains_any(normalized, COMPLAINT_PATTERNS) {
        Intent::Complaint
    } else {
        Intent::SeekingInfo
    }
}

fn detect_domain(normalized: &str) -> Domain {
    let groups = [
        (TECHNICAL_KEYWORDS, Domain::Technical),
        (PRICING_DOMAIN_KEYWORDS, Domain::Pricing),
        (SUPPORT_KEYWORDS, Domain::Support),
        (PRODUCT_KEYWORDS, Domain::Product),
        (BILLING_KEYWORDS, Domain::Billing),
        (ACCOUNT_KEYWORDS, Domain::Account),
    ];

    let mut best = Domain::General;
    let mut best_score = 0;
    for (keywords, domain) in groups {
        let score = keywords.iter().filter(|k| normalized.contains(*k)).count();
        if score > best_score {
            best_score = score;
            best = domain;
        }
    }
    best
}

fn assess_complexity(normalized: &str) -> Complexity {
    if contains_any(normalized, COMPLEX_INDICATORS) {
        return Complexity::Complex;
    }
    if contains_any(normalized, SIMPLE_INDICATORS) {
        return Complexity::Simple;
    }
    match normalized.split_whitespace().count() {
        n if n < 5 => Complexity::Simple,
        n if n > 15 => Complexity::Complex,
        _ => Complexity::Moderate,
    }
}

/// Content words of a message, deduplicated, in first-occurrence order.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        let cleaned = word
            .trim_matches(|c| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'))
            .to_lowercase();
        if cleaned.chars().count() < 3 || STOPWORDS.contains(&cleaned.as_str()) {
            continue;
        }
        if !keywords.contains(&cleaned) {
            keywords.push(cleaned);
        }
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

fn confidence(normalized: &str, kind: QuestionType, intent: Intent, domain: Domain) -> f64 {
    let mut confidence = 0.3;
    if normalized.contains('?') {
        confidence += 0.2;
    }
    if kind != QuestionType::General {
        confidence += 0.2;
    }
    if domain != Domain::General {
        confidence += 0.15;
    }
    if matches!(intent, Intent::SeekingInfo | Intent::RequestingAction) {
        confidence += 0.1;
    }
    if normalized.split_whitespace().count() < 3 {
        confidence -= 0.2;
    }
    f64::clamp(confidence, 0.0, 1.0)
}

fn requires_knowledge(kind: QuestionType, domain: Domain, complexity: Complexity) -> bool {
    if kind == QuestionType::Greeting {
        return false;
    }
    if matches!(kind, QuestionType::HowTo | QuestionType::Troubleshooting)
        || matches!(domain, Domain::Technical | Domain::Product)
    {
        return true;
    }
    match complexity {
        Complexity::Complex => true,
        Complexity::Moderate => matches!(domain, Domain::Support | Domain::Billing),
        Complexity::Simple => false,
    }
}
