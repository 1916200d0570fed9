// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lexical greeting detection.
//!
//! Scores a message on how much it looks like a bare greeting ("hi",
//! "good morning!") as opposed to a greeting wrapped around a real request.
//! Pure keyword heuristics: no network, no model call.

use serde::Serialize;
use strum::{Display, EnumString};
use tms_config::model::AgenticConfig;

/// Built-in greeting keywords, matched as substrings of the normalized message.
pub const DEFAULT_GREETING_KEYWORDS: &[&str] = &[
    "hello", "hi", "hey", "greetings", "good morning", "good afternoon",
    "good evening", "howdy", "hiya", "welcome", "salutations",
    "helo", "hallo", "helllo", "heyyy", "hii", "hiiii",
    "hola", "bonjour", "guten tag", "ciao", "konnichiwa", "namaste",
    "yo", "sup", "what's up", "whats up", "wassup",
];

/// Built-in keywords that suggest the message is a request, not a greeting.
pub const DEFAULT_NEGATIVE_KEYWORDS: &[&str] = &[
    "help", "support", "problem", "issue", "error", "bug", "question",
    "pricing", "cost", "payment", "refund", "return", "policy",
    "technical", "api", "integration", "setup", "configuration",
    "account", "login", "password", "billing", "invoice",
];

/// Words that lower greeting confidence once each.
const PENALTY_QUESTION_WORDS: &[&str] = &[
    "what", "how", "when", "where", "why", "who", "can", "could", "would", "should",
];

/// Words that mark a greeting as carrying a question.
const QUESTION_WORDS: &[&str] = &[
    "what", "how", "when", "where", "why", "who", "can", "could", "would", "should",
    "is", "are", "do", "does", "did",
];

const MIN_CONFIDENCE_FALLBACK: f64 = 0.4;

/// Shape of a message as seen by the greeting detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GreetingType {
    SimpleGreeting,
    QuestionGreeting,
    Complex,
    Empty,
}

/// Outcome of [`GreetingDetector::detect`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GreetingResult {
    pub is_greeting: bool,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    /// Matched keywords in keyword-list order, without duplicates.
    pub matched_terms: Vec<String>,
    pub message_type: GreetingType,
}

impl GreetingResult {
    fn empty() -> Self {
        Self {
            is_greeting: false,
            confidence: 0.0,
            matched_terms: Vec::new(),
            message_type: GreetingType::Empty,
        }
    }

    fn no_match() -> Self {
        Self {
            is_greeting: false,
            confidence: 0.0,
            matched_terms: Vec::new(),
            message_type: GreetingType::Complex,
        }
    }
}

/// Keyword-driven greeting detector.
#[derive(Debug, Clone)]
pub struct GreetingDetector {
    greeting_keywords: Vec<String>,
    negative_keywords: Vec<String>,
    min_confidence: f64,
}

impl GreetingDetector {
    /// Build a detector from the agentic config section.
    ///
    /// Empty keyword lists fall back to the built-in lists; a zero threshold
    /// falls back to 0.4.
    pub fn new(config: &AgenticConfig) -> Self {
        let greeting_keywords = keyword_list(&config.greeting_keywords, DEFAULT_GREETING_KEYWORDS);
        let negative_keywords = keyword_list(&config.negative_keywords, DEFAULT_NEGATIVE_KEYWORDS);
        let min_confidence = if config.greeting_confidence > 0.0 {
            config.greeting_confidence
        } else {
            MIN_CONFIDENCE_FALLBACK
        };

        Self {
            greeting_keywords,
            negative_keywords,
            min_confidence,
        }
    }

    /// Detector with the built-in keyword lists and a 0.4 threshold.
    pub fn with_defaults() -> Self {
        Self::new(&AgenticConfig::default())
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    pub fn keywords(&self) -> &[String] {
        &self.greeting_keywords
    }

    /// Analyze a message.
    pub fn detect(&self, message: &str) -> GreetingResult {
        if message.trim().is_empty() {
            return GreetingResult::empty();
        }

        let normalized = normalize(message);
        let words: Vec<&str> = normalized.split_whitespace().collect();

        let matched_terms = self.find_matches(&normalized);
        if matched_terms.is_empty() {
            return GreetingResult::no_match();
        }

        let mut confidence = self.base_confidence(message, &words, matched_terms.len());

        // Requests dressed as greetings ("hi, my login is broken") keep half.
        if self
            .negative_keywords
            .iter()
            .any(|k| normalized.contains(k.as_str()))
        {
            confidence *= 0.5;
        }

        // Very short messages are boosted even when a negative keyword hit.
        if words.len() <= 3 {
            confidence += 0.2;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let message_type = self.classify(&words, confidence);

        GreetingResult {
            is_greeting: confidence > 0.0 && confidence >= self.min_confidence,
            confidence,
            matched_terms,
            message_type,
        }
    }

    /// True for greetings that carry no question.
    pub fn is_simple_greeting(&self, message: &str) -> bool {
        let result = self.detect(message);
        result.is_greeting && result.message_type == GreetingType::SimpleGreeting
    }

    fn find_matches(&self, normalized: &str) -> Vec<String> {
        let mut matches: Vec<String> = Vec::new();
        for keyword in &self.greeting_keywords {
            if normalized.contains(keyword.as_str()) && !matches.contains(keyword) {
                matches.push(keyword.clone());
            }
        }
        matches
    }

    fn base_confidence(&self, raw: &str, words: &[&str], match_count: usize) -> f64 {
        let mut confidence = match_count as f64 * 0.3;

        let word_count = words.len();
        if word_count <= 3 {
            confidence += 0.4;
        } else if word_count <= 5 {
            confidence += 0.2;
        } else if word_count > 10 {
            confidence -= 0.1;
        }

        if let Some(first) = words.first().copied() {
            let leads_with_greeting = self
                .greeting_keywords
                .iter()
                .any(|k| k.starts_with(first) || first.starts_with(k.as_str()));
            if leads_with_greeting {
                confidence += 0.2;
            }
        }

        let question_words = words
            .iter()
            .filter(|w| PENALTY_QUESTION_WORDS.contains(*w))
            .count();
        confidence -= 0.1 * question_words as f64;

        if raw.contains('!') || raw.contains(":)") {
            confidence += 0.1;
        }

        confidence.min(1.0)
    }

    fn classify(&self, words: &[&str], confidence: f64) -> GreetingType {
        if confidence < self.min_confidence {
            return GreetingType::Complex;
        }
        if has_question_word(words) {
            GreetingType::QuestionGreeting
        } else {
            GreetingType::SimpleGreeting
        }
    }
}

impl Default for GreetingDetector {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn keyword_list(configured: &[String], defaults: &[&str]) -> Vec<String> {
    if configured.is_empty() {
        defaults.iter().map(|k| (*k).to_string()).collect()
    } else {
        configured.iter().map(|k| k.trim().to_lowercase()).collect()
    }
}

fn has_question_word(words: &[&str]) -> bool {
    words.iter().any(|w| QUESTION_WORDS.contains(w))
}

/// Lowercase, turn punctuation into spaces, drop everything else that is
/// not a letter, and collapse whitespace.
pub(crate) fn normalize(message: &str) -> String {
    let lowered = message.trim().to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_alphabetic() || c.is_whitespace() {
            cleaned.push(c);
        } else if is_punctuation(c) {
            cleaned.push(' ');
        }
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Punctuation marks, excluding math and currency symbols.
fn is_punctuation(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation() && !matches!(c, '$' | '+' | '<' | '=' | '>' | '^' | '`' | '|' | '~');
    }
    matches!(
        c,
        '¡' | '§' | '«' | '¶' | '·' | '»' | '¿'
            | '\u{2010}'..='\u{2027}'
            | '\u{2030}'..='\u{205E}'
            | '\u{3001}'..='\u{3003}'
    )
}
