// SPDX-FileCopyrightText: 2026 TMS Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics rendered with miette.
//!
//! Deserialization failures from figment are mapped onto [`ConfigError`],
//! pointing at the offending key in the TOML file when it can be found.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler similarity a key must exceed to be offered as a fix.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in the TMS configuration")]
    #[diagnostic(code(tms::config::unknown_key), help("{}", unknown_key_help(suggestion.as_deref(), valid_keys)))]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a recognized key here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(tms::config::invalid_type), help("use a value of type {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    /// A value that deserialized but is out of range.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(tms::config::invalid_value), help("{}", hint.as_deref().unwrap_or("see the defaults with `tms config`")))]
    Invalid {
        key: String,
        message: String,
        hint: Option<String>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(tms::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
            hint: None,
        }
    }

    pub(crate) fn with_hint(mut self, text: impl Into<String>) -> Self {
        if let Self::Invalid { hint, .. } = &mut self {
            *hint = Some(text.into());
        }
        self
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    let Some(suggestion) = suggestion else {
        return format!("expected one of: {valid_keys}");
    };
    format!("did you mean `{suggestion}`? expected one of: {valid_keys}")
}

/// TOML files read during loading, keyed by the path figment reports.
#[derive(Debug, Default)]
pub struct SourceIndex {
    files: Vec<(String, String)>,
}

impl SourceIndex {
    pub fn new(files: Vec<(String, String)>) -> Self {
        Self { files }
    }

    fn file_for(&self, error: &figment::Error) -> Option<&(String, String)> {
        let metadata = error.metadata.as_ref()?;
        let figment::Source::File(path) = metadata.source.as_ref()? else {
            return None;
        };
        let path = path.display().to_string();
        self.files.iter().find(|(name, _)| *name == path)
    }

    /// Span and source text for `field` when the file that set it is known.
    fn locate(
        &self,
        error: &figment::Error,
        field: &str,
    ) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
        let Some((name, content)) = self.file_for(error) else {
            return (None, None);
        };
        let section = error.path.first().map(String::as_str);
        match key_offset(content, section, field) {
            Some(offset) => (
                Some(SourceSpan::new(offset.into(), field.len())),
                Some(NamedSource::new(name, content.clone())),
            ),
            None => (None, None),
        }
    }

    /// Map every error carried by `err` to a diagnostic.
    pub fn diagnose(&self, err: figment::Error) -> Vec<ConfigError> {
        err.into_iter().map(|error| self.diagnose_one(error)).collect()
    }

    fn diagnose_one(&self, error: figment::Error) -> ConfigError {
        use figment::error::Kind;

        match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = self.locate(&error, field);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                key: error.path.join("."),
                detail: format!("found {actual}"),
                expected: expected.to_string(),
            },
            _ => ConfigError::Other(error.to_string()),
        }
    }
}

/// Byte offset of a `field = ...` line, searched after the `[section]`
/// header when one is given.
pub fn key_offset(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let body_start = match section {
        Some(name) => {
            let header = format!("[{name}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut line_start = body_start;
    for line in content[body_start..].split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let assigns_field = line
            .trim_start()
            .strip_prefix(field)
            .is_some_and(|rest| rest.trim_start().starts_with('='));
        if assigns_field {
            return Some(line_start + indent);
        }
        line_start += line.len();
    }
    None
}

/// Closest valid key, if any is similar enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best: Option<(f64, &str)> = None;
    for &key in valid_keys {
        let score = strsim::jaro_winkler(unknown, key);
        if score > SUGGESTION_THRESHOLD && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, key));
        }
    }
    best.map(|(_, key)| key.to_string())
}

/// Print every diagnostic to stderr.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    eprintln!(
        "tms: {} configuration error{}",
        errors.len(),
        if errors.len() == 1 { "" } else { "s" }
    );
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("  {error}"),
        }
    }
}
