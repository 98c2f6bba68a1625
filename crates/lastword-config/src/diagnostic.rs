// SPDX-FileCopyrightText: 2026 Lastword Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Diagnostics for `lastword.toml`.
//!
//! Figment reports unknown keys and type mismatches with little context.
//! [`SECTIONS`] lets us name the section at fault, list what it accepts,
//! point at the offending line and say what kind of value a key wants.

#![allow(unused_assignments)] // emitted by miette's Diagnostic derive

use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Every section of `lastword.toml` with the keys it accepts.
pub const SECTIONS: &[(&str, &[&str])] = &[
    ("service", &["name", "log_level"]),
    ("storage", &["database_path", "wal_mode", "busy_timeout_ms"]),
    (
        "scheduler",
        &[
            "batch_limit",
            "max_retries",
            "stuck_after_secs",
            "channel_timeout_secs",
            "stale_reminder_minutes",
            "final_notice_minutes",
            "tick_interval_secs",
            "recent_window_hours",
            "idempotency_window_minutes",
            "max_concurrent_dispatch",
        ],
    ),
    ("panic", &["selection_ttl_secs"]),
    (
        "email",
        &[
            "smtp_host",
            "smtp_port",
            "smtp_username",
            "smtp_password",
            "from_address",
        ],
    ),
    (
        "sms",
        &[
            "account_sid",
            "auth_token",
            "from_number",
            "whatsapp",
            "api_base",
        ],
    ),
    ("gateway", &["enabled", "host", "port", "bearer_token"]),
];

/// Similarity below which no "did you mean" is offered.
const SUGGESTION_FLOOR: f64 = 0.7;

pub fn section_names() -> impl Iterator<Item = &'static str> {
    SECTIONS.iter().map(|(name, _)| *name)
}

pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SECTIONS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown section `[{section}]`")]
    #[diagnostic(
        code(lastword::config::unknown_section),
        help("{}", hint(suggestion.as_deref(), "sections", valid))
    )]
    UnknownSection {
        section: String,
        suggestion: Option<String>,
        valid: String,
        #[label("not a lastword section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("unknown key `{key}` in [{section}]")]
    #[diagnostic(
        code(lastword::config::unknown_key),
        help("{}", hint(suggestion.as_deref(), &format!("keys in [{section}]"), valid_keys))
    )]
    UnknownKey {
        section: String,
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(lastword::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path, e.g. `scheduler.batch_limit`.
        key: String,
        found: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A well-typed value that breaks a semantic rule.
    #[error("invalid value for `{key}`: {message}")]
    #[diagnostic(code(lastword::config::validation))]
    Validation { key: String, message: String },

    #[error("{0}")]
    #[diagnostic(code(lastword::config::other))]
    Other(String),
}

fn hint(suggestion: Option<&str>, what: &str, valid: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {what}: {valid}"),
        None => format!("{what}: {valid}"),
    }
}

/// What a key expects, phrased for the person editing the file.
fn expected_value(section: &str, key: &str, fallback: &str) -> String {
    match (section, key) {
        ("service", "log_level") => "one of trace, debug, info, warn, error".to_string(),
        ("gateway", "port") | ("email", "smtp_port") => "a port number from 1 to 65535".to_string(),
        ("storage", "wal_mode") | ("sms", "whatsapp") | ("gateway", "enabled") => {
            "`true` or `false`".to_string()
        }
        (_, k) if k.ends_with("_secs") => "a whole number of seconds".to_string(),
        (_, k) if k.ends_with("_minutes") => "a whole number of minutes".to_string(),
        (_, k) if k.ends_with("_hours") => "a whole number of hours".to_string(),
        (_, k) if k.ends_with("_ms") => "a whole number of milliseconds".to_string(),
        ("scheduler", "batch_limit" | "max_retries" | "max_concurrent_dispatch") => {
            "a positive whole number".to_string()
        }
        _ => fallback.to_string(),
    }
}

/// Translate a figment extraction failure into diagnostics.
///
/// `sources` holds `(path, content)` of the TOML files that were merged and
/// is only used to attach spans.
pub fn from_figment(err: figment::Error, sources: &[(String, String)]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let source = pick_source(&error, sources);
            match (&error.kind, error.path.as_slice()) {
                (Kind::UnknownField(field, _), []) => {
                    let names: Vec<&str> = section_names().collect();
                    let (span, src) = spanned(source, |c| header_offset(c, field), field.len() + 2);
                    ConfigError::UnknownSection {
                        section: field.clone(),
                        suggestion: closest(field, &names),
                        valid: names.join(", "),
                        span,
                        src,
                    }
                }
                (Kind::UnknownField(field, expected), [section, ..]) => {
                    let keys = section_keys(section).unwrap_or(*expected);
                    let (span, src) =
                        spanned(source, |c| key_offset(c, Some(section.as_str()), field), field.len());
                    ConfigError::UnknownKey {
                        section: section.clone(),
                        key: field.clone(),
                        suggestion: closest(field, keys),
                        valid_keys: keys.join(", "),
                        span,
                        src,
                    }
                }
                (Kind::InvalidType(found, expected), [section, leaf]) => {
                    let (span, src) =
                        spanned(source, |c| key_offset(c, Some(section.as_str()), leaf), leaf.len());
                    ConfigError::InvalidType {
                        key: format!("{section}.{leaf}"),
                        found: found.to_string(),
                        expected: expected_value(section, leaf, expected),
                        span,
                        src,
                    }
                }
                (Kind::InvalidType(found, expected), path) => ConfigError::InvalidType {
                    key: path.join("."),
                    found: found.to_string(),
                    expected: expected.clone(),
                    span: None,
                    src: None,
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// The file an error came from; a lone source is assumed when figment
/// cannot tell (inline strings, relative `--config` paths).
fn pick_source<'a>(
    error: &figment::Error,
    sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    file.and_then(|path| sources.iter().find(|(p, _)| *p == path))
        .or_else(|| match sources {
            [only] => Some(only),
            _ => None,
        })
}

fn spanned(
    source: Option<&(String, String)>,
    offset: impl FnOnce(&str) -> Option<usize>,
    len: usize,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((name, content)) = source else {
        return (None, None);
    };
    match offset(content) {
        Some(at) => (
            Some(SourceSpan::new(at.into(), len)),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `key = ...` inside `[section]`, or at the top level when
/// `section` is `None`.
pub fn key_offset(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let body = line.trim_start();
        let indent = line.len() - body.len();
        if let Some(header) = table_header(body) {
            current = Some(header);
        } else if current == section
            && body
                .split_once('=')
                .is_some_and(|(lhs, _)| lhs.trim() == key)
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// Byte offset of the `[section]` header line.
fn header_offset(content: &str, section: &str) -> Option<usize> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let body = line.trim_start();
        if table_header(body) == Some(section) {
            return Some(offset + line.len() - body.len());
        }
        offset += line.len();
    }
    None
}

fn table_header(line: &str) -> Option<&str> {
    line.trim_end()
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .map(str::trim)
}

/// Closest candidate by normalized Damerau-Levenshtein similarity.
pub fn closest(input: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::normalized_damerau_levenshtein(input, c), *c))
        .filter(|(score, _)| *score >= SUGGESTION_FLOOR)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Print each error to stderr as a miette report.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut out = String::new();
        match handler.render_report(&mut out, error) {
            Ok(()) => eprint!("{out}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}
