use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexSet};
use std::collections::HashSet;
use tracing::{debug, warn};

use super::rules::{ErrorRule, Extractor, FILE_HEADER_PATTERN, INDICATOR_PATTERN, NOISE, RULES};
use super::{ErrorKind, ParsedError, Severity};

static ANSI_ESCAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("Invalid regex pattern"));

static INDICATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(INDICATOR_PATTERN).expect("Invalid regex pattern"));

static FILE_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(FILE_HEADER_PATTERN).expect("Invalid regex pattern"));

struct CompiledRule {
    rule: &'static ErrorRule,
    regexes: Vec<Regex>,
}

static COMPILED: Lazy<Vec<CompiledRule>> = Lazy::new(|| {
    RULES
        .iter()
        .map(|rule| CompiledRule {
            rule,
            regexes: rule
                .patterns
                .iter()
                .filter_map(|pattern| match Regex::new(pattern) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!("Skipping invalid pattern in rule {}: {}", rule.name, e);
                        None
                    }
                })
                .collect(),
        })
        .collect()
});

static RULE_SET: Lazy<Option<RegexSet>> = Lazy::new(|| {
    let patterns = RULES.iter().flat_map(|rule| rule.patterns.iter().copied());
    match RegexSet::new(patterns) {
        Ok(set) => Some(set),
        Err(e) => {
            warn!("Failed to build rule set: {}", e);
            None
        }
    }
});

/// Result of running detection over tool output
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub errors: Vec<ParsedError>,
    /// The output looks like a failure but no rule recognised it
    pub classification_miss: bool,
}

/// Whether the text contains anything that looks like an error
pub fn has_errors(raw: &str) -> bool {
    let text = strip_ansi(raw);
    matches_any(&text)
}

/// Classify raw tool output into deduplicated, ordered errors
pub fn classify(raw: &str) -> Vec<ParsedError> {
    let text = strip_ansi(raw);
    if !matches_any(&text) {
        return Vec::new();
    }

    let mut found = Vec::new();
    for compiled in COMPILED.iter() {
        for re in &compiled.regexes {
            for caps in re.captures_iter(&text) {
                if let Some(error) = extract(compiled.rule, &caps, &text) {
                    found.push(error);
                }
            }
        }
    }

    let mut errors = dedupe(found);
    errors.sort_by_key(|e| (e.severity, e.line.unwrap_or(u32::MAX)));
    debug!("Classified {} errors", errors.len());
    errors
}

/// Classify and flag output that looks failed but was not recognised
pub fn detect(raw: &str) -> Detection {
    let errors = classify(raw);
    let classification_miss = errors.is_empty() && has_errors(raw);
    if classification_miss {
        debug!("Output contains error indicators but no rule matched");
    }
    Detection {
        errors,
        classification_miss,
    }
}

/// Repair order, lower first
pub fn fix_priority(error: &ParsedError) -> u8 {
    match error.kind {
        ErrorKind::Syntax => 0,
        ErrorKind::TypeError => 1,
        ErrorKind::MissingModule => 2,
        ErrorKind::Lint => 3,
        ErrorKind::Runtime => 4,
        ErrorKind::Build => 5,
        ErrorKind::Test => 6,
        ErrorKind::Other => 7,
    }
}

fn strip_ansi(raw: &str) -> std::borrow::Cow<'_, str> {
    ANSI_ESCAPE.replace_all(raw, "")
}

fn matches_any(text: &str) -> bool {
    INDICATORS.is_match(text) || RULE_SET.as_ref().is_some_and(|set| set.is_match(text))
}

fn extract(rule: &ErrorRule, caps: &Captures<'_>, text: &str) -> Option<ParsedError> {
    let msg = caps.name("msg")?.as_str().trim();
    if msg.is_empty() || is_noise(msg) {
        return None;
    }
    let message = match rule.template {
        Some(template) => template.replace("{msg}", msg),
        None => msg.to_string(),
    };

    let whole = caps.get(0)?;
    let mut file = caps.name("file").map(|m| normalize_path(m.as_str()));
    if file.is_none() && rule.extractor == Extractor::FileHeader {
        file = FILE_HEADER
            .captures_iter(&text[..whole.start()])
            .last()
            .map(|header| normalize_path(&header["file"]));
    }

    let severity = caps
        .name("severity")
        .and_then(|m| Severity::from_label(m.as_str()))
        .unwrap_or(rule.severity);

    Some(ParsedError {
        kind: rule.kind,
        severity,
        message,
        file,
        line: caps.name("line").and_then(|m| m.as_str().parse().ok()),
        column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
        code: caps.name("code").map(|m| m.as_str().to_string()),
        rule: caps.name("rule").map(|m| m.as_str().to_string()),
        framework: rule.framework.map(str::to_string),
        suggestion: rule.suggestion.map(str::to_string),
        raw_text: whole.as_str().trim_end().to_string(),
    })
}

fn is_noise(message: &str) -> bool {
    let lower = message.to_lowercase();
    NOISE.iter().any(|noise| lower.contains(noise))
}

fn normalize_path(path: &str) -> String {
    path.trim().trim_start_matches("./").replace('\\', "/")
}

/// Keep the first occurrence of each identity, then drop location-less
/// records whose message is already reported with a location
fn dedupe(found: Vec<ParsedError>) -> Vec<ParsedError> {
    let mut seen = HashSet::new();
    let unique: Vec<ParsedError> = found.into_iter().filter(|e| seen.insert(e.identity())).collect();

    let located: HashSet<&str> = unique
        .iter()
        .filter(|e| e.file.is_some())
        .map(|e| e.message.as_str())
        .collect();
    let redundant: Vec<bool> = unique
        .iter()
        .map(|e| e.file.is_none() && located.contains(e.message.as_str()))
        .collect();

    unique
        .into_iter()
        .zip(redundant)
        .filter_map(|(e, drop)| (!drop).then_some(e))
        .collect()
}
