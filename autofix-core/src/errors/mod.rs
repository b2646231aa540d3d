//! Error detection and classification
//!
//! Turns raw compiler, linter, test-runner and runtime output into
//! structured [`ParsedError`] records. Matching is driven by a declarative
//! rule table (see [`rules`]); adding an ecosystem is a data change.

pub mod classifier;
pub mod rules;

pub use classifier::{Detection, classify, detect, fix_priority, has_errors};
pub use rules::{ErrorRule, Extractor};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a detected failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Syntax,
    TypeError,
    MissingModule,
    Lint,
    Runtime,
    Build,
    Test,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::TypeError => "type-error",
            ErrorKind::MissingModule => "missing-module",
            ErrorKind::Lint => "lint",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Build => "build",
            ErrorKind::Test => "test",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Severity of a detected failure, ordered most severe first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Parse a severity word as printed by common tools
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "error" | "err" | "fatal" | "fatal error" | "e" | "failed" => Some(Severity::Error),
            "warning" | "warn" | "w" => Some(Severity::Warning),
            "info" | "note" | "hint" | "help" | "information" | "i" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// One detected failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    pub raw_text: String,
}

impl ParsedError {
    /// Create an error with only the required fields set
    pub fn new(kind: ErrorKind, severity: Severity, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind,
            severity,
            raw_text: message.clone(),
            message,
            file: None,
            line: None,
            column: None,
            code: None,
            rule: None,
            framework: None,
            suggestion: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32, column: Option<u32>) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = column;
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Deduplication and retry-accounting key
    pub fn identity(&self) -> ErrorIdentity {
        ErrorIdentity {
            message: self.message.clone(),
            file: self.file.clone(),
            line: self.line,
        }
    }

    /// `file:line:col` when known
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_ref()?;
        Some(match (self.line, self.column) {
            (Some(line), Some(col)) => format!("{}:{}:{}", file, line, col),
            (Some(line), None) => format!("{}:{}", file, line),
            _ => file.clone(),
        })
    }
}

impl fmt::Display for ParsedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(location) = self.location() {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

/// The `(message, file, line)` triple that identifies an error occurrence
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorIdentity {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl fmt::Display for ErrorIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file, line, self.message),
            (Some(file), None) => write!(f, "{}: {}", file, self.message),
            _ => f.write_str(&self.message),
        }
    }
}
