//! Editor diagnostics intake
//!
//! Diagnostics arrive from the host as change events. They are mapped
//! straight to [`ParsedError`]s (no text classification), queued per file,
//! and fixed once the file has been saved and gone quiet.

pub mod debouncer;
pub mod queue;
pub mod service;

pub use debouncer::SaveDebouncer;
pub use queue::DiagnosticsQueue;
pub use service::AutoFixService;

use crate::errors::{ErrorKind, ParsedError, Severity};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Zero-based editor range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRange {
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

/// One diagnostic as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub message: String,
    pub severity: Severity,
    pub range: DiagnosticRange,
    pub code: Option<String>,
    /// Producer, e.g. `ts`, `eslint`, `rustc`, `Pylance`
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, line: u32) -> Self {
        Self {
            message: message.into(),
            severity: Severity::Error,
            range: DiagnosticRange { start_line: line, end_line: line, ..Default::default() },
            code: None,
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>, code: Option<&str>) -> Self {
        self.source = Some(source.into());
        self.code = code.map(str::to_string);
        self
    }
}

/// "Diagnostics changed" notification for one file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsEvent {
    pub uri: PathBuf,
    pub diagnostics: Vec<Diagnostic>,
}

/// Host capability for reading current diagnostics
#[async_trait]
pub trait DiagnosticsSource: Send + Sync {
    async fn diagnostics(&self, path: &Path) -> Vec<Diagnostic>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Fix a file's queued errors once its saves settle
    pub auto_fix_on_save: bool,
    /// Quiet period after a save before fixing starts
    pub debounce_ms: u64,
    /// Wait after applying a fix before re-reading diagnostics
    pub settle_ms: u64,
    pub include_warnings: bool,
    pub ignore_globs: Vec<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            auto_fix_on_save: false,
            debounce_ms: 1200,
            settle_ms: 500,
            include_warnings: false,
            ignore_globs: [
                "**/target/**",
                "**/node_modules/**",
                "**/.git/**",
                "**/dist/**",
                "**/build/**",
                "**/.dart_tool/**",
            ]
            .iter()
            .map(|g| g.to_string())
            .collect(),
        }
    }
}

struct SourceMapping {
    /// Lowercased source name prefix
    source: &'static str,
    /// Codes that select `kind`; empty matches any code
    codes: &'static [&'static str],
    kind: ErrorKind,
}

const MAPPINGS: &[SourceMapping] = &[
    SourceMapping { source: "ts", codes: &["2307", "2305", "2792", "7016"], kind: ErrorKind::MissingModule },
    SourceMapping {
        source: "ts",
        codes: &["1002", "1003", "1005", "1109", "1128", "1161", "17002"],
        kind: ErrorKind::Syntax,
    },
    SourceMapping { source: "ts", codes: &[], kind: ErrorKind::TypeError },
    SourceMapping { source: "eslint", codes: &[], kind: ErrorKind::Lint },
    SourceMapping { source: "stylelint", codes: &[], kind: ErrorKind::Lint },
    SourceMapping { source: "clippy", codes: &[], kind: ErrorKind::Lint },
    SourceMapping {
        source: "rust",
        codes: &["E0432", "E0433", "E0463", "unresolved-import", "unresolved-module"],
        kind: ErrorKind::MissingModule,
    },
    SourceMapping {
        source: "rust",
        codes: &["E0308", "E0277", "E0599", "E0061", "E0425", "E0412", "type-mismatch"],
        kind: ErrorKind::TypeError,
    },
    SourceMapping { source: "rust", codes: &[], kind: ErrorKind::Build },
    SourceMapping {
        source: "pylance",
        codes: &["reportMissingImports", "reportMissingModuleSource"],
        kind: ErrorKind::MissingModule,
    },
    SourceMapping {
        source: "pyright",
        codes: &["reportMissingImports", "reportMissingModuleSource"],
        kind: ErrorKind::MissingModule,
    },
    SourceMapping { source: "mypy", codes: &["import", "import-not-found"], kind: ErrorKind::MissingModule },
    SourceMapping { source: "pylance", codes: &[], kind: ErrorKind::TypeError },
    SourceMapping { source: "pyright", codes: &[], kind: ErrorKind::TypeError },
    SourceMapping { source: "mypy", codes: &[], kind: ErrorKind::TypeError },
    SourceMapping { source: "ruff", codes: &[], kind: ErrorKind::Lint },
    SourceMapping { source: "flake8", codes: &[], kind: ErrorKind::Lint },
    SourceMapping { source: "pylint", codes: &[], kind: ErrorKind::Lint },
    SourceMapping { source: "dart", codes: &["uri_does_not_exist"], kind: ErrorKind::MissingModule },
    SourceMapping { source: "dart", codes: &[], kind: ErrorKind::TypeError },
    SourceMapping { source: "go", codes: &["BrokenImport"], kind: ErrorKind::MissingModule },
    SourceMapping { source: "compiler", codes: &["BrokenImport"], kind: ErrorKind::MissingModule },
    SourceMapping { source: "go", codes: &[], kind: ErrorKind::TypeError },
    SourceMapping { source: "compiler", codes: &[], kind: ErrorKind::TypeError },
];

/// Kind for a diagnostic from its source and code, falling back to the message
pub fn kind_for(diagnostic: &Diagnostic) -> ErrorKind {
    let source = diagnostic.source.as_deref().unwrap_or_default().to_lowercase();
    let code = diagnostic.code.as_deref().unwrap_or_default();

    if !source.is_empty() {
        let mapped = MAPPINGS.iter().find(|m| {
            source.starts_with(m.source) && (m.codes.is_empty() || m.codes.iter().any(|c| c.eq_ignore_ascii_case(code)))
        });
        if let Some(mapping) = mapped {
            return mapping.kind;
        }
    }

    let message = diagnostic.message.to_lowercase();
    if message.contains("syntax") || message.starts_with("expected") || message.starts_with("unexpected token") {
        ErrorKind::Syntax
    } else if message.contains("cannot find module")
        || message.contains("no module named")
        || message.contains("unresolved import")
        || message.contains("could not be resolved")
    {
        ErrorKind::MissingModule
    } else {
        ErrorKind::Other
    }
}

/// Map a host diagnostic to the common error record (1-based positions)
pub fn to_parsed_error(path: &Path, diagnostic: &Diagnostic) -> ParsedError {
    let mut error = ParsedError::new(kind_for(diagnostic), diagnostic.severity, diagnostic.message.trim()).at(
        path.to_string_lossy(),
        diagnostic.range.start_line + 1,
        Some(diagnostic.range.start_col + 1),
    );
    error.code = diagnostic.code.clone();
    error.framework = diagnostic.source.clone();
    error
}

/// Map and filter a file's diagnostics the way the queue does
pub fn collect_errors(path: &Path, diagnostics: &[Diagnostic], include_warnings: bool) -> Vec<ParsedError> {
    let mut seen = std::collections::HashSet::new();
    diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error || (include_warnings && d.severity == Severity::Warning))
        .map(|d| to_parsed_error(path, d))
        .filter(|e| seen.insert(e.identity()))
        .collect()
}
