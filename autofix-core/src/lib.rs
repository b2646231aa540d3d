//! Core of the autofix engine
//!
//! Classifies build and test output into structured errors, asks a language
//! model for a repair, parses the reply into file and command actions, gates
//! the dangerous ones, applies the rest and verifies the result.

pub mod actions;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod fix;
pub mod llm;

pub use actions::{ActionExecutor, ActionParser, LocalWorkspace, SafetyPolicy, Workspace};
pub use config::{AutofixConfig, ConfigError};
pub use errors::{ErrorKind, ParsedError, Severity, classify, has_errors};
pub use fix::{BatchResult, CommandFixReport, FixConfig, FixEngine, FixError, FixEvent};
pub use tokio_util::sync::CancellationToken;
