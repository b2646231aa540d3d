//! Re-checking after a fix has been applied

use super::FixError;
use crate::actions::{ActionError, ActionExecutor};
use crate::diagnostics::{DiagnosticsSource, collect_errors};
use crate::errors::{ParsedError, Severity, classify};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Produces the current error list after actions were applied
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, cancel: &CancellationToken) -> Result<Vec<ParsedError>, FixError>;
}

/// Re-runs a command and classifies its output
pub struct CommandVerifier {
    executor: Arc<ActionExecutor>,
    command: String,
    cwd: Option<PathBuf>,
    include_warnings: bool,
    latest: Mutex<Option<Vec<ParsedError>>>,
}

impl CommandVerifier {
    pub fn new(executor: Arc<ActionExecutor>, command: impl Into<String>, cwd: Option<PathBuf>) -> Self {
        Self { executor, command: command.into(), cwd, include_warnings: true, latest: Mutex::new(None) }
    }

    pub fn include_warnings(mut self, include: bool) -> Self {
        self.include_warnings = include;
        self
    }

    /// Errors from the most recent verification run
    pub fn latest(&self) -> Option<Vec<ParsedError>> {
        self.latest.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self, cancel: &CancellationToken) -> Result<Vec<ParsedError>, FixError> {
        debug!("Verifying with `{}`", self.command);
        let output = match self.executor.run_captured(&self.command, self.cwd.as_deref(), cancel).await {
            Ok(out) => out.output,
            Err(ActionError::Exec { output, .. }) => output,
            Err(ActionError::Timeout { partial_output, .. }) => partial_output,
            Err(ActionError::Cancelled) => return Err(FixError::Cancelled),
            Err(e) => return Err(FixError::verification(e.to_string())),
        };

        let errors: Vec<ParsedError> = classify(&output)
            .into_iter()
            .filter(|e| e.severity == Severity::Error || (self.include_warnings && e.severity == Severity::Warning))
            .collect();
        *self.latest.lock().unwrap_or_else(|p| p.into_inner()) = Some(errors.clone());
        Ok(errors)
    }
}

/// Reads fresh editor diagnostics for one file after a settle delay
pub struct DiagnosticsVerifier {
    source: Arc<dyn DiagnosticsSource>,
    path: PathBuf,
    settle: Duration,
    include_warnings: bool,
}

impl DiagnosticsVerifier {
    pub fn new(source: Arc<dyn DiagnosticsSource>, path: impl Into<PathBuf>, settle: Duration) -> Self {
        Self { source, path: path.into(), settle, include_warnings: false }
    }

    pub fn include_warnings(mut self, include: bool) -> Self {
        self.include_warnings = include;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Verifier for DiagnosticsVerifier {
    async fn verify(&self, cancel: &CancellationToken) -> Result<Vec<ParsedError>, FixError> {
        tokio::select! {
            _ = tokio::time::sleep(self.settle) => {}
            _ = cancel.cancelled() => return Err(FixError::Cancelled),
        }
        let diagnostics = self.source.diagnostics(&self.path).await;
        Ok(collect_errors(&self.path, &diagnostics, self.include_warnings))
    }
}

/// Whether an error reported at `reported` belongs to the batch file `scope`
///
/// Tools print paths relative to different roots, so a suffix match on
/// whole components counts.
pub fn same_file(reported: Option<&str>, scope: Option<&str>) -> bool {
    match (reported, scope) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            let (a, b) = (Path::new(a.trim_start_matches("./")), Path::new(b.trim_start_matches("./")));
            a == b || a.ends_with(b) || b.ends_with(a)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;

    struct FixedSource(Vec<Diagnostic>);

    #[async_trait]
    impl DiagnosticsSource for FixedSource {
        async fn diagnostics(&self, _path: &Path) -> Vec<Diagnostic> {
            self.0.clone()
        }
    }

    #[test]
    fn test_same_file() {
        assert!(same_file(Some("./src/a.ts"), Some("src/a.ts")));
        assert!(same_file(Some("/work/p/src/a.ts"), Some("src/a.ts")));
        assert!(!same_file(Some("src/b.ts"), Some("src/a.ts")));
        assert!(!same_file(Some("ra.ts"), Some("a.ts")));
        assert!(same_file(None, None));
        assert!(!same_file(Some("a.ts"), None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnostics_verifier_maps_fresh_errors() {
        let source = Arc::new(FixedSource(vec![Diagnostic::error("still broken", 2)]));
        let verifier = DiagnosticsVerifier::new(source, "/p/a.ts", Duration::from_millis(500));
        let errors = verifier.verify(&CancellationToken::new()).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, Some(3));
    }

    #[tokio::test]
    async fn test_diagnostics_verifier_cancelled() {
        let source = Arc::new(FixedSource(vec![]));
        let verifier = DiagnosticsVerifier::new(source, "/p/a.ts", Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(verifier.verify(&cancel).await, Err(FixError::Cancelled)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_verifier_classifies_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let workspace = Arc::new(crate::actions::LocalWorkspace::new(dir.path()));
        let executor = Arc::new(ActionExecutor::new(workspace, Default::default()));
        let verifier = CommandVerifier::new(
            executor,
            "printf 'src/a.ts(3,5): error TS2322: Type mismatch.\\n'; exit 2",
            None,
        );
        let errors = verifier.verify(&CancellationToken::new()).await.unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].file.as_deref(), Some("src/a.ts"));
        assert_eq!(verifier.latest().map(|l| l.len()), Some(1));
    }
}
