//! Per-file queue of errors reported by the editor

use super::{DiagnosticsConfig, DiagnosticsEvent, collect_errors};
use crate::errors::ParsedError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, trace};

#[derive(Default)]
struct QueueState {
    /// Files with queued errors, oldest first
    order: VecDeque<PathBuf>,
    errors: HashMap<PathBuf, Vec<ParsedError>>,
}

impl QueueState {
    fn remove(&mut self, path: &Path) -> Option<Vec<ParsedError>> {
        self.order.retain(|p| p != path);
        self.errors.remove(path)
    }
}

/// Cloneable handle to the shared diagnostics queue
#[derive(Clone)]
pub struct DiagnosticsQueue {
    state: Arc<Mutex<QueueState>>,
    ignore: Arc<GlobSet>,
    include_warnings: bool,
}

impl DiagnosticsQueue {
    pub fn new(config: &DiagnosticsConfig) -> Result<Self, globset::Error> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.ignore_globs {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            ignore: Arc::new(builder.build()?),
            include_warnings: config.include_warnings,
        })
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.is_match(path)
    }

    /// Apply a diagnostics change event
    ///
    /// The file's queued errors become exactly the qualifying errors in the
    /// event, so errors that disappeared are pruned and a file with none
    /// left leaves the queue. Returns how many errors are queued for it.
    pub async fn on_diagnostics(&self, event: DiagnosticsEvent) -> usize {
        if self.is_ignored(&event.uri) {
            trace!("Ignoring diagnostics for {}", event.uri.display());
            return 0;
        }

        let errors = collect_errors(&event.uri, &event.diagnostics, self.include_warnings);
        let mut state = self.state.lock().await;

        if errors.is_empty() {
            if state.remove(&event.uri).is_some() {
                debug!("Cleared queued errors for {}", event.uri.display());
            }
            return 0;
        }

        let count = errors.len();
        if state.errors.insert(event.uri.clone(), errors).is_none() {
            state.order.push_back(event.uri.clone());
        }
        debug!("{} errors queued for {}", count, event.uri.display());
        count
    }

    /// Remove and return a file's queued errors
    pub async fn take(&self, path: &Path) -> Option<Vec<ParsedError>> {
        self.state.lock().await.remove(path)
    }

    /// Put errors back at the end of the queue unless newer ones arrived
    pub async fn requeue(&self, path: PathBuf, errors: Vec<ParsedError>) {
        let mut state = self.state.lock().await;
        if errors.is_empty() || state.errors.contains_key(&path) {
            return;
        }
        state.errors.insert(path.clone(), errors);
        state.order.push_back(path);
    }

    /// Oldest file with queued errors
    pub async fn next_file(&self) -> Option<(PathBuf, Vec<ParsedError>)> {
        let mut state = self.state.lock().await;
        let path = state.order.pop_front()?;
        let errors = state.errors.remove(&path)?;
        Some((path, errors))
    }

    pub async fn errors_for(&self, path: &Path) -> Vec<ParsedError> {
        self.state.lock().await.errors.get(path).cloned().unwrap_or_default()
    }

    pub async fn queued_files(&self) -> Vec<PathBuf> {
        self.state.lock().await.order.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        let mut state = self.state.lock().await;
        state.order.clear();
        state.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostic;
    use crate::errors::Severity;

    fn event(path: &str, diagnostics: Vec<Diagnostic>) -> DiagnosticsEvent {
        DiagnosticsEvent { uri: PathBuf::from(path), diagnostics }
    }

    #[tokio::test]
    async fn test_fifo_order_and_prune() {
        let queue = DiagnosticsQueue::new(&DiagnosticsConfig::default()).unwrap();

        queue.on_diagnostics(event("/p/a.ts", vec![Diagnostic::error("a1", 0)])).await;
        queue.on_diagnostics(event("/p/b.ts", vec![Diagnostic::error("b1", 0)])).await;
        let count = queue
            .on_diagnostics(event("/p/a.ts", vec![Diagnostic::error("a2", 3), Diagnostic::error("a2", 3)]))
            .await;
        assert_eq!(count, 1);
        assert_eq!(queue.queued_files().await, vec![PathBuf::from("/p/a.ts"), PathBuf::from("/p/b.ts")]);

        let (first, errors) = queue.next_file().await.unwrap();
        assert_eq!(first, PathBuf::from("/p/a.ts"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "a2");

        queue.on_diagnostics(event("/p/b.ts", vec![])).await;
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_ignored_paths_and_warnings() {
        let queue = DiagnosticsQueue::new(&DiagnosticsConfig::default()).unwrap();
        let count = queue
            .on_diagnostics(event("/p/node_modules/x/index.js", vec![Diagnostic::error("x", 0)]))
            .await;
        assert_eq!(count, 0);

        let mut warning = Diagnostic::error("unused", 0);
        warning.severity = Severity::Warning;
        assert_eq!(queue.on_diagnostics(event("/p/src/a.ts", vec![warning.clone()])).await, 0);

        let config = DiagnosticsConfig { include_warnings: true, ..Default::default() };
        let queue = DiagnosticsQueue::new(&config).unwrap();
        assert_eq!(queue.on_diagnostics(event("/p/src/a.ts", vec![warning])).await, 1);
        assert!(queue.take(Path::new("/p/src/a.ts")).await.is_some());
        assert!(queue.is_empty().await);
    }
}
