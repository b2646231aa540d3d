//! Automatic fixing driven by editor diagnostics and saves

use super::{DiagnosticsConfig, DiagnosticsEvent, DiagnosticsQueue, DiagnosticsSource};
use crate::fix::{BatchResult, DiagnosticsVerifier, FixEngine, FixError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Fixes a file's queued errors once its saves have settled
pub struct AutoFixService {
    engine: Arc<FixEngine>,
    queue: DiagnosticsQueue,
    source: Arc<dyn DiagnosticsSource>,
    config: DiagnosticsConfig,
}

impl AutoFixService {
    pub fn new(
        engine: Arc<FixEngine>,
        source: Arc<dyn DiagnosticsSource>,
        config: DiagnosticsConfig,
    ) -> Result<Self, globset::Error> {
        let queue = DiagnosticsQueue::new(&config)?;
        Ok(Self { engine, queue, source, config })
    }

    /// Shared queue handle for diagnostics producers
    pub fn queue(&self) -> &DiagnosticsQueue {
        &self.queue
    }

    pub async fn on_diagnostics(&self, event: DiagnosticsEvent) -> usize {
        self.queue.on_diagnostics(event).await
    }

    /// Fix the queued errors of one file, if it has any
    pub async fn fix_file(&self, path: &Path, cancel: &CancellationToken) -> Option<BatchResult> {
        let Some(errors) = self.queue.take(path).await else {
            debug!("No queued errors for {}", path.display());
            return None;
        };

        let verifier = DiagnosticsVerifier::new(self.source.clone(), path, Duration::from_millis(self.config.settle_ms))
            .include_warnings(self.config.include_warnings);

        match self.engine.fix_all_in_file(path, errors.clone(), &verifier, cancel).await {
            Ok(result) => {
                info!("{}: {}", path.display(), result.status_line());
                Some(result)
            }
            Err(FixError::Busy) => {
                warn!("Fix already running; {} stays queued", path.display());
                self.queue.requeue(path.to_path_buf(), errors).await;
                None
            }
            Err(e) => {
                warn!("Fixing {} failed: {}", path.display(), e);
                None
            }
        }
    }

    /// Drain every queued file, oldest first
    pub async fn fix_pending(&self, cancel: &CancellationToken) -> Vec<BatchResult> {
        let mut results = Vec::new();
        while !cancel.is_cancelled() {
            let Some(path) = self.queue.queued_files().await.into_iter().next() else {
                break;
            };
            match self.fix_file(&path, cancel).await {
                Some(result) => results.push(result),
                None => break,
            }
        }
        results
    }

    /// Process settled saves one at a time until the channel closes or
    /// `cancel` fires; returns the number of fix passes run
    ///
    /// With `auto_fix_on_save` off, saves are consumed and the file's errors
    /// stay queued for [`AutoFixService::fix_pending`].
    pub async fn run(&self, mut saves: mpsc::UnboundedReceiver<PathBuf>, cancel: CancellationToken) -> usize {
        let mut passes = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                saved = saves.recv() => match saved {
                    Some(path) if !self.config.auto_fix_on_save => {
                        trace!("Fix on save disabled, {} stays queued", path.display());
                    }
                    Some(path) => {
                        if self.fix_file(&path, &cancel).await.is_some() {
                            passes += 1;
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("Auto-fix loop finished after {} pass(es)", passes);
        passes
    }
}
