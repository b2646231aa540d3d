//! Save debouncing so a burst of saves triggers a single fix pass

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, trace};

/// Per-file save timer
///
/// Each save bumps the file's generation and arms a timer. When a timer
/// expires it fires only if no later save arrived for the same file, so
/// the latest save in a burst is the one that is emitted.
pub struct SaveDebouncer {
    delay: Duration,
    generations: Arc<DashMap<PathBuf, u64>>,
    tx: mpsc::UnboundedSender<PathBuf>,
}

impl SaveDebouncer {
    /// Create a debouncer and the receiver its settled files arrive on
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self { delay, generations: Arc::new(DashMap::new()), tx };
        (debouncer, rx)
    }

    /// Record a save
    pub fn notify(&self, path: PathBuf) {
        let generation = {
            let mut entry = self.generations.entry(path.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        trace!("Save #{} for {}", generation, path.display());

        let delay = self.delay;
        let generations = self.generations.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            if generations.remove_if(&path, |_, current| *current == generation).is_some() {
                debug!("Save settled for {}", path.display());
                let _ = tx.send(path);
            }
        });
    }

    /// Files with a timer still running
    pub fn pending_count(&self) -> usize {
        self.generations.len()
    }

    /// Drop all pending timers; they expire without firing
    pub fn clear(&self) {
        self.generations.clear();
    }
}
