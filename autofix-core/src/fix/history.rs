//! Attempt counts per error identity

use crate::errors::ErrorIdentity;
use std::collections::HashMap;
use std::sync::Mutex;

/// Monotonic attempt counter shared across batches
///
/// Counts only grow; [`AttemptHistory::reset`] is the single way back to
/// zero.
#[derive(Debug, Default)]
pub struct AttemptHistory {
    counts: Mutex<HashMap<ErrorIdentity, u32>>,
}

impl AttemptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, identity: &ErrorIdentity) -> u32 {
        self.lock().get(identity).copied().unwrap_or(0)
    }

    /// Record an attempt and return the new count
    pub fn increment(&self, identity: &ErrorIdentity) -> u32 {
        let mut counts = self.lock();
        let count = counts.entry(identity.clone()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn snapshot(&self) -> HashMap<ErrorIdentity, u32> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ErrorIdentity, u32>> {
        self.counts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
