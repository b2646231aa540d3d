//! Fix orchestration
//!
//! The [`FixEngine`] drains a batch of errors one target at a time: build a
//! prompt, ask the model, apply the returned actions, verify, and retry up
//! to a bound tracked per error identity.

pub mod engine;
pub mod events;
pub mod history;
pub mod prompt;
pub mod verify;

#[cfg(test)]
mod tests;

pub use engine::FixEngine;
pub use events::FixEvent;
pub use history::AttemptHistory;
pub use verify::{CommandVerifier, DiagnosticsVerifier, Verifier};

use crate::actions::{ActionError, AppliedAction};
use crate::errors::{ErrorIdentity, ParsedError};
use crate::llm::LLMError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    /// Attempts per error identity
    pub max_retries: u32,
    /// Lifetime attempts per identity before it is skipped outright
    pub history_ceiling: u32,
    /// Lines of source shown either side of the target
    pub context_radius: usize,
    /// Other errors from the same file included in the prompt
    pub max_co_errors: usize,
    pub stream_responses: bool,
    /// Also repair warnings found in command output
    pub fix_warnings: bool,
    pub system_prompt: Option<String>,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            history_ceiling: 3,
            context_radius: 15,
            max_co_errors: 3,
            stream_responses: false,
            fix_warnings: true,
            system_prompt: None,
        }
    }
}

impl FixConfig {
    /// Total attempts any identity may receive
    pub fn attempt_bound(&self) -> u32 {
        self.max_retries.min(self.history_ceiling)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptOutcome {
    Fixed,
    StillFailing,
    /// The response contained no usable actions
    Unparseable,
    /// Interrupted by cancellation
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStatus {
    Queued,
    Fixing,
    Fixed,
    Exhausted,
    SkippedDuplicate,
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorStatus::Queued => "queued",
            ErrorStatus::Fixing => "fixing",
            ErrorStatus::Fixed => "fixed",
            ErrorStatus::Exhausted => "exhausted",
            ErrorStatus::SkippedDuplicate => "skipped (attempt limit reached)",
        };
        f.write_str(label)
    }
}

/// One model round trip for one target
#[derive(Debug, Clone, Serialize)]
pub struct FixAttempt {
    pub id: Uuid,
    pub target: ErrorIdentity,
    pub attempt_number: u32,
    pub prompt_sent: String,
    pub actions_applied: Vec<AppliedAction>,
    pub outcome: AttemptOutcome,
    pub started_at: DateTime<Utc>,
}

impl FixAttempt {
    pub fn new(target: ErrorIdentity, attempt_number: u32, prompt_sent: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            attempt_number,
            prompt_sent,
            actions_applied: Vec::new(),
            outcome: AttemptOutcome::StillFailing,
            started_at: Utc::now(),
        }
    }
}

/// Final state of one queued error
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutcome {
    pub identity: ErrorIdentity,
    pub status: ErrorStatus,
    pub attempts: u32,
}

/// Result of draining one file's errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    /// `None` for errors reported without a file
    pub file: Option<String>,
    pub fixed_count: usize,
    pub remaining_count: usize,
    pub remaining_errors: Vec<ParsedError>,
    /// Errors skipped because their attempt history was exhausted
    pub skipped_count: usize,
    /// Errors that first appeared during verification
    pub introduced: Vec<ParsedError>,
    pub attempts: Vec<FixAttempt>,
    pub outcomes: Vec<ErrorOutcome>,
    pub success: bool,
    pub cancelled: bool,
}

impl BatchResult {
    pub fn status_line(&self) -> String {
        format!("Fixed {}, {} remaining", self.fixed_count, self.remaining_count)
    }
}

/// Result of repairing a command's output
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommandFixReport {
    pub command: String,
    pub initial_errors: usize,
    pub batches: Vec<BatchResult>,
    pub success: bool,
}

impl CommandFixReport {
    pub fn fixed_count(&self) -> usize {
        self.batches.iter().map(|b| b.fixed_count).sum()
    }

    pub fn remaining_count(&self) -> usize {
        self.batches.iter().map(|b| b.remaining_count).sum()
    }

    pub fn status_line(&self) -> String {
        format!("Fixed {}, {} remaining", self.fixed_count(), self.remaining_count())
    }
}

#[derive(Debug, Error)]
pub enum FixError {
    #[error("A fix loop is already running")]
    Busy,

    #[error("Fixing cancelled")]
    Cancelled,

    #[error("Output looks like it contains errors but none could be classified: {excerpt}")]
    ClassificationMiss { excerpt: String },

    #[error("Gave up on {identity} after {attempts} attempts")]
    RetryCeilingReached { identity: ErrorIdentity, attempts: u32 },

    #[error("Model error: {0}")]
    Model(#[from] LLMError),

    #[error("Action error: {0}")]
    Action(#[from] ActionError),

    #[error("Verification failed: {0}")]
    Verification(String),
}

impl FixError {
    pub fn verification(message: impl Into<String>) -> Self {
        FixError::Verification(message.into())
    }
}
