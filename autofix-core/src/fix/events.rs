//! Progress events emitted while fixing

use super::AttemptOutcome;
use crate::actions::DiffStat;
use crate::errors::ErrorIdentity;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FixEvent {
    BatchStarted { file: Option<String>, errors: usize },
    AttemptStarted { target: ErrorIdentity, attempt: u32, max_attempts: u32 },
    ModelResponded { target: ErrorIdentity, chars: usize, actions: usize },
    ActionApplied { description: String, diff: Option<DiffStat> },
    ApprovalRequired { description: String, reason: String, approved: bool },
    ActionFailed { description: String, error: String },
    Verified { target: ErrorIdentity, outcome: AttemptOutcome, remaining: usize },
    ErrorFixed { target: ErrorIdentity, attempts: u32 },
    ErrorExhausted { target: ErrorIdentity, attempts: u32 },
    ErrorSkipped { target: ErrorIdentity, reason: String },
    ClassificationMiss { excerpt: String },
    Cancelled { remaining: usize },
    BatchFinished { file: Option<String>, fixed: usize, remaining: usize },
}

impl fmt::Display for FixEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixEvent::BatchStarted { file, errors } => match file {
                Some(file) => write!(f, "Fixing {} error(s) in {}", errors, file),
                None => write!(f, "Fixing {} error(s)", errors),
            },
            FixEvent::AttemptStarted { target, attempt, max_attempts } => {
                write!(f, "Attempt {}/{}: {}", attempt, max_attempts, target)
            }
            FixEvent::ModelResponded { chars, actions, .. } => {
                write!(f, "Model replied ({} chars, {} action(s))", chars, actions)
            }
            FixEvent::ActionApplied { description, diff } => match diff {
                Some(diff) => write!(f, "Applied: {} ({})", description, diff),
                None => write!(f, "Applied: {}", description),
            },
            FixEvent::ApprovalRequired { description, reason, approved } => {
                let verdict = if *approved { "approved" } else { "rejected" };
                write!(f, "Approval for {} ({}): {}", description, reason, verdict)
            }
            FixEvent::ActionFailed { description, error } => write!(f, "Failed: {}: {}", description, error),
            FixEvent::Verified { outcome, remaining, .. } => {
                write!(f, "Verified: {:?}, {} error(s) left in scope", outcome, remaining)
            }
            FixEvent::ErrorFixed { target, attempts } => {
                write!(f, "Fixed after {} attempt(s): {}", attempts, target)
            }
            FixEvent::ErrorExhausted { target, attempts } => {
                write!(f, "Could not fix after {} attempt(s): {}", attempts, target)
            }
            FixEvent::ErrorSkipped { target, reason } => write!(f, "Skipped {}: {}", target, reason),
            FixEvent::ClassificationMiss { excerpt } => {
                write!(f, "Errors detected but not recognised: {}", excerpt)
            }
            FixEvent::Cancelled { remaining } => write!(f, "Cancelled with {} error(s) unresolved", remaining),
            FixEvent::BatchFinished { fixed, remaining, .. } => {
                write!(f, "Fixed {}, {} remaining", fixed, remaining)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings() {
        let target = ErrorIdentity { message: "bad".into(), file: Some("a.ts".into()), line: Some(3) };
        let event = FixEvent::AttemptStarted { target: target.clone(), attempt: 2, max_attempts: 3 };
        assert_eq!(event.to_string(), "Attempt 2/3: a.ts:3: bad");

        let done = FixEvent::BatchFinished { file: None, fixed: 1, remaining: 2 };
        assert_eq!(done.to_string(), "Fixed 1, 2 remaining");

        let applied = FixEvent::ActionApplied {
            description: "edit a.ts".into(),
            diff: Some(DiffStat { added: 2, removed: 1 }),
        };
        assert_eq!(applied.to_string(), "Applied: edit a.ts (+2 -1)");
    }
}
