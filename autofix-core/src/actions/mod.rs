//! Workspace actions proposed by model output
//!
//! A model response is parsed into file and command actions. Every action
//! carries its own state; dangerous commands and file deletes must be
//! approved before they can execute.

pub mod executor;
pub mod parser;
pub mod safety;
pub mod workspace;

pub use executor::{ActionExecutor, CommandOutput, DiffStat, ExecutorConfig, InteractiveProcess};
pub use parser::ActionParser;
pub use safety::{DangerCategory, SafetyPolicy, SafetyVerdict, assess, is_safe};
pub use workspace::{LocalWorkspace, Workspace};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Command exited with code {exit_code}")]
    Exec { exit_code: i32, output: String },

    #[error("Command timed out after {after:?}")]
    Timeout { after: Duration, partial_output: String },

    #[error("Approval required: {action}")]
    ApprovalRequired { action: String },

    #[error("Action was rejected")]
    Rejected,

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: ActionState, to: ActionState },

    #[error("Path is outside the workspace: {0}")]
    PathOutsideWorkspace(PathBuf),

    #[error("Failed to start command: {0}")]
    Spawn(String),
}

impl ActionError {
    pub fn io(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Self::Io { path: path.into(), message: err.to_string() }
    }

    /// Output captured before the failure, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Exec { output, .. } => Some(output),
            Self::Timeout { partial_output, .. } => Some(partial_output),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;

/// Lifecycle of a single action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionState {
    Pending,
    Approved,
    Rejected,
    Executed,
    Failed,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionState::Pending => "pending",
            ActionState::Approved => "approved",
            ActionState::Rejected => "rejected",
            ActionState::Executed => "executed",
            ActionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Checked state machine shared by file and command actions.
/// Gated actions can only run once approved.
fn transition(from: ActionState, to: ActionState, gated: bool) -> Result<ActionState> {
    use ActionState::*;
    let allowed = match (from, to) {
        (Pending, Approved) | (Pending, Rejected) => true,
        (Pending, Executed) | (Pending, Failed) => !gated,
        (Approved, Executed) | (Approved, Failed) => true,
        _ => false,
    };
    if allowed { Ok(to) } else { Err(ActionError::InvalidTransition { from, to }) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileOp {
    Create,
    Edit,
    Delete,
}

impl fmt::Display for FileOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOp::Create => f.write_str("create"),
            FileOp::Edit => f.write_str("edit"),
            FileOp::Delete => f.write_str("delete"),
        }
    }
}

/// A file mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAction {
    pub id: Uuid,
    pub op: FileOp,
    /// Workspace-relative path
    pub path: PathBuf,
    pub new_content: Option<String>,
    /// Content at parse time, when the file existed
    pub prior_content: Option<String>,
    pub state: ActionState,
    pub error: Option<String>,
}

impl FileAction {
    fn new(op: FileOp, path: PathBuf, new_content: Option<String>, prior_content: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            op,
            path,
            new_content,
            prior_content,
            state: ActionState::Pending,
            error: None,
        }
    }

    pub fn create(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self::new(FileOp::Create, path.into(), Some(content.into()), None)
    }

    pub fn edit(path: impl Into<PathBuf>, content: impl Into<String>, prior: impl Into<String>) -> Self {
        Self::new(FileOp::Edit, path.into(), Some(content.into()), Some(prior.into()))
    }

    pub fn delete(path: impl Into<PathBuf>, prior: Option<String>) -> Self {
        Self::new(FileOp::Delete, path.into(), None, prior)
    }

    /// Deletes always go through approval
    pub fn requires_approval(&self) -> bool {
        self.op == FileOp::Delete
    }

    pub fn approve(&mut self) -> Result<()> {
        self.state = transition(self.state, ActionState::Approved, self.requires_approval())?;
        Ok(())
    }

    pub fn reject(&mut self) -> Result<()> {
        self.state = transition(self.state, ActionState::Rejected, self.requires_approval())?;
        Ok(())
    }

    pub fn mark_executed(&mut self) -> Result<()> {
        self.state = transition(self.state, ActionState::Executed, self.requires_approval())?;
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<()> {
        self.state = transition(self.state, ActionState::Failed, self.requires_approval())?;
        self.error = Some(message.into());
        Ok(())
    }

    pub fn describe(&self) -> String {
        format!("{} {}", self.op, self.path.display())
    }
}

/// A shell command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandAction {
    pub id: Uuid,
    pub command: String,
    pub working_dir: Option<PathBuf>,
    /// Fixed at construction from the safety gate
    pub is_dangerous: bool,
    pub state: ActionState,
    pub output: Option<String>,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl CommandAction {
    /// Build a command gated by the built-in safety tables
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        let is_dangerous = !safety::is_safe(&command);
        Self {
            id: Uuid::new_v4(),
            command,
            working_dir: None,
            is_dangerous,
            state: ActionState::Pending,
            output: None,
            exit_code: None,
            error: None,
        }
    }

    /// Re-assess against a configured policy
    pub fn gated_by(mut self, policy: &SafetyPolicy) -> Self {
        self.is_dangerous = !policy.is_safe(&self.command);
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn requires_approval(&self) -> bool {
        self.is_dangerous
    }

    pub fn approve(&mut self) -> Result<()> {
        self.state = transition(self.state, ActionState::Approved, self.requires_approval())?;
        Ok(())
    }

    pub fn reject(&mut self) -> Result<()> {
        self.state = transition(self.state, ActionState::Rejected, self.requires_approval())?;
        Ok(())
    }

    pub fn mark_executed(&mut self) -> Result<()> {
        self.state = transition(self.state, ActionState::Executed, self.requires_approval())?;
        Ok(())
    }

    pub fn mark_failed(&mut self, message: impl Into<String>) -> Result<()> {
        self.state = transition(self.state, ActionState::Failed, self.requires_approval())?;
        self.error = Some(message.into());
        Ok(())
    }
}

/// Actions extracted from one model response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedActions {
    pub files: Vec<FileAction>,
    pub commands: Vec<CommandAction>,
}

impl ParsedActions {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.commands.len()
    }
}

/// An action as it ended up after an attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AppliedAction {
    File(FileAction),
    Command(CommandAction),
}

impl AppliedAction {
    pub fn state(&self) -> ActionState {
        match self {
            AppliedAction::File(a) => a.state,
            AppliedAction::Command(a) => a.state,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            AppliedAction::File(a) => a.describe(),
            AppliedAction::Command(a) => format!("run `{}`", a.command),
        }
    }
}

/// A gated action awaiting a decision
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalRequest {
    pub action_id: Uuid,
    pub description: String,
    pub reason: String,
}

impl ApprovalRequest {
    pub fn for_file(action: &FileAction) -> Self {
        Self {
            action_id: action.id,
            description: action.describe(),
            reason: "file deletion always requires approval".to_string(),
        }
    }

    pub fn for_command(action: &CommandAction, policy: &SafetyPolicy) -> Self {
        Self {
            action_id: action.id,
            description: format!("run `{}`", action.command),
            reason: policy.assess(&action.command).reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

/// Decides on gated actions
#[async_trait]
pub trait ApprovalHandler: Send + Sync {
    async fn decide(&self, request: &ApprovalRequest) -> ApprovalDecision;
}

/// Rejects everything; the default for unattended runs
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAll;

#[async_trait]
impl ApprovalHandler for DenyAll {
    async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Reject
    }
}

/// Approves everything
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

#[async_trait]
impl ApprovalHandler for ApproveAll {
    async fn decide(&self, _request: &ApprovalRequest) -> ApprovalDecision {
        ApprovalDecision::Approve
    }
}
