//! Applies file actions and runs commands

use super::workspace::{Workspace, normalize_relative};
use super::{ActionError, ActionState, CommandAction, FileAction, FileOp, Result};
use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long to wait for pipes to close after the process is gone
const DRAIN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Wall-clock limit for captured commands
    pub timeout_secs: u64,
    /// Combined stdout and stderr kept per command
    pub max_output_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { timeout_secs: 120, max_output_bytes: 512 * 1024 }
    }
}

/// Result of a captured command that exited successfully
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutput {
    pub output: String,
    pub exit_code: i32,
    pub truncated: bool,
    pub duration: Duration,
}

/// A detached process started by [`ActionExecutor::run_interactive`]
#[derive(Debug)]
pub struct InteractiveProcess {
    pub pid: Option<u32>,
    /// Exit code, `None` when killed by a signal or not observable
    pub exit: tokio::task::JoinHandle<Option<i32>>,
}

/// Line counts of an edit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub added: usize,
    pub removed: usize,
}

impl DiffStat {
    pub fn between(old: &str, new: &str) -> Self {
        let diff = TextDiff::from_lines(old, new);
        let mut stat = DiffStat::default();
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => stat.added += 1,
                ChangeTag::Delete => stat.removed += 1,
                ChangeTag::Equal => {}
            }
        }
        stat
    }
}

impl fmt::Display for DiffStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{} -{}", self.added, self.removed)
    }
}

/// Bounded sink shared by the stdout and stderr readers
struct OutputBuffer {
    data: Mutex<Vec<u8>>,
    limit: usize,
    truncated: AtomicBool,
}

impl OutputBuffer {
    fn new(limit: usize) -> Self {
        Self { data: Mutex::new(Vec::new()), limit, truncated: AtomicBool::new(false) }
    }

    fn push(&self, bytes: &[u8]) {
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        let room = self.limit.saturating_sub(data.len());
        if bytes.len() > room {
            self.truncated.store(true, Ordering::Relaxed);
        }
        data.extend_from_slice(&bytes[..bytes.len().min(room)]);
    }

    fn snapshot(&self) -> (String, bool) {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        (String::from_utf8_lossy(&data).into_owned(), self.truncated.load(Ordering::Relaxed))
    }
}

/// Keep reading after the limit so the child never blocks on a full pipe
async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: Arc<OutputBuffer>) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => sink.push(&chunk[..n]),
            Err(e) => {
                debug!("Output pipe closed with error: {}", e);
                break;
            }
        }
    }
}

enum Finish {
    Exited(std::io::Result<std::process::ExitStatus>),
    TimedOut,
    Cancelled,
}

fn shell_command(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Kill a captured command together with everything it started
///
/// Captured commands lead their own process group, so the group id is the
/// child's pid.
async fn kill_tree(child: &mut Child) -> std::io::Result<()> {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        // SAFETY: plain signal delivery to a group this executor created
        if unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) } != 0 {
            debug!("killpg({}) failed: {}", pid, std::io::Error::last_os_error());
        }
    }
    child.kill().await
}

/// Applies actions against a workspace
pub struct ActionExecutor {
    workspace: Arc<dyn Workspace>,
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(workspace: Arc<dyn Workspace>, config: ExecutorConfig) -> Self {
        Self { workspace, config }
    }

    pub fn workspace(&self) -> &Arc<dyn Workspace> {
        &self.workspace
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Apply one file action, recording the outcome on it
    pub async fn apply_file(&self, action: &mut FileAction) -> Result<Option<DiffStat>> {
        match action.state {
            ActionState::Rejected => return Err(ActionError::Rejected),
            ActionState::Pending if action.requires_approval() => {
                return Err(ActionError::ApprovalRequired { action: action.describe() });
            }
            _ => {}
        }

        let result = match action.op {
            FileOp::Delete => self.workspace.delete_file(&action.path).await.map(|_| None),
            FileOp::Create | FileOp::Edit => {
                let content = action.new_content.as_deref().unwrap_or_default();
                let prior = action.prior_content.as_deref().unwrap_or_default();
                self.workspace
                    .write_file(&action.path, content)
                    .await
                    .map(|_| Some(DiffStat::between(prior, content)))
            }
        };

        match result {
            Ok(stat) => {
                action.mark_executed()?;
                info!("Applied {}", action.describe());
                Ok(stat)
            }
            Err(e) => {
                warn!("Failed to {}: {}", action.describe(), e);
                action.mark_failed(e.to_string())?;
                Err(e)
            }
        }
    }

    /// Run a command to completion, capturing combined output
    pub async fn run_captured(
        &self,
        command: &str,
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput> {
        let cwd = self.resolve_dir(cwd)?;
        debug!("Running `{}` in {}", command, cwd.display());
        let started = Instant::now();

        let mut cmd = shell_command(command);
        cmd.current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        let mut child = cmd
            .spawn()
            .map_err(|e| ActionError::Spawn(format!("{}: {}", command, e)))?;

        let buffer = Arc::new(OutputBuffer::new(self.config.max_output_bytes));
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, buffer.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, buffer.clone())));
        }

        let timeout = Duration::from_secs(self.config.timeout_secs);
        let finish = tokio::select! {
            status = child.wait() => Finish::Exited(status),
            _ = tokio::time::sleep(timeout) => Finish::TimedOut,
            _ = cancel.cancelled() => Finish::Cancelled,
        };

        if !matches!(finish, Finish::Exited(_)) {
            if let Err(e) = kill_tree(&mut child).await {
                warn!("Failed to kill `{}`: {}", command, e);
            }
        }
        for reader in readers {
            if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
                debug!("Output pipe still open after exit of `{}`", command);
            }
        }
        let (output, truncated) = buffer.snapshot();

        match finish {
            Finish::Exited(Ok(status)) => {
                let exit_code = status.code().unwrap_or(-1);
                debug!("`{}` exited with {} in {:?}", command, exit_code, started.elapsed());
                if status.success() {
                    Ok(CommandOutput { output, exit_code, truncated, duration: started.elapsed() })
                } else {
                    Err(ActionError::Exec { exit_code, output })
                }
            }
            Finish::Exited(Err(e)) => Err(ActionError::Spawn(format!("{}: {}", command, e))),
            Finish::TimedOut => {
                warn!("`{}` timed out after {:?}", command, timeout);
                Err(ActionError::Timeout { after: timeout, partial_output: output })
            }
            Finish::Cancelled => {
                info!("`{}` cancelled", command);
                Err(ActionError::Cancelled)
            }
        }
    }

    /// Start a command attached to the terminal without waiting for it
    ///
    /// The returned handle resolves to the exit code once the process ends;
    /// dropping it leaves the process running.
    pub fn run_interactive(&self, command: &str, cwd: Option<&Path>) -> Result<InteractiveProcess> {
        let cwd = self.resolve_dir(cwd)?;
        let mut child = shell_command(command)
            .current_dir(&cwd)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ActionError::Spawn(format!("{}: {}", command, e)))?;

        let pid = child.id();
        let label = command.to_string();
        let exit = tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => {
                    info!("Interactive `{}` exited with {}", label, status);
                    status.code()
                }
                Err(e) => {
                    warn!("Interactive `{}` failed: {}", label, e);
                    None
                }
            }
        });
        Ok(InteractiveProcess { pid, exit })
    }

    /// Run a command action through the approval gate
    pub async fn execute_command(
        &self,
        action: &mut CommandAction,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput> {
        match action.state {
            ActionState::Rejected => return Err(ActionError::Rejected),
            ActionState::Pending if action.requires_approval() => {
                return Err(ActionError::ApprovalRequired { action: action.command.clone() });
            }
            _ => {}
        }

        let result = self.run_captured(&action.command, action.working_dir.as_deref(), cancel).await;
        match &result {
            Ok(out) => {
                action.output = Some(out.output.clone());
                action.exit_code = Some(out.exit_code);
                action.mark_executed()?;
            }
            Err(e) => {
                action.output = e.output().map(str::to_string);
                if let ActionError::Exec { exit_code, .. } = e {
                    action.exit_code = Some(*exit_code);
                }
                action.mark_failed(e.to_string())?;
            }
        }
        result
    }

    fn resolve_dir(&self, cwd: Option<&Path>) -> Result<PathBuf> {
        let root = self.workspace.root();
        match cwd {
            None => Ok(root.to_path_buf()),
            Some(dir) if dir.is_absolute() => {
                if dir.starts_with(root) {
                    Ok(dir.to_path_buf())
                } else {
                    Err(ActionError::PathOutsideWorkspace(dir.to_path_buf()))
                }
            }
            Some(dir) => normalize_relative(dir)
                .map(|rel| root.join(rel))
                .ok_or_else(|| ActionError::PathOutsideWorkspace(dir.to_path_buf())),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::actions::LocalWorkspace;
    use tempfile::TempDir;

    fn executor(dir: &TempDir, config: ExecutorConfig) -> ActionExecutor {
        ActionExecutor::new(Arc::new(LocalWorkspace::new(dir.path())), config)
    }

    #[tokio::test]
    async fn test_apply_create_edit_delete() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig::default());

        let mut create = FileAction::create("src/new.txt", "a\nb\n");
        let stat = exec.apply_file(&mut create).await.unwrap();
        assert_eq!(stat, Some(DiffStat { added: 2, removed: 0 }));
        assert_eq!(create.state, ActionState::Executed);

        let mut edit = FileAction::edit("src/new.txt", "a\nc\n", "a\nb\n");
        let stat = exec.apply_file(&mut edit).await.unwrap().unwrap();
        assert_eq!(stat.to_string(), "+1 -1");

        let mut delete = FileAction::delete("src/new.txt", None);
        let err = exec.apply_file(&mut delete).await.unwrap_err();
        assert!(matches!(err, ActionError::ApprovalRequired { .. }));
        assert!(dir.path().join("src/new.txt").exists());

        delete.approve().unwrap();
        exec.apply_file(&mut delete).await.unwrap();
        assert_eq!(delete.state, ActionState::Executed);
        assert!(!dir.path().join("src/new.txt").exists());
    }

    #[tokio::test]
    async fn test_failed_delete_is_recorded() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig::default());
        let mut delete = FileAction::delete("missing.txt", None);
        delete.approve().unwrap();
        assert!(exec.apply_file(&mut delete).await.is_err());
        assert_eq!(delete.state, ActionState::Failed);
        assert!(delete.error.is_some());
    }

    #[tokio::test]
    async fn test_run_captured_combines_streams() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig::default());
        let token = CancellationToken::new();

        let out = exec.run_captured("echo out; echo err 1>&2", None, &token).await.unwrap();
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
        assert_eq!(out.exit_code, 0);

        let err = exec.run_captured("echo broken; exit 3", None, &token).await.unwrap_err();
        match err {
            ActionError::Exec { exit_code, output } => {
                assert_eq!(exit_code, 3);
                assert!(output.contains("broken"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_captured_truncates_and_times_out() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig { timeout_secs: 1, max_output_bytes: 16 });
        let token = CancellationToken::new();

        let out = exec
            .run_captured("for i in 1 2 3 4 5 6 7 8; do echo line-$i; done", None, &token)
            .await
            .unwrap();
        assert!(out.truncated);
        assert_eq!(out.output.len(), 16);

        let err = exec.run_captured("echo started; sleep 5", None, &token).await.unwrap_err();
        match err {
            ActionError::Timeout { partial_output, .. } => assert!(partial_output.contains("started")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig::default());
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let err = exec.run_captured("sleep 10", None, &token).await.unwrap_err();
        assert!(matches!(err, ActionError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_and_cancel_stop_grandchildren() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig { timeout_secs: 1, ..Default::default() });
        let token = CancellationToken::new();

        let err = exec
            .run_captured("sh -c 'sleep 2; touch after-timeout.txt'", None, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Timeout { .. }));

        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });
        let err = exec
            .run_captured("sh -c 'sleep 1; touch after-cancel.txt' & wait", None, &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Cancelled));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!dir.path().join("after-timeout.txt").exists());
        assert!(!dir.path().join("after-cancel.txt").exists());
    }

    #[tokio::test]
    async fn test_run_interactive_reports_exit() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig::default());
        let process = exec.run_interactive("exit 3", None).unwrap();
        assert!(process.pid.is_some());
        assert_eq!(process.exit.await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_execute_command_enforces_gate() {
        let dir = TempDir::new().unwrap();
        let exec = executor(&dir, ExecutorConfig::default());
        let token = CancellationToken::new();

        let mut dangerous = CommandAction::new("rm -f nothing-here");
        let err = exec.execute_command(&mut dangerous, &token).await.unwrap_err();
        assert!(matches!(err, ActionError::ApprovalRequired { .. }));
        assert_eq!(dangerous.state, ActionState::Pending);

        let mut safe = CommandAction::new("ls");
        exec.execute_command(&mut safe, &token).await.unwrap();
        assert_eq!(safe.state, ActionState::Executed);
        assert_eq!(safe.exit_code, Some(0));

        let mut escaping = CommandAction::new("ls").in_dir("../..");
        assert!(exec.execute_command(&mut escaping, &token).await.is_err());
    }
}
