//! The fix loop

use super::events::FixEvent;
use super::history::AttemptHistory;
use super::prompt::{DEFAULT_SYSTEM_PROMPT, FixPrompt};
use super::verify::{CommandVerifier, Verifier, same_file};
use super::{
    AttemptOutcome, BatchResult, CommandFixReport, ErrorOutcome, ErrorStatus, FixAttempt, FixConfig, FixError,
};
use crate::actions::{
    ActionError, ActionExecutor, ActionParser, AppliedAction, ApprovalDecision, ApprovalHandler, ApprovalRequest,
    DenyAll, ParsedActions, SafetyPolicy,
};
use crate::errors::{ErrorIdentity, ParsedError, Severity, detect, fix_priority};
use crate::llm::{ModelProvider, collect_stream};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Longest output excerpt carried by a classification miss
const MISS_EXCERPT_CHARS: usize = 400;

/// Drives model-assisted repair of classified errors
///
/// Only one fix loop runs at a time per engine; a concurrent call fails
/// with [`FixError::Busy`]. Attempt history is kept for the engine's
/// lifetime so an error that could not be fixed is not retried until
/// [`FixEngine::reset_history`] is called.
pub struct FixEngine {
    model: Arc<dyn ModelProvider>,
    executor: Arc<ActionExecutor>,
    parser: ActionParser,
    policy: SafetyPolicy,
    approvals: Arc<dyn ApprovalHandler>,
    config: FixConfig,
    history: AttemptHistory,
    busy: AtomicBool,
    events: Option<mpsc::UnboundedSender<FixEvent>>,
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct AttemptReport {
    attempt: FixAttempt,
    /// In-scope errors after verification; `None` when verification did not run
    fresh: Option<Vec<ParsedError>>,
}

impl FixEngine {
    pub fn new(model: Arc<dyn ModelProvider>, executor: Arc<ActionExecutor>, config: FixConfig) -> Self {
        let policy = SafetyPolicy::default();
        Self {
            parser: ActionParser::new(executor.workspace().clone(), policy.clone()),
            model,
            executor,
            policy,
            approvals: Arc::new(DenyAll),
            config,
            history: AttemptHistory::new(),
            busy: AtomicBool::new(false),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: SafetyPolicy) -> Self {
        self.parser = ActionParser::new(self.executor.workspace().clone(), policy.clone());
        self.policy = policy;
        self
    }

    pub fn with_approvals(mut self, approvals: Arc<dyn ApprovalHandler>) -> Self {
        self.approvals = approvals;
        self
    }

    /// Attach an event channel and return its receiver
    pub fn with_events(mut self) -> (Self, mpsc::UnboundedReceiver<FixEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        (self, rx)
    }

    pub fn config(&self) -> &FixConfig {
        &self.config
    }

    pub fn executor(&self) -> &Arc<ActionExecutor> {
        &self.executor
    }

    pub fn is_fixing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Forget all attempt counts so exhausted errors become eligible again
    pub fn reset_history(&self) {
        info!("Clearing attempt history ({} entries)", self.history.len());
        self.history.reset();
    }

    pub fn history_snapshot(&self) -> HashMap<ErrorIdentity, u32> {
        self.history.snapshot()
    }

    /// Fix a batch of errors belonging to one file
    pub async fn fix_all_in_file(
        &self,
        file: &Path,
        errors: Vec<ParsedError>,
        verifier: &dyn Verifier,
        cancel: &CancellationToken,
    ) -> Result<BatchResult, FixError> {
        let _guard = self.acquire()?;
        let scope = file.to_string_lossy().into_owned();
        Ok(self.run_batch(Some(scope), errors, verifier, cancel).await)
    }

    /// Run a command, classify its output and repair what it reports
    ///
    /// Errors are grouped by file in the order they were first reported and
    /// each group is drained before the next starts. Verification re-runs
    /// the command.
    pub async fn fix_command(
        &self,
        command: &str,
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<CommandFixReport, FixError> {
        let _guard = self.acquire()?;

        let (output, failed) = match self.executor.run_captured(command, cwd, cancel).await {
            Ok(out) => (out.output, false),
            Err(ActionError::Exec { output, .. }) => (output, true),
            Err(ActionError::Timeout { partial_output, .. }) => (partial_output, true),
            Err(ActionError::Cancelled) => return Err(FixError::Cancelled),
            Err(e) => return Err(e.into()),
        };

        let detection = detect(&output);
        let errors: Vec<ParsedError> = detection.errors.into_iter().filter(|e| self.wants(e.severity)).collect();
        let mut report = CommandFixReport {
            command: command.to_string(),
            initial_errors: errors.len(),
            ..Default::default()
        };

        if errors.is_empty() {
            if failed {
                let excerpt = tail(&output, MISS_EXCERPT_CHARS);
                self.emit(FixEvent::ClassificationMiss { excerpt: excerpt.clone() });
                return Err(FixError::ClassificationMiss { excerpt });
            }
            report.success = true;
            return Ok(report);
        }

        let mut groups: Vec<(Option<String>, Vec<ParsedError>)> = Vec::new();
        for error in errors {
            match groups.iter_mut().find(|(file, _)| *file == error.file) {
                Some((_, group)) => group.push(error),
                None => groups.push((error.file.clone(), vec![error])),
            }
        }
        debug!("`{}` reported errors in {} file group(s)", command, groups.len());

        let verifier = CommandVerifier::new(self.executor.clone(), command, cwd.map(Path::to_path_buf))
            .include_warnings(self.config.fix_warnings);

        for (file, mut group) in groups {
            // An earlier batch's verification may already show these fixed
            let mut fixed_earlier = 0;
            if let Some(latest) = verifier.latest() {
                let present: HashSet<ErrorIdentity> = latest.iter().map(ParsedError::identity).collect();
                let before = group.len();
                group.retain(|e| present.contains(&e.identity()));
                fixed_earlier = before - group.len();
            }
            let mut batch = self.run_batch(file, group, &verifier, cancel).await;
            batch.fixed_count += fixed_earlier;
            report.batches.push(batch);
        }

        report.success = report.batches.iter().all(|b| b.success);
        info!("`{}`: {}", command, report.status_line());
        Ok(report)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>, FixError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| FixError::Busy)?;
        Ok(BusyGuard(&self.busy))
    }

    fn wants(&self, severity: Severity) -> bool {
        match severity {
            Severity::Error => true,
            Severity::Warning => self.config.fix_warnings,
            Severity::Info => false,
        }
    }

    fn emit(&self, event: FixEvent) {
        info!("{}", event);
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    async fn run_batch(
        &self,
        file: Option<String>,
        mut errors: Vec<ParsedError>,
        verifier: &dyn Verifier,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let bound = self.config.attempt_bound();
        let mut known: HashSet<ErrorIdentity> = HashSet::new();
        errors.retain(|e| known.insert(e.identity()));
        errors.sort_by_key(|e| (fix_priority(e), e.line.unwrap_or(u32::MAX)));

        let mut pending: VecDeque<ParsedError> = errors.into();
        let mut result = BatchResult { file: file.clone(), ..Default::default() };
        self.emit(FixEvent::BatchStarted { file: file.clone(), errors: pending.len() });

        while let Some(target) = pending.pop_front() {
            let identity = target.identity();
            if cancel.is_cancelled() {
                self.cancel_batch(&mut result, target, 0, &mut pending);
                break;
            }

            let prior = self.history.count(&identity);
            if prior >= bound {
                let reason = FixError::RetryCeilingReached { identity: identity.clone(), attempts: prior }.to_string();
                self.emit(FixEvent::ErrorSkipped { target: identity.clone(), reason });
                result.skipped_count += 1;
                result.outcomes.push(ErrorOutcome { identity, status: ErrorStatus::SkippedDuplicate, attempts: 0 });
                result.remaining_errors.push(target);
                continue;
            }

            let mut attempts = 0;
            let mut status = ErrorStatus::Exhausted;
            while self.history.count(&identity) < bound && !cancel.is_cancelled() {
                attempts += 1;
                let report = self.attempt(&target, &pending, file.as_deref(), bound, verifier, cancel).await;
                let outcome = report.attempt.outcome;
                result.attempts.push(report.attempt);

                if let Some(fresh) = report.fresh {
                    let present: HashSet<ErrorIdentity> = fresh.iter().map(ParsedError::identity).collect();
                    for error in fresh {
                        if known.insert(error.identity()) {
                            debug!("New error surfaced during verification: {}", error);
                            result.introduced.push(error);
                        }
                    }
                    let (still, gone): (Vec<ParsedError>, Vec<ParsedError>) =
                        pending.drain(..).partition(|e| present.contains(&e.identity()));
                    pending.extend(still);
                    for error in gone {
                        let identity = error.identity();
                        self.emit(FixEvent::ErrorFixed { target: identity.clone(), attempts: 0 });
                        result.fixed_count += 1;
                        result.outcomes.push(ErrorOutcome { identity, status: ErrorStatus::Fixed, attempts: 0 });
                    }
                }

                match outcome {
                    AttemptOutcome::Fixed => {
                        status = ErrorStatus::Fixed;
                        break;
                    }
                    AttemptOutcome::Exhausted => break,
                    AttemptOutcome::StillFailing | AttemptOutcome::Unparseable => {}
                }
            }

            if status == ErrorStatus::Fixed {
                self.emit(FixEvent::ErrorFixed { target: identity.clone(), attempts });
                result.fixed_count += 1;
                result.outcomes.push(ErrorOutcome { identity, status, attempts });
            } else if cancel.is_cancelled() {
                self.cancel_batch(&mut result, target, attempts, &mut pending);
                break;
            } else {
                self.emit(FixEvent::ErrorExhausted { target: identity.clone(), attempts });
                result.outcomes.push(ErrorOutcome { identity, status, attempts });
                result.remaining_errors.push(target);
            }
        }

        result.remaining_count = result.remaining_errors.len();
        result.success = result.remaining_count == 0;
        self.emit(FixEvent::BatchFinished { file, fixed: result.fixed_count, remaining: result.remaining_count });
        result
    }

    fn cancel_batch(
        &self,
        result: &mut BatchResult,
        target: ParsedError,
        attempts: u32,
        pending: &mut VecDeque<ParsedError>,
    ) {
        result.cancelled = true;
        result.outcomes.push(ErrorOutcome { identity: target.identity(), status: ErrorStatus::Exhausted, attempts });
        result.remaining_errors.push(target);
        for error in pending.drain(..) {
            result.outcomes.push(ErrorOutcome { identity: error.identity(), status: ErrorStatus::Exhausted, attempts: 0 });
            result.remaining_errors.push(error);
        }
        self.emit(FixEvent::Cancelled { remaining: result.remaining_errors.len() });
    }

    async fn attempt(
        &self,
        target: &ParsedError,
        pending: &VecDeque<ParsedError>,
        scope: Option<&str>,
        bound: u32,
        verifier: &dyn Verifier,
        cancel: &CancellationToken,
    ) -> AttemptReport {
        let identity = target.identity();
        let number = self.history.increment(&identity);
        self.emit(FixEvent::AttemptStarted { target: identity.clone(), attempt: number, max_attempts: bound });

        let source = match target.file.as_deref() {
            Some(file) => self.executor.workspace().read_file(Path::new(file)).await.ok(),
            None => None,
        };
        let co_errors: Vec<ParsedError> = pending
            .iter()
            .filter(|e| e.file == target.file)
            .take(self.config.max_co_errors)
            .cloned()
            .collect();
        let prompt = FixPrompt {
            target,
            source: source.as_deref(),
            co_errors: &co_errors,
            attempt: number,
            max_attempts: bound,
            context_radius: self.config.context_radius,
        }
        .render();

        let mut attempt = FixAttempt::new(identity.clone(), number, prompt);
        let unverified = |mut attempt: FixAttempt, outcome| {
            attempt.outcome = outcome;
            AttemptReport { attempt, fresh: None }
        };

        let response = match self.ask_model(&attempt.prompt_sent, cancel).await {
            Ok(text) => text,
            Err(FixError::Cancelled) => return unverified(attempt, AttemptOutcome::Exhausted),
            Err(e) => {
                warn!("Model call failed for {}: {}", identity, e);
                return unverified(attempt, AttemptOutcome::StillFailing);
            }
        };

        let actions = self.parser.parse(&response).await;
        self.emit(FixEvent::ModelResponded {
            target: identity.clone(),
            chars: response.len(),
            actions: actions.len(),
        });
        if actions.is_empty() {
            debug!("No actions in model response for {}", identity);
            return unverified(attempt, AttemptOutcome::Unparseable);
        }

        attempt.actions_applied = self.apply_actions(actions, cancel).await;
        if cancel.is_cancelled() {
            return unverified(attempt, AttemptOutcome::Exhausted);
        }

        match verifier.verify(cancel).await {
            Ok(fresh) => {
                let fresh: Vec<ParsedError> =
                    fresh.into_iter().filter(|e| same_file(e.file.as_deref(), scope)).collect();
                let still_failing = fresh.iter().any(|e| e.identity() == identity);
                attempt.outcome = if still_failing { AttemptOutcome::StillFailing } else { AttemptOutcome::Fixed };
                self.emit(FixEvent::Verified { target: identity, outcome: attempt.outcome, remaining: fresh.len() });
                AttemptReport { attempt, fresh: Some(fresh) }
            }
            Err(FixError::Cancelled) => unverified(attempt, AttemptOutcome::Exhausted),
            Err(e) => {
                warn!("Verification failed for {}: {}", identity, e);
                unverified(attempt, AttemptOutcome::StillFailing)
            }
        }
    }

    async fn ask_model(&self, prompt: &str, cancel: &CancellationToken) -> Result<String, FixError> {
        let system = self.config.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let request = async {
            if self.config.stream_responses {
                let stream = self.model.complete_stream(prompt, Some(system)).await?;
                collect_stream(stream).await
            } else {
                self.model.complete(prompt, Some(system)).await
            }
        };
        tokio::select! {
            response = request => Ok(response?),
            _ = cancel.cancelled() => Err(FixError::Cancelled),
        }
    }

    /// Apply file actions, then run commands; gated actions go through approval
    async fn apply_actions(&self, actions: ParsedActions, cancel: &CancellationToken) -> Vec<AppliedAction> {
        let mut applied = Vec::with_capacity(actions.len());

        for mut action in actions.files {
            if action.requires_approval() {
                let approved = self.approve(ApprovalRequest::for_file(&action)).await;
                let decided = if approved { action.approve() } else { action.reject() };
                if let Err(e) = decided {
                    warn!("Could not record approval for {}: {}", action.describe(), e);
                }
                if !approved {
                    applied.push(AppliedAction::File(action));
                    continue;
                }
            }
            match self.executor.apply_file(&mut action).await {
                Ok(diff) => self.emit(FixEvent::ActionApplied { description: action.describe(), diff }),
                Err(e) => self.emit(FixEvent::ActionFailed { description: action.describe(), error: e.to_string() }),
            }
            applied.push(AppliedAction::File(action));
        }

        for mut action in actions.commands {
            if cancel.is_cancelled() {
                break;
            }
            let description = format!("run `{}`", action.command);
            if action.requires_approval() {
                let approved = self.approve(ApprovalRequest::for_command(&action, &self.policy)).await;
                let decided = if approved { action.approve() } else { action.reject() };
                if let Err(e) = decided {
                    warn!("Could not record approval for {}: {}", description, e);
                }
                if !approved {
                    applied.push(AppliedAction::Command(action));
                    continue;
                }
            }
            match self.executor.execute_command(&mut action, cancel).await {
                Ok(_) => self.emit(FixEvent::ActionApplied { description, diff: None }),
                Err(e) => self.emit(FixEvent::ActionFailed { description, error: e.to_string() }),
            }
            applied.push(AppliedAction::Command(action));
        }

        applied
    }

    async fn approve(&self, request: ApprovalRequest) -> bool {
        let approved = self.approvals.decide(&request).await == ApprovalDecision::Approve;
        self.emit(FixEvent::ApprovalRequired { description: request.description, reason: request.reason, approved });
        approved
    }
}

/// Last `max` characters of `text`, trimmed
fn tail(text: &str, max: usize) -> String {
    let text = text.trim();
    let skip = text.chars().count().saturating_sub(max);
    text.chars().skip(skip).collect()
}
