use super::*;
use crate::actions::{ActionExecutor, ActionState, ApproveAll, LocalWorkspace, Workspace};
use crate::errors::{ErrorKind, Severity};
use crate::llm::mock::{MockModelProvider, MockStep};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const FILE: &str = "src/app.ts";

/// Reports one error per `ERR_<X>` marker still present in the file
struct MarkerVerifier {
    workspace: Arc<dyn Workspace>,
}

#[async_trait]
impl Verifier for MarkerVerifier {
    async fn verify(&self, _cancel: &CancellationToken) -> Result<Vec<ParsedError>, FixError> {
        let content = self
            .workspace
            .read_file(Path::new(FILE))
            .await
            .map_err(|e| FixError::verification(e.to_string()))?;
        Ok(["A", "B", "C", "D"]
            .iter()
            .enumerate()
            .filter(|(_, marker)| content.contains(&format!("ERR_{}", marker)))
            .map(|(i, marker)| marker_error(marker, i as u32 + 1))
            .collect())
    }
}

fn marker_error(marker: &str, line: u32) -> ParsedError {
    ParsedError::new(ErrorKind::TypeError, Severity::Error, format!("error {}", marker)).at(FILE, line, Some(1))
}

fn edit(content: &str) -> String {
    format!("Updated file:\n\n```ts:{}\n{}```\n", FILE, content)
}

struct Fixture {
    dir: TempDir,
    workspace: Arc<dyn Workspace>,
    executor: Arc<ActionExecutor>,
}

impl Fixture {
    fn new(initial: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join(FILE), initial).unwrap();
        let workspace: Arc<dyn Workspace> = Arc::new(LocalWorkspace::new(dir.path()));
        let executor = Arc::new(ActionExecutor::new(workspace.clone(), Default::default()));
        Self { dir, workspace, executor }
    }

    fn engine(&self, model: &MockModelProvider) -> FixEngine {
        self.engine_with(model, FixConfig::default())
    }

    fn engine_with(&self, model: &MockModelProvider, config: FixConfig) -> FixEngine {
        FixEngine::new(Arc::new(model.clone()), self.executor.clone(), config)
    }

    fn verifier(&self) -> MarkerVerifier {
        MarkerVerifier { workspace: self.workspace.clone() }
    }

    fn content(&self) -> String {
        std::fs::read_to_string(self.dir.path().join(FILE)).unwrap()
    }
}

#[tokio::test]
async fn test_first_response_fixes_one_of_three() {
    let fixture = Fixture::new("ERR_A\nERR_B\nERR_C\n");
    let model = MockModelProvider::with_responses([edit("fixed\nERR_B\nERR_C\n")]);
    let engine = fixture.engine(&model);
    let errors = vec![marker_error("C", 3), marker_error("A", 1), marker_error("B", 2)];

    let result = engine
        .fix_all_in_file(Path::new(FILE), errors, &fixture.verifier(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.fixed_count, 1);
    assert_eq!(result.remaining_count, 2);
    assert!(!result.success);
    assert_eq!(result.status_line(), "Fixed 1, 2 remaining");
    // A fixed on its first attempt, then three unparseable attempts each for B and C
    assert_eq!(model.call_count(), 7);
    assert_eq!(result.attempts.len(), 7);
    assert_eq!(result.attempts[0].target.message, "error A");
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::Fixed);
    assert_eq!(result.attempts[1].outcome, AttemptOutcome::Unparseable);
    assert!(model.prompts()[0].contains("error B"), "co-occurring errors are listed");
}

#[tokio::test]
async fn test_unresolvable_error_exhausts_then_is_skipped() {
    let fixture = Fixture::new("ERR_A\n");
    let model = MockModelProvider::with_responses([
        edit("ERR_A\ntry 1\n"),
        edit("ERR_A\ntry 2\n"),
        edit("ERR_A\ntry 3\n"),
    ]);
    let (engine, mut events) = fixture.engine(&model).with_events();
    let cancel = CancellationToken::new();

    let result = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &cancel)
        .await
        .unwrap();
    assert_eq!(result.attempts.len(), 3);
    assert!(result.attempts.iter().all(|a| a.outcome == AttemptOutcome::StillFailing));
    assert_eq!(result.outcomes[0].status, ErrorStatus::Exhausted);
    assert_eq!(result.remaining_count, 1);
    assert_eq!(engine.history_snapshot().get(&marker_error("A", 1).identity()), Some(&3));
    assert_eq!(fixture.content(), "ERR_A\ntry 3\n");

    let again = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &cancel)
        .await
        .unwrap();
    assert_eq!(model.call_count(), 3);
    assert_eq!(again.skipped_count, 1);
    assert_eq!(again.outcomes[0].status, ErrorStatus::SkippedDuplicate);
    assert!(!again.success);

    let mut skipped = false;
    while let Ok(event) = events.try_recv() {
        skipped |= matches!(event, FixEvent::ErrorSkipped { .. });
    }
    assert!(skipped);

    engine.reset_history();
    engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &cancel)
        .await
        .unwrap();
    assert_eq!(model.call_count(), 6);
}

#[tokio::test]
async fn test_lower_max_retries_bounds_attempts() {
    let fixture = Fixture::new("ERR_A\n");
    let model = MockModelProvider::with_responses([
        edit("ERR_A\ntry 1\n"),
        edit("ERR_A\ntry 2\n"),
        edit("ERR_A\ntry 3\n"),
    ]);
    let config = FixConfig { max_retries: 2, ..Default::default() };
    assert_eq!(config.attempt_bound(), 2);
    let engine = fixture.engine_with(&model, config);
    let cancel = CancellationToken::new();

    let result = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &cancel)
        .await
        .unwrap();
    assert_eq!(model.call_count(), 2);
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.outcomes[0].status, ErrorStatus::Exhausted);
    assert_eq!(result.outcomes[0].attempts, 2);
    assert_eq!(fixture.content(), "ERR_A\ntry 2\n");

    let again = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &cancel)
        .await
        .unwrap();
    assert_eq!(again.outcomes[0].status, ErrorStatus::SkippedDuplicate);
    assert_eq!(model.call_count(), 2);
}

#[tokio::test]
async fn test_joint_fix_and_introduced_errors() {
    let fixture = Fixture::new("ERR_A\nERR_B\n");
    let model = MockModelProvider::with_responses([edit("ok\nERR_D\n")]);
    let engine = fixture.engine(&model);

    let result = engine
        .fix_all_in_file(
            Path::new(FILE),
            vec![marker_error("A", 1), marker_error("B", 2)],
            &fixture.verifier(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(model.call_count(), 1);
    assert_eq!(result.fixed_count, 2);
    assert!(result.success);
    assert_eq!(result.introduced.len(), 1);
    assert_eq!(result.introduced[0].message, "error D");
}

#[tokio::test]
async fn test_model_failure_counts_as_attempt() {
    let fixture = Fixture::new("ERR_A\n");
    let model = MockModelProvider::new();
    model.push(MockStep::Fail(LLMError::network("connection reset")));
    model.push(MockStep::Respond(edit("clean\n")));
    let engine = fixture.engine(&model);

    let result = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].outcome, AttemptOutcome::StillFailing);
    assert_eq!(result.outcomes[0].attempts, 2);
}

#[tokio::test]
async fn test_cancel_during_model_call_keeps_applied_actions() {
    let fixture = Fixture::new("ERR_A\n");
    let model = MockModelProvider::with_responses([edit("ERR_A\nstep one\n")]);
    model.push(MockStep::Hang);
    let engine = fixture.engine(&model);
    let cancel = CancellationToken::new();

    let watcher = {
        let model = model.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            while model.call_count() < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            cancel.cancel();
        })
    };

    let result = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &cancel)
        .await
        .unwrap();
    watcher.await.unwrap();

    assert!(result.cancelled);
    assert_eq!(result.remaining_count, 1);
    assert_eq!(result.attempts.len(), 2);
    assert_eq!(result.attempts[0].actions_applied[0].state(), ActionState::Executed);
    assert_eq!(result.attempts[1].outcome, AttemptOutcome::Exhausted);
    assert_eq!(result.outcomes[0].status, ErrorStatus::Exhausted);
    assert_eq!(fixture.content(), "ERR_A\nstep one\n");
    assert!(!engine.is_fixing());
}

#[tokio::test]
async fn test_concurrent_fix_is_rejected() {
    let fixture = Fixture::new("ERR_A\n");
    let model = MockModelProvider::new();
    model.push(MockStep::Hang);
    let engine = Arc::new(fixture.engine(&model));
    let cancel = CancellationToken::new();

    let running = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        let verifier = fixture.verifier();
        tokio::spawn(async move {
            engine.fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &verifier, &cancel).await
        })
    };
    while model.call_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(engine.is_fixing());

    let second = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &cancel)
        .await;
    assert!(matches!(second, Err(FixError::Busy)));

    cancel.cancel();
    let first = running.await.unwrap().unwrap();
    assert!(first.cancelled);
    assert!(!engine.is_fixing());
}

#[tokio::test]
async fn test_delete_requires_approval() {
    let fixture = Fixture::new("ERR_A\n");
    std::fs::write(fixture.dir.path().join("src/legacy.ts"), "old").unwrap();
    let response = format!("{}\n```delete\nsrc/legacy.ts\n```\n", edit("clean\n"));

    let model = MockModelProvider::with_responses([response.clone()]);
    let engine = fixture.engine(&model);
    let result = engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(result.success);
    let states: Vec<ActionState> = result.attempts[0].actions_applied.iter().map(|a| a.state()).collect();
    assert_eq!(states, vec![ActionState::Executed, ActionState::Rejected]);
    assert!(fixture.dir.path().join("src/legacy.ts").exists());

    std::fs::write(fixture.dir.path().join(FILE), "ERR_A\n").unwrap();
    let model = MockModelProvider::with_responses([response]);
    let engine = fixture.engine(&model).with_approvals(Arc::new(ApproveAll));
    engine
        .fix_all_in_file(Path::new(FILE), vec![marker_error("A", 1)], &fixture.verifier(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!fixture.dir.path().join("src/legacy.ts").exists());
}

#[cfg(unix)]
mod command {
    use super::*;

    const CHECK: &str = "if grep -q ERR_A src/app.ts; then echo \"src/app.ts(1,1): error TS2304: Cannot find name 'a'.\"; exit 2; fi";

    #[tokio::test]
    async fn test_fix_command_repairs_and_verifies() {
        let fixture = Fixture::new("const x = ERR_A;\n");
        let model = MockModelProvider::with_responses([edit("const x = 1;\n")]);
        let engine = fixture.engine(&model);

        let report = engine.fix_command(CHECK, None, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.initial_errors, 1);
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.batches[0].file.as_deref(), Some(FILE));
        assert!(report.success);
        assert_eq!(report.status_line(), "Fixed 1, 0 remaining");
        assert!(model.prompts()[0].contains("Cannot find name 'a'"));
        assert!(model.prompts()[0].contains(">>1 | const x = ERR_A;"));
    }

    const UTIL: &str = "src/util.ts";

    const CHECK_TWO_FILES: &str = "s=0; \
        if grep -q ERR_A src/app.ts; then echo \"src/app.ts(1,1): error TS2304: Cannot find name 'a'.\"; s=2; fi; \
        if grep -q ERR_B src/util.ts; then echo \"src/util.ts(1,1): error TS2304: Cannot find name 'b'.\"; s=2; fi; \
        exit $s";

    fn two_broken_files() -> Fixture {
        let fixture = Fixture::new("const x = ERR_A;\n");
        std::fs::write(fixture.dir.path().join(UTIL), "const y = ERR_B;\n").unwrap();
        fixture
    }

    #[tokio::test]
    async fn test_fix_command_drains_files_in_report_order() {
        let fixture = two_broken_files();
        let model = MockModelProvider::with_responses([
            edit("const x = 1;\n"),
            format!("```ts:{}\nconst y = 2;\n```\n", UTIL),
        ]);
        let engine = fixture.engine(&model);

        let report = engine.fix_command(CHECK_TWO_FILES, None, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.initial_errors, 2);
        let files: Vec<Option<&str>> = report.batches.iter().map(|b| b.file.as_deref()).collect();
        assert_eq!(files, vec![Some(FILE), Some(UTIL)]);
        assert!(report.success);
        assert_eq!(report.status_line(), "Fixed 2, 0 remaining");

        let prompts = model.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Cannot find name 'a'"));
        assert!(prompts[1].contains("Cannot find name 'b'"));
    }

    #[tokio::test]
    async fn test_fix_command_counts_errors_fixed_by_earlier_batch() {
        let fixture = two_broken_files();
        let both = format!("{}\n```ts:{}\nconst y = 2;\n```\n", edit("const x = 1;\n"), UTIL);
        let model = MockModelProvider::with_responses([both]);
        let engine = fixture.engine(&model);

        let report = engine.fix_command(CHECK_TWO_FILES, None, &CancellationToken::new()).await.unwrap();
        assert_eq!(model.call_count(), 1);
        assert_eq!(report.batches.len(), 2);
        assert_eq!(report.batches[0].fixed_count, 1);
        assert_eq!(report.batches[1].file.as_deref(), Some(UTIL));
        assert_eq!(report.batches[1].fixed_count, 1);
        assert!(report.batches[1].attempts.is_empty());
        assert!(report.success);
        assert_eq!(report.fixed_count(), 2);
    }

    #[tokio::test]
    async fn test_fix_command_clean_and_unrecognised() {
        let fixture = Fixture::new("ok\n");
        let model = MockModelProvider::new();
        let engine = fixture.engine(&model);
        let cancel = CancellationToken::new();

        let clean = engine.fix_command("echo all good", None, &cancel).await.unwrap();
        assert!(clean.success);
        assert_eq!(clean.initial_errors, 0);

        let miss = engine.fix_command("echo 'something odd happened'; exit 1", None, &cancel).await;
        assert!(matches!(miss, Err(FixError::ClassificationMiss { .. })));
        assert_eq!(model.call_count(), 0);
    }
}
