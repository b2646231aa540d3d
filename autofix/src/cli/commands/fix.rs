//! Run a check command and repair what it reports

use super::cancel_on_ctrl_c;
use crate::cli::Context;
use crate::cli::app::FixArgs;
use crate::cli::approval::TerminalApproval;
use anyhow::{Context as _, Result, bail};
use autofix_core::actions::{ActionExecutor, ApprovalHandler, ApproveAll, LocalWorkspace};
use autofix_core::llm::OpenAICompatProvider;
use autofix_core::{CommandFixReport, FixEngine, FixError};
use std::sync::Arc;
use tracing::info;

pub async fn execute(args: FixArgs, ctx: Context) -> Result<()> {
    let mut config = ctx.config;
    if let Some(max_retries) = args.max_retries {
        config.engine.max_retries = max_retries;
    }
    if args.stream {
        config.engine.stream_responses = true;
    }

    let policy = config.safety.build()?;
    let model = OpenAICompatProvider::new(config.model.clone()).context("Failed to set up the model provider")?;
    info!("Using {} model {}", config.model.provider, config.model.model);

    let executor = Arc::new(ActionExecutor::new(Arc::new(LocalWorkspace::new(&ctx.root)), config.executor.clone()));
    let approvals: Arc<dyn ApprovalHandler> = if args.yes { Arc::new(ApproveAll) } else { Arc::new(TerminalApproval) };
    let (engine, mut events) = FixEngine::new(Arc::new(model), executor, config.engine.clone())
        .with_policy(policy)
        .with_approvals(approvals)
        .with_events();

    let quiet = args.json;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !quiet {
                eprintln!("  {}", event);
            }
        }
    });

    let cancel = cancel_on_ctrl_c();
    let result = engine.fix_command(&args.command, None, &cancel).await;
    drop(engine);
    let _ = printer.await;

    let report = match result {
        Ok(report) => report,
        Err(FixError::ClassificationMiss { excerpt }) => {
            bail!("`{}` failed but its output was not recognised:\n{}", args.command, excerpt)
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    if !report.success {
        bail!("{}", report.status_line());
    }
    Ok(())
}

fn print_summary(report: &CommandFixReport) {
    if report.initial_errors == 0 {
        println!("`{}` reported no errors.", report.command);
        return;
    }
    println!();
    for batch in &report.batches {
        let file = batch.file.as_deref().unwrap_or("(no file)");
        println!("{}: {}", file, batch.status_line());
        for error in &batch.remaining_errors {
            println!("    remaining: {}", error);
        }
        for error in &batch.introduced {
            println!("    new: {}", error);
        }
    }
    println!("{}", report.status_line());
}
