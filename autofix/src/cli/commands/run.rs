//! Run one command through the safety gate

use super::cancel_on_ctrl_c;
use crate::cli::Context;
use crate::cli::app::RunArgs;
use crate::cli::approval::TerminalApproval;
use anyhow::{Result, bail};
use autofix_core::actions::{
    ActionExecutor, ApprovalDecision, ApprovalHandler, ApprovalRequest, CommandAction, LocalWorkspace,
};
use std::sync::Arc;

pub async fn execute(args: RunArgs, ctx: &Context) -> Result<()> {
    let policy = ctx.config.safety.build()?;
    let mut action = CommandAction::new(args.command.join(" ")).gated_by(&policy);

    if action.requires_approval() {
        let decision = if args.yes {
            ApprovalDecision::Approve
        } else {
            TerminalApproval.decide(&ApprovalRequest::for_command(&action, &policy)).await
        };
        if decision == ApprovalDecision::Reject {
            action.reject()?;
            bail!("Not running `{}`: approval declined", action.command);
        }
        action.approve()?;
    }

    let executor = ActionExecutor::new(Arc::new(LocalWorkspace::new(&ctx.root)), ctx.config.executor.clone());

    if args.interactive {
        let process = executor.run_interactive(&action.command, None)?;
        let code = process.exit.await?;
        if code != Some(0) {
            bail!("`{}` exited with {:?}", action.command, code);
        }
        return Ok(());
    }

    let cancel = cancel_on_ctrl_c();
    let result = executor.execute_command(&mut action, &cancel).await;
    if let Some(output) = &action.output {
        print!("{}", output);
    }
    match result {
        Ok(out) if out.truncated => {
            eprintln!("(output truncated at {} bytes)", ctx.config.executor.max_output_bytes);
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
