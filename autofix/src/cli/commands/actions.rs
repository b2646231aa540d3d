//! Show the actions a model response would produce

use crate::cli::app::ActionsArgs;
use crate::cli::{Context, read_input};
use anyhow::Result;
use autofix_core::actions::{ActionParser, DiffStat, FileOp, LocalWorkspace};
use std::sync::Arc;

pub async fn execute(args: ActionsArgs, ctx: &Context) -> Result<()> {
    let response = read_input(args.file.as_deref()).await?;
    let parser = ActionParser::new(Arc::new(LocalWorkspace::new(&ctx.root)), ctx.config.safety.build()?);
    let actions = parser.parse(&response).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&actions)?);
        return Ok(());
    }

    if actions.is_empty() {
        println!("No actions found.");
        return Ok(());
    }

    for action in &actions.files {
        let detail = match (action.op, &action.prior_content, &action.new_content) {
            (FileOp::Edit, Some(old), Some(new)) => format!(" ({})", DiffStat::between(old, new)),
            (FileOp::Create, _, Some(new)) => format!(" ({} lines)", new.lines().count()),
            _ => String::new(),
        };
        let gate = if action.requires_approval() { "  [needs approval]" } else { "" };
        println!("  {}{}{}", action.describe(), detail, gate);
    }
    for action in &actions.commands {
        let gate = if action.is_dangerous { "  [needs approval]" } else { "" };
        println!("  run `{}`{}", action.command, gate);
    }
    Ok(())
}
