//! Safety verdict for a command

use crate::cli::Context;
use crate::cli::app::CheckArgs;
use anyhow::Result;

pub fn execute(args: CheckArgs, ctx: &Context) -> Result<()> {
    let policy = ctx.config.safety.build()?;
    let command = args.command.join(" ");
    let verdict = policy.assess(&command);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    } else if verdict.safe {
        println!("safe: {}", command);
    } else {
        println!("requires approval: {}", verdict.reason);
    }
    Ok(())
}
