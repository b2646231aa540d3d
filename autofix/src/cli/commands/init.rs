//! Write the default configuration

use crate::cli::Context;
use crate::cli::app::InitArgs;
use anyhow::{Context as _, Result, bail};
use autofix_core::AutofixConfig;
use autofix_core::config::PROJECT_CONFIG_FILE;

pub fn execute(args: InitArgs, ctx: &Context) -> Result<()> {
    let path = if args.user {
        AutofixConfig::user_config_path().context("No user config directory on this platform")?
    } else {
        ctx.root.join(PROJECT_CONFIG_FILE)
    };

    if path.exists() && !args.force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    AutofixConfig::default().save(&path)?;
    println!("Wrote {}", path.display());
    Ok(())
}
