use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
use cli::{Cli, Commands, Context};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let ctx = Context::load(cli.root.as_deref(), cli.config.as_deref())?;
    debug!("Project root: {}", ctx.root.display());

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Classify(args) => runtime.block_on(cli::commands::classify::execute(args))?,
        Commands::Check(args) => cli::commands::check::execute(args, &ctx)?,
        Commands::Actions(args) => runtime.block_on(cli::commands::actions::execute(args, &ctx))?,
        Commands::Run(args) => runtime.block_on(cli::commands::run::execute(args, &ctx))?,
        Commands::Fix(args) => runtime.block_on(cli::commands::fix::execute(args, ctx))?,
        Commands::Init(args) => cli::commands::init::execute(args, &ctx)?,
    }

    Ok(())
}
