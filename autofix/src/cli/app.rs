use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "autofix",
    version,
    about = "Autofix - repair build, lint and test failures with a language model",
    long_about = "Autofix classifies compiler, linter and test output into structured errors, asks a language model for a fix, applies the returned edits and commands behind a safety gate, and re-runs the check until the errors are gone or the retry budget is spent."
)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify errors in a log
    #[command(about = "Classify errors in build, lint or test output")]
    Classify(ClassifyArgs),

    /// Check whether a command needs approval
    #[command(about = "Show the safety verdict for a shell command")]
    Check(CheckArgs),

    /// Parse a model response into actions
    #[command(about = "List the file and command actions in a model response")]
    Actions(ActionsArgs),

    /// Run a command through the safety gate
    #[command(about = "Run a shell command, asking for approval when it is dangerous")]
    Run(RunArgs),

    /// Run a check command and repair what it reports
    #[command(about = "Run a command, classify its errors and fix them")]
    Fix(FixArgs),

    /// Write a default configuration file
    #[command(about = "Write the default configuration to .autofix.toml")]
    Init(InitArgs),
}

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Log file to classify (stdin when omitted)
    pub file: Option<PathBuf>,

    /// Print errors as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Command to assess
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Print the verdict as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ActionsArgs {
    /// File holding the model response (stdin when omitted)
    pub file: Option<PathBuf>,

    /// Print actions as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command to run
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Attach the command to this terminal instead of capturing output
    #[arg(short, long)]
    pub interactive: bool,

    /// Approve dangerous commands without asking
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug)]
pub struct FixArgs {
    /// Check command whose output lists the errors, e.g. "cargo build"
    #[arg(long)]
    pub command: String,

    /// Attempts per error
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Approve dangerous commands and deletions without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Stream model responses
    #[arg(long)]
    pub stream: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Write to the user config directory instead of the project
    #[arg(long)]
    pub user: bool,

    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fix_and_check() {
        let cli = Cli::parse_from(["autofix", "-vv", "fix", "--command", "cargo build", "--max-retries", "2", "--yes"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Fix(args) => {
                assert_eq!(args.command, "cargo build");
                assert_eq!(args.max_retries, Some(2));
                assert!(args.yes);
            }
            other => panic!("unexpected {:?}", other),
        }

        let cli = Cli::parse_from(["autofix", "check", "rm", "-rf", "/tmp/x"]);
        match cli.command {
            Commands::Check(args) => assert_eq!(args.command.join(" "), "rm -rf /tmp/x"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
