use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod env_inject;
mod fetch;
mod test_report;
mod util;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_logging(args.verbose);

    match args.command {
        Command::TestReport(args) => test_report::summarize(args),
        Command::FetchLogs(args) => fetch::fetch_logs(args),
        Command::EnvFlags(args) => env_inject::env_flags(args),
    }
}

/// Diagnostics go to stderr; stdout carries reports and flags.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
