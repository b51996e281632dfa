//! CLI argument parsing for the tub operational helpers.
//!
//! Each subcommand is a leaf: it owns its inputs and never calls another
//! subcommand. Defaults reproduce the paths the backend and firmware trees use.
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Default test command, run inside `--dir`.
pub const DEFAULT_TEST_COMMAND: &str = "make test";

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "tubops",
    version,
    about = "Operational helpers: test reports, production log fetch, build env flags",
    after_help = "Commands:\n  test-report                Run the backend test suite and summarize failures\n  fetch-logs                 Download production logs and state over FTPS\n  env-flags                  Emit build defines from a project .env file\n\nExamples:\n  tubops test-report --dir backend\n  tubops fetch-logs --since \"2 hours ago\"\n  tubops fetch-logs --list --since yesterday\n  tubops env-flags --project-dir esp32",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    TestReport(TestReportArgs),
    FetchLogs(FetchLogsArgs),
    EnvFlags(EnvFlagsArgs),
}

/// Test summarizer inputs.
#[derive(Parser, Debug)]
#[command(about = "Run the test suite and report failures and errors")]
pub struct TestReportArgs {
    /// Directory the test command runs in
    #[arg(long, value_name = "DIR", default_value = "backend")]
    pub dir: PathBuf,

    /// Test command, split with shell quoting rules
    #[arg(long, value_name = "CMD", default_value = DEFAULT_TEST_COMMAND)]
    pub command: String,

    /// JUnit XML result file, relative to --dir unless absolute
    #[arg(long, value_name = "PATH", default_value = "tests/results/junit.xml")]
    pub junit: PathBuf,

    /// Give up on the test command after this long (e.g. 5m, 90s)
    #[arg(long, value_name = "DURATION", default_value = "5m", value_parser = parse_duration)]
    pub timeout: Duration,

    /// Where to persist the rendered report (default: <tmp>/backend_test_results.md)
    #[arg(long, value_name = "PATH")]
    pub report_path: Option<PathBuf>,

    /// Emit machine-readable JSON instead of the markdown report
    #[arg(long)]
    pub json: bool,
}

/// Production fetch inputs.
#[derive(Parser, Debug)]
#[command(
    about = "Fetch production logs and state files over FTPS",
    after_help = "Examples:\n  tubops fetch-logs                           Full download\n  tubops fetch-logs --since \"2 hours ago\"     Last 2 hours\n  tubops fetch-logs --since yesterday         Since yesterday\n  tubops fetch-logs --since \"Jan 25 2pm\"      Since specific time\n  tubops fetch-logs --list                    List files only\n  tubops fetch-logs --list --since \"1 day ago\""
)]
pub struct FetchLogsArgs {
    /// Only files modified after this time (e.g. "2 hours ago", "yesterday")
    #[arg(long, value_name = "WHEN")]
    pub since: Option<String>,

    /// List remote files without downloading
    #[arg(long)]
    pub list: bool,

    /// Keep .gz files compressed
    #[arg(long)]
    pub no_decompress: bool,

    /// Output directory (default: <tmp>/prod-debug-TIMESTAMP)
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Credentials file with FTP_HOST, FTP_USERNAME, FTP_PASSWORD, relative to
    /// the working directory (run from the backend tree or pass a path)
    #[arg(long, value_name = "PATH", default_value = "config/env.production")]
    pub env_file: PathBuf,
}

/// Output shape for `env-flags`.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlagFormat {
    /// One `-D KEY="value"` flag per line (PlatformIO dynamic build_flags)
    BuildFlags,
    /// `cargo:rustc-env=KEY=VALUE` lines for a build script
    Cargo,
}

/// Build environment injector inputs.
#[derive(Parser, Debug)]
#[command(about = "Emit compile-time defines from a project .env file")]
pub struct EnvFlagsArgs {
    /// Project directory holding the env file
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Env file name, relative to --project-dir
    #[arg(long, value_name = "PATH", default_value = ".env")]
    pub env_file: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = FlagFormat::BuildFlags)]
    pub format: FlagFormat,
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw).map_err(|err| format!("invalid duration {raw:?}: {err}"))
}
