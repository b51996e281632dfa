//! Test-suite summarizer.
//!
//! Runs the backend test command, pulls failure records out of both the
//! runner's text output and its JUnit XML file, and renders a markdown report
//! grouped by file. A failing test run is the expected input, not an error.
use crate::cli::TestReportArgs;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

mod junit;
mod render;
mod run;
mod text;

pub use junit::parse_junit_file;
pub use render::render_report;
pub use run::{run_test_command, TestRun};
pub use text::parse_text_output;

const REPORT_FILE_NAME: &str = "backend_test_results.md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Failure,
    Error,
}

/// One failed or errored test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub test_name: String,
    pub message: String,
    pub file: String,
    pub line: Option<u32>,
    pub kind: FailureKind,
    /// Runner-provided failure class (e.g. an exception type), JUnit only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

impl FailureRecord {
    fn dedup_key(&self) -> (&str, &str, Option<u32>) {
        (&self.test_name, &self.file, self.line)
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    return_code: i32,
    timed_out: bool,
    failure_count: usize,
    failures: &'a [FailureRecord],
}

/// Concatenate text and JUnit records, keeping the first of each
/// `(test_name, file, line)`.
pub fn merge_failures(text: Vec<FailureRecord>, junit: Vec<FailureRecord>) -> Vec<FailureRecord> {
    let mut unique: Vec<FailureRecord> = Vec::new();
    let mut seen: HashSet<(String, String, Option<u32>)> = HashSet::new();
    for record in text.into_iter().chain(junit) {
        let (test_name, file, line) = record.dedup_key();
        if seen.insert((test_name.to_string(), file.to_string(), line)) {
            unique.push(record);
        }
    }
    unique
}

/// Group records by file, in the order each file first appears.
pub fn group_by_file(records: &[FailureRecord]) -> Vec<(&str, Vec<&FailureRecord>)> {
    let mut groups: Vec<(&str, Vec<&FailureRecord>)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(file, _)| *file == record.file) {
            Some((_, entries)) => entries.push(record),
            None => groups.push((&record.file, vec![record])),
        }
    }
    groups
}

pub fn default_report_path() -> PathBuf {
    std::env::temp_dir().join(REPORT_FILE_NAME)
}

pub fn summarize(args: TestReportArgs) -> Result<()> {
    let argv = shell_words::split(&args.command)
        .with_context(|| format!("parse test command: {}", args.command))?;
    if argv.is_empty() {
        return Err(anyhow!("test command is empty"));
    }
    let junit_path = if args.junit.is_absolute() {
        args.junit.clone()
    } else {
        args.dir.join(&args.junit)
    };

    eprintln!("🧪 Running backend test suite...");
    let run = run_test_command(&args.dir, &argv, &junit_path, args.timeout);
    tracing::info!(
        return_code = run.return_code,
        timed_out = run.timed_out,
        stdout_bytes = run.stdout.len(),
        stderr_bytes = run.stderr.len(),
        "test command finished"
    );

    let text_failures = parse_text_output(&run.stdout, &run.stderr);
    let junit_failures = parse_junit_file(&junit_path);
    tracing::debug!(
        text = text_failures.len(),
        junit = junit_failures.len(),
        "parsed failure records"
    );
    let failures = merge_failures(text_failures, junit_failures);
    let report = render_report(&failures, &run);

    if args.json {
        let json = serde_json::to_string_pretty(&JsonReport {
            return_code: run.return_code,
            timed_out: run.timed_out,
            failure_count: failures.len(),
            failures: &failures,
        })
        .context("serialize test report JSON")?;
        println!("{json}");
    } else {
        println!("{report}");
    }

    let report_path = args.report_path.unwrap_or_else(default_report_path);
    match persist_report(&report_path, &report) {
        Ok(()) => println!("\nResults also saved to: {}", report_path.display()),
        Err(err) => {
            let error = format!("{err:#}");
            tracing::warn!(path = %report_path.display(), %error, "could not save report");
        }
    }
    Ok(())
}

/// Write through a sibling temp file so readers never see a half report.
fn persist_report(path: &Path, report: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    tmp.write_all(report.as_bytes())
        .with_context(|| format!("write {}", tmp.path().display()))?;
    tmp.persist(path)
        .with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}
