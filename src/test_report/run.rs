use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Outcome of one test command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRun {
    /// Exit code, or -1 when the command never produced one.
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl TestRun {
    fn aborted(stderr: String, timed_out: bool) -> Self {
        Self {
            return_code: -1,
            stdout: String::new(),
            stderr,
            timed_out,
        }
    }
}

/// Run the test command in `dir`, bounded by `timeout`.
///
/// Never fails: launch errors and timeouts come back as a `TestRun` whose
/// stderr explains what happened.
pub fn run_test_command(dir: &Path, argv: &[String], junit_path: &Path, timeout: Duration) -> TestRun {
    if let Some(parent) = junit_path.parent() {
        if let Err(err) = fs::create_dir_all(parent) {
            tracing::warn!(path = %parent.display(), %err, "could not create results directory");
        }
    }
    match spawn_and_wait(dir, argv, timeout) {
        Ok(Captured::Exited {
            status,
            stdout,
            stderr,
        }) => TestRun {
            return_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            timed_out: false,
        },
        Ok(Captured::TimedOut) => TestRun::aborted(
            format!(
                "Test suite timed out after {}",
                humantime::format_duration(timeout)
            ),
            true,
        ),
        Err(err) => {
            let error = format!("{err:#}");
            tracing::warn!(%error, "test command did not run");
            TestRun::aborted(format!("Failed to run tests: {error}"), false)
        }
    }
}

enum Captured {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
    },
    TimedOut,
}

fn spawn_and_wait(dir: &Path, argv: &[String], timeout: Duration) -> Result<Captured> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("test command is empty"))?;
    let program = resolve_program(program)?;

    // Output goes to unnamed temp files rather than pipes: the child can
    // write any amount while we poll, and there is no reader thread.
    let mut stdout_file = tempfile::tempfile().context("create stdout capture file")?;
    let mut stderr_file = tempfile::tempfile().context("create stderr capture file")?;

    let start = Instant::now();
    let mut child = Command::new(&program)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout_file.try_clone()?))
        .stderr(Stdio::from(stderr_file.try_clone()?))
        .spawn()
        .with_context(|| format!("spawn {} in {}", program.display(), dir.display()))?;

    let status = loop {
        if let Some(status) = child.try_wait().context("check test command status")? {
            break status;
        }
        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(elapsed_ms = start.elapsed().as_millis(), "test command timed out");
            return Ok(Captured::TimedOut);
        }
        std::thread::sleep(POLL_INTERVAL);
    };

    Ok(Captured::Exited {
        status,
        stdout: read_capture(&mut stdout_file).context("read test stdout")?,
        stderr: read_capture(&mut stderr_file).context("read test stderr")?,
    })
}

/// Bare program names go through PATH lookup so a missing tool is reported
/// by name; anything with a path separator is used as given.
fn resolve_program(program: &str) -> Result<PathBuf> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Ok(PathBuf::from(program));
    }
    which::which(program).with_context(|| format!("{program} not found on PATH"))
}

fn read_capture(file: &mut File) -> Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    fn have(program: &str) -> bool {
        which::which(program).is_ok()
    }

    #[test]
    fn captures_exit_code_and_both_streams() {
        if !have("sh") {
            eprintln!("Skipping: sh not available");
            return;
        }
        let dir = tempfile::TempDir::new().expect("tempdir");
        let junit = dir.path().join("tests/results/junit.xml");
        let run = run_test_command(
            dir.path(),
            &argv(&["sh", "-c", "echo out; echo err >&2; exit 3"]),
            &junit,
            Duration::from_secs(30),
        );
        assert_eq!(run.return_code, 3);
        assert_eq!(run.stdout.trim(), "out");
        assert_eq!(run.stderr.trim(), "err");
        assert!(!run.timed_out);
        assert!(junit.parent().expect("parent").is_dir());
    }

    #[test]
    fn large_output_does_not_block_the_wait_loop() {
        if !have("sh") {
            eprintln!("Skipping: sh not available");
            return;
        }
        let dir = tempfile::TempDir::new().expect("tempdir");
        let run = run_test_command(
            dir.path(),
            &argv(&["sh", "-c", "i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done"]),
            &dir.path().join("junit.xml"),
            Duration::from_secs(60),
        );
        assert_eq!(run.return_code, 0);
        assert_eq!(run.stdout.lines().count(), 20000);
    }

    #[test]
    fn timeout_reports_an_empty_run() {
        if !have("sleep") {
            eprintln!("Skipping: sleep not available");
            return;
        }
        let dir = tempfile::TempDir::new().expect("tempdir");
        let run = run_test_command(
            dir.path(),
            &argv(&["sleep", "5"]),
            &dir.path().join("junit.xml"),
            Duration::from_millis(100),
        );
        assert!(run.timed_out);
        assert_eq!(run.return_code, -1);
        assert!(run.stdout.is_empty());
        assert!(run.stderr.starts_with("Test suite timed out after"));
    }

    #[test]
    fn launch_failure_is_reported_not_raised() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let run = run_test_command(
            dir.path(),
            &argv(&["definitely-not-a-real-test-runner-xyz"]),
            &dir.path().join("junit.xml"),
            Duration::from_secs(1),
        );
        assert_eq!(run.return_code, -1);
        assert!(!run.timed_out);
        assert!(run.stderr.starts_with("Failed to run tests:"));
    }
}
