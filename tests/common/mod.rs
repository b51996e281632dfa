//! Shared helpers for the `tubops` integration tests.

use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Run the built `tubops` binary with `args` inside `cwd`.
pub fn run_tubops(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tubops"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .output()
        .expect("spawn tubops")
}

/// Check if a tool is available on PATH; print a skip notice if not.
#[allow(dead_code)]
pub fn skip_if_missing(tool: &str) -> bool {
    let missing = which::which(tool).is_err();
    if missing {
        eprintln!("Skipping: {tool} not available");
    }
    missing
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
