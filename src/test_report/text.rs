//! Failure extraction from the runner's plain-text output.
//!
//! The block shape follows PHPUnit's defect listing:
//!
//! ```text
//! 1) Tests\Unit\ThermostatTest::testHeatTarget
//! Failed asserting that false is true.
//!
//! /srv/backend/tests/Unit/ThermostatTest.php:42
//! ```
//!
//! Another runner's output format needs its own block and location patterns.
use super::{FailureKind, FailureRecord};
use regex::Regex;
use std::sync::OnceLock;

const UNKNOWN_FILE: &str = "Unknown";

fn block_header() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| Regex::new(r"^\d+\)\s+(.+)$").expect("valid block header regex"))
}

fn location() -> &'static Regex {
    static LOCATION: OnceLock<Regex> = OnceLock::new();
    LOCATION.get_or_init(|| {
        Regex::new(r"^(/[^:]+\.\w+):(\d+)").expect("valid location regex")
    })
}

/// Scan combined stdout/stderr for numbered failure blocks.
pub fn parse_text_output(stdout: &str, stderr: &str) -> Vec<FailureRecord> {
    let combined = format!("{stdout}\n{stderr}");
    let lines: Vec<&str> = combined.split('\n').collect();

    let mut failures = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !block_header().is_match(line.trim()) {
            continue;
        }
        if let Some(record) = parse_failure_block(&lines, idx) {
            failures.push(record);
        }
    }
    failures
}

/// Parse the block whose header sits at `start`. Returns `None` for a block
/// that does not hold together; the caller skips it.
fn parse_failure_block(lines: &[&str], start: usize) -> Option<FailureRecord> {
    let header = lines.get(start)?.trim();
    let test_name = block_header().captures(header)?.get(1)?.as_str().to_string();

    let mut message_lines: Vec<&str> = Vec::new();
    let mut file_info: Option<(String, Option<u32>)> = None;

    for raw in lines.iter().skip(start + 1) {
        let line = raw.trim();
        if block_header().is_match(line) {
            break;
        }
        if let Some(caps) = location().captures(line) {
            // The first location is the test file; later ones are stack frames.
            if file_info.is_none() {
                let file = caps.get(1)?.as_str().to_string();
                let line_no = caps.get(2).and_then(|m| m.as_str().parse().ok());
                file_info = Some((file, line_no));
            }
            continue;
        }
        if !line.is_empty() && !line.starts_with("---") && !line.starts_with("+++") {
            message_lines.push(line);
        }
    }

    let (file, line) = file_info.unwrap_or_else(|| (UNKNOWN_FILE.to_string(), None));
    Some(FailureRecord {
        test_name,
        message: message_lines.join("\n").trim().to_string(),
        file,
        line,
        kind: FailureKind::Failure,
        subtype: None,
    })
}
