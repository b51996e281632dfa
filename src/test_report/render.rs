use super::{group_by_file, FailureRecord, TestRun};

pub const SUCCESS_MESSAGE: &str =
    "✅ All backend tests passed successfully! No failures or errors to report.";
const SUITE_LABEL: &str = "Backend (PHPUnit)";

/// Render the markdown report for a set of deduplicated records.
pub fn render_report(failures: &[FailureRecord], run: &TestRun) -> String {
    if failures.is_empty() {
        return SUCCESS_MESSAGE.to_string();
    }

    let mut out: Vec<String> = vec![
        format!(
            "❌ Backend Test Suite Results: {} failure(s)/error(s) found",
            failures.len()
        ),
        String::new(),
        "## Test Failures and Errors".to_string(),
        String::new(),
    ];

    for (file, entries) in group_by_file(failures) {
        out.push(format!("### {file}"));
        out.push(String::new());
        for failure in entries {
            let line_info = failure
                .line
                .map(|line| format!(":{line}"))
                .unwrap_or_default();
            let type_info = match failure.subtype.as_deref() {
                Some(subtype) if !subtype.is_empty() => format!(" ({subtype})"),
                _ => String::new(),
            };
            out.push(format!("**{}**{type_info}", failure.test_name));
            out.push(format!("Location: `{file}{line_info}`"));
            out.push(String::new());
            out.push("```".to_string());
            out.push(failure.message.clone());
            out.push("```".to_string());
            out.push(String::new());
        }
    }

    out.push("---".to_string());
    out.push(String::new());
    out.push("**Test Run Summary:**".to_string());
    out.push(format!("- Return Code: {}", run.return_code));
    out.push(format!("- Total Failures/Errors: {}", failures.len()));
    out.push(format!("- Test Suite: {SUITE_LABEL}"));
    out.join("\n")
}
