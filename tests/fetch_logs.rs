//! `tubops fetch-logs` failures that must happen before any connection.

mod common;

use common::{run_tubops, stderr, stdout};
use std::fs;
use tempfile::TempDir;

#[test]
fn missing_credentials_file_is_fatal() {
    let temp = TempDir::new().expect("tempdir");

    let output = run_tubops(temp.path(), &["fetch-logs", "--list"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("config/env.production not found"));
    assert!(!stdout(&output).contains("Connecting to"));
}

#[test]
fn missing_password_is_fatal_before_connecting() {
    let temp = TempDir::new().expect("tempdir");
    let env_file = temp.path().join("env.production");
    // Port 9 on a reserved address: a connection attempt would hang or fail loudly.
    fs::write(&env_file, "FTP_HOST=192.0.2.1\nFTP_USERNAME=tub\nFTP_PORT=9\n").expect("write env");

    let output = run_tubops(
        temp.path(),
        &["fetch-logs", "--list", "--env-file", "env.production"],
    );

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Missing FTP credentials"), "{err}");
    assert!(err.contains("FTP_PASSWORD: MISSING"), "{err}");
    assert!(!stdout(&output).contains("Connecting to"));
}

#[test]
fn unparseable_since_is_a_usage_error() {
    let temp = TempDir::new().expect("tempdir");

    let output = run_tubops(temp.path(), &["fetch-logs", "--since", "whenever"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Could not parse time expression: 'whenever'"), "{err}");
    assert!(err.contains("2 hours ago"), "{err}");
}
