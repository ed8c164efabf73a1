//! CLI: workflow status output.

use assert_cmd::Command;
use serial_test::serial;
use tempfile::TempDir;

fn cmd(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("deespec").unwrap();
    cmd.env("DEESPEC_HOME", home.path());
    cmd
}

#[test]
#[serial]
fn status_reports_counts_locks_and_stats() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["sbi", "create", "--id", "s1", "--title", "demo"])
        .assert()
        .success();

    let output = cmd(&home).args(["workflow", "status"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("PENDING: 1"), "stdout: {stdout}");
    assert!(stdout.contains("no live run-locks"));
    // No run loop has executed yet
    assert!(stdout.contains("no runner stats recorded"));
}

#[test]
#[serial]
fn status_as_json_carries_the_runner_field() {
    let home = TempDir::new().unwrap();
    let output = cmd(&home)
        .args(["--output", "json", "workflow", "status"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout must be JSON");
    assert!(parsed["statuses"].is_array());
    assert!(parsed["run_locks"].is_array());
    // Present but null until a runner has snapshotted stats
    assert!(parsed.get("runner").is_some());
    assert!(parsed["runner"].is_null());
}
