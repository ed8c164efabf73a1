//! CLI: error presentation and exit codes.

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
fn missing_task_is_a_user_error() {
    let home = TempDir::new().unwrap();
    let output = cmd(&home).args(["sbi", "get", "ghost"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NotFound"), "stderr: {stderr}");
}

#[test]
#[serial]
fn json_errors_carry_the_taxonomy() {
    let home = TempDir::new().unwrap();
    let output = cmd(&home)
        .args(["--output", "json", "sbi", "get", "ghost"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout must be JSON");
    assert_eq!(parsed["taxonomy"], "NotFound");
    assert_eq!(parsed["retryable"], false);
    assert!(parsed["details"].as_str().unwrap().contains("ghost"));
}

#[test]
#[serial]
fn create_then_get_round_trips() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["sbi", "create", "--id", "s1", "--title", "demo task"])
        .assert()
        .success();

    let output = cmd(&home)
        .args(["--output", "json", "sbi", "get", "s1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["id"], "s1");
    assert_eq!(parsed["kind"], "SBI");
    assert_eq!(parsed["status"], "PENDING");
}

#[test]
#[serial]
fn delete_with_live_children_is_refused() {
    let home = TempDir::new().unwrap();
    cmd(&home)
        .args(["epic", "create", "--id", "e1", "--title", "epic"])
        .assert()
        .success();
    cmd(&home)
        .args(["pbi", "create", "--id", "p1", "--title", "pbi", "--parent", "e1"])
        .assert()
        .success();

    let output = cmd(&home).args(["epic", "delete", "e1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
}
