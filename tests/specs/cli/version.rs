//! CLI: version output in both formats.

use assert_cmd::Command;

#[test]
fn version_prints_the_package_version() {
    let output = Command::cargo_bin("deespec")
        .unwrap()
        .arg("version")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_as_json() {
    let output = Command::cargo_bin("deespec")
        .unwrap()
        .args(["--output", "json", "version"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout must be JSON");
    assert_eq!(parsed["version"], env!("CARGO_PKG_VERSION"));
}
