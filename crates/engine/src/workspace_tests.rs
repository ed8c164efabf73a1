// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

#[test]
fn init_creates_layout_and_default_prompts() {
    let dir = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path());
    ws.init().unwrap();

    assert!(ws.specs_dir("sbi").is_dir());
    assert!(ws.specs_dir("pbi").is_dir());
    assert!(ws.base().join("var").is_dir());
    for name in ["WIP.md", "REVIEW.md", "REVIEW_AND_WIP.md", "PBI_DECOMPOSE.md"] {
        assert!(ws.prompt_path(name).is_file(), "missing {name}");
    }
}

#[test]
fn init_does_not_clobber_customized_prompts() {
    let dir = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path());
    ws.init().unwrap();

    std::fs::write(ws.prompt_path("WIP.md"), "customized").unwrap();
    ws.init().unwrap();
    assert_eq!(
        std::fs::read_to_string(ws.prompt_path("WIP.md")).unwrap(),
        "customized"
    );
}

#[test]
fn paths_are_rooted_at_base() {
    let ws = Workspace::new("/data/deespec");
    let id = TaskId::new("sbi-1");
    assert_eq!(ws.db_path(), Path::new("/data/deespec/deespec.db"));
    assert_eq!(
        ws.journal_path(),
        Path::new("/data/deespec/var/journal.ndjson")
    );
    assert_eq!(ws.sbi_dir(&id), Path::new("/data/deespec/specs/sbi/sbi-1"));
    assert_eq!(
        ws.label_prompt_path("backend"),
        Path::new("/data/deespec/prompts/labels/backend.md")
    );
}

#[test]
fn check_contained_accepts_inside_paths() {
    let dir = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path());
    ws.init().unwrap();

    let spec = ws.sbi_dir(&TaskId::new("s1"));
    std::fs::create_dir_all(&spec).unwrap();
    ws.check_contained(&spec).unwrap();
}

#[test]
fn check_contained_rejects_outside_paths() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path());
    ws.init().unwrap();

    assert!(ws.check_contained(outside.path()).is_err());
}

#[cfg(unix)]
#[test]
fn check_contained_rejects_symlinks() {
    let dir = TempDir::new().unwrap();
    let outside = TempDir::new().unwrap();
    let ws = Workspace::new(dir.path());
    ws.init().unwrap();

    let link = ws.specs_dir("sbi").join("sneaky");
    std::os::unix::fs::symlink(outside.path(), &link).unwrap();
    assert!(ws.check_contained(&link).is_err());
}
