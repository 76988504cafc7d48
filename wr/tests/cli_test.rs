//! CLI behavior against a throwaway state directory

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Write a config pointing the state dir into `temp`
fn config_file(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("writer.yml");
    let state = temp.path().join("state");
    fs::write(&path, format!("state-dir: {}\n", state.display())).unwrap();
    path
}

fn wr(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("wr").unwrap();
    cmd.arg("--config").arg(config);
    cmd
}

#[test]
fn test_init_creates_channels() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);

    wr(&config)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("editor→outline"));

    let fifo_dir = temp.path().join("state").join("fifo");
    for name in [
        "editor_to_outline",
        "outline_to_editor",
        "editor_to_suggestions",
        "suggestions_to_editor",
    ] {
        assert!(fifo_dir.join(name).exists(), "{} missing", name);
    }
    assert!(temp.path().join("state").join("logs").join("writer.log").exists());
}

#[test]
fn test_context_and_request_leave_marker() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);
    let doc = temp.path().join("paper.md");
    fs::write(&doc, "# Paper\n\nFirst paragraph.\n").unwrap();

    wr(&config)
        .args(["context", doc.to_str().unwrap(), "--cursor", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cursor at 3"));
    wr(&config).args(["request", "suggestions"]).assert().success();

    let state = temp.path().join("state");
    assert!(state.join("request_suggestions").exists());
    let context: serde_json::Value = serde_json::from_str(&fs::read_to_string(state.join("context.json")).unwrap()).unwrap();
    assert_eq!(context["cursor_line"], 3);
    assert_eq!(context["lines"][2], "First paragraph.");
}

#[test]
fn test_fill_section_needs_heading() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);

    wr(&config)
        .args(["request", "fill-section"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--heading"));

    wr(&config)
        .args(["request", "fill-section", "--heading", "Method"])
        .assert()
        .success();
    assert!(temp.path().join("state").join("request_fill_section").exists());
}

#[test]
fn test_preview_show_without_batch() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);

    wr(&config)
        .args(["preview", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No suggestions yet"));
    wr(&config)
        .args(["preview", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("null"));
}

#[test]
fn test_preview_clear_leaves_marker() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);

    wr(&config)
        .args(["preview", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("clearing"));
    assert!(temp.path().join("state").join("preview_clear").exists());
}

#[test]
fn test_send_without_reader_is_dropped() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);
    wr(&config).arg("init").assert().success();

    wr(&config)
        .args(["send", "editor_to_outline", "cursor_pos", r#"{"line": 4}"#])
        .assert()
        .success()
        .stdout(predicate::str::contains("No reader"));
}

#[test]
fn test_send_rejects_unknown_channel_and_bad_json() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);

    wr(&config)
        .args(["send", "editor_to_nowhere", "cursor_pos"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown channel"));
    wr(&config)
        .args(["send", "editor_to_outline", "cursor_pos", "{not json"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("writer.yml");
    fs::write(&path, "suggestions:\n  count: 9\n").unwrap();

    wr(&path)
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("count"));
}
