//! Integration tests for covdiff CLI

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

fn run_covdiff(dir: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_covdiff"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();

    (stdout, stderr, success)
}

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

const OLD_SRC: &str = "package a\n\nfunc f() {\n\tg()\n}\n";
const NEW_SRC: &str = "package a\n\nfunc f() {\n\tg()\n\th()\n}\n";

#[test]
fn test_cli_help() {
    let dir = tempdir().unwrap();
    let (stdout, _, success) = run_covdiff(dir.path(), &["--help"]);

    assert!(success);
    assert!(stdout.contains("covdiff"));
    assert!(stdout.contains("merge"));
    assert!(stdout.contains("summary"));
}

#[test]
fn test_cli_version() {
    let dir = tempdir().unwrap();
    let (stdout, _, success) = run_covdiff(dir.path(), &["--version"]);

    assert!(success);
    assert!(stdout.contains("covdiff"));
}

#[test]
fn test_diff_table_output() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("old.go"), OLD_SRC).unwrap();
    fs::write(dir.path().join("new.go"), NEW_SRC).unwrap();

    let (stdout, _, success) = run_covdiff(dir.path(), &["diff", "old.go", "new.go"]);

    assert!(success);
    assert!(stdout.contains("Kind"));
    assert!(stdout.contains("unchanged"));
    assert!(stdout.contains("inserted"));
}

#[test]
fn test_diff_json_output() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("old.go"), OLD_SRC).unwrap();
    fs::write(dir.path().join("new.go"), NEW_SRC).unwrap();

    let (stdout, _, success) =
        run_covdiff(dir.path(), &["diff", "old.go", "new.go", "--output", "json"]);

    assert!(success);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON output");
    let ranges = parsed.as_array().unwrap();
    assert!(ranges.iter().any(|r| r["kind"] == "inserted" && r["newStart"] == 5));
}

#[test]
fn test_profile_normalize() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("cover.out"),
        "mode: set\na.go:1.1,2.2 1 3\n\na.go:3.1,4.2 1 0\n",
    )
    .unwrap();

    let (stdout, _, success) = run_covdiff(dir.path(), &["profile", "cover.out", "--normalize"]);

    assert!(success);
    assert_eq!(stdout, "mode: set\na.go:1.1,2.2 1 1\na.go:3.1,4.2 1 0\n");
}

#[test]
fn test_invalid_profile_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("cover.out"), "mode: set\nnot a block\n").unwrap();

    let (_, stderr, success) = run_covdiff(dir.path(), &["profile", "cover.out"]);

    assert!(!success);
    assert!(stderr.contains("line 2"));
}

#[test]
fn test_merge_without_repo_adds_counters() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("old.out"),
        "mode: count\na.go:1.1,2.2 1 3\na.go:3.1,4.2 1 4\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("new.out"),
        "mode: count\na.go:1.1,2.2 1 3\na.go:3.1,4.2 1 4\n",
    )
    .unwrap();

    let (stdout, _, success) =
        run_covdiff(dir.path(), &["merge", "--old", "old.out", "--new", "new.out"]);

    assert!(success);
    assert_eq!(stdout, "mode: count\na.go:1.1,2.2 1 6\na.go:3.1,4.2 1 8\n");
}

#[test]
fn test_merge_counter_mismatch_fails() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("old.out"), "mode: count\na.go:1.1,2.2 1 3\n").unwrap();
    fs::write(
        dir.path().join("new.out"),
        "mode: count\na.go:1.1,2.2 1 3\na.go:3.1,4.2 1 4\n",
    )
    .unwrap();

    let (_, stderr, success) =
        run_covdiff(dir.path(), &["merge", "--old", "old.out", "--new", "new.out"]);

    assert!(!success);
    assert!(stderr.contains("counter count mismatch"));
}

#[test]
fn test_merge_writes_output_file() {
    let dir = tempdir().unwrap();
    let profile = "mode: set\na.go:1.1,2.2 1 1\n";
    fs::write(dir.path().join("old.out"), profile).unwrap();
    fs::write(dir.path().join("new.out"), profile).unwrap();

    let (stdout, _, success) = run_covdiff(
        dir.path(),
        &["merge", "--old", "old.out", "--new", "new.out", "-o", "merged.out"],
    );

    assert!(success);
    assert!(stdout.is_empty());
    let merged = fs::read_to_string(dir.path().join("merged.out")).unwrap();
    assert_eq!(merged, profile);
}

#[test]
fn test_summary_of_working_tree() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.go"), NEW_SRC).unwrap();
    fs::write(
        dir.path().join("cover.out"),
        "mode: set\nexample.com/m/a.go:3.10,4.5 1 1\nexample.com/m/a.go:5.2,6.2 1 0\n",
    )
    .unwrap();

    let (stdout, stderr, success) = run_covdiff(
        dir.path(),
        &[
            "summary",
            "--profile",
            "cover.out",
            "--strip-prefix",
            "example.com/m",
            "--output",
            "json",
        ],
    );

    assert!(success, "stderr: {stderr}");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("Invalid JSON output");
    let total = &parsed[""]["detail"]["total"];
    assert_eq!(total["covered"], 2);
    assert_eq!(total["total"], 4);
    assert_eq!(total["value"], 0.5);
    assert_eq!(parsed[""]["detail"]["incremental"]["total"], 0);
}

#[test]
fn test_summary_between_commits() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    if !git(root, &["init", "-q"]) {
        // git is not installed
        return;
    }
    git(root, &["config", "user.email", "test@example.com"]);
    git(root, &["config", "user.name", "Test"]);
    fs::write(root.join("a.go"), OLD_SRC).unwrap();
    git(root, &["add", "."]);
    git(root, &["commit", "-q", "-m", "base"]);
    fs::write(root.join("a.go"), NEW_SRC).unwrap();
    git(root, &["commit", "-q", "-am", "change"]);

    fs::write(
        root.join("cover.out"),
        "mode: set\na.go:3.10,4.5 1 1\na.go:5.2,6.2 1 0\n",
    )
    .unwrap();
    let (stdout, stderr, success) = run_covdiff(
        root,
        &[
            "summary",
            "--profile",
            "cover.out",
            "--from",
            "HEAD~1",
            "--to",
            "HEAD",
            "--uncovered",
        ],
    );

    assert!(success, "stderr: {stderr}");
    assert!(stdout.contains("Changed lines"));
    assert!(stdout.contains("0/1"));
    assert!(stdout.contains("a.go:5"));
}

#[test]
fn test_unknown_revision_fails() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    if !git(root, &["init", "-q"]) {
        return;
    }
    fs::write(root.join("cover.out"), "mode: set\n").unwrap();

    let (_, stderr, success) = run_covdiff(
        root,
        &["summary", "--profile", "cover.out", "--from", "nope", "--to", "HEAD"],
    );

    assert!(!success);
    assert!(stderr.contains("Error"));
}
