use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn forge_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_stellarforge"));
    cmd.env_remove("STELLARFORGE_ACTOR");
    cmd
}

fn run(dir: &Path, args: &[&str]) -> Output {
    forge_cmd().current_dir(dir).args(args).output().unwrap()
}

fn run_with_stdin(dir: &Path, args: &[&str], input: &str) -> Output {
    let mut child = forge_cmd()
        .current_dir(dir)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(input.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_init_creates_forge_directory() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["init"]);

    assert!(output.status.success());
    assert!(tmp.path().join(".stellarforge").exists());
    assert!(tmp.path().join(".stellarforge/config.yaml").exists());
    assert!(tmp.path().join(".stellarforge/notes.loro").exists());
}

#[test]
fn test_init_sqlite_backend() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["init", "--backend", "sqlite"]);

    assert!(output.status.success());
    assert!(tmp.path().join(".stellarforge/notes.db").exists());
    let config = std::fs::read_to_string(tmp.path().join(".stellarforge/config.yaml")).unwrap();
    assert!(config.contains("backend: sqlite"));
}

#[test]
fn test_init_twice_fails() {
    let tmp = TempDir::new().unwrap();

    run(tmp.path(), &["init"]);
    let output = run(tmp.path(), &["init"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Already initialized"));
}

#[test]
fn test_failed_init_leaves_no_directory() {
    let tmp = TempDir::new().unwrap();

    let output = run(tmp.path(), &["init", "--debounce-ms", "0"]);

    assert!(!output.status.success());
    assert!(!tmp.path().join(".stellarforge").exists());

    let output = run(tmp.path(), &["init"]);
    assert!(output.status.success());
}

#[test]
fn test_show_without_init_fails() {
    let tmp = TempDir::new().unwrap();
    std::fs::create_dir(tmp.path().join(".git")).unwrap();

    let output = run(tmp.path(), &["show", "world-1"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Not in a stellarforge project"));
}

#[test]
fn test_show_missing_note() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init"]);

    let output = run(tmp.path(), &["show", "world-1"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No note for world 'world-1'"));
}

#[test]
fn test_edit_then_show_roundtrip() {
    for backend in ["loro", "sqlite"] {
        let tmp = TempDir::new().unwrap();
        assert!(run(tmp.path(), &["init", "--backend", backend]).status.success());

        let output = run_with_stdin(
            tmp.path(),
            &["edit", "world-1", "--actor", "ada"],
            "The sky has two suns.\nNobody sleeps.\n",
        );
        assert!(
            output.status.success(),
            "edit failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        let stdout = String::from_utf8_lossy(&output.stdout);
        assert!(stdout.contains("Saved note"));

        let output = run(tmp.path(), &["show", "world-1", "--json"]);
        assert!(output.status.success());
        let note: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(note["parent_id"], "world-1");
        assert_eq!(note["owner_id"], "ada");
        assert_eq!(note["content"], "The sky has two suns.\nNobody sleeps.");
    }
}

#[test]
fn test_second_edit_updates_same_note() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init"]);

    let output = run_with_stdin(
        tmp.path(),
        &["edit", "world-1", "--actor", "ada", "--json"],
        "first draft\n",
    );
    let first: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    let output = run_with_stdin(
        tmp.path(),
        &["edit", "world-1", "--actor", "grace", "--replace", "--json"],
        "rewritten\n",
    );
    assert!(output.status.success());
    let second: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["content"], "rewritten");
    assert_eq!(second["owner_id"], "ada");

    let output = run(tmp.path(), &["list", "--json"]);
    let notes: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(notes.as_array().unwrap().len(), 1);
}

#[test]
fn test_edit_with_empty_input_changes_nothing() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init"]);

    let output = run_with_stdin(tmp.path(), &["edit", "world-1", "--actor", "ada"], "");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No changes"));

    let output = run(tmp.path(), &["list"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("No notes found."));
}

#[test]
fn test_list_shows_each_world() {
    let tmp = TempDir::new().unwrap();
    run(tmp.path(), &["init", "--backend", "sqlite"]);

    run_with_stdin(tmp.path(), &["edit", "alpha", "--actor", "ada"], "Alpha notes\n");
    run_with_stdin(tmp.path(), &["edit", "beta", "--actor", "ada"], "Beta notes\n");

    let output = run(tmp.path(), &["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("alpha"));
    assert!(stdout.contains("Beta notes"));
}
