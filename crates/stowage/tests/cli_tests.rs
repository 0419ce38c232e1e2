//! Integration tests for the stowage CLI.
//!
//! These run the built binary against a temporary store directory.

use rstest::{fixture, rstest};
use tempfile::TempDir;

mod common;
use common::run_stowage;

/// Provides a fresh temporary store directory for each test
#[fixture]
fn store() -> TempDir {
    TempDir::new().expect("Failed to create temp directory")
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn put(store: &TempDir, id: &str, name: &str, body: &str) {
    let output = run_stowage(
        store.path(),
        &["put", "--id", id, "--name", name, "--body", body],
    );
    assert!(
        output.status.success(),
        "put failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[rstest]
fn put_writes_canonical_file(store: TempDir) {
    put(&store, "7", "Pin Map", "X");

    assert!(store.path().join("Pin_Map_7.xml").is_file());
}

#[rstest]
fn ls_lists_recovered_items(store: TempDir) {
    put(&store, "7", "Pin Map", "X");
    put(&store, "3", "Legend", "");
    std::fs::write(store.path().join("notes.txt"), "ignored").unwrap();

    let output = run_stowage(store.path(), &["ls"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Pin_Map_7.xml"));
    assert!(out.contains("Legend_3.xml"));
    assert!(!out.contains("notes.txt"));
    assert!(out.find("Legend").unwrap() < out.find("Pin Map").unwrap());
}

#[rstest]
fn show_prints_note(store: TempDir) {
    put(&store, "7", "Pin Map", "remember the pins");

    let output = run_stowage(store.path(), &["show", "7"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Pin Map"));
    assert!(out.contains("remember the pins"));
}

#[rstest]
fn show_json_prints_payload(store: TempDir) {
    put(&store, "7", "Pin Map", "X");

    let output = run_stowage(store.path(), &["show", "7", "--json"]);

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(payload["name"], "Pin Map");
    assert_eq!(payload["body"], "X");
}

#[rstest]
#[case::show(&["show", "999"])]
#[case::rm(&["rm", "999"])]
#[case::mv(&["mv", "999", "Other"])]
fn missing_item_fails(store: TempDir, #[case] args: &[&str]) {
    let output = run_stowage(store.path(), args);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no readable item with id 999"));
}

#[rstest]
fn rm_deletes_file(store: TempDir) {
    put(&store, "7", "Pin Map", "X");

    let output = run_stowage(store.path(), &["rm", "7"]);

    assert!(output.status.success());
    assert!(!store.path().join("Pin_Map_7.xml").exists());
}

#[rstest]
fn mv_renames_file_and_note(store: TempDir) {
    put(&store, "7", "Pin Map", "X");

    let output = run_stowage(store.path(), &["mv", "7", "Route Map"]);

    assert!(output.status.success());
    assert!(!store.path().join("Pin_Map_7.xml").exists());
    assert!(store.path().join("Route_Map_7.xml").is_file());
    let shown = stdout(&run_stowage(store.path(), &["show", "7"]));
    assert!(shown.contains("Route Map"));
}

#[rstest]
fn put_rejects_unstorable_name(store: TempDir) {
    let output = run_stowage(store.path(), &["put", "--id", "1", "--name", "a/b"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("rejected"));
}

#[rstest]
fn invalid_config_file_is_reported(store: TempDir) {
    std::fs::write(store.path().join("stowage.yaml"), "queue-capacity: 0\n").unwrap();

    let output = run_stowage(store.path(), &["ls"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load config"));
    assert!(stderr.contains("queue-capacity"));
}
