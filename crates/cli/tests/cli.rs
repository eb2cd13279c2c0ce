//! End-to-end tests for the medibot binary
//!
//! None of these reach the Gemini API: commands that need it either fail
//! on the missing key or stop before the first request.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

const HISTORY_JSON: &str = r#"{
  "20240301_093000": {
    "title": "Chat 1",
    "timestamp": "2024-03-01 09:30:00",
    "messages": [
      {"role": "user", "content": "What is gout?"},
      {"role": "assistant", "content": "A form of arthritis."}
    ]
  },
  "20240302_100000": {
    "title": "Chat 2",
    "timestamp": "2024-03-02 10:00:00",
    "messages": []
  }
}"#;

fn medibot(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("medibot").unwrap();
    cmd.current_dir(dir)
        .env_remove("RUST_LOG")
        .arg("--memory")
        .arg("--history-dir")
        .arg(dir.join("histories"));
    cmd
}

fn write_history(dir: &Path) {
    let histories = dir.join("histories");
    std::fs::create_dir_all(&histories).unwrap();
    std::fs::write(histories.join("default_chat_history.json"), HISTORY_JSON).unwrap();
}

#[test]
fn test_help_lists_commands() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build-index"))
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn test_build_index_requires_api_key() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .env_remove("GOOGLE_API_KEY")
        .arg("build-index")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_API_KEY"));
}

#[test]
fn test_build_index_creates_data_dir() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .arg("build-index")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created 'data' directory"));

    assert!(dir.path().join("data").is_dir());
}

#[test]
fn test_build_index_rejects_overlap() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .args(["build-index", "--chunk_size", "10", "--chunk_overlap", "10"])
        .assert()
        .failure();

    assert!(!dir.path().join("data").exists());
}

#[test]
fn test_build_index_no_matches() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .args(["build-index", "--pdf-path", "library/*.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No PDF files match library/*.pdf"));
}

#[test]
fn test_history_list_empty() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No saved chats for 'default'"));
}

#[test]
fn test_history_export_markdown() {
    let dir = tempdir().unwrap();
    write_history(dir.path());

    medibot(dir.path())
        .args(["history", "export", "20240301_093000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Chat 1"))
        .stdout(predicate::str::contains("**User**: What is gout?"))
        .stdout(predicate::str::contains("**Assistant**: A form of arthritis."));

    medibot(dir.path())
        .args(["history", "show", "19990101_000000"])
        .assert()
        .failure();
}

#[test]
fn test_history_clear_keep_current() {
    let dir = tempdir().unwrap();
    write_history(dir.path());

    medibot(dir.path())
        .args(["history", "clear", "--keep-current"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kept 20240302_100000"));

    medibot(dir.path())
        .args(["history", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chat 2"))
        .stdout(predicate::str::contains("Chat 1").not());
}

#[test]
fn test_history_rejects_bad_profile() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .args(["history", "--profile", "../etc", "list"])
        .assert()
        .failure();
}

#[test]
fn test_stats_on_empty_index() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Documents: 0"))
        .stdout(predicate::str::contains("index is empty"));
}

/// Id of the chat announced by `✓ Started <title> [<id>]`
fn started_id(stdout: &str, title: &str) -> String {
    let marker = format!("✓ Started {} [", title);
    let start = stdout.find(&marker).unwrap() + marker.len();
    let end = start + stdout[start..].find(']').unwrap();
    stdout[start..end].to_string()
}

#[test]
fn test_repl_clear_keeps_open_chat() {
    let dir = tempdir().unwrap();
    let output = medibot(dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .arg("chat")
        .write_stdin("/new\n/new\n/clear\n/sources on\n/export\n/open nope\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared chat history, kept the current chat"))
        .stdout(predicate::str::contains("Sources on"))
        .stdout(predicate::str::contains("No chat with id nope"))
        .stdout(predicate::str::contains("Goodbye!"))
        .get_output()
        .stdout
        .clone();

    let stdout = String::from_utf8(output).unwrap();
    let first = started_id(&stdout, "Chat 1");
    let current = started_id(&stdout, "Chat 2");
    assert_ne!(first, current);

    let json = std::fs::read_to_string(dir.path().join("histories/default_chat_history.json")).unwrap();
    let saved: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(saved.keys().collect::<Vec<_>>(), vec![&current]);
    assert_eq!(saved[&current]["title"], "Chat 2");

    let exported = dir.path().join(format!("medibot_chat_{}.md", current));
    assert!(std::fs::read_to_string(exported).unwrap().starts_with("# Chat 2"));
}

#[test]
fn test_repl_survives_failed_question() {
    let dir = tempdir().unwrap();
    medibot(dir.path())
        .env("GOOGLE_API_KEY", "test-key")
        .env("GEMINI_BASE_URL", "http://127.0.0.1:9")
        .env("GEMINI_TIMEOUT_SECS", "5")
        .arg("chat")
        .write_stdin("What is gout?\n/chats\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Error:"))
        .stdout(predicate::str::contains("0 messages"))
        .stdout(predicate::str::contains("Goodbye!"));

    // A failed answer is never saved
    assert!(!dir.path().join("histories/default_chat_history.json").exists());
}
