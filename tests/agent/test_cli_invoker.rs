//! Tests for the `--print` process invoker against fake CLI scripts

#![cfg(unix)]

use claude_chat_relay::types::permissions::allow_all;
use claude_chat_relay::{
    AgentInvoker, AgentSessionId, ChatId, CliInvoker, RelayError, SessionStore,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Write an executable shell script standing in for the Claude CLI
fn fake_cli(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("claude");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const ECHO_CLI: &str = r#"printf 'args:%s\n' "$*"
printf 'pwd:%s\n' "$(pwd)"
printf 'prompt:'
cat"#;

#[tokio::test]
async fn test_prompt_is_sent_on_stdin() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let session = store.get_or_create(ChatId::new(1));

    let invoker = CliInvoker::new(fake_cli(bin.path(), ECHO_CLI));
    let response = invoker
        .run(&session, "What does main.rs do?", &allow_all())
        .await
        .unwrap();

    assert!(response.text.contains("--print"));
    assert!(response.text.contains("--permission-mode bypassPermissions"));
    assert!(!response.text.contains("--continue"));
    assert!(response.text.ends_with("prompt:What does main.rs do?"));
    assert!(response.continuation.is_none());

    // The working directory was created and used
    assert!(session.working_dir.is_dir());
    let dir_name = session.working_dir.file_name().unwrap().to_string_lossy().to_string();
    assert!(response.text.contains(&dir_name));
}

#[tokio::test]
async fn test_later_runs_continue_the_conversation() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(1);
    let invoker = CliInvoker::new(fake_cli(bin.path(), ECHO_CLI)).model(Some("sonnet".into()));

    let first = invoker
        .run(&store.get_or_create(chat), "one", &allow_all())
        .await
        .unwrap();
    assert!(!first.text.contains("--continue"));
    assert!(first.text.contains("--model sonnet"));

    store.record_run(chat, None);
    let second = invoker
        .run(&store.get_or_create(chat), "two", &allow_all())
        .await
        .unwrap();
    assert!(second.text.contains("--continue"));

    // A cleared chat starts over
    store.clear(chat);
    let third = invoker
        .run(&store.get_or_create(chat), "three", &allow_all())
        .await
        .unwrap();
    assert!(!third.text.contains("--continue"));
}

#[tokio::test]
async fn test_nonzero_exit_is_agent_error_with_stderr() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let session = store.get_or_create(ChatId::new(1));

    let invoker = CliInvoker::new(fake_cli(bin.path(), "cat >/dev/null\necho boom >&2\nexit 1"));
    let err = invoker.run(&session, "hi", &allow_all()).await.unwrap_err();

    match &err {
        RelayError::Agent { exit_code, .. } => assert_eq!(*exit_code, Some(1)),
        other => panic!("expected agent error, got {other:?}"),
    }
    assert!(err.is_agent_failure());
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.stderr(), Some("boom"));
    assert!(!err.user_notice().contains("boom"));
}

#[tokio::test]
async fn test_blank_output_is_empty_response() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let session = store.get_or_create(ChatId::new(1));

    let invoker = CliInvoker::new(fake_cli(bin.path(), "cat >/dev/null\necho '   '"));
    let err = invoker.run(&session, "hi", &allow_all()).await.unwrap_err();
    assert!(matches!(err, RelayError::EmptyResponse { .. }));
}

#[tokio::test]
async fn test_slow_cli_times_out() {
    let bin = tempfile::tempdir().unwrap();
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let session = store.get_or_create(ChatId::new(1));

    let invoker = CliInvoker::new(fake_cli(bin.path(), "sleep 10"))
        .timeout(Duration::from_millis(200));
    let started = std::time::Instant::now();
    let err = invoker.run(&session, "hi", &allow_all()).await.unwrap_err();

    assert!(matches!(err, RelayError::Timeout(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_missing_cli_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let session = store.get_or_create(ChatId::new(1));

    let invoker = CliInvoker::new(root.path().join("no-such-claude"));
    let err = invoker.run(&session, "hi", &allow_all()).await.unwrap_err();
    assert!(matches!(err, RelayError::CliNotFound(_)));
}

#[test]
fn test_launch_options_follow_session() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(2);
    let invoker = CliInvoker::new("/usr/bin/claude");

    let fresh = invoker.launch_options(&store.get_or_create(chat));
    assert!(!fresh.continue_conversation);

    store.record_run(chat, Some(AgentSessionId::new("ignored-by-print-mode")));
    let session = store.get_or_create(chat);
    let options = invoker.launch_options(&session);
    assert!(options.continue_conversation);
    assert_eq!(options.cwd.as_deref(), Some(session.working_dir.as_path()));
    assert!(options.resume.is_none());
}
