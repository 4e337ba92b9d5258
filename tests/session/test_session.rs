//! Tests for per-chat session state

use claude_chat_relay::session::{Role, discard_working_dir, prepare_working_dir};
use claude_chat_relay::{AgentSessionId, ChatId, SessionStore};

#[test]
fn test_get_or_create_is_stable() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(42);

    let first = store.get_or_create(chat);
    let second = store.get_or_create(chat);

    assert_eq!(first.working_dir, second.working_dir);
    assert_eq!(first.generation, second.generation);
    assert!(first.working_dir.starts_with(root.path()));
    assert!(!first.has_prior_run());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_chats_are_isolated() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);

    let a = store.get_or_create(ChatId::new(1));
    let b = store.get_or_create(ChatId::new(2));
    assert_ne!(a.working_dir, b.working_dir);

    store.append_exchange(ChatId::new(1), "hi", "hello");
    assert_eq!(store.history(ChatId::new(1)).len(), 1);
    assert!(store.history(ChatId::new(2)).is_empty());
}

#[test]
fn test_history_cap_evicts_oldest() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 2);
    let chat = ChatId::new(7);
    store.get_or_create(chat);

    for i in 0..5 {
        store.append_exchange(chat, format!("q{i}"), format!("a{i}"));
    }

    let history = store.history(chat);
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].user_text, "q3");
    assert_eq!(history[1].agent_text, "a4");
}

#[test]
fn test_clear_resets_working_state() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(9);

    let before = store.get_or_create(chat);
    store.append_exchange(chat, "q", "a");
    store.record_run(chat, Some(AgentSessionId::new("sess-1")));
    assert!(store.get_or_create(chat).has_prior_run());

    let previous = store.clear(chat);
    assert_eq!(previous.as_deref(), Some(before.working_dir.as_path()));

    let after = store.get_or_create(chat);
    assert_ne!(after.working_dir, before.working_dir);
    assert_eq!(after.generation, before.generation + 1);
    assert!(after.continuation.is_none());
    assert!(!after.has_prior_run());
    assert!(store.history(chat).is_empty());
}

#[test]
fn test_clear_unknown_chat_creates_fresh_session() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);

    assert!(store.clear(ChatId::new(3)).is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_clear_history_keeps_continuation() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(4);

    let before = store.get_or_create(chat);
    store.append_exchange(chat, "q", "a");
    store.record_run(chat, Some(AgentSessionId::new("keep-me")));
    store.clear_history(chat);

    let after = store.get_or_create(chat);
    assert!(after.history.is_empty());
    assert_eq!(after.working_dir, before.working_dir);
    assert_eq!(after.continuation, Some(AgentSessionId::new("keep-me")));
}

#[test]
fn test_record_run_without_token_keeps_previous() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(5);
    store.get_or_create(chat);

    store.record_run(chat, Some(AgentSessionId::new("first")));
    store.record_run(chat, None);

    let session = store.get_or_create(chat);
    assert_eq!(session.runs, 2);
    assert_eq!(session.continuation, Some(AgentSessionId::new("first")));
}

#[test]
fn test_contextual_prompt_replays_history() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(6);
    store.get_or_create(chat);

    assert_eq!(store.get_or_create(chat).contextual_prompt("first"), "first");

    store.append_exchange(chat, "What is 2+2?", "4");
    let session = store.get_or_create(chat);
    assert_eq!(
        session.messages(),
        vec![(Role::User, "What is 2+2?"), (Role::Assistant, "4")]
    );
    assert_eq!(
        session.contextual_prompt("And 3+3?"),
        "User: What is 2+2?\n\nAssistant: 4\n\nUser: And 3+3?"
    );
}

#[tokio::test]
async fn test_working_dir_lifecycle() {
    let root = tempfile::tempdir().unwrap();
    let store = SessionStore::new(root.path(), 20);
    let chat = ChatId::new(8);
    let session = store.get_or_create(chat);

    prepare_working_dir(&session.working_dir).await.unwrap();
    tokio::fs::write(session.working_dir.join("notes.txt"), "x")
        .await
        .unwrap();
    assert!(session.working_dir.is_dir());

    discard_working_dir(&session.working_dir).await;
    assert!(!session.working_dir.exists());

    // Removing twice is harmless
    discard_working_dir(&session.working_dir).await;
}
