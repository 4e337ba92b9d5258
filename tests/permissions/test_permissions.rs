//! Unit tests for `PermissionBroker`
//!
//! Tests the pending -> approved | denied lifecycle of tool approvals

use claude_chat_relay::permissions::Resolution;
use claude_chat_relay::{
    ChatId, PermissionAction, PermissionBroker, PermissionOutcome, PermissionResult, RelayError,
    RequestId, ToolName, ToolUseRequest,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn intent(tool: &str) -> ToolUseRequest {
    ToolUseRequest {
        request_id: RequestId::new("cli-1"),
        tool_name: ToolName::new(tool),
        input: json!({"command": "rm -rf build"}),
    }
}

#[tokio::test]
async fn test_approval_reaches_waiter() {
    let broker = Arc::new(PermissionBroker::new());
    let chat = ChatId::new(1);

    let ticket = broker.open(chat, &intent("Bash")).unwrap();
    let request = ticket.request().clone();
    assert_eq!(request.resolution, Resolution::Pending);
    assert_eq!(broker.pending_for(chat).unwrap().request_id, request.request_id);

    let waiter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.wait(ticket, Duration::from_secs(5)).await })
    };

    let resolved = broker
        .apply(&PermissionAction::Approve(request.request_id.clone()))
        .unwrap();
    assert_eq!(resolved.resolution, Resolution::Approved);
    assert_eq!(resolved.tool_name, ToolName::new("Bash"));

    assert_eq!(waiter.await.unwrap(), PermissionOutcome::Approved);
    assert!(broker.is_empty());
}

#[tokio::test]
async fn test_denial_reaches_waiter() {
    let broker = Arc::new(PermissionBroker::new());
    let ticket = broker.open(ChatId::new(2), &intent("Write")).unwrap();
    let id = ticket.request().request_id.clone();

    let waiter = {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move { broker.wait(ticket, Duration::from_secs(5)).await })
    };

    broker.resolve(&id, false).unwrap();
    let outcome = waiter.await.unwrap();
    assert_eq!(outcome, PermissionOutcome::Denied);
    assert!(!outcome.into_result(&ToolName::new("Write")).is_allow());
}

#[tokio::test]
async fn test_decide_reports_permission_timeout() {
    let broker = PermissionBroker::new();
    let chat = ChatId::new(31);
    let ticket = broker.open(chat, &intent("Edit")).unwrap();
    let id = ticket.request().request_id.clone();

    let err = broker
        .decide(ticket, Duration::from_millis(20))
        .await
        .unwrap_err();
    match &err {
        RelayError::PermissionTimeout(timed_out) => assert_eq!(timed_out, id.as_str()),
        other => panic!("expected a permission timeout, got {other:?}"),
    }
    assert_eq!(err.user_notice(), "Request denied due to timeout.");
    assert!(broker.is_empty());
}

#[tokio::test]
async fn test_timeout_denies_and_forgets_request() {
    let broker = PermissionBroker::new();
    let chat = ChatId::new(3);
    let ticket = broker.open(chat, &intent("Bash")).unwrap();
    let id = ticket.request().request_id.clone();

    let outcome = broker.wait(ticket, Duration::from_millis(20)).await;
    assert_eq!(outcome, PermissionOutcome::TimedOut);
    assert!(broker.pending_for(chat).is_none());

    match outcome.into_result(&ToolName::new("Bash")) {
        PermissionResult::Deny(deny) => assert!(deny.message.contains("timeout")),
        PermissionResult::Allow(_) => panic!("timeout must deny"),
    }

    // A late answer finds nothing
    let late = broker.resolve(&id, true).unwrap_err();
    assert!(matches!(late, RelayError::PermissionNotFound(_)));
}

#[tokio::test]
async fn test_second_request_in_chat_conflicts() {
    let broker = PermissionBroker::new();
    let chat = ChatId::new(4);

    let _first = broker.open(chat, &intent("Bash")).unwrap();
    let err = broker.open(chat, &intent("Edit")).unwrap_err();
    assert!(matches!(err, RelayError::PermissionConflict { chat_id: 4, .. }));

    // Another chat is independent
    assert!(broker.open(ChatId::new(5), &intent("Edit")).is_ok());
    assert_eq!(broker.len(), 2);
}

#[test]
fn test_unknown_request_is_not_found() {
    let broker = PermissionBroker::new();
    let err = broker
        .resolve(&RequestId::new("does-not-exist"), true)
        .unwrap_err();
    assert!(matches!(err, RelayError::PermissionNotFound(_)));
}

#[test]
fn test_request_resolves_only_once() {
    let broker = PermissionBroker::new();
    let ticket = broker.open(ChatId::new(6), &intent("Bash")).unwrap();
    let id = ticket.request().request_id.clone();

    assert!(broker.resolve(&id, true).is_ok());
    assert!(broker.resolve(&id, false).is_err());
    drop(ticket);
}

#[test]
fn test_prompt_carries_summary_and_options() {
    let broker = PermissionBroker::new();
    let ticket = broker.open(ChatId::new(7), &intent("Bash")).unwrap();
    let prompt = ticket.request().prompt();

    let text = prompt.text();
    assert!(text.contains("Tool: Bash"));
    assert!(text.contains("rm -rf build"));
    assert_eq!(
        PermissionAction::parse(&prompt.approve_data()),
        Some(PermissionAction::Approve(prompt.request_id.clone()))
    );
    assert_eq!(
        PermissionAction::parse(&prompt.deny_data()),
        Some(PermissionAction::Deny(prompt.request_id.clone()))
    );
}
