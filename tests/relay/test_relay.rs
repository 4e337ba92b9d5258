//! End-to-end tests of the relay with a recording sink and a scripted agent

use claude_chat_relay::permissions::PermissionPrompt;
use claude_chat_relay::relay::{
    CLEARED_TEXT, NO_TEXT_RESPONSE, PERMISSION_EXPIRED_TEXT, WELCOME_TEXT,
};
use claude_chat_relay::{
    AgentInvoker, AgentResponse, ApprovalMode, Attachment, ChatId, ChatSink, Command,
    InboundEvent, PermissionCallback, Relay, RelayConfig, RelayError, Session, ToolName,
    ToolUseRequest, RequestId,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(ChatId, String),
    Prompt(ChatId, PermissionPrompt),
    Image(ChatId, PathBuf),
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingSink {
    fn texts(&self, chat: ChatId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Text(c, t) if *c == chat => Some(t.clone()),
                _ => None,
            })
            .collect()
    }

    fn prompts(&self) -> Vec<PermissionPrompt> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Prompt(_, p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    fn images(&self) -> Vec<PathBuf> {
        self.sent
            .lock()
            .iter()
            .filter_map(|s| match s {
                Sent::Image(_, p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ChatSink for RecordingSink {
    async fn send_text(&self, chat_id: ChatId, text: &str) -> claude_chat_relay::Result<()> {
        self.sent.lock().push(Sent::Text(chat_id, text.to_string()));
        Ok(())
    }

    async fn send_permission_prompt(
        &self,
        chat_id: ChatId,
        prompt: &PermissionPrompt,
    ) -> claude_chat_relay::Result<()> {
        self.sent.lock().push(Sent::Prompt(chat_id, prompt.clone()));
        Ok(())
    }

    async fn send_image(
        &self,
        chat_id: ChatId,
        path: &Path,
        _caption: &str,
    ) -> claude_chat_relay::Result<()> {
        self.sent.lock().push(Sent::Image(chat_id, path.to_path_buf()));
        Ok(())
    }
}

/// What the scripted agent does on every run
#[derive(Clone)]
enum Script {
    Reply(String),
    Fail { stderr: String },
    AskThenReply { tool: String },
    Slow(Duration),
    WriteImage { name: String },
}

struct ScriptedAgent {
    script: Script,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedAgent {
    fn new(script: Script) -> Self {
        Self {
            script,
            prompts: Mutex::default(),
        }
    }
}

impl AgentInvoker for ScriptedAgent {
    async fn run(
        &self,
        session: &Session,
        prompt: &str,
        permissions: &PermissionCallback,
    ) -> claude_chat_relay::Result<AgentResponse> {
        self.prompts.lock().push(prompt.to_string());
        match &self.script {
            Script::Reply(text) => Ok(AgentResponse::text(text.clone())),
            Script::Fail { stderr } => Err(RelayError::agent(
                format!("Claude CLI exited with 1: {stderr}"),
                Some(1),
                Some(stderr.clone()),
            )),
            Script::AskThenReply { tool } => {
                let result = permissions(ToolUseRequest {
                    request_id: RequestId::new("cli-1"),
                    tool_name: ToolName::new(tool.clone()),
                    input: serde_json::json!({"command": "make"}),
                })
                .await;
                let verdict = if result.is_allow() { "ran" } else { "skipped" };
                Ok(AgentResponse::text(format!("{tool} {verdict}")))
            }
            Script::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(AgentResponse::text("finally"))
            }
            Script::WriteImage { name } => {
                std::fs::write(session.working_dir.join(name), b"png").unwrap();
                Ok(AgentResponse::text(format!("Here is the chart: `{name}`")))
            }
        }
    }
}

type TestRelay = Relay<ScriptedAgent, RecordingSink>;

fn relay_with(
    root: &TempDir,
    script: Script,
    tweak: impl FnOnce(RelayConfig) -> RelayConfig,
) -> Arc<TestRelay> {
    let config = RelayConfig::builder()
        .bot_token("123:test")
        .session_root(root.path())
        .build();
    Arc::new(Relay::new(
        tweak(config),
        ScriptedAgent::new(script),
        RecordingSink::default(),
    ))
}

fn message(chat: ChatId, text: &str) -> InboundEvent {
    InboundEvent::Message {
        chat_id: chat,
        text: text.to_string(),
        attachment: None,
    }
}

/// Poll until the relay has shown a permission prompt
async fn wait_for_prompt(relay: &TestRelay) -> PermissionPrompt {
    for _ in 0..200 {
        if let Some(prompt) = relay.sink().prompts().pop() {
            return prompt;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no permission prompt was shown");
}

#[tokio::test]
async fn test_reply_is_delivered_and_recorded() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Reply("  Hello there!  ".into()), |c| c);
    let chat = ChatId::new(1);

    relay.handle(message(chat, "hi")).await;

    assert_eq!(relay.sink().texts(chat), vec!["Hello there!"]);
    let history = relay.sessions().history(chat);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_text, "hi");
    assert_eq!(history[0].agent_text, "Hello there!");
    assert!(relay.sessions().get_or_create(chat).has_prior_run());
}

#[tokio::test]
async fn test_agent_failure_leaves_session_unchanged() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Fail { stderr: "boom".into() }, |c| c);
    let chat = ChatId::new(2);

    relay.handle(message(chat, "hi")).await;

    let texts = relay.sink().texts(chat);
    assert_eq!(texts.len(), 1);
    assert!(!texts[0].contains("boom"));
    assert!(texts[0].contains("error occurred"));
    assert!(relay.sessions().history(chat).is_empty());
    assert!(!relay.sessions().get_or_create(chat).has_prior_run());
}

#[tokio::test]
async fn test_long_reply_is_split_to_limit() {
    let root = tempfile::tempdir().unwrap();
    let reply = "word ".repeat(100);
    let relay = relay_with(&root, Script::Reply(reply.clone()), |c| RelayConfig {
        max_message_length: 64,
        ..c
    });
    let chat = ChatId::new(3);

    relay.handle(message(chat, "talk a lot")).await;

    let texts = relay.sink().texts(chat);
    assert!(texts.len() > 1);
    assert!(texts.iter().all(|t| t.chars().count() <= 64));
    assert_eq!(texts.concat(), reply.trim());
}

#[tokio::test]
async fn test_empty_reply_gets_notice() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Reply("   ".into()), |c| c);
    let chat = ChatId::new(4);

    relay.handle(message(chat, "hi")).await;
    assert_eq!(relay.sink().texts(chat), vec![NO_TEXT_RESPONSE]);
}

#[tokio::test]
async fn test_clear_isolates_next_message() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Reply("ok".into()), |c| c);
    let chat = ChatId::new(5);

    relay.handle(message(chat, "remember this")).await;
    let before = relay.sessions().get_or_create(chat);
    assert!(before.working_dir.is_dir());

    relay
        .handle(InboundEvent::Command {
            chat_id: chat,
            command: Command::Clear,
        })
        .await;

    assert_eq!(relay.sink().texts(chat).last().unwrap(), CLEARED_TEXT);
    assert!(!before.working_dir.exists());

    let after = relay.sessions().get_or_create(chat);
    assert_ne!(after.working_dir, before.working_dir);
    assert!(after.history.is_empty());
    assert!(!after.has_prior_run());
    assert!(after.continuation.is_none());
}

#[tokio::test]
async fn test_clear_leaves_other_chats_untouched() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Reply("ok".into()), |c| c);
    let cleared = ChatId::new(51);
    let kept = ChatId::new(52);

    relay.handle(message(cleared, "first chat")).await;
    relay.handle(message(kept, "second chat")).await;
    let kept_before = relay.sessions().get_or_create(kept);

    relay
        .handle(InboundEvent::Command {
            chat_id: cleared,
            command: Command::Clear,
        })
        .await;

    assert_eq!(relay.sessions().history(cleared).len(), 0);
    assert_eq!(relay.sessions().history(kept).len(), 1);

    let kept_after = relay.sessions().get_or_create(kept);
    assert_eq!(kept_after.working_dir, kept_before.working_dir);
    assert_eq!(kept_after.generation, kept_before.generation);
    assert!(kept_after.working_dir.is_dir());
    assert!(kept_after.has_prior_run());
    assert_eq!(relay.sink().texts(kept), vec!["ok"]);
}

#[tokio::test]
async fn test_start_and_help_commands() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Reply("ok".into()), |c| c);
    let chat = ChatId::new(6);

    relay.handle(message(chat, "hi")).await;
    relay.handle(InboundEvent::text(chat, "/start")).await;
    relay.handle(InboundEvent::text(chat, "/help")).await;

    let texts = relay.sink().texts(chat);
    assert_eq!(texts[1], WELCOME_TEXT);
    assert!(texts[2].contains("/clear"));
    assert!(relay.sessions().history(chat).is_empty());
}

#[tokio::test]
async fn test_interactive_approval() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::AskThenReply { tool: "Bash".into() }, |c| RelayConfig {
        approval_mode: ApprovalMode::Interactive,
        ..c
    });
    let chat = ChatId::new(7);

    let running = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.handle(message(chat, "build it")).await })
    };

    let prompt = wait_for_prompt(&relay).await;
    assert_eq!(prompt.tool_name, ToolName::new("Bash"));
    assert!(prompt.text().contains("make"));

    relay
        .handle(InboundEvent::Callback {
            chat_id: chat,
            data: prompt.approve_data(),
        })
        .await;
    running.await.unwrap();

    let texts = relay.sink().texts(chat);
    assert!(texts.contains(&"Approved: Bash".to_string()));
    assert!(texts.contains(&"Bash ran".to_string()));
    assert!(relay.permissions().is_empty());
}

#[tokio::test]
async fn test_interactive_denial_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::AskThenReply { tool: "Bash".into() }, |c| RelayConfig {
        approval_mode: ApprovalMode::Interactive,
        ..c
    });
    let chat = ChatId::new(8);

    let running = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.handle(message(chat, "build it")).await })
    };

    let prompt = wait_for_prompt(&relay).await;
    relay
        .handle(InboundEvent::Callback {
            chat_id: chat,
            data: prompt.deny_data(),
        })
        .await;
    running.await.unwrap();

    let texts = relay.sink().texts(chat);
    assert!(texts.contains(&"Denied: Bash".to_string()));
    assert!(texts.contains(&"Bash skipped".to_string()));
    assert!(texts.contains(&"Tool 'Bash' was denied.".to_string()));
}

#[tokio::test]
async fn test_unanswered_permission_times_out() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::AskThenReply { tool: "Write".into() }, |c| RelayConfig {
        approval_mode: ApprovalMode::Interactive,
        permission_timeout: Duration::from_millis(50),
        ..c
    });
    let chat = ChatId::new(9);

    relay.handle(message(chat, "write it")).await;

    let texts = relay.sink().texts(chat);
    assert!(texts.contains(&"Write skipped".to_string()));
    assert!(texts.contains(&"Tool 'Write' was denied due to timeout.".to_string()));
    assert!(relay.permissions().is_empty());

    // A late answer is rejected
    let prompt = relay.sink().prompts().pop().unwrap();
    relay
        .handle(InboundEvent::Callback {
            chat_id: chat,
            data: prompt.approve_data(),
        })
        .await;
    assert_eq!(relay.sink().texts(chat).last().unwrap(), PERMISSION_EXPIRED_TEXT);
}

#[tokio::test]
async fn test_callback_from_other_chat_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::AskThenReply { tool: "Bash".into() }, |c| RelayConfig {
        approval_mode: ApprovalMode::Interactive,
        permission_timeout: Duration::from_millis(300),
        ..c
    });
    let owner = ChatId::new(10);
    let stranger = ChatId::new(11);

    let running = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.handle(message(owner, "build it")).await })
    };

    let prompt = wait_for_prompt(&relay).await;
    relay
        .handle(InboundEvent::Callback {
            chat_id: stranger,
            data: prompt.approve_data(),
        })
        .await;
    assert_eq!(relay.sink().texts(stranger), vec![PERMISSION_EXPIRED_TEXT]);

    running.await.unwrap();
    assert!(relay.sink().texts(owner).contains(&"Bash skipped".to_string()));
}

#[tokio::test]
async fn test_bypass_mode_never_prompts() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::AskThenReply { tool: "Bash".into() }, |c| c);
    let chat = ChatId::new(12);

    relay.handle(message(chat, "build it")).await;
    assert!(relay.sink().prompts().is_empty());
    assert_eq!(relay.sink().texts(chat), vec!["Bash ran"]);
}

#[tokio::test]
async fn test_busy_chat_is_told_to_wait() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Slow(Duration::from_millis(300)), |c| RelayConfig {
        busy_timeout: Some(Duration::from_millis(20)),
        ..c
    });
    let chat = ChatId::new(13);

    let first = {
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.handle(message(chat, "one")).await })
    };
    while !relay.gate().is_busy(chat) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    relay.handle(message(chat, "two")).await;
    first.await.unwrap();

    let texts = relay.sink().texts(chat);
    assert!(texts[0].contains("Still working"));
    assert_eq!(texts[1], "finally");
    assert_eq!(relay.sessions().history(chat).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_runs_in_arrival_order() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Slow(Duration::from_millis(2)), |c| c);

    for round in 0..20 {
        let chat = ChatId::new(1000 + round);
        let mut tasks = JoinSet::new();
        for i in 0..8 {
            // Admit in read order, as the binary does, then race the dispatches
            let admitted = relay.admit(message(chat, &format!("m{i}")));
            let relay = Arc::clone(&relay);
            tasks.spawn(async move { relay.dispatch(admitted).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }

        let expected: Vec<String> = (0..8).map(|i| format!("m{i}")).collect();
        let prompts: Vec<String> = relay
            .invoker()
            .prompts
            .lock()
            .drain(..)
            .collect();
        assert_eq!(prompts, expected, "round {round}");

        let recorded: Vec<String> = relay
            .sessions()
            .history(chat)
            .into_iter()
            .map(|exchange| exchange.user_text)
            .collect();
        assert_eq!(recorded, expected, "round {round}");
    }
}

#[tokio::test]
async fn test_start_waits_for_running_message() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Slow(Duration::from_millis(200)), |c| c);
    let chat = ChatId::new(53);

    let running = {
        let admitted = relay.admit(message(chat, "long job"));
        let relay = Arc::clone(&relay);
        tokio::spawn(async move { relay.dispatch(admitted).await })
    };
    while relay.invoker().prompts.lock().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(relay.gate().is_busy(chat));

    relay.handle(InboundEvent::text(chat, "/start")).await;
    running.await.unwrap();

    assert_eq!(relay.sink().texts(chat), vec!["finally", WELCOME_TEXT]);
    assert!(relay.sessions().history(chat).is_empty());
    assert!(!relay.gate().is_busy(chat));
}

#[tokio::test]
async fn test_mentioned_images_are_sent_first() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::WriteImage { name: "chart.png".into() }, |c| c);
    let chat = ChatId::new(14);

    relay.handle(message(chat, "plot it")).await;

    let working_dir = relay.sessions().get_or_create(chat).working_dir;
    assert_eq!(relay.sink().images(), vec![working_dir.join("chart.png")]);
    let sent = relay.sink().sent.lock().clone();
    assert!(matches!(sent[0], Sent::Image(..)));
    assert!(matches!(sent[1], Sent::Text(..)));
}

#[tokio::test]
async fn test_document_attachment_is_inlined() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Reply("summary".into()), |c| c);
    let chat = ChatId::new(15);

    relay
        .handle(InboundEvent::Message {
            chat_id: chat,
            text: "what is this?".to_string(),
            attachment: Some(Attachment::Document {
                file_name: "todo.txt".to_string(),
                mime_type: Some("text/plain".to_string()),
                data: b"buy milk".to_vec(),
            }),
        })
        .await;

    let prompts = relay.invoker().prompts.lock().clone();
    assert_eq!(prompts, vec!["what is this?\n\nFile content:\nbuy milk".to_string()]);

    // History keeps the short form
    let history = relay.sessions().history(chat);
    assert_eq!(history[0].user_text, "[File: todo.txt] what is this?");
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let relay = relay_with(&root, Script::Reply("unused".into()), |c| c);
    let chat = ChatId::new(16);

    relay.handle(message(chat, "   ")).await;
    assert_eq!(relay.sink().texts(chat).len(), 1);
    assert!(relay.sessions().history(chat).is_empty());
}
