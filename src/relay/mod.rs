//! Chat relay
//!
//! [`Relay`] ties the pieces together: it takes [`InboundEvent`]s from a
//! messaging platform, serializes work per chat through the
//! [`ConcurrencyGate`], runs the agent against the chat's session, routes
//! tool approvals through the [`PermissionBroker`] and delivers the reply
//! through a [`ChatSink`].
//!
//! Events that touch a chat's session take a [`GateTicket`] when they are
//! admitted ([`Relay::admit`]), so a chat's messages and commands run in
//! the order they arrived even when each is handled on its own task.
//! Permission answers arrive as separate [`InboundEvent::Callback`]s while
//! the message that raised them is still running, so callbacks never take
//! the gate.

pub mod attachments;
mod inbound;
mod sink;

pub use attachments::PreparedPrompt;
pub use inbound::{Attachment, Command, InboundEvent};
pub use sink::ChatSink;

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::{AgentInvoker, AgentResponse};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::format::{extract_image_paths, hard_cut, is_sendable_image, split_or_truncate};
use crate::gate::{ConcurrencyGate, GateGuard, GateTicket};
use crate::permissions::{PermissionAction, PermissionBroker};
use crate::session::{SessionStore, discard_working_dir, prepare_working_dir};
use crate::types::identifiers::{ChatId, ToolName};
use crate::types::permissions::{
    ApprovalMode, PermissionCallback, PermissionOutcome, PermissionResult, allow_all,
    permission_callback,
};

/// Reply to `/start`
pub const WELCOME_TEXT: &str = "Welcome! I'm your Claude Code assistant.\n\n\
Send me a message and I'll pass it to Claude. Conversation context is kept \
per chat.\n\n\
Commands:\n\
/start - Start/restart conversation\n\
/clear - Clear conversation history\n\
/help - Show help message";

/// Reply to `/help`
pub const HELP_TEXT: &str = "How to use this bot:\n\n\
- Send any text message to talk to Claude\n\
- Send an image (with an optional caption) and Claude will analyze it\n\
- Send a text file and Claude will read its content\n\
- Image files Claude mentions in a reply are sent back to you\n\n\
When Claude wants to use a tool you may be asked to approve or deny it.\n\n\
Commands:\n\
/start - Start/restart conversation\n\
/clear - Clear conversation history and start over\n\
/help - Show this message";

/// Reply to `/clear`
pub const CLEARED_TEXT: &str = "Conversation history cleared!";

/// Sent when the agent returned neither text nor images
pub const NO_TEXT_RESPONSE: &str = "No text response received from the agent.";

/// Sent for a message with no text and no attachment
pub const EMPTY_MESSAGE_TEXT: &str = "Please send a text message, image, or file.";

/// Answer to a stale or foreign permission callback
pub const PERMISSION_EXPIRED_TEXT: &str = "Permission request expired or not found.";

/// Tool uses refused during one run
type DenialLog = Arc<Mutex<Vec<(ToolName, PermissionOutcome)>>>;

/// Inbound event holding its place in the chat's queue
///
/// Produced by [`Relay::admit`] and consumed by [`Relay::dispatch`].
#[derive(Debug)]
pub struct Admitted {
    event: InboundEvent,
    ticket: Option<GateTicket>,
}

impl Admitted {
    /// The admitted event
    #[must_use]
    pub const fn event(&self) -> &InboundEvent {
        &self.event
    }
}

/// Relays chat messages to a coding agent and its replies back
pub struct Relay<I, S> {
    config: Arc<RelayConfig>,
    store: SessionStore,
    gate: ConcurrencyGate,
    invoker: I,
    broker: Arc<PermissionBroker>,
    sink: Arc<S>,
}

impl<I, S> Relay<I, S>
where
    I: AgentInvoker,
    S: ChatSink,
{
    /// Build a relay from configuration
    pub fn new(config: RelayConfig, invoker: I, sink: S) -> Self {
        let store = SessionStore::new(config.session_root.clone(), config.history_cap);
        let gate = ConcurrencyGate::new(config.lock_scope);
        Self {
            config: Arc::new(config),
            store,
            gate,
            invoker,
            broker: Arc::new(PermissionBroker::new()),
            sink: Arc::new(sink),
        }
    }

    /// Configuration in effect
    #[must_use]
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Per-chat sessions
    #[must_use]
    pub const fn sessions(&self) -> &SessionStore {
        &self.store
    }

    /// Pending permission requests
    #[must_use]
    pub fn permissions(&self) -> &PermissionBroker {
        &self.broker
    }

    /// Per-chat serialization
    #[must_use]
    pub const fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Agent invoker
    #[must_use]
    pub const fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Outbound sink
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Reserve the event's turn in its chat's queue
    ///
    /// Call this in arrival order, where events are read; the returned
    /// [`Admitted`] can then be dispatched on any task.
    pub fn admit(&self, event: InboundEvent) -> Admitted {
        let ticket = match &event {
            InboundEvent::Message { chat_id, .. }
            | InboundEvent::Command {
                chat_id,
                command: Command::Start | Command::Clear,
            } => Some(self.gate.ticket(*chat_id)),
            InboundEvent::Command { .. } | InboundEvent::Callback { .. } => None,
        };
        Admitted { event, ticket }
    }

    /// Handle an admitted event once its turn comes
    ///
    /// Failures are reported to the chat and logged; they never escape.
    pub async fn dispatch(&self, admitted: Admitted) {
        let Admitted { event, ticket } = admitted;
        match event {
            InboundEvent::Message {
                chat_id,
                text,
                attachment,
            } => self.message_in_turn(chat_id, ticket, &text, attachment).await,
            InboundEvent::Command { chat_id, command } => {
                self.command_in_turn(chat_id, ticket, command).await;
            }
            InboundEvent::Callback { chat_id, data } => self.handle_callback(chat_id, &data).await,
        }
    }

    /// Admit and handle one inbound event
    pub async fn handle(&self, event: InboundEvent) {
        self.dispatch(self.admit(event)).await;
    }

    /// Run the agent on a user message and deliver its reply
    pub async fn handle_message(
        &self,
        chat_id: ChatId,
        text: &str,
        attachment: Option<Attachment>,
    ) {
        self.message_in_turn(chat_id, None, text, attachment).await;
    }

    async fn message_in_turn(
        &self,
        chat_id: ChatId,
        ticket: Option<GateTicket>,
        text: &str,
        attachment: Option<Attachment>,
    ) {
        if text.trim().is_empty() && attachment.is_none() {
            self.notify(chat_id, EMPTY_MESSAGE_TEXT).await;
            return;
        }

        let ticket = ticket.unwrap_or_else(|| self.gate.ticket(chat_id));
        let _guard = match ticket.acquire_with(self.config.busy_timeout).await {
            Ok(guard) => guard,
            Err(e) => {
                log::info!("Chat {chat_id} is busy: {e}");
                self.notify(chat_id, e.user_notice()).await;
                return;
            }
        };

        if let Err(e) = self.process_message(chat_id, text, attachment).await {
            log::error!("Error processing message for chat {chat_id}: {e}");
            if let Some(stderr) = e.stderr()
                && !stderr.is_empty()
            {
                log::error!("Agent stderr for chat {chat_id}: {stderr}");
            }
            self.notify(chat_id, e.user_notice()).await;
        }
    }

    async fn process_message(
        &self,
        chat_id: ChatId,
        text: &str,
        attachment: Option<Attachment>,
    ) -> Result<()> {
        let session = self.store.get_or_create(chat_id);
        prepare_working_dir(&session.working_dir).await?;

        let prepared = match attachment {
            Some(attachment) => attachments::prepare(&session.working_dir, text, attachment).await?,
            None => PreparedPrompt::text(text),
        };

        let denials = DenialLog::default();
        let callback = self.permission_callback(chat_id, &denials);

        log::info!(
            "Running agent for chat {chat_id} (generation {}, {} prior runs)",
            session.generation,
            session.runs
        );
        let response = self
            .invoker
            .run(&session, &prepared.prompt, &callback)
            .await?;

        let reply = response.text.trim().to_string();
        self.store
            .append_exchange(chat_id, prepared.history_text, reply.clone());
        self.store.record_run(chat_id, response.continuation.clone());

        let denials = std::mem::take(&mut *denials.lock());
        self.deliver(chat_id, &session.working_dir, &reply, &response, &denials)
            .await;
        Ok(())
    }

    fn permission_callback(&self, chat_id: ChatId, denials: &DenialLog) -> PermissionCallback {
        if self.config.approval_mode == ApprovalMode::Bypass {
            return allow_all();
        }

        let broker = Arc::clone(&self.broker);
        let sink = Arc::clone(&self.sink);
        let timeout = self.config.permission_timeout;
        let denials = Arc::clone(denials);

        permission_callback(move |intent| {
            let broker = Arc::clone(&broker);
            let sink = Arc::clone(&sink);
            let denials = Arc::clone(&denials);
            async move {
                let tool_name = intent.tool_name.clone();
                let ticket = match broker.open(chat_id, &intent) {
                    Ok(ticket) => ticket,
                    Err(e) => {
                        denials.lock().push((tool_name.clone(), PermissionOutcome::Denied));
                        return PermissionResult::deny(e.to_string());
                    }
                };

                let prompt = ticket.request().prompt();
                if let Err(e) = sink.send_permission_prompt(chat_id, &prompt).await {
                    log::error!("Failed to present permission request {}: {e}", prompt.request_id);
                    // Nobody can answer a prompt that was never shown
                    let _ = broker.resolve(&prompt.request_id, false);
                }

                let outcome = broker.wait(ticket, timeout).await;
                if outcome != PermissionOutcome::Approved {
                    denials.lock().push((tool_name.clone(), outcome));
                }
                outcome.into_result(&tool_name)
            }
        })
    }

    async fn deliver(
        &self,
        chat_id: ChatId,
        working_dir: &Path,
        reply: &str,
        response: &AgentResponse,
        denials: &[(ToolName, PermissionOutcome)],
    ) {
        let mut sent_images = 0usize;
        for mentioned in extract_image_paths(reply) {
            let path = resolve_image_path(&mentioned, working_dir);
            if !is_sendable_image(&path) || tokio::fs::metadata(&path).await.is_err() {
                continue;
            }
            let caption = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            match self.sink.send_image(chat_id, &path, &caption).await {
                Ok(()) => sent_images += 1,
                Err(e) => log::error!("Error auto-sending image {}: {e}", path.display()),
            }
        }

        if reply.is_empty() {
            if sent_images == 0 {
                self.notify(chat_id, NO_TEXT_RESPONSE).await;
            }
        } else {
            self.send_chunks(chat_id, reply).await;
        }

        let notices = denial_notices(denials, &response.denied);
        if !notices.is_empty() {
            self.send_chunks(chat_id, &notices).await;
        }
    }

    async fn send_chunks(&self, chat_id: ChatId, text: &str) {
        let max = self.config.max_message_length;
        for chunk in split_or_truncate(text, max) {
            if let Err(e) = self.sink.send_text(chat_id, &chunk).await {
                log::error!("Error sending chunk to chat {chat_id}: {e}");
                for piece in hard_cut(&chunk, max) {
                    if let Err(e) = self.sink.send_text(chat_id, &piece).await {
                        log::error!("Error sending fallback piece to chat {chat_id}: {e}");
                    }
                }
            }
        }
    }

    /// Handle `/start`, `/clear` or `/help`
    pub async fn handle_command(&self, chat_id: ChatId, command: Command) {
        self.command_in_turn(chat_id, None, command).await;
    }

    async fn command_in_turn(
        &self,
        chat_id: ChatId,
        ticket: Option<GateTicket>,
        command: Command,
    ) {
        match command {
            Command::Start => {
                let _guard = self.take_turn(chat_id, ticket).await;
                self.store.get_or_create(chat_id);
                self.store.clear_history(chat_id);
                self.notify(chat_id, WELCOME_TEXT).await;
            }
            Command::Clear => {
                let _guard = self.take_turn(chat_id, ticket).await;
                if let Some(previous) = self.store.clear(chat_id) {
                    discard_working_dir(&previous).await;
                }
                self.notify(chat_id, CLEARED_TEXT).await;
            }
            Command::Help => self.notify(chat_id, HELP_TEXT).await,
        }
    }

    async fn take_turn(&self, chat_id: ChatId, ticket: Option<GateTicket>) -> GateGuard {
        match ticket {
            Some(ticket) => ticket.acquire().await,
            None => self.gate.acquire(chat_id).await,
        }
    }

    /// Handle an approve/deny answer to a permission prompt
    pub async fn handle_callback(&self, chat_id: ChatId, data: &str) {
        let reply = match self.answer_permission(chat_id, data) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("Permission callback {data:?} from chat {chat_id} rejected: {e}");
                PERMISSION_EXPIRED_TEXT.to_string()
            }
        };
        self.notify(chat_id, &reply).await;
    }

    fn answer_permission(&self, chat_id: ChatId, data: &str) -> Result<String> {
        let action = PermissionAction::parse(data)
            .ok_or_else(|| RelayError::PermissionNotFound(data.to_string()))?;

        // Only the chat a prompt was shown in may answer it
        let belongs_here = self
            .broker
            .pending_for(chat_id)
            .is_some_and(|pending| &pending.request_id == action.request_id());
        if !belongs_here {
            return Err(RelayError::PermissionNotFound(
                action.request_id().to_string(),
            ));
        }

        let request = self.broker.apply(&action)?;
        Ok(if action.is_approve() {
            format!("Approved: {}", request.tool_name)
        } else {
            format!("Denied: {}", request.tool_name)
        })
    }

    async fn notify(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.sink.send_text(chat_id, text).await {
            log::error!("Failed to send message to chat {chat_id}: {e}");
        }
    }
}

impl<I, S> std::fmt::Debug for Relay<I, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("config", &self.config)
            .field("sessions", &self.store.len())
            .field("pending_permissions", &self.broker.len())
            .finish_non_exhaustive()
    }
}

/// Notices for refused tool uses, one line per tool
///
/// `recorded` comes from the relay's own callback and distinguishes
/// timeouts; `reported` covers refusals the invoker saw but the callback did
/// not record.
fn denial_notices(recorded: &[(ToolName, PermissionOutcome)], reported: &[ToolName]) -> String {
    let mut lines: Vec<String> = recorded
        .iter()
        .map(|(tool, outcome)| match outcome {
            PermissionOutcome::TimedOut => format!("Tool '{tool}' was denied due to timeout."),
            _ => format!("Tool '{tool}' was denied."),
        })
        .collect();

    if recorded.is_empty() {
        lines.extend(reported.iter().map(|tool| format!("Tool '{tool}' was denied.")));
    }
    lines.join("\n")
}

/// Absolute location of an image path mentioned by the agent
fn resolve_image_path(mentioned: &str, working_dir: &Path) -> PathBuf {
    if let Some(rest) = mentioned.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    let path = PathBuf::from(mentioned);
    if path.is_absolute() {
        path
    } else {
        working_dir.join(path)
    }
}
