//! Line-oriented console front end
//!
//! Stands in for a messaging platform: each stdin line is one inbound event
//! and every outbound message is printed to stdout prefixed with its chat.
//!
//! ```text
//! hello                 message in the default chat
//! @42 hello             message in chat 42
//! /clear                command in the default chat
//! approve <request-id>  answer a permission prompt
//! deny <request-id>
//! ```

use std::fmt::Write as _;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::Mutex;

use crate::error::{RelayError, Result};
use crate::permissions::{PermissionAction, PermissionPrompt};
use crate::relay::{ChatSink, InboundEvent};
use crate::types::identifiers::{ChatId, RequestId};

/// Chat used for lines without an `@<chat>` prefix
pub const DEFAULT_CONSOLE_CHAT: ChatId = ChatId::new(1);

/// Parse one console line into an event
///
/// Blank lines yield `None`.
#[must_use]
pub fn parse_line(line: &str, default_chat: ChatId) -> Option<InboundEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (chat_id, rest) = match line.strip_prefix('@') {
        Some(tagged) => {
            let (id, rest) = tagged.split_once(char::is_whitespace).unwrap_or((tagged, ""));
            match id.parse::<i64>() {
                Ok(id) => (ChatId::new(id), rest.trim()),
                Err(_) => (default_chat, line),
            }
        }
        None => (default_chat, line),
    };

    let mut words = rest.split_whitespace();
    let action = match (words.next(), words.next(), words.next()) {
        (Some("approve"), Some(id), None) => Some(PermissionAction::Approve(RequestId::new(id))),
        (Some("deny"), Some(id), None) => Some(PermissionAction::Deny(RequestId::new(id))),
        _ => None,
    };

    Some(match action {
        Some(action) => InboundEvent::Callback {
            chat_id,
            data: action.callback_data(),
        },
        None => InboundEvent::text(chat_id, rest),
    })
}

/// [`ChatSink`] printing to a writer, stdout by default
pub struct ConsoleSink<W = Stdout> {
    out: Mutex<W>,
}

impl ConsoleSink<Stdout> {
    /// Sink writing to stdout
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> ConsoleSink<W> {
    /// Sink writing to `out`
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    /// Recover the writer
    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W> ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&self, chat_id: ChatId, body: &str) -> Result<()> {
        let mut text = String::with_capacity(body.len() + 16);
        for line in body.lines() {
            let _ = writeln!(text, "[{chat_id}] {line}");
        }
        if body.is_empty() {
            let _ = writeln!(text, "[{chat_id}]");
        }

        let mut out = self.out.lock().await;
        out.write_all(text.as_bytes())
            .await
            .map_err(|e| RelayError::platform(format!("console write failed: {e}")))?;
        out.flush()
            .await
            .map_err(|e| RelayError::platform(format!("console flush failed: {e}")))
    }
}

impl<W> ChatSink for ConsoleSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<()> {
        self.emit(chat_id, text).await
    }

    async fn send_permission_prompt(
        &self,
        chat_id: ChatId,
        prompt: &PermissionPrompt,
    ) -> Result<()> {
        let body = format!(
            "{}\n\nReply `approve {id}` or `deny {id}`",
            prompt.text(),
            id = prompt.request_id
        );
        self.emit(chat_id, &body).await
    }

    async fn send_image(&self, chat_id: ChatId, path: &Path, caption: &str) -> Result<()> {
        self.emit(chat_id, &format!("[image] {} {caption}", path.display()))
            .await
    }
}
