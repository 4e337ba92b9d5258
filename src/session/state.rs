//! Session state structures
//!
//! Defines the per-chat session record and the bounded exchange history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;

use crate::types::identifiers::{AgentSessionId, ChatId};

/// Author of a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The chat user
    User,
    /// The agent
    Assistant,
}

/// One completed round-trip: the user's text and the agent's reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Text sent by the user (attachments rendered as `[Image] ...` / `[File: ...] ...`)
    pub user_text: String,
    /// Reply produced by the agent
    pub agent_text: String,
    /// When the exchange was recorded
    pub recorded_at: DateTime<Utc>,
}

/// Per-chat session
///
/// Links a chat to the agent's working state. Continuity across messages is
/// carried only by `working_dir` (process variant, `--continue`) and
/// `continuation` (library variant, `--resume`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Chat this session belongs to
    pub chat_id: ChatId,
    /// Stable working directory reused by every invocation for this chat
    pub working_dir: PathBuf,
    /// Incremented by every clear; part of the session identity
    pub generation: u64,
    /// Agent session token reported by the last successful run
    pub continuation: Option<AgentSessionId>,
    /// Successful runs in the current working directory
    pub runs: u64,
    /// When the current working state was created
    pub created_at: DateTime<Utc>,
    /// Last time the session was touched
    pub last_used_at: DateTime<Utc>,
    /// Bounded FIFO of exchanges, oldest first
    pub history: VecDeque<Exchange>,
}

impl Session {
    pub(super) fn new(chat_id: ChatId, working_dir: PathBuf, generation: u64) -> Self {
        let now = Utc::now();
        Self {
            chat_id,
            working_dir,
            generation,
            continuation: None,
            runs: 0,
            created_at: now,
            last_used_at: now,
            history: VecDeque::new(),
        }
    }

    /// Whether the agent already holds a conversation in this working directory
    #[must_use]
    pub const fn has_prior_run(&self) -> bool {
        self.runs > 0
    }

    /// Number of exchanges currently retained
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// History flattened into `(role, text)` pairs, oldest first
    #[must_use]
    pub fn messages(&self) -> Vec<(Role, &str)> {
        self.history
            .iter()
            .flat_map(|e| {
                [
                    (Role::User, e.user_text.as_str()),
                    (Role::Assistant, e.agent_text.as_str()),
                ]
            })
            .collect()
    }

    /// Prompt prefixed with the retained history as a plain-text transcript
    ///
    /// Used when the agent has no continuation token to resume from.
    #[must_use]
    pub fn contextual_prompt(&self, prompt: &str) -> String {
        if self.history.is_empty() {
            return prompt.to_string();
        }
        let mut parts: Vec<String> = self
            .messages()
            .into_iter()
            .map(|(role, text)| match role {
                Role::User => format!("User: {text}"),
                Role::Assistant => format!("Assistant: {text}"),
            })
            .collect();
        parts.push(format!("User: {prompt}"));
        parts.join("\n\n")
    }

    /// Push an exchange, evicting the oldest ones beyond `cap`
    pub(super) fn push_exchange(&mut self, exchange: Exchange, cap: usize) {
        self.history.push_back(exchange);
        while self.history.len() > cap {
            self.history.pop_front(); // Remove oldest
        }
        self.last_used_at = Utc::now();
    }
}
