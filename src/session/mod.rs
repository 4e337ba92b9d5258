//! Per-chat session store
//!
//! `SessionStore` maps a chat to its [`Session`]. It is explicit process-wide
//! state: populated lazily on first use, reset only by an explicit clear, and
//! dropped with the process. Nothing is persisted.
//!
//! The store only guards its map for the duration of a single call. Ordering
//! between a chat's invocations is the job of [`crate::gate::ConcurrencyGate`];
//! callers must hold the chat's gate while running the agent and appending
//! the resulting exchange.
//!
//! # Module Structure
//!
//! - `state` - Session record and exchange history

mod state;

pub use state::{Exchange, Role, Session};

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::identifiers::{AgentSessionId, ChatId};

/// Store of per-chat sessions
pub struct SessionStore {
    root: PathBuf,
    history_cap: usize,
    sessions: Mutex<HashMap<ChatId, Session>>,
}

impl SessionStore {
    /// Create an empty store
    ///
    /// # Arguments
    /// * `root` - Directory under which per-chat working directories live
    /// * `history_cap` - Maximum exchanges retained per chat
    pub fn new(root: impl Into<PathBuf>, history_cap: usize) -> Self {
        Self {
            root: root.into(),
            history_cap: history_cap.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Configured history cap
    #[must_use]
    pub const fn history_cap(&self) -> usize {
        self.history_cap
    }

    /// Get the chat's session, creating fresh working state if absent
    ///
    /// Repeated calls without an intervening [`clear`](Self::clear) return the
    /// same working directory and generation.
    pub fn get_or_create(&self, chat_id: ChatId) -> Session {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(chat_id).or_insert_with(|| {
            log::info!("Created session for chat {chat_id}");
            Session::new(chat_id, self.working_dir_for(chat_id, 0), 0)
        });
        session.last_used_at = Utc::now();
        session.clone()
    }

    /// Drop the chat's history and reset its working state
    ///
    /// The chat keeps a session entry; it gets a new generation, a new working
    /// directory and no continuation token.
    ///
    /// # Returns
    /// The previous working directory, for the caller to remove
    pub fn clear(&self, chat_id: ChatId) -> Option<PathBuf> {
        let mut sessions = self.sessions.lock();
        let previous = sessions.remove(&chat_id);
        let generation = previous.as_ref().map_or(0, |s| s.generation + 1);
        sessions.insert(
            chat_id,
            Session::new(chat_id, self.working_dir_for(chat_id, generation), generation),
        );
        log::info!("Cleared session for chat {chat_id} (generation {generation})");
        previous.map(|s| s.working_dir)
    }

    /// Drop the chat's history only, keeping the agent's working state
    pub fn clear_history(&self, chat_id: ChatId) {
        if let Some(session) = self.sessions.lock().get_mut(&chat_id) {
            session.history.clear();
            log::info!("Cleared conversation history for chat {chat_id}");
        }
    }

    /// Record a completed exchange, evicting the oldest beyond the cap
    pub fn append_exchange(
        &self,
        chat_id: ChatId,
        user_text: impl Into<String>,
        agent_text: impl Into<String>,
    ) {
        let exchange = Exchange {
            user_text: user_text.into(),
            agent_text: agent_text.into(),
            recorded_at: Utc::now(),
        };
        let mut sessions = self.sessions.lock();
        let session = sessions
            .entry(chat_id)
            .or_insert_with(|| Session::new(chat_id, self.working_dir_for(chat_id, 0), 0));
        session.push_exchange(exchange, self.history_cap);
    }

    /// Record a successful agent run and the continuation token it reported
    pub fn record_run(&self, chat_id: ChatId, continuation: Option<AgentSessionId>) {
        if let Some(session) = self.sessions.lock().get_mut(&chat_id) {
            session.runs += 1;
            if continuation.is_some() {
                session.continuation = continuation;
            }
            session.last_used_at = Utc::now();
        }
    }

    /// Snapshot of the chat's history, oldest first
    #[must_use]
    pub fn history(&self, chat_id: ChatId) -> Vec<Exchange> {
        self.sessions
            .lock()
            .get(&chat_id)
            .map(|s| s.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of chats with a session
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no chat has a session yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn working_dir_for(&self, chat_id: ChatId, generation: u64) -> PathBuf {
        self.root.join(format!("claude_chat_{chat_id}_{generation}"))
    }
}

/// Make sure a session's working directory exists
///
/// # Errors
/// Returns error if the directory cannot be created
pub async fn prepare_working_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path).await?;
    Ok(())
}

/// Remove a discarded working directory, logging instead of failing
pub async fn discard_working_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => log::info!("Removed working directory {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove working directory {}: {e}", path.display()),
    }
}
