//! Interactive tool approval
//!
//! The [`PermissionBroker`] keeps the pending permission requests of all
//! chats. Each request goes `pending -> approved | denied`: it is opened when
//! the agent reports a tool-use intent, presented to the user, and resolved
//! either by the user's answer or by a timeout, which counts as a denial.
//! Resolved requests are forgotten immediately.
//!
//! A chat has at most one pending request. The agent waits for each decision
//! before raising its next tool use, so a second open for the same chat is
//! refused with [`RelayError::PermissionConflict`].

mod prompt;

pub use prompt::{MAX_INPUT_SUMMARY, PermissionAction, PermissionPrompt, summarize_input};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::error::{RelayError, Result};
use crate::types::identifiers::{ChatId, RequestId, ToolName};
use crate::types::permissions::{PermissionOutcome, ToolUseRequest};

/// State of a permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Waiting for the user
    Pending,
    /// User approved
    Approved,
    /// User denied, or no answer arrived in time
    Denied,
}

/// Snapshot of a permission request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPermissionRequest {
    /// Opaque ID carried by the approve/deny options
    pub request_id: RequestId,
    /// Chat the request was presented in
    pub chat_id: ChatId,
    /// Tool asking to run
    pub tool_name: ToolName,
    /// Human-readable summary of the tool input
    pub tool_input_summary: String,
    /// Current state
    pub resolution: Resolution,
    /// When the request was opened
    pub created_at: DateTime<Utc>,
}

impl PendingPermissionRequest {
    /// Prompt presenting this request to the user
    #[must_use]
    pub fn prompt(&self) -> PermissionPrompt {
        PermissionPrompt {
            request_id: self.request_id.clone(),
            tool_name: self.tool_name.clone(),
            input_summary: self.tool_input_summary.clone(),
        }
    }
}

/// Handle held by the task waiting on a decision
#[derive(Debug)]
pub struct PermissionTicket {
    request: PendingPermissionRequest,
    decision: oneshot::Receiver<bool>,
}

impl PermissionTicket {
    /// The request this ticket waits on
    #[must_use]
    pub const fn request(&self) -> &PendingPermissionRequest {
        &self.request
    }
}

struct Entry {
    request: PendingPermissionRequest,
    decision: oneshot::Sender<bool>,
}

#[derive(Default)]
struct Registry {
    requests: HashMap<RequestId, Entry>,
    by_chat: HashMap<ChatId, RequestId>,
}

impl Registry {
    fn take(&mut self, request_id: &RequestId) -> Option<Entry> {
        let entry = self.requests.remove(request_id)?;
        self.by_chat.remove(&entry.request.chat_id);
        Some(entry)
    }
}

/// Registry of pending permission requests across chats
#[derive(Default)]
pub struct PermissionBroker {
    registry: Mutex<Registry>,
}

impl PermissionBroker {
    /// Create an empty broker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a pending request for a tool-use intent in `chat_id`
    ///
    /// # Errors
    /// Returns `RelayError::PermissionConflict` if the chat already has a pending request
    pub fn open(&self, chat_id: ChatId, intent: &ToolUseRequest) -> Result<PermissionTicket> {
        let mut registry = self.registry.lock();

        if let Some(pending) = registry.by_chat.get(&chat_id) {
            log::error!(
                "Chat {chat_id} raised a tool use for {} while {pending} is pending",
                intent.tool_name
            );
            return Err(RelayError::PermissionConflict {
                chat_id: chat_id.get(),
                pending: pending.to_string(),
            });
        }

        let request = PendingPermissionRequest {
            request_id: RequestId::generate(),
            chat_id,
            tool_name: intent.tool_name.clone(),
            tool_input_summary: summarize_input(&intent.input),
            resolution: Resolution::Pending,
            created_at: Utc::now(),
        };
        let (tx, rx) = oneshot::channel();

        registry
            .by_chat
            .insert(chat_id, request.request_id.clone());
        registry.requests.insert(
            request.request_id.clone(),
            Entry {
                request: request.clone(),
                decision: tx,
            },
        );

        log::info!(
            "Created permission request {} for tool {} in chat {chat_id}",
            request.request_id,
            request.tool_name
        );

        Ok(PermissionTicket {
            request,
            decision: rx,
        })
    }

    /// Wait for the user's decision
    ///
    /// The request is forgotten once this returns, whatever the outcome.
    ///
    /// # Errors
    /// Returns `RelayError::PermissionTimeout` if no decision arrived within `timeout`
    pub async fn decide(&self, ticket: PermissionTicket, timeout: Duration) -> Result<bool> {
        let PermissionTicket { request, decision } = ticket;
        let decided = tokio::time::timeout(timeout, decision).await;

        // No-op if the user already resolved it
        if self.registry.lock().take(&request.request_id).is_some() {
            log::info!("Cleaned up permission request {}", request.request_id);
        }

        match decided {
            Ok(Ok(approve)) => Ok(approve),
            // Sender dropped without a decision
            Ok(Err(_)) => Ok(false),
            Err(_) => Err(RelayError::PermissionTimeout(request.request_id.to_string())),
        }
    }

    /// Wait for the user's decision, treating silence past `timeout` as denial
    pub async fn wait(&self, ticket: PermissionTicket, timeout: Duration) -> PermissionOutcome {
        match self.decide(ticket, timeout).await {
            Ok(true) => PermissionOutcome::Approved,
            Ok(false) => PermissionOutcome::Denied,
            Err(e) => {
                log::warn!("{e}");
                PermissionOutcome::TimedOut
            }
        }
    }

    /// Apply the user's decision to a pending request
    ///
    /// # Returns
    /// Snapshot of the resolved request
    ///
    /// # Errors
    /// Returns `RelayError::PermissionNotFound` if the request is unknown,
    /// already resolved or expired
    pub fn resolve(
        &self,
        request_id: &RequestId,
        approve: bool,
    ) -> Result<PendingPermissionRequest> {
        let Some(entry) = self.registry.lock().take(request_id) else {
            log::warn!("Permission request {request_id} not found");
            return Err(RelayError::PermissionNotFound(request_id.to_string()));
        };

        let mut request = entry.request;
        request.resolution = if approve {
            Resolution::Approved
        } else {
            Resolution::Denied
        };

        if entry.decision.send(approve).is_err() {
            // The waiter gave up (timed out) between our lookup and the send
            return Err(RelayError::PermissionNotFound(request_id.to_string()));
        }

        log::info!(
            "{} permission request {request_id} for tool {}",
            if approve { "Approved" } else { "Denied" },
            request.tool_name
        );
        Ok(request)
    }

    /// Apply a decoded approve/deny answer
    ///
    /// # Errors
    /// Returns `RelayError::PermissionNotFound` if the request is unknown or already resolved
    pub fn apply(&self, action: &PermissionAction) -> Result<PendingPermissionRequest> {
        self.resolve(action.request_id(), action.is_approve())
    }

    /// The chat's pending request, if any
    #[must_use]
    pub fn pending_for(&self, chat_id: ChatId) -> Option<PendingPermissionRequest> {
        let registry = self.registry.lock();
        let id = registry.by_chat.get(&chat_id)?;
        registry.requests.get(id).map(|e| e.request.clone())
    }

    /// Number of pending requests across all chats
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.lock().requests.len()
    }

    /// Whether no request is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.lock().requests.is_empty()
    }
}

impl std::fmt::Debug for PermissionBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionBroker")
            .field("pending", &self.len())
            .finish()
    }
}
