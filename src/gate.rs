//! Per-chat mutual exclusion for agent invocations
//!
//! The agent keeps state in the chat's working directory, so two invocations
//! for the same chat must never overlap. Work is admitted in two steps:
//! [`ConcurrencyGate::ticket`] synchronously reserves the next turn in the
//! chat's lane, and [`GateTicket::acquire`] waits for that turn. Turns are
//! served strictly in ticket order, so taking the ticket where events are
//! read keeps a chat's messages in arrival order no matter how the tasks that
//! wait for them are scheduled.
//!
//! The [`GateGuard`] releases the turn when dropped, on every exit path of
//! the guarded work. A ticket dropped before its turn (a bounded wait that
//! gave up) is skipped.

use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::config::LockScope;
use crate::error::{RelayError, Result};
use crate::types::identifiers::ChatId;

#[derive(Debug, Default)]
struct Turns {
    /// Next ticket number to hand out
    next: u64,
    /// Ticket whose turn it is
    serving: u64,
    /// Tickets dropped before their turn came
    abandoned: BTreeSet<u64>,
}

impl Turns {
    fn finish(&mut self, number: u64) -> bool {
        if number != self.serving {
            self.abandoned.insert(number);
            return false;
        }
        self.serving += 1;
        while self.abandoned.remove(&self.serving) {
            self.serving += 1;
        }
        true
    }
}

/// FIFO lane shared by every ticket of a chat (or of everyone, in global scope)
#[derive(Debug, Default)]
struct Lane {
    turns: Mutex<Turns>,
    advanced: Notify,
}

/// Reserved place in a chat's queue
///
/// Obtained synchronously from [`ConcurrencyGate::ticket`]; turn it into a
/// [`GateGuard`] with [`GateTicket::acquire`].
#[must_use = "a ticket holds a place in the chat's queue until it is dropped"]
pub struct GateTicket {
    chat_id: ChatId,
    number: u64,
    lane: Arc<Lane>,
}

impl GateTicket {
    /// Chat this ticket queues for
    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    /// Wait for this ticket's turn
    pub async fn acquire(self) -> GateGuard {
        let lane = Arc::clone(&self.lane);
        loop {
            let advanced = lane.advanced.notified();
            tokio::pin!(advanced);
            advanced.as_mut().enable();

            if lane.turns.lock().serving == self.number {
                return GateGuard { ticket: self };
            }
            advanced.await;
        }
    }

    /// Wait for this ticket's turn, giving up after `wait`
    ///
    /// # Errors
    /// Returns `RelayError::Busy` if the turn did not come within `wait`
    pub async fn acquire_timeout(self, wait: Duration) -> Result<GateGuard> {
        let chat_id = self.chat_id;
        tokio::time::timeout(wait, self.acquire())
            .await
            .map_err(|_| {
                log::warn!("Chat {chat_id} still busy after {wait:?}");
                RelayError::Busy(chat_id.get())
            })
    }

    /// Wait for this ticket's turn, bounded by `wait` when one is given
    ///
    /// # Errors
    /// Returns `RelayError::Busy` if a bounded wait elapsed
    pub async fn acquire_with(self, wait: Option<Duration>) -> Result<GateGuard> {
        match wait {
            Some(wait) => self.acquire_timeout(wait).await,
            None => Ok(self.acquire().await),
        }
    }
}

impl Drop for GateTicket {
    fn drop(&mut self) {
        if self.lane.turns.lock().finish(self.number) {
            self.lane.advanced.notify_waiters();
        }
    }
}

impl std::fmt::Debug for GateTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateTicket")
            .field("chat_id", &self.chat_id)
            .field("number", &self.number)
            .finish_non_exhaustive()
    }
}

/// Exclusive hold on a chat's gate; released on drop
#[must_use = "the gate is released as soon as the guard is dropped"]
pub struct GateGuard {
    ticket: GateTicket,
}

impl GateGuard {
    /// Chat this guard was acquired for
    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        self.ticket.chat_id
    }
}

impl std::fmt::Debug for GateGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateGuard")
            .field("chat_id", &self.ticket.chat_id)
            .finish_non_exhaustive()
    }
}

/// Sharded lane map keyed by chat, or a single process-wide lane
pub struct ConcurrencyGate {
    scope: LockScope,
    global: Arc<Lane>,
    lanes: Mutex<HashMap<ChatId, Arc<Lane>>>,
}

impl ConcurrencyGate {
    /// Create a gate with the given granularity
    #[must_use]
    pub fn new(scope: LockScope) -> Self {
        Self {
            scope,
            global: Arc::new(Lane::default()),
            lanes: Mutex::new(HashMap::new()),
        }
    }

    /// Configured lock granularity
    #[must_use]
    pub const fn scope(&self) -> LockScope {
        self.scope
    }

    /// Reserve the chat's next turn without waiting
    pub fn ticket(&self, chat_id: ChatId) -> GateTicket {
        let lane = self.lane_for(chat_id);
        let number = {
            let mut turns = lane.turns.lock();
            let number = turns.next;
            turns.next += 1;
            if number != turns.serving {
                log::debug!("Chat {chat_id} is busy, queueing behind the gate");
            }
            number
        };
        GateTicket {
            chat_id,
            number,
            lane,
        }
    }

    /// Wait until the chat's gate is free and take it
    pub async fn acquire(&self, chat_id: ChatId) -> GateGuard {
        self.ticket(chat_id).acquire().await
    }

    /// Take the chat's gate, giving up after `wait`
    ///
    /// # Errors
    /// Returns `RelayError::Busy` if the gate stayed held for the whole wait
    pub async fn acquire_timeout(&self, chat_id: ChatId, wait: Duration) -> Result<GateGuard> {
        self.ticket(chat_id).acquire_timeout(wait).await
    }

    /// Take the gate, bounded by `wait` when one is given
    ///
    /// # Errors
    /// Returns `RelayError::Busy` if a bounded wait elapsed
    pub async fn acquire_with(&self, chat_id: ChatId, wait: Option<Duration>) -> Result<GateGuard> {
        self.ticket(chat_id).acquire_with(wait).await
    }

    /// Whether the chat's gate is held or has queued tickets
    #[must_use]
    pub fn is_busy(&self, chat_id: ChatId) -> bool {
        let lane = self.lane_for(chat_id);
        let turns = lane.turns.lock();
        turns.serving < turns.next
    }

    fn lane_for(&self, chat_id: ChatId) -> Arc<Lane> {
        match self.scope {
            LockScope::Global => Arc::clone(&self.global),
            LockScope::PerChat => Arc::clone(self.lanes.lock().entry(chat_id).or_default()),
        }
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(LockScope::default())
    }
}
