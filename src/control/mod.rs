//! Control protocol for stream-json sessions with Claude Code CLI
//!
//! The CLI asks for tool approval with `control_request` lines
//! (`subtype: can_use_tool`) and expects a `control_response` carrying the
//! same `request_id`. The relay opens each session with an `initialize`
//! request and then writes the user prompt.

mod messages;

pub use messages::{ControlResponse, OutboundMessage, OutboundRequest, UserPrompt};

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::identifiers::RequestId;

/// Generator of request IDs for relay-initiated control requests
#[derive(Debug, Default)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    /// Create a generator starting at 1
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Generate the next request ID
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        let id = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        RequestId::new(format!("req_{id}_{}", uuid::Uuid::new_v4().simple()))
    }
}
