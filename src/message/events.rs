//! Typed events produced by an agent turn

use crate::types::identifiers::{AgentSessionId, ToolName};
use crate::types::permissions::ToolUseRequest;

/// One event of an agent turn, in the order the agent produced it
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Assistant text
    Text(String),
    /// The agent started a tool
    ToolUse {
        /// Tool use ID
        id: String,
        /// Tool name
        name: ToolName,
        /// Tool input parameters
        input: serde_json::Value,
    },
    /// The agent asks whether a tool may run; a decision must be sent back
    PermissionRequest(ToolUseRequest),
    /// Result of a tool execution
    ToolResult {
        /// ID of the tool use this is a result for
        tool_use_id: String,
        /// Whether the tool failed or was refused
        is_error: bool,
        /// Flattened result text
        content: String,
    },
    /// End of the turn
    Final {
        /// Final answer text, when the agent reports one
        text: Option<String>,
        /// Whether the turn ended in an error
        is_error: bool,
        /// Agent session to resume next time
        session_id: Option<AgentSessionId>,
        /// Number of conversation turns
        num_turns: u32,
        /// Total cost in USD
        total_cost_usd: Option<f64>,
    },
}

impl AgentEvent {
    /// Whether this event ends the turn
    #[must_use]
    pub const fn is_final(&self) -> bool {
        matches!(self, Self::Final { .. })
    }
}
