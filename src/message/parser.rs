//! Message parser for Claude Code stream-json output

use crate::error::{RelayError, Result};
use crate::types::identifiers::{RequestId, ToolName};
use crate::types::messages::{ContentBlock, ControlRequestBody, Message, UserContent};
use crate::types::permissions::ToolUseRequest;

use super::events::AgentEvent;

/// Parse a JSON value into a typed Message
///
/// # Arguments
/// * `data` - Raw JSON value from CLI output
///
/// # Errors
/// Returns `RelayError::MessageParse` if the JSON cannot be parsed into a valid Message
pub fn parse_message(data: serde_json::Value) -> Result<Message> {
    serde_json::from_value(data.clone()).map_err(|e| {
        RelayError::message_parse(format!("Failed to parse message: {e}"), Some(data))
    })
}

/// Flatten a message into the agent events it carries, in order
///
/// System messages, partial stream events and control traffic other than
/// tool approval carry no events.
#[must_use]
pub fn into_events(message: Message) -> Vec<AgentEvent> {
    match message {
        Message::Assistant { message, .. } => message
            .content
            .into_iter()
            .filter_map(block_event)
            .collect(),
        Message::User { message, .. } => match message.content {
            Some(UserContent::Blocks(blocks)) => {
                blocks.into_iter().filter_map(block_event).collect()
            }
            _ => Vec::new(),
        },
        Message::Result {
            is_error,
            num_turns,
            session_id,
            total_cost_usd,
            result,
            ..
        } => vec![AgentEvent::Final {
            text: result,
            is_error,
            session_id,
            num_turns,
            total_cost_usd,
        }],
        Message::ControlRequest {
            request_id,
            request:
                ControlRequestBody::CanUseTool {
                    tool_name, input, ..
                },
        } => vec![AgentEvent::PermissionRequest(ToolUseRequest {
            request_id: RequestId::new(request_id),
            tool_name: ToolName::new(tool_name),
            input,
        })],
        Message::ControlRequest { .. }
        | Message::System { .. }
        | Message::StreamEvent { .. }
        | Message::ControlResponse { .. }
        | Message::ControlCancelRequest { .. } => Vec::new(),
    }
}

fn block_event(block: ContentBlock) -> Option<AgentEvent> {
    match block {
        ContentBlock::Text { text } => Some(AgentEvent::Text(text)),
        ContentBlock::ToolUse { id, name, input } => Some(AgentEvent::ToolUse {
            id,
            name: ToolName::new(name),
            input,
        }),
        ContentBlock::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => Some(AgentEvent::ToolResult {
            tool_use_id,
            is_error: is_error.unwrap_or(false),
            content: content.map(|c| c.to_text()).unwrap_or_default(),
        }),
        ContentBlock::Thinking { .. } | ContentBlock::Other => None,
    }
}
