//! Control protocol message types
//!
//! Outbound lines the relay writes to a stream-json session: the opening
//! handshake, the user prompt and answers to the CLI's control requests.

use serde::Serialize;

use crate::types::identifiers::{AgentSessionId, RequestId};
use crate::types::permissions::PermissionResult;

/// Line written to the CLI's standard input
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Request initiated by the relay
    ControlRequest {
        /// Correlation ID echoed by the CLI's response
        request_id: RequestId,
        /// Request body
        request: OutboundRequest,
    },
    /// Answer to a request initiated by the CLI
    ControlResponse {
        /// Response body
        response: ControlResponse,
    },
    /// User prompt
    User {
        /// Message content
        message: UserPrompt,
        /// Always null for top-level prompts
        parent_tool_use_id: Option<String>,
        /// Session the prompt belongs to
        session_id: AgentSessionId,
    },
}

/// Requests the relay sends to the CLI
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum OutboundRequest {
    /// Opening handshake; the relay registers no hooks
    Initialize {
        /// Hook registrations
        hooks: Option<serde_json::Value>,
    },
}

/// Response envelope for a CLI control request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "subtype", rename_all = "snake_case")]
pub enum ControlResponse {
    /// Request handled
    Success {
        /// ID of the request being answered
        request_id: String,
        /// Response payload
        response: serde_json::Value,
    },
    /// Request could not be handled
    Error {
        /// ID of the request being answered
        request_id: String,
        /// Error description
        error: String,
    },
}

/// Content of a user prompt
#[derive(Debug, Clone, Serialize)]
pub struct UserPrompt {
    /// Always "user"
    pub role: &'static str,
    /// Prompt text
    pub content: String,
}

impl OutboundMessage {
    /// Handshake opening a stream-json session
    #[must_use]
    pub fn initialize(request_id: RequestId) -> Self {
        Self::ControlRequest {
            request_id,
            request: OutboundRequest::Initialize { hooks: None },
        }
    }

    /// Prompt for the session
    pub fn user(prompt: impl Into<String>, session_id: AgentSessionId) -> Self {
        Self::User {
            message: UserPrompt {
                role: "user",
                content: prompt.into(),
            },
            parent_tool_use_id: None,
            session_id,
        }
    }

    /// Answer to a `can_use_tool` request
    ///
    /// The CLI expects the tool input back on approval; `original_input` is
    /// used unless the decision carries an updated input.
    #[must_use]
    pub fn permission(
        request_id: &RequestId,
        result: PermissionResult,
        original_input: serde_json::Value,
    ) -> Self {
        let payload = match result {
            PermissionResult::Allow(allow) => serde_json::json!({
                "behavior": "allow",
                "updatedInput": allow.updated_input.unwrap_or(original_input),
            }),
            PermissionResult::Deny(deny) => serde_json::json!({
                "behavior": "deny",
                "message": deny.message,
                "interrupt": deny.interrupt,
            }),
        };
        Self::ControlResponse {
            response: ControlResponse::Success {
                request_id: request_id.as_str().to_string(),
                response: payload,
            },
        }
    }

    /// Refusal of a control request the relay does not support
    pub fn unsupported(request_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ControlResponse {
            response: ControlResponse::Error {
                request_id: request_id.into(),
                error: error.into(),
            },
        }
    }

    /// Serialize as one newline-terminated JSON line
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
