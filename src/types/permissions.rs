//! Permission-related type definitions
//!
//! This module contains the relay-level approval mode, the CLI permission
//! modes it maps onto, the tool-use request handed to permission callbacks,
//! and the allow/deny result sent back into the agent.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::identifiers::{RequestId, ToolName};

// ============================================================================
// Permission Types
// ============================================================================

/// How tool-use requests from the agent are approved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Every tool use is auto-approved
    #[default]
    Bypass,
    /// The chat user approves or denies each tool use
    Interactive,
}

impl ApprovalMode {
    /// Parse the configuration value (`bypass` / `interactive`)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bypass" => Some(Self::Bypass),
            "interactive" => Some(Self::Interactive),
            _ => None,
        }
    }

    /// CLI permission mode matching this approval mode
    #[must_use]
    pub const fn cli_mode(self) -> PermissionMode {
        match self {
            Self::Bypass => PermissionMode::BypassPermissions,
            Self::Interactive => PermissionMode::Default,
        }
    }
}

/// Permission modes understood by the Claude Code CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Default mode - CLI asks before dangerous tools
    Default,
    /// Auto-accept file edits
    AcceptEdits,
    /// Plan mode
    Plan,
    /// Allow all tools
    BypassPermissions,
}

impl PermissionMode {
    /// Value passed to `--permission-mode`
    #[must_use]
    pub const fn as_flag(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}

/// Tool-use intent reported by the agent that needs a decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUseRequest {
    /// Agent-side request ID the decision must be correlated with
    pub request_id: RequestId,
    /// Tool name being requested
    pub tool_name: ToolName,
    /// Tool input parameters
    pub input: serde_json::Value,
}

/// Permission result for allowing tool use
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResultAllow {
    /// Modified input for the tool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_input: Option<serde_json::Value>,
}

/// Permission result for denying tool use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionResultDeny {
    /// Reason for denying, delivered to the agent as a negative tool result
    pub message: String,
    /// Whether to interrupt the conversation
    #[serde(default)]
    pub interrupt: bool,
}

/// Permission result enum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "behavior", rename_all = "lowercase")]
pub enum PermissionResult {
    /// Allow the tool use
    Allow(PermissionResultAllow),
    /// Deny the tool use
    Deny(PermissionResultDeny),
}

impl PermissionResult {
    /// Allow with the input unchanged
    #[must_use]
    pub fn allow() -> Self {
        Self::Allow(PermissionResultAllow::default())
    }

    /// Deny with a reason
    pub fn deny(message: impl Into<String>) -> Self {
        Self::Deny(PermissionResultDeny {
            message: message.into(),
            interrupt: false,
        })
    }

    /// Whether this result lets the tool run
    #[must_use]
    pub const fn is_allow(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Final state of a pending permission request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    /// User approved the tool use
    Approved,
    /// User denied the tool use
    Denied,
    /// No decision arrived in time; treated as a denial
    TimedOut,
}

impl PermissionOutcome {
    /// Convert the outcome into the result sent back to the agent
    #[must_use]
    pub fn into_result(self, tool_name: &ToolName) -> PermissionResult {
        match self {
            Self::Approved => PermissionResult::allow(),
            Self::Denied => PermissionResult::deny(format!("User denied use of {tool_name}")),
            Self::TimedOut => PermissionResult::deny(format!(
                "Permission request for {tool_name} denied due to timeout"
            )),
        }
    }
}

/// Callback type for tool permission checks
pub type PermissionCallback = Arc<
    dyn Fn(ToolUseRequest) -> Pin<Box<dyn Future<Output = PermissionResult> + Send>> + Send + Sync,
>;

/// Create a permission callback from a closure
pub fn permission_callback<F, Fut>(f: F) -> PermissionCallback
where
    F: Fn(ToolUseRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PermissionResult> + Send + 'static,
{
    Arc::new(move |request| Box::pin(f(request)))
}

/// Permission callback that approves every tool use
#[must_use]
pub fn allow_all() -> PermissionCallback {
    permission_callback(|_request| async { PermissionResult::allow() })
}
