//! Rendering of permission prompts and decoding of the user's answer

use serde::{Deserialize, Serialize};

use crate::types::identifiers::{RequestId, ToolName};

/// Longest tool input summary shown to the user, in characters
pub const MAX_INPUT_SUMMARY: usize = 500;

const APPROVE_PREFIX: &str = "approve_";
const DENY_PREFIX: &str = "deny_";

/// Human-readable summary of a tool's input, at most [`MAX_INPUT_SUMMARY`] characters
#[must_use]
pub fn summarize_input(input: &serde_json::Value) -> String {
    let rendered = match input {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    if rendered.chars().count() <= MAX_INPUT_SUMMARY {
        return rendered;
    }
    let mut truncated: String = rendered.chars().take(MAX_INPUT_SUMMARY - 3).collect();
    truncated.push_str("...");
    truncated
}

/// A user's answer to a permission prompt, as carried by the platform's callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionAction {
    /// Let the tool run
    Approve(RequestId),
    /// Refuse the tool
    Deny(RequestId),
}

impl PermissionAction {
    /// Decode callback data (`approve_<id>` / `deny_<id>`)
    #[must_use]
    pub fn parse(data: &str) -> Option<Self> {
        if let Some(id) = data.strip_prefix(APPROVE_PREFIX)
            && !id.is_empty()
        {
            return Some(Self::Approve(RequestId::new(id)));
        }
        if let Some(id) = data.strip_prefix(DENY_PREFIX)
            && !id.is_empty()
        {
            return Some(Self::Deny(RequestId::new(id)));
        }
        None
    }

    /// Encode as callback data
    #[must_use]
    pub fn callback_data(&self) -> String {
        match self {
            Self::Approve(id) => format!("{APPROVE_PREFIX}{id}"),
            Self::Deny(id) => format!("{DENY_PREFIX}{id}"),
        }
    }

    /// Request this answer refers to
    #[must_use]
    pub const fn request_id(&self) -> &RequestId {
        match self {
            Self::Approve(id) | Self::Deny(id) => id,
        }
    }

    /// Whether the answer approves the tool
    #[must_use]
    pub const fn is_approve(&self) -> bool {
        matches!(self, Self::Approve(_))
    }
}

/// Message asking the user to approve or deny one tool use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPrompt {
    /// Request the two options resolve
    pub request_id: RequestId,
    /// Tool asking to run
    pub tool_name: ToolName,
    /// Summary of the tool input
    pub input_summary: String,
}

impl PermissionPrompt {
    /// Prompt text shown above the two options
    #[must_use]
    pub fn text(&self) -> String {
        format!(
            "Permission Required\n\nTool: {}\n\nParameters:\n{}\n\nDo you want to allow this action?",
            self.tool_name, self.input_summary
        )
    }

    /// Callback data of the approve option
    #[must_use]
    pub fn approve_data(&self) -> String {
        PermissionAction::Approve(self.request_id.clone()).callback_data()
    }

    /// Callback data of the deny option
    #[must_use]
    pub fn deny_data(&self) -> String {
        PermissionAction::Deny(self.request_id.clone()).callback_data()
    }
}
