//! Type definitions for the chat relay
//!
//! This module contains the type definitions shared across the relay,
//! organized into logical submodules:
//!
//! - [`identifiers`] - Type-safe ID wrappers (`ChatId`, `RequestId`, `ToolName`, `AgentSessionId`)
//! - [`permissions`] - Approval modes, permission results, and callbacks
//! - [`messages`] - Stream-json message and content block types

pub mod identifiers;
pub mod messages;
pub mod permissions;

// Re-export commonly used types
pub use identifiers::{AgentSessionId, ChatId, RequestId, ToolName};
pub use messages::{ContentBlock, ContentValue, ControlRequestBody, Message};
pub use permissions::{
    ApprovalMode, PermissionCallback, PermissionMode, PermissionOutcome, PermissionResult,
    PermissionResultAllow, PermissionResultDeny, ToolUseRequest, allow_all, permission_callback,
};
