//! Error types for the chat relay

use thiserror::Error;

/// Main error type for the chat relay
#[derive(Error, Debug)]
pub enum RelayError {
    /// Missing or invalid configuration (fatal at startup)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Claude Code CLI not found or not installed
    #[error("Claude Code CLI not found: {0}")]
    CliNotFound(String),

    /// Agent call or agent process failed
    #[error("Agent error (exit code {exit_code:?}): {message}")]
    Agent {
        /// Error message
        message: String,
        /// Process exit code, if the agent ran as a process
        exit_code: Option<i32>,
        /// Captured standard error output
        stderr: Option<String>,
    },

    /// Agent finished successfully but produced no output
    #[error("Agent returned an empty response")]
    EmptyResponse {
        /// Captured standard error output
        stderr: Option<String>,
    },

    /// Agent did not finish within the configured time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// No user decision arrived for a permission request
    #[error("Permission request {0} timed out")]
    PermissionTimeout(String),

    /// A second permission request was opened while one is still pending for the chat
    #[error("Chat {chat_id} already has a pending permission request ({pending})")]
    PermissionConflict {
        /// Chat identifier
        chat_id: i64,
        /// Request ID of the pending request
        pending: String,
    },

    /// Permission request unknown or already resolved
    #[error("Permission request not found: {0}")]
    PermissionNotFound(String),

    /// Chat is busy with another invocation and the bounded wait elapsed
    #[error("Chat {0} is busy")]
    Busy(i64),

    /// Message could not be split for delivery
    #[error("Format error: {0}")]
    Format(String),

    /// Transport layer error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Message parse error with optional raw data
    #[error("Message parse error: {message}")]
    MessageParse {
        /// Error message
        message: String,
        /// Raw message data that failed to parse
        data: Option<serde_json::Value>,
    },

    /// JSON decode error when parsing agent output
    #[error("JSON decode error: {0}")]
    JsonDecode(#[from] serde_json::Error),

    /// Chat platform failed to deliver a message
    #[error("Platform error: {0}")]
    Platform(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;

impl RelayError {
    /// Create a CLI not found error
    #[must_use]
    pub fn cli_not_found() -> Self {
        Self::CliNotFound(
            "Claude Code not found. Install with:\n\
             npm install -g @anthropic-ai/claude-code\n\
             \n\
             Or set CLAUDE_CLI_PATH to the claude executable"
                .to_string(),
        )
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an agent error
    pub fn agent(msg: impl Into<String>, exit_code: Option<i32>, stderr: Option<String>) -> Self {
        Self::Agent {
            message: msg.into(),
            exit_code,
            stderr,
        }
    }

    /// Create an empty response error
    #[must_use]
    pub fn empty_response(stderr: Option<String>) -> Self {
        Self::EmptyResponse { stderr }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a message parse error
    pub fn message_parse(msg: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self::MessageParse {
            message: msg.into(),
            data,
        }
    }

    /// Create a platform error
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Create a format error
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Whether this error belongs to the agent failure family.
    ///
    /// Agent failures are recovered locally: the user gets a notice and the
    /// session is left unchanged so the message can be retried.
    #[must_use]
    pub const fn is_agent_failure(&self) -> bool {
        matches!(
            self,
            Self::Agent { .. }
                | Self::EmptyResponse { .. }
                | Self::Timeout(_)
                | Self::CliNotFound(_)
                | Self::Transport(_)
                | Self::MessageParse { .. }
                | Self::JsonDecode(_)
        )
    }

    /// Captured agent stderr, if any
    #[must_use]
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Agent { stderr, .. } | Self::EmptyResponse { stderr } => stderr.as_deref(),
            _ => None,
        }
    }

    /// Generic, credential-free notice shown in the chat for this error.
    ///
    /// Raw stderr, paths and error chains are only logged, never sent.
    #[must_use]
    pub const fn user_notice(&self) -> &'static str {
        match self {
            Self::CliNotFound(_) => {
                "Claude CLI not found. Please make sure the 'claude' command is installed \
                 and available in your PATH."
            }
            Self::Timeout(_) => "Timeout: the agent took too long to respond. Please try again.",
            Self::EmptyResponse { .. } => "No response received from the agent.",
            Self::PermissionTimeout(_) => "Request denied due to timeout.",
            Self::Busy(_) => "Still working on your previous message. Please wait and try again.",
            Self::PermissionConflict { .. } | Self::PermissionNotFound(_) => {
                "Permission request expired or not found."
            }
            _ => "An error occurred while processing your request. Please try again.",
        }
    }
}
