//! Agent invocation
//!
//! [`AgentInvoker::run`] turns one user message into one agent reply for a
//! chat's [`Session`]. Two implementations exist:
//!
//! - [`CliInvoker`] - spawns `claude --print` once per message; continuity
//!   comes from `--continue` in the chat's stable working directory
//! - [`SdkInvoker`] - drives a bidirectional agent conversation as a stream of
//!   typed [`AgentEvent`]s, routing tool-use requests through the
//!   permission callback and resuming with the session's continuation token
//!
//! Callers must hold the chat's [`crate::gate::ConcurrencyGate`] for the
//! duration of `run`. Neither invoker touches the session store; recording
//! the exchange after a successful reply is the caller's job.

mod cli;
mod sdk;
mod stream_json;

pub use cli::CliInvoker;
pub use sdk::{AgentBackend, AgentRequest, Conversation, SdkInvoker};
pub use stream_json::{StreamJsonBackend, StreamJsonConversation};

pub use crate::message::AgentEvent;

use std::future::Future;

use crate::config::{AgentMode, RelayConfig};
use crate::error::{RelayError, Result};
use crate::session::Session;
use crate::types::identifiers::{AgentSessionId, ToolName};
use crate::types::permissions::PermissionCallback;

/// Reply produced by one successful agent run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    /// Text to relay to the chat
    pub text: String,
    /// Token to resume the agent's conversation with next time
    pub continuation: Option<AgentSessionId>,
    /// Tools whose use was refused during the run, in order
    pub denied: Vec<ToolName>,
}

impl AgentResponse {
    /// Response carrying only text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Produces agent replies for chat messages
pub trait AgentInvoker: Send + Sync {
    /// Run the agent on `prompt` within `session`
    ///
    /// Tool-use requests the agent raises are passed to `permissions`, one
    /// at a time, and the agent waits for each decision.
    ///
    /// # Errors
    /// Returns an error from the agent failure family
    /// ([`RelayError::is_agent_failure`]) if the agent fails, times out or
    /// produces no output
    fn run(
        &self,
        session: &Session,
        prompt: &str,
        permissions: &PermissionCallback,
    ) -> impl Future<Output = Result<AgentResponse>> + Send;
}

/// Invoker selected by configuration
pub enum Invoker {
    /// One `--print` process per message
    Cli(CliInvoker),
    /// Bidirectional stream-json conversation
    Sdk(SdkInvoker<StreamJsonBackend>),
}

impl Invoker {
    /// Build the invoker for the configured agent mode
    ///
    /// # Errors
    /// Returns `RelayError::CliNotFound` if the Claude CLI cannot be located
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        Ok(match config.agent_mode {
            AgentMode::Cli => Self::Cli(CliInvoker::from_config(config)?),
            AgentMode::Sdk => Self::Sdk(SdkInvoker::from_config(config)?),
        })
    }
}

impl AgentInvoker for Invoker {
    async fn run(
        &self,
        session: &Session,
        prompt: &str,
        permissions: &PermissionCallback,
    ) -> Result<AgentResponse> {
        match self {
            Self::Cli(invoker) => invoker.run(session, prompt, permissions).await,
            Self::Sdk(invoker) => invoker.run(session, prompt, permissions).await,
        }
    }
}

/// Fold failures outside the agent family into an agent error
///
/// Keeps the caller's contract simple: whatever goes wrong inside `run`
/// surfaces as something [`RelayError::is_agent_failure`] recognises.
pub(crate) fn into_agent_failure(error: RelayError) -> RelayError {
    if error.is_agent_failure() {
        error
    } else {
        RelayError::agent(error.to_string(), None, None)
    }
}
