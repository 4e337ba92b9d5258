//! Library variant: a bidirectional agent conversation consumed as typed events

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

use crate::config::{DEFAULT_AGENT_TIMEOUT, RelayConfig};
use crate::error::{RelayError, Result};
use crate::session::{Session, prepare_working_dir};
use crate::transport::resolve_cli;
use crate::types::identifiers::{AgentSessionId, RequestId};
use crate::types::permissions::{PermissionCallback, PermissionMode, PermissionResult};

use super::stream_json::StreamJsonBackend;
use super::{AgentEvent, AgentInvoker, AgentResponse, into_agent_failure};

/// Everything an agent needs to start a turn
#[derive(Debug, Clone, PartialEq)]
pub struct AgentRequest {
    /// Prompt text
    pub prompt: String,
    /// Working directory of the chat
    pub working_dir: PathBuf,
    /// Agent session to resume
    pub resume: Option<AgentSessionId>,
    /// Tool permission mode
    pub permission_mode: PermissionMode,
    /// Model override
    pub model: Option<String>,
}

/// A running agent turn
///
/// Events are pulled one at a time by a single task. When a
/// [`AgentEvent::PermissionRequest`] is returned, the agent is blocked until
/// [`respond`](Conversation::respond) is called for it.
pub trait Conversation: Send {
    /// Next event of the turn; `None` once the agent has nothing more to say
    ///
    /// # Errors
    /// Returns error if the agent fails or its output cannot be decoded
    fn next_event(&mut self) -> impl Future<Output = Result<Option<AgentEvent>>> + Send;

    /// Send a permission decision back into the agent
    ///
    /// # Errors
    /// Returns error if the decision cannot be delivered
    fn respond(
        &mut self,
        request_id: &RequestId,
        result: PermissionResult,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Shut the turn down and release its resources
    ///
    /// # Errors
    /// Returns error if cleanup fails
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Starts agent conversations
pub trait AgentBackend: Send + Sync {
    /// Conversation type produced by this backend
    type Conversation: Conversation;

    /// Start a turn for `request`
    ///
    /// # Errors
    /// Returns error if the agent cannot be started
    fn start(
        &self,
        request: AgentRequest,
    ) -> impl Future<Output = Result<Self::Conversation>> + Send;
}

/// Invoker driving an [`AgentBackend`] conversation to its final event
pub struct SdkInvoker<B> {
    backend: B,
    permission_mode: PermissionMode,
    model: Option<String>,
    timeout: Duration,
}

impl<B: AgentBackend> SdkInvoker<B> {
    /// Invoker over `backend` with bypass permissions
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            permission_mode: PermissionMode::BypassPermissions,
            model: None,
            timeout: DEFAULT_AGENT_TIMEOUT,
        }
    }

    /// Set the permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    /// Set the model
    #[must_use]
    pub fn model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Bound on time spent waiting for the agent (permission waits excluded)
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Backend this invoker drives
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Request for one turn in `session`
    #[must_use]
    pub fn request(&self, session: &Session, prompt: &str) -> AgentRequest {
        let prompt = match session.continuation {
            Some(_) => prompt.to_string(),
            None => session.contextual_prompt(prompt),
        };
        AgentRequest {
            prompt,
            working_dir: session.working_dir.clone(),
            resume: session.continuation.clone(),
            permission_mode: self.permission_mode,
            model: self.model.clone(),
        }
    }

    async fn invoke(
        &self,
        session: &Session,
        prompt: &str,
        permissions: &PermissionCallback,
    ) -> Result<AgentResponse> {
        prepare_working_dir(&session.working_dir).await?;

        let request = self.request(session, prompt);
        log::info!(
            "Starting agent turn for chat {} (resume: {})",
            session.chat_id,
            request.resume.as_ref().map_or("none", AgentSessionId::as_str)
        );

        let mut conversation = tokio::time::timeout(self.timeout, self.backend.start(request))
            .await
            .map_err(|_| RelayError::timeout("agent did not start in time"))??;

        let outcome = self.drive(&mut conversation, permissions).await;

        if let Err(e) = conversation.close().await {
            log::warn!("Failed to close agent conversation: {e}");
        }

        outcome
    }

    /// Consume events until the final one, answering permission requests in order
    async fn drive(
        &self,
        conversation: &mut B::Conversation,
        permissions: &PermissionCallback,
    ) -> Result<AgentResponse> {
        let mut remaining = self.timeout;
        let mut texts: Vec<String> = Vec::new();
        let mut denied = Vec::new();
        let mut tool_names: HashMap<String, String> = HashMap::new();

        loop {
            let started = Instant::now();
            let next = tokio::time::timeout(remaining, conversation.next_event())
                .await
                .map_err(|_| {
                    RelayError::timeout(format!(
                        "agent did not finish within {} seconds",
                        self.timeout.as_secs_f64()
                    ))
                })??;
            remaining = remaining.saturating_sub(started.elapsed());

            let Some(event) = next else {
                return Err(RelayError::agent(
                    "Agent stream ended without a final result",
                    None,
                    None,
                ));
            };

            match event {
                AgentEvent::Text(text) => texts.push(text),
                AgentEvent::ToolUse { id, name, .. } => {
                    log::info!("Agent is using tool {name}");
                    tool_names.insert(id, name.to_string());
                }
                AgentEvent::ToolResult {
                    tool_use_id,
                    is_error,
                    ..
                } => {
                    let name = tool_names.get(&tool_use_id).map_or("unknown", String::as_str);
                    log::debug!("Tool {name} finished (error: {is_error})");
                }
                AgentEvent::PermissionRequest(request) => {
                    let request_id = request.request_id.clone();
                    let tool_name = request.tool_name.clone();
                    // Waiting on the user does not count against the agent's budget
                    let result = permissions(request).await;
                    if result.is_allow() {
                        log::info!("Tool {tool_name} approved");
                    } else {
                        log::info!("Tool {tool_name} denied");
                        denied.push(tool_name);
                    }
                    conversation.respond(&request_id, result).await?;
                }
                AgentEvent::Final {
                    text,
                    is_error,
                    session_id,
                    num_turns,
                    total_cost_usd,
                } => {
                    log::info!(
                        "Agent turn finished: {num_turns} turns, cost {:.4} USD",
                        total_cost_usd.unwrap_or_default()
                    );
                    if is_error {
                        return Err(RelayError::agent(
                            text.unwrap_or_else(|| "Agent reported an error".to_string()),
                            None,
                            None,
                        ));
                    }
                    let text = text
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| texts.join("\n\n"));
                    return Ok(AgentResponse {
                        text: text.trim().to_string(),
                        continuation: session_id,
                        denied,
                    });
                }
            }
        }
    }
}

impl SdkInvoker<StreamJsonBackend> {
    /// Build from configuration, locating the CLI if no path is configured
    ///
    /// # Errors
    /// Returns `RelayError::CliNotFound` if the CLI cannot be located
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let mut backend = StreamJsonBackend::new(resolve_cli(config.cli_path.clone())?);
        if let Some(ref key) = config.api_key {
            backend = backend.env("ANTHROPIC_API_KEY", key);
        }
        Ok(Self::new(backend)
            .permission_mode(config.approval_mode.cli_mode())
            .model(config.model.clone())
            .timeout(config.agent_timeout))
    }
}

impl<B: AgentBackend> AgentInvoker for SdkInvoker<B> {
    async fn run(
        &self,
        session: &Session,
        prompt: &str,
        permissions: &PermissionCallback,
    ) -> Result<AgentResponse> {
        self.invoke(session, prompt, permissions)
            .await
            .map_err(into_agent_failure)
    }
}
