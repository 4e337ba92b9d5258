//! Agent backend over the Claude Code CLI stream-json protocol

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use tokio::sync::mpsc;

use crate::control::{OutboundMessage, RequestIds};
use crate::error::{RelayError, Result};
use crate::message::{AgentEvent, into_events, parse_message};
use crate::transport::{LaunchMode, LaunchOptions, SubprocessTransport, Transport};
use crate::types::identifiers::RequestId;
use crate::types::messages::{ControlRequestBody, Message};
use crate::types::permissions::PermissionResult;

use super::sdk::{AgentBackend, AgentRequest, Conversation};

/// Starts one CLI process per turn speaking stream-json on stdin/stdout
#[derive(Debug, Clone)]
pub struct StreamJsonBackend {
    cli_path: PathBuf,
    env: HashMap<String, String>,
}

impl StreamJsonBackend {
    /// Backend using the CLI at `cli_path`
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            env: HashMap::new(),
        }
    }

    /// Add an environment variable for the CLI process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn launch_options(&self, request: &AgentRequest) -> LaunchOptions {
        let mut options = LaunchOptions::new(LaunchMode::StreamJson)
            .permission_mode(request.permission_mode)
            .resume(request.resume.clone())
            .model(request.model.clone())
            .cwd(&request.working_dir);
        for (key, value) in &self.env {
            options = options.env(key, value);
        }
        options
    }
}

impl AgentBackend for StreamJsonBackend {
    type Conversation = StreamJsonConversation;

    async fn start(&self, request: AgentRequest) -> Result<StreamJsonConversation> {
        let options = self.launch_options(&request);
        let mut transport = SubprocessTransport::new(options, Some(self.cli_path.clone()))?;
        transport.connect().await?;
        let messages = transport.read_messages();

        let mut conversation = StreamJsonConversation {
            transport,
            messages,
            pending: VecDeque::new(),
            tool_inputs: HashMap::new(),
            finished: false,
        };

        let ids = RequestIds::new();
        conversation
            .send(&OutboundMessage::initialize(ids.next_id()))
            .await?;
        let session_id = request.resume.unwrap_or_default();
        conversation
            .send(&OutboundMessage::user(request.prompt, session_id))
            .await?;

        Ok(conversation)
    }
}

/// One running stream-json turn
pub struct StreamJsonConversation {
    transport: SubprocessTransport,
    messages: mpsc::UnboundedReceiver<Result<serde_json::Value>>,
    pending: VecDeque<AgentEvent>,
    tool_inputs: HashMap<RequestId, serde_json::Value>,
    finished: bool,
}

impl StreamJsonConversation {
    async fn send(&mut self, message: &OutboundMessage) -> Result<()> {
        let line = message.to_line()?;
        self.transport.write(&line).await
    }

    /// Error for a process that stopped talking before its final result
    async fn ended_early(&mut self) -> RelayError {
        if let Err(e) = self.transport.close().await {
            log::warn!("Failed to close Claude Code process: {e}");
        }
        let stderr = self.transport.stderr_output().trim().to_string();
        let exit_code = self.transport.exit_code();
        RelayError::agent(
            format!("Claude Code exited before finishing (exit code {exit_code:?}): {stderr}"),
            exit_code,
            (!stderr.is_empty()).then_some(stderr),
        )
    }
}

impl Conversation for StreamJsonConversation {
    async fn next_event(&mut self) -> Result<Option<AgentEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            let Some(item) = self.messages.recv().await else {
                return Err(self.ended_early().await);
            };

            let message = match parse_message(item?) {
                Ok(message) => message,
                Err(e) => {
                    log::debug!("Ignoring unrecognised message: {e}");
                    continue;
                }
            };

            match message {
                Message::ControlRequest {
                    request_id,
                    request: ControlRequestBody::Unsupported,
                } => {
                    log::warn!("Refusing unsupported control request {request_id}");
                    self.send(&OutboundMessage::unsupported(
                        request_id,
                        "Unsupported control request",
                    ))
                    .await?;
                }
                Message::ControlCancelRequest { request_id } => {
                    log::debug!("Claude Code cancelled control request {request_id}");
                }
                message => {
                    for event in into_events(message) {
                        match &event {
                            AgentEvent::PermissionRequest(request) => {
                                self.tool_inputs
                                    .insert(request.request_id.clone(), request.input.clone());
                            }
                            AgentEvent::Final { .. } => {
                                self.finished = true;
                                // The turn is over; let the process exit
                                self.transport.end_input().await?;
                            }
                            _ => {}
                        }
                        self.pending.push_back(event);
                    }
                }
            }
        }
    }

    async fn respond(&mut self, request_id: &RequestId, result: PermissionResult) -> Result<()> {
        let input = self
            .tool_inputs
            .remove(request_id)
            .unwrap_or(serde_json::Value::Null);
        self.send(&OutboundMessage::permission(request_id, result, input))
            .await
    }

    async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

impl std::fmt::Debug for StreamJsonConversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamJsonConversation")
            .field("pending", &self.pending.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}
