//! Process variant: one `claude --print` run per message

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{DEFAULT_AGENT_TIMEOUT, RelayConfig};
use crate::error::{RelayError, Result};
use crate::session::{Session, prepare_working_dir};
use crate::transport::{LaunchMode, LaunchOptions, ProcessOutput, resolve_cli, run_once};
use crate::types::permissions::{PermissionCallback, PermissionMode};

use super::{AgentInvoker, AgentResponse, into_agent_failure};

/// Runs the CLI as a stateless call: `(working_dir, continue_flag, prompt) -> output`
#[derive(Debug, Clone)]
pub struct CliInvoker {
    cli_path: PathBuf,
    permission_mode: PermissionMode,
    model: Option<String>,
    timeout: Duration,
}

impl CliInvoker {
    /// Invoker for the CLI at `cli_path` with bypass permissions
    pub fn new(cli_path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: cli_path.into(),
            permission_mode: PermissionMode::BypassPermissions,
            model: None,
            timeout: DEFAULT_AGENT_TIMEOUT,
        }
    }

    /// Build from configuration, locating the CLI if no path is configured
    ///
    /// # Errors
    /// Returns `RelayError::CliNotFound` if the CLI cannot be located
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let cli_path = resolve_cli(config.cli_path.clone())?;
        let mode = config.approval_mode.cli_mode();
        if mode != PermissionMode::BypassPermissions {
            log::warn!(
                "Interactive approval is not available in CLI mode; \
                 tools that need approval will be refused by the CLI"
            );
        }
        Ok(Self::new(cli_path)
            .permission_mode(mode)
            .model(config.model.clone())
            .timeout(config.agent_timeout))
    }

    /// Set the permission mode passed to the CLI
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

    /// Bound on one run
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Launch options for one run in `session`
    #[must_use]
    pub fn launch_options(&self, session: &Session) -> LaunchOptions {
        LaunchOptions::new(LaunchMode::Print)
            .permission_mode(self.permission_mode)
            .continue_conversation(session.has_prior_run())
            .model(self.model.clone())
            .cwd(&session.working_dir)
    }

    async fn invoke(&self, session: &Session, prompt: &str) -> Result<AgentResponse> {
        prepare_working_dir(&session.working_dir).await?;

        let options = self.launch_options(session);
        log::info!(
            "Sending prompt to Claude CLI (--print mode) for chat {} (continue: {})",
            session.chat_id,
            options.continue_conversation
        );

        let output = run_once(&self.cli_path, &options, prompt, self.timeout).await?;
        interpret(output)
    }
}

/// Map a finished process to a reply or an agent error
fn interpret(output: ProcessOutput) -> Result<AgentResponse> {
    let stderr = output.stderr.trim().to_string();

    if !output.success() {
        let code = output
            .exit_code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        return Err(RelayError::agent(
            format!("Claude CLI exited with {code}: {stderr}"),
            output.exit_code,
            Some(stderr),
        ));
    }

    let text = output.stdout.trim();
    if text.is_empty() {
        return Err(RelayError::empty_response(
            (!stderr.is_empty()).then_some(stderr),
        ));
    }

    Ok(AgentResponse::text(text))
}

impl AgentInvoker for CliInvoker {
    async fn run(
        &self,
        session: &Session,
        prompt: &str,
        _permissions: &PermissionCallback,
    ) -> Result<AgentResponse> {
        // Print mode has no channel for approvals; the permission mode flag decides
        self.invoke(session, prompt).await.map_err(into_agent_failure)
    }
}
