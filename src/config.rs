//! Relay configuration
//!
//! Settings are read once from the environment at startup and shared
//! read-only (`Arc<RelayConfig>`) by every component afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{RelayError, Result};
use crate::types::permissions::ApprovalMode;

/// Default number of exchanges kept per chat
pub const DEFAULT_HISTORY_CAP: usize = 20;

/// Default maximum characters per outbound chat message
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;

/// Default bound on one agent invocation
pub const DEFAULT_AGENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default bound on waiting for a permission decision
pub const DEFAULT_PERMISSION_TIMEOUT: Duration = Duration::from_secs(300);

const BOT_TOKEN_PLACEHOLDER: &str = "your_telegram_bot_token_here";
const API_KEY_PLACEHOLDER: &str = "your_anthropic_api_key_here";

/// Which agent integration handles messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentMode {
    /// Bidirectional stream-json session (library variant)
    #[default]
    Sdk,
    /// One `claude --print` process per message (process variant)
    Cli,
}

/// Granularity of the concurrency gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockScope {
    /// One lock per chat; different chats run in parallel
    #[default]
    PerChat,
    /// One lock for the whole process
    Global,
}

impl LockScope {
    /// Parse the configuration value (`chat` / `global`)
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chat" | "per_chat" | "per-chat" => Some(Self::PerChat),
            "global" => Some(Self::Global),
            _ => None,
        }
    }
}

/// Process-wide relay configuration
#[derive(Clone)]
pub struct RelayConfig {
    /// Messaging platform bot token
    pub bot_token: String,
    /// Anthropic API key, forwarded to the agent process
    pub api_key: Option<String>,
    /// Agent integration
    pub agent_mode: AgentMode,
    /// Tool-use approval mode
    pub approval_mode: ApprovalMode,
    /// Maximum exchanges kept per chat
    pub history_cap: usize,
    /// Maximum characters per outbound message
    pub max_message_length: usize,
    /// Bound on one agent invocation
    pub agent_timeout: Duration,
    /// Bound on waiting for a permission decision
    pub permission_timeout: Duration,
    /// Directory under which per-chat working directories are created
    pub session_root: PathBuf,
    /// Explicit path to the Claude Code CLI
    pub cli_path: Option<PathBuf>,
    /// Model override passed to the CLI
    pub model: Option<String>,
    /// Concurrency gate granularity
    pub lock_scope: LockScope,
    /// Bounded wait for the gate; `None` waits indefinitely
    pub busy_timeout: Option<Duration>,
}

impl RelayConfig {
    /// Create a new builder for `RelayConfig`
    #[must_use]
    pub fn builder() -> RelayConfigBuilder {
        RelayConfigBuilder::default()
    }

    /// Load configuration from process environment variables
    ///
    /// # Errors
    /// Returns `RelayError::Config` if a required variable is missing or a value is invalid
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup function
    ///
    /// # Errors
    /// Returns `RelayError::Config` if a required variable is missing or a value is invalid
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            RelayError::config("Missing required environment variable: TELEGRAM_BOT_TOKEN")
        })?;

        let agent_mode = match get("USE_CLAUDE_CLI") {
            Some(v) if v.trim().eq_ignore_ascii_case("true") => AgentMode::Cli,
            _ => AgentMode::Sdk,
        };

        let approval_mode = match get("PERMISSION_MODE") {
            Some(v) => ApprovalMode::parse(&v).ok_or_else(|| {
                RelayError::config(format!(
                    "PERMISSION_MODE must be 'bypass' or 'interactive', got '{v}'"
                ))
            })?,
            None => ApprovalMode::default(),
        };

        let lock_scope = match get("LOCK_SCOPE") {
            Some(v) => LockScope::parse(&v).ok_or_else(|| {
                RelayError::config(format!("LOCK_SCOPE must be 'chat' or 'global', got '{v}'"))
            })?,
            None => LockScope::default(),
        };

        let mut builder = Self::builder()
            .bot_token(bot_token)
            .agent_mode(agent_mode)
            .approval_mode(approval_mode)
            .lock_scope(lock_scope);

        if let Some(key) = get("ANTHROPIC_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Some(v) = get("MAX_HISTORY_LENGTH") {
            builder = builder.history_cap(parse_count("MAX_HISTORY_LENGTH", &v)?);
        }
        if let Some(v) = get("MAX_MESSAGE_LENGTH") {
            builder = builder.max_message_length(parse_count("MAX_MESSAGE_LENGTH", &v)?);
        }
        if let Some(v) = get("CLAUDE_TIMEOUT") {
            builder = builder.agent_timeout(parse_seconds("CLAUDE_TIMEOUT", &v)?);
        }
        if let Some(v) = get("PERMISSION_TIMEOUT") {
            builder = builder.permission_timeout(parse_seconds("PERMISSION_TIMEOUT", &v)?);
        }
        if let Some(v) = get("BUSY_TIMEOUT") {
            builder = builder.busy_timeout(parse_seconds("BUSY_TIMEOUT", &v)?);
        }
        if let Some(v) = get("SESSION_ROOT") {
            builder = builder.session_root(v);
        }
        if let Some(v) = get("CLAUDE_CLI_PATH") {
            builder = builder.cli_path(v);
        }
        if let Some(v) = get("CLAUDE_MODEL") {
            builder = builder.model(v);
        }

        let config = builder.build();
        config.validate()?;

        log::info!(
            "Configuration loaded - Mode: {}",
            match config.agent_mode {
                AgentMode::Cli => "CLI",
                AgentMode::Sdk => "SDK",
            }
        );
        Ok(config)
    }

    /// Validate credentials and limits
    ///
    /// # Errors
    /// Returns `RelayError::Config` describing the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.trim().is_empty() || self.bot_token == BOT_TOKEN_PLACEHOLDER {
            return Err(RelayError::config(
                "TELEGRAM_BOT_TOKEN is not configured (missing or placeholder)",
            ));
        }

        if self.agent_mode == AgentMode::Sdk {
            match self.api_key.as_deref() {
                Some(key) if !key.trim().is_empty() && key != API_KEY_PLACEHOLDER => {}
                _ => {
                    return Err(RelayError::config(
                        "Missing required environment variable: ANTHROPIC_API_KEY \
                         (required when USE_CLAUDE_CLI=false)",
                    ));
                }
            }
        }

        if self.history_cap == 0 {
            return Err(RelayError::config("MAX_HISTORY_LENGTH must be at least 1"));
        }
        if self.max_message_length == 0 {
            return Err(RelayError::config("MAX_MESSAGE_LENGTH must be at least 1"));
        }
        if self.agent_timeout.is_zero() || self.permission_timeout.is_zero() {
            return Err(RelayError::config("Timeouts must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_key: None,
            agent_mode: AgentMode::default(),
            approval_mode: ApprovalMode::default(),
            history_cap: DEFAULT_HISTORY_CAP,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            agent_timeout: DEFAULT_AGENT_TIMEOUT,
            permission_timeout: DEFAULT_PERMISSION_TIMEOUT,
            session_root: std::env::temp_dir(),
            cli_path: None,
            model: None,
            lock_scope: LockScope::default(),
            busy_timeout: None,
        }
    }
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("bot_token", &"<redacted>")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("agent_mode", &self.agent_mode)
            .field("approval_mode", &self.approval_mode)
            .field("history_cap", &self.history_cap)
            .field("max_message_length", &self.max_message_length)
            .field("agent_timeout", &self.agent_timeout)
            .field("permission_timeout", &self.permission_timeout)
            .field("session_root", &self.session_root)
            .field("cli_path", &self.cli_path)
            .field("model", &self.model)
            .field("lock_scope", &self.lock_scope)
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RelayError::config(format!(
            "{key} must be a positive integer, got '{value}'"
        ))),
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    match value.trim().parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(Duration::from_secs_f64(secs)),
        _ => Err(RelayError::config(format!(
            "{key} must be a positive number of seconds, got '{value}'"
        ))),
    }
}

// ============================================================================
// Builder for RelayConfig
// ============================================================================

/// Builder for `RelayConfig`
#[derive(Debug, Default)]
pub struct RelayConfigBuilder {
    config: RelayConfig,
}

impl RelayConfigBuilder {
    /// Set the platform bot token
    #[must_use]
    pub fn bot_token(mut self, token: impl Into<String>) -> Self {
        self.config.bot_token = token.into();
        self
    }

    /// Set the Anthropic API key
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Set the agent integration
    #[must_use]
    pub const fn agent_mode(mut self, mode: AgentMode) -> Self {
        self.config.agent_mode = mode;
        self
    }

    /// Set the approval mode
    #[must_use]
    pub const fn approval_mode(mut self, mode: ApprovalMode) -> Self {
        self.config.approval_mode = mode;
        self
    }

    /// Set the per-chat history cap (exchanges)
    #[must_use]
    pub const fn history_cap(mut self, cap: usize) -> Self {
        self.config.history_cap = cap;
        self
    }

    /// Set the outbound message length limit
    #[must_use]
    pub const fn max_message_length(mut self, len: usize) -> Self {
        self.config.max_message_length = len;
        self
    }

    /// Set the agent invocation timeout
    #[must_use]
    pub const fn agent_timeout(mut self, timeout: Duration) -> Self {
        self.config.agent_timeout = timeout;
        self
    }

    /// Set the permission decision timeout
    #[must_use]
    pub const fn permission_timeout(mut self, timeout: Duration) -> Self {
        self.config.permission_timeout = timeout;
        self
    }

    /// Set the session root directory
    #[must_use]
    pub fn session_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.session_root = path.into();
        self
    }

    /// Set the Claude Code CLI path
    #[must_use]
    pub fn cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cli_path = Some(path.into());
        self
    }

    /// Set the model override
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Set the gate granularity
    #[must_use]
    pub const fn lock_scope(mut self, scope: LockScope) -> Self {
        self.config.lock_scope = scope;
        self
    }

    /// Set the bounded gate wait
    #[must_use]
    pub const fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.busy_timeout = Some(timeout);
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> RelayConfig {
        self.config
    }
}
