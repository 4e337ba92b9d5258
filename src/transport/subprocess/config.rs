//! Configuration constants and launch options for the CLI subprocess

use std::collections::HashMap;
use std::path::PathBuf;

use crate::types::identifiers::AgentSessionId;
use crate::types::permissions::PermissionMode;

/// Default maximum size of one stream-json line (1MB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Maximum stderr kept for error reports (64KB)
pub const MAX_STDERR_CAPTURE: usize = 64 * 1024;

/// Value of `CLAUDE_CODE_ENTRYPOINT` for processes started by the relay
pub const ENTRYPOINT: &str = "sdk-rust-chat-relay";

/// Environment variables that must not be overridden through `LaunchOptions::env`
///
/// These variables can affect how the subprocess loads and executes code.
pub const DANGEROUS_ENV_VARS: &[&str] = &[
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    "PATH",
    "NODE_OPTIONS",
    "PYTHONPATH",
    "PERL5LIB",
    "RUBYLIB",
];

/// How the CLI exchanges data with the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Prompt on stdin, final answer as plain text on stdout
    Print,
    /// Line-delimited JSON in both directions, with tool approval over stdio
    StreamJson,
}

/// Everything needed to start one CLI process
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Data exchange mode
    pub mode: LaunchMode,
    /// Value for `--permission-mode`
    pub permission_mode: PermissionMode,
    /// Pass `--continue` (resume the most recent conversation in `cwd`)
    pub continue_conversation: bool,
    /// Pass `--resume <id>`
    pub resume: Option<AgentSessionId>,
    /// Pass `--model <model>`
    pub model: Option<String>,
    /// Working directory of the process
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: HashMap<String, String>,
    /// Maximum size of one stream-json line
    pub max_buffer_size: usize,
}

impl LaunchOptions {
    /// Options for the given mode with everything else unset
    #[must_use]
    pub fn new(mode: LaunchMode) -> Self {
        Self {
            mode,
            permission_mode: PermissionMode::BypassPermissions,
            continue_conversation: false,
            resume: None,
            model: None,
            cwd: None,
            env: HashMap::new(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }

    /// Set the permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.permission_mode = mode;
        self
    }

    /// Continue the most recent conversation in the working directory
    #[must_use]
    pub const fn continue_conversation(mut self, yes: bool) -> Self {
        self.continue_conversation = yes;
        self
    }

    /// Resume a specific agent session
    #[must_use]
    pub fn resume(mut self, session: Option<AgentSessionId>) -> Self {
        self.resume = session;
        self
    }

    /// Select the model
    #[must_use]
    pub fn model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Add an environment variable
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}
