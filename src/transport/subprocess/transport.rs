//! Subprocess transport implementation using Claude Code CLI

use parking_lot::Mutex;
use std::env;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{RelayError, Result};
use crate::transport::Transport;

use super::config::LaunchOptions;

/// Stream-json transport over a Claude Code CLI subprocess
pub struct SubprocessTransport {
    pub(super) options: LaunchOptions,
    pub(super) cli_path: PathBuf,
    pub(super) process: Option<Child>,
    pub(super) stdin: Option<ChildStdin>,
    pub(super) stdout: Option<ChildStdout>,
    pub(super) ready: Arc<AtomicBool>,
    pub(super) reader_task: Option<JoinHandle<()>>,
    pub(super) stderr_task: Option<JoinHandle<()>>,
    pub(super) stderr: Arc<Mutex<String>>,
    pub(super) exit_status: Option<ExitStatus>,
}

impl SubprocessTransport {
    /// Create a new subprocess transport
    ///
    /// # Arguments
    /// * `options` - Launch options (mode, permission mode, session flags, cwd)
    /// * `cli_path` - Optional path to Claude Code CLI (will search if None)
    ///
    /// # Errors
    /// Returns error if CLI cannot be found
    pub fn new(options: LaunchOptions, cli_path: Option<PathBuf>) -> Result<Self> {
        let cli_path = resolve_cli(cli_path)?;

        Ok(Self {
            options,
            cli_path,
            process: None,
            stdin: None,
            stdout: None,
            ready: Arc::new(AtomicBool::new(false)),
            reader_task: None,
            stderr_task: None,
            stderr: Arc::new(Mutex::new(String::new())),
            exit_status: None,
        })
    }

    /// Standard error captured so far
    #[must_use]
    pub fn stderr_output(&self) -> String {
        self.stderr.lock().clone()
    }

    /// Exit code of the process, known once it has been closed
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.and_then(|s| s.code())
    }
}

/// Use the configured CLI path, or search for the CLI
///
/// # Errors
/// Returns error if no path is configured and the CLI cannot be found
pub fn resolve_cli(configured: Option<PathBuf>) -> Result<PathBuf> {
    match configured {
        Some(path) => Ok(path),
        None => find_cli(),
    }
}

/// Find Claude Code CLI binary
///
/// # Errors
/// Returns error if CLI cannot be found in PATH or common locations
pub fn find_cli() -> Result<PathBuf> {
    // Try using 'which' crate first
    if let Ok(path) = which::which("claude") {
        return Ok(path);
    }

    // Manual search in common locations
    let home = env::var("HOME").unwrap_or_else(|_| String::from("/root"));
    let locations = vec![
        PathBuf::from(home.clone()).join(".npm-global/bin/claude"),
        PathBuf::from("/usr/local/bin/claude"),
        PathBuf::from(home.clone()).join(".local/bin/claude"),
        PathBuf::from(home.clone()).join("node_modules/.bin/claude"),
        PathBuf::from(home).join(".yarn/bin/claude"),
    ];

    for path in locations {
        if path.exists() && path.is_file() {
            return Ok(path);
        }
    }

    Err(RelayError::cli_not_found())
}

impl Transport for SubprocessTransport {
    async fn connect(&mut self) -> Result<()> {
        self.connect_impl().await
    }

    async fn write(&mut self, data: &str) -> Result<()> {
        if !self.is_ready() {
            return Err(RelayError::transport("Transport is not ready for writing"));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RelayError::transport("stdin not available"))?;

        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| RelayError::transport(format!("Failed to write to stdin: {e}")))?;

        stdin
            .flush()
            .await
            .map_err(|e| RelayError::transport(format!("Failed to flush stdin: {e}")))?;

        Ok(())
    }

    async fn end_input(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin
                .shutdown()
                .await
                .map_err(|e| RelayError::transport(format!("Failed to close stdin: {e}")))?;
        }
        Ok(())
    }

    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        self.read_messages_impl()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn close(&mut self) -> Result<()> {
        self.close_impl().await
    }
}

impl Drop for SubprocessTransport {
    fn drop(&mut self) {
        self.drop_impl();
    }
}
