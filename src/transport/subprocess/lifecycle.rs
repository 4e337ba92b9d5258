//! Lifecycle management for subprocess transport (connect, close)

use std::process::Stdio;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{RelayError, Result};

use super::command::CommandBuilder;
use super::config::MAX_STDERR_CAPTURE;
use super::transport::SubprocessTransport;

/// Time a process gets to exit on its own after stdin is closed
const GRACEFUL_EXIT: Duration = Duration::from_secs(5);

impl SubprocessTransport {
    /// Spawn the CLI process and set up stdio pipes
    ///
    /// # Errors
    /// Returns error if process spawning fails or stdio handles cannot be obtained
    pub(super) async fn connect_impl(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Ok(());
        }

        let mut cmd = CommandBuilder::new(&self.cli_path, &self.options).build();

        // Pipe stderr instead of inheriting so the child never touches our terminal
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            if let Some(ref cwd) = self.options.cwd
                && !cwd.exists()
            {
                return RelayError::transport(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                ));
            }
            if e.kind() == std::io::ErrorKind::NotFound {
                return RelayError::cli_not_found();
            }
            RelayError::transport(format!("Failed to start Claude Code: {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RelayError::transport("Failed to get stdin handle"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RelayError::transport("Failed to get stdout handle"))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RelayError::transport("Failed to get stderr handle"))?;

        // Consume stderr so the child never blocks on a full pipe; keep a bounded copy
        let captured = self.stderr.clone();
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("claude stderr: {line}");
                let mut buf = captured.lock();
                if buf.len() + line.len() < MAX_STDERR_CAPTURE {
                    buf.push_str(&line);
                    buf.push('\n');
                }
            }
        });

        log::debug!("Started Claude Code stream session (pid {:?})", child.id());

        self.stdin = Some(stdin);
        self.stdout = Some(stdout);
        self.process = Some(child);
        self.stderr_task = Some(stderr_task);
        self.ready.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Close the transport and clean up resources
    ///
    /// # Errors
    /// Returns error if waiting for the process fails
    pub(super) async fn close_impl(&mut self) -> Result<()> {
        self.ready.store(false, Ordering::SeqCst);

        // Close stdin to signal the process to exit gracefully
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        self.stdout = None;

        if let Some(mut child) = self.process.take() {
            match tokio::time::timeout(GRACEFUL_EXIT, child.wait()).await {
                Ok(Ok(status)) => {
                    self.exit_status = Some(status);
                }
                Ok(Err(e)) => {
                    return Err(RelayError::Io(e));
                }
                Err(_) => {
                    log::warn!("Claude Code did not exit after stdin closed, killing it");
                    let _ = child.kill().await;
                    self.exit_status = child.wait().await.ok();
                }
            }
        }

        // stderr reaches EOF once the process is gone
        if let Some(task) = self.stderr_task.take() {
            let _ = tokio::time::timeout(Duration::from_millis(500), task).await;
        }

        Ok(())
    }

    /// Handle Drop cleanup
    pub(super) fn drop_impl(&mut self) {
        drop(self.stdin.take());

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        if let Some(mut child) = self.process.take() {
            let _ = child.start_kill();
        }
    }
}
