//! One process per prompt: write stdin, collect stdout/stderr, wait for exit

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::ChildStdin;

use crate::error::{RelayError, Result};

use super::command::CommandBuilder;
use super::config::LaunchOptions;

/// Captured result of a finished CLI process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Everything written to standard output
    pub stdout: String,
    /// Everything written to standard error
    pub stderr: String,
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
}

impl ProcessOutput {
    /// Whether the process exited with code 0
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

/// Run the CLI once with `input` on standard input
///
/// Standard input is closed after the prompt is written. Output is read
/// until the process exits. If it runs longer than `timeout` the process
/// is killed and reaped.
///
/// # Errors
/// - `RelayError::CliNotFound` if the executable does not exist
/// - `RelayError::Timeout` if the process outlived `timeout`
/// - `RelayError::Transport` / `RelayError::Io` for pipe failures
pub async fn run_once(
    cli_path: &Path,
    options: &LaunchOptions,
    input: &str,
    timeout: Duration,
) -> Result<ProcessOutput> {
    let mut cmd = CommandBuilder::new(cli_path, options).build();
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| spawn_error(&e, cli_path, options))?;
    log::debug!("Spawned {} (pid {:?})", cli_path.display(), child.id());

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

    let waited = tokio::time::timeout(timeout, async {
        let (fed, status, out, err) =
            tokio::join!(feed(stdin, input), child.wait(), drain(stdout), drain(stderr));
        if let Err(e) = fed
            && e.kind() != io::ErrorKind::BrokenPipe
        {
            log::warn!("Failed to write prompt to agent stdin: {e}");
        }
        Ok::<_, io::Error>((status?, out?, err?))
    })
    .await;

    match waited {
        Ok(Ok((status, stdout, stderr))) => Ok(ProcessOutput {
            stdout,
            stderr,
            exit_code: status.code(),
        }),
        Ok(Err(e)) => Err(RelayError::Io(e)),
        Err(_) => {
            log::warn!("Agent process exceeded {timeout:?}, terminating");
            if let Err(e) = child.start_kill() {
                log::warn!("Failed to kill agent process: {e}");
            }
            let _ = child.wait().await;
            Err(RelayError::timeout(format!(
                "agent process did not finish within {} seconds",
                timeout.as_secs_f64()
            )))
        }
    }
}

async fn feed(mut stdin: ChildStdin, input: &str) -> io::Result<()> {
    stdin.write_all(input.as_bytes()).await?;
    stdin.flush().await?;
    stdin.shutdown().await
    // dropping stdin closes the pipe
}

async fn drain<R: AsyncRead + Unpin>(mut reader: R) -> io::Result<String> {
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn spawn_error(e: &io::Error, cli_path: &Path, options: &LaunchOptions) -> RelayError {
    if let Some(ref cwd) = options.cwd
        && !cwd.exists()
    {
        return RelayError::transport(format!(
            "Working directory does not exist: {}",
            cwd.display()
        ));
    }
    if e.kind() == io::ErrorKind::NotFound {
        log::error!("Claude CLI not found at {}", cli_path.display());
        return RelayError::cli_not_found();
    }
    RelayError::transport(format!("Failed to start Claude Code: {e}"))
}
