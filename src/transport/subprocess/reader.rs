//! Message reading logic for subprocess transport

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::error::{RelayError, Result};

use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Read messages from the subprocess output
    ///
    /// Spawns a background task that decodes one JSON value per stdout line.
    /// The channel closes when stdout reaches EOF.
    ///
    /// # Returns
    /// A receiver that yields parsed JSON values or errors
    pub(super) fn read_messages_impl(
        &mut self,
    ) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let stdout = self.stdout.take();
        let max_line = self.options.max_buffer_size;

        let task = tokio::spawn(async move {
            let Some(stdout) = stdout else {
                let _ = tx.send(Err(RelayError::transport(
                    "Not connected - stdout not available",
                )));
                return;
            };

            let mut lines = FramedRead::new(stdout, LinesCodec::new_with_max_length(max_line));

            while let Some(line) = lines.next().await {
                let item = match line {
                    Ok(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<serde_json::Value>(line) {
                            Ok(value) => Ok(value),
                            Err(e) => {
                                // The CLI occasionally prints plain text lines; skip them
                                log::debug!("Skipping non-JSON line from Claude Code: {e}");
                                continue;
                            }
                        }
                    }
                    Err(LinesCodecError::MaxLineLengthExceeded) => Err(RelayError::transport(
                        format!("JSON message exceeded maximum buffer size of {max_line} bytes"),
                    )),
                    Err(LinesCodecError::Io(e)) => {
                        let _ = tx.send(Err(RelayError::Io(e)));
                        break;
                    }
                };

                if tx.send(item).is_err() {
                    // Receiver dropped, stop reading
                    break;
                }
            }
        });

        self.reader_task = Some(task);

        rx
    }
}
