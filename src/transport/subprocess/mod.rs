//! Subprocess transport implementation using Claude Code CLI
//!
//! Two ways of running the CLI:
//! - [`run_once`] - one `--print` process per prompt, output collected after exit
//! - [`SubprocessTransport`] - one stream-json process for the length of a turn

mod command;
mod config;
mod lifecycle;
mod oneshot;
mod reader;
mod transport;

// Re-export public types
pub use command::CommandBuilder;
pub use config::{DEFAULT_MAX_BUFFER_SIZE, LaunchMode, LaunchOptions};
pub use oneshot::{ProcessOutput, run_once};
pub use transport::{SubprocessTransport, find_cli, resolve_cli};
