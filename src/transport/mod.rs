//! Transport layer for communicating with Claude Code CLI
//!
//! This module provides the transport abstraction and the subprocess
//! implementations used by both agent variants.

pub mod subprocess;

use tokio::sync::mpsc;

use crate::error::Result;

/// Transport trait for a bidirectional session with Claude Code
///
/// This trait defines the interface for sending and receiving line-delimited
/// JSON to/from a running Claude Code CLI process.
pub trait Transport: Send + Sync {
    /// Connect to the transport
    ///
    /// # Errors
    /// Returns error if connection fails
    fn connect(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Write data to the transport
    ///
    /// # Arguments
    /// * `data` - String data to write (typically one JSON line)
    ///
    /// # Errors
    /// Returns error if write fails or transport is not ready
    fn write(&mut self, data: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    /// End the input stream (close stdin)
    ///
    /// # Errors
    /// Returns error if closing fails
    fn end_input(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Read messages from the transport
    ///
    /// Returns a receiver that yields JSON values emitted by Claude Code.
    /// A background task does the reading, so writes can proceed concurrently.
    /// The receiver is closed when the transport ends.
    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>>;

    /// Check if transport is ready for communication
    fn is_ready(&self) -> bool;

    /// Close the transport and clean up resources
    ///
    /// # Errors
    /// Returns error if cleanup fails
    fn close(&mut self) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub use subprocess::{
    LaunchMode, LaunchOptions, ProcessOutput, SubprocessTransport, find_cli, resolve_cli, run_once,
};
