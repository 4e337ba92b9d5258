//! # Claude Chat Relay
//!
//! Relays chat messages to the Claude Code agent and sends its replies back.
//!
//! Each chat gets an isolated [`Session`](session::Session): its own working
//! directory, a bounded history of exchanges and the agent's continuation
//! token. Messages of one chat are processed one at a time through the
//! [`ConcurrencyGate`]; different chats run in parallel.
//!
//! ## Pieces
//!
//! - [`SessionStore`] - per-chat working state
//! - [`ConcurrencyGate`] - per-chat (or global) serialization
//! - [`AgentInvoker`] - one user message in, one reply out
//!   - [`CliInvoker`](agent::CliInvoker) spawns `claude --print` per message
//!   - [`SdkInvoker`](agent::SdkInvoker) drives a stream-json conversation
//!     and routes tool-use requests through a permission callback
//! - [`PermissionBroker`] - pending tool approvals with timeouts
//! - [`format`] - message splitting and image path extraction
//! - [`Relay`] - dispatches [`InboundEvent`]s and answers through a [`ChatSink`]
//!
//! ## Example
//!
//! ```no_run
//! use claude_chat_relay::{ConsoleSink, Invoker, Relay, RelayConfig, InboundEvent, ChatId};
//!
//! # async fn example() -> claude_chat_relay::Result<()> {
//! let config = RelayConfig::from_env()?;
//! let invoker = Invoker::from_config(&config)?;
//! let relay = Relay::new(config, invoker, ConsoleSink::stdout());
//!
//! relay.handle(InboundEvent::text(ChatId::new(1), "What does main.rs do?")).await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agent;
pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod format;
pub mod gate;
pub mod message;
pub mod permissions;
pub mod relay;
pub mod session;
pub mod transport;
pub mod types;

pub use agent::{AgentInvoker, AgentResponse, CliInvoker, Invoker, SdkInvoker};
pub use config::{AgentMode, LockScope, RelayConfig, RelayConfigBuilder};
pub use console::ConsoleSink;
pub use error::{RelayError, Result};
pub use format::{extract_image_paths, split_message};
pub use gate::{ConcurrencyGate, GateGuard, GateTicket};
pub use message::{AgentEvent, parse_message};
pub use permissions::{PendingPermissionRequest, PermissionAction, PermissionBroker};
pub use relay::{Admitted, Attachment, ChatSink, Command, InboundEvent, Relay};
pub use session::{Exchange, Session, SessionStore};
pub use transport::{SubprocessTransport, Transport};
pub use types::identifiers::{AgentSessionId, ChatId, RequestId, ToolName};
pub use types::permissions::{
    ApprovalMode, PermissionCallback, PermissionMode, PermissionOutcome, PermissionResult,
    ToolUseRequest,
};

/// Version of the relay
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
