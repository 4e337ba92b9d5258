//! Decoding of Claude Code stream-json output into typed agent events

mod events;
mod parser;

pub use events::AgentEvent;
pub use parser::{into_events, parse_message};
