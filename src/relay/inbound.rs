//! Inbound platform events

use crate::types::identifiers::ChatId;

/// Chat commands understood by the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Restart the conversation (history only)
    Start,
    /// Drop history and the agent's working state
    Clear,
    /// Show usage help
    Help,
}

impl Command {
    /// Parse `/start`, `/clear` or `/help` (an `@botname` suffix is ignored)
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.trim().split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Self::Start),
            "clear" => Some(Self::Clear),
            "help" => Some(Self::Help),
            _ => None,
        }
    }
}

/// File attached to a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Photo
    Image {
        /// Raw image bytes
        data: Vec<u8>,
    },
    /// Any other file
    Document {
        /// Original file name
        file_name: String,
        /// MIME type reported by the platform
        mime_type: Option<String>,
        /// Raw file bytes
        data: Vec<u8>,
    },
}

/// Event delivered by the messaging platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// User message, optionally with an attachment
    Message {
        /// Chat the message came from
        chat_id: ChatId,
        /// Message text or attachment caption
        text: String,
        /// Attached file
        attachment: Option<Attachment>,
    },
    /// Chat command
    Command {
        /// Chat the command came from
        chat_id: ChatId,
        /// Command
        command: Command,
    },
    /// User pressed one of the options of a permission prompt
    Callback {
        /// Chat the prompt was shown in
        chat_id: ChatId,
        /// Opaque callback data of the option
        data: String,
    },
}

impl InboundEvent {
    /// Text message, or command when the text is one
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        let text = text.into();
        match Command::parse(&text) {
            Some(command) => Self::Command { chat_id, command },
            None => Self::Message {
                chat_id,
                text,
                attachment: None,
            },
        }
    }

    /// Chat the event belongs to
    #[must_use]
    pub const fn chat_id(&self) -> ChatId {
        match self {
            Self::Message { chat_id, .. }
            | Self::Command { chat_id, .. }
            | Self::Callback { chat_id, .. } => *chat_id,
        }
    }
}
