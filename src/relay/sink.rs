//! Outbound side of the messaging platform

use std::future::Future;
use std::path::Path;

use crate::error::Result;
use crate::permissions::PermissionPrompt;
use crate::types::identifiers::ChatId;

/// Delivers relay output to a chat
///
/// Implemented by the platform adapter. Every method is called with text
/// that already fits the configured message size.
pub trait ChatSink: Send + Sync + 'static {
    /// Send one text message
    ///
    /// # Errors
    /// Returns `RelayError::Platform` if the platform rejects the message
    fn send_text(&self, chat_id: ChatId, text: &str) -> impl Future<Output = Result<()>> + Send;

    /// Present a permission prompt with approve and deny options
    ///
    /// # Errors
    /// Returns `RelayError::Platform` if the prompt cannot be shown
    fn send_permission_prompt(
        &self,
        chat_id: ChatId,
        prompt: &PermissionPrompt,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Send an image file
    ///
    /// # Errors
    /// Returns `RelayError::Platform` if the image cannot be delivered
    fn send_image(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}
