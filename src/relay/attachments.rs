//! Turning attachments into agent prompts

use std::path::Path;

use crate::error::Result;
use crate::format::hard_truncate;

use super::inbound::Attachment;

/// Most characters of a document's content placed in the prompt
pub const MAX_DOCUMENT_CHARS: usize = 4000;

const DEFAULT_IMAGE_CAPTION: &str = "What's in this image?";

/// Prompt for the agent plus the text recorded in history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPrompt {
    /// Text sent to the agent
    pub prompt: String,
    /// Text recorded as the user's side of the exchange
    pub history_text: String,
}

impl PreparedPrompt {
    /// Plain text message
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            prompt: text.clone(),
            history_text: text,
        }
    }
}

/// Build the prompt for a message with an attachment
///
/// Images (and documents with an `image/*` type) are written into
/// `working_dir` so the agent can open them; other documents are inlined.
///
/// # Errors
/// Returns error if an image cannot be written to `working_dir`
pub async fn prepare(
    working_dir: &Path,
    caption: &str,
    attachment: Attachment,
) -> Result<PreparedPrompt> {
    let caption = caption.trim();
    match attachment {
        Attachment::Image { data } => {
            image_prompt(working_dir, &photo_file_name(), caption, &data).await
        }
        Attachment::Document {
            file_name,
            mime_type,
            data,
        } => {
            let mime = mime_type.unwrap_or_default();
            if mime.starts_with("image/") {
                let name = safe_file_name(&file_name, &photo_file_name());
                return image_prompt(working_dir, &name, caption, &data).await;
            }

            let content = document_content(&file_name, &mime, &data);
            let caption = if caption.is_empty() {
                format!("Analyze this file: {file_name}")
            } else {
                caption.to_string()
            };
            Ok(PreparedPrompt {
                prompt: format!(
                    "{caption}\n\nFile content:\n{}",
                    hard_truncate(&content, MAX_DOCUMENT_CHARS)
                ),
                history_text: format!("[File: {file_name}] {caption}"),
            })
        }
    }
}

async fn image_prompt(
    working_dir: &Path,
    file_name: &str,
    caption: &str,
    data: &[u8],
) -> Result<PreparedPrompt> {
    tokio::fs::create_dir_all(working_dir).await?;
    let path = working_dir.join(file_name);
    tokio::fs::write(&path, data).await?;
    log::info!("Saved image attachment to {}", path.display());

    let caption = if caption.is_empty() {
        DEFAULT_IMAGE_CAPTION
    } else {
        caption
    };
    Ok(PreparedPrompt {
        prompt: format!(
            "{caption}\n\nUser has sent an image saved at: {}\n\
             Please analyze this image and respond to the user's request.",
            path.display()
        ),
        history_text: format!("[Image] {caption}"),
    })
}

fn document_content(file_name: &str, mime: &str, data: &[u8]) -> String {
    if mime.starts_with("text/") {
        match std::str::from_utf8(data) {
            Ok(text) => text.to_string(),
            Err(_) => format!("[Text file: {file_name} - unable to decode]"),
        }
    } else if mime == "application/pdf" {
        format!("[PDF file: {file_name}]")
    } else {
        let mime = if mime.is_empty() { "unknown" } else { mime };
        format!("[File: {file_name}, Type: {mime}]")
    }
}

/// Fresh name for a photo, so earlier photos in the chat stay readable
fn photo_file_name() -> String {
    format!("image_{}.jpg", uuid::Uuid::new_v4().simple())
}

/// File name without directory components
fn safe_file_name(name: &str, fallback: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(fallback)
        .to_string()
}
