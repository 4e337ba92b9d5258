//! Outbound message formatting
//!
//! Splits agent replies into chunks that fit the platform's message size
//! limit and finds image paths mentioned in a reply. Lengths are counted in
//! characters, and every cut falls on a character boundary.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{RelayError, Result};

/// Extensions recognised as images in agent replies
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp", "svg"];

/// Extensions that can be delivered as a photo
pub const SENDABLE_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

static IMAGE_PATH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let ext = IMAGE_EXTENSIONS.join("|");
    [
        format!(r"(?i)`([^`]+\.(?:{ext}))`"),
        format!(r"(?i)\[([^\]]+\.(?:{ext}))\]"),
        format!(r"(?i)([~/\w\-.]+\.(?:{ext}))\b"),
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Split `text` into chunks of at most `max_len` characters
///
/// Cuts prefer a paragraph break, then a line break, then a space, and
/// fall back to a hard cut. Separators stay at the end of the chunk they
/// close, so joining the chunks gives back `text` exactly. Text that
/// already fits is returned as a single chunk.
///
/// # Errors
/// Returns `RelayError::Format` if `max_len` is zero
pub fn split_message(text: &str, max_len: usize) -> Result<Vec<String>> {
    if max_len == 0 {
        return Err(RelayError::format("maximum message length must be positive"));
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    loop {
        let Some(limit) = byte_offset_of_char(rest, max_len) else {
            chunks.push(rest.to_string());
            break;
        };

        let cut = preferred_cut(&rest[..limit]).unwrap_or(limit);
        let (chunk, tail) = rest.split_at(cut);
        chunks.push(chunk.to_string());
        rest = tail;

        if rest.is_empty() {
            break;
        }
    }

    Ok(chunks)
}

/// Byte offset just past the first `n` characters, or `None` if `text` has at most `n`
fn byte_offset_of_char(text: &str, n: usize) -> Option<usize> {
    text.char_indices().nth(n).map(|(i, _)| i)
}

/// Best place to end a chunk within `window`, as a byte offset
fn preferred_cut(window: &str) -> Option<usize> {
    let floor = window.len() / 2;
    let candidates = [
        window.rfind("\n\n").map(|i| i + 2),
        window.rfind('\n').map(|i| i + 1),
        window.rfind(' ').map(|i| i + 1),
    ];

    // A boundary in the back half keeps chunks reasonably full
    candidates
        .iter()
        .flatten()
        .copied()
        .find(|&cut| cut >= floor)
        .or_else(|| candidates.iter().flatten().copied().max())
}

/// Cut `text` into pieces of exactly `max_len` characters (the last may be shorter)
///
/// Used when a formatted chunk is rejected by the platform.
#[must_use]
pub fn hard_cut(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return vec![String::new()];
    }
    chars
        .chunks(max_len)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// First `max_len` characters of `text`
#[must_use]
pub fn hard_truncate(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}

/// Split for delivery, falling back to hard truncation if splitting fails
#[must_use]
pub fn split_or_truncate(text: &str, max_len: usize) -> Vec<String> {
    split_message(text, max_len).unwrap_or_else(|e| {
        log::error!("Failed to split message: {e}");
        vec![hard_truncate(text, max_len.max(1))]
    })
}

/// Image file paths mentioned in `text`, deduplicated, in order of appearance
#[must_use]
pub fn extract_image_paths(text: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    for pattern in IMAGE_PATH_PATTERNS.iter() {
        for captures in pattern.captures_iter(text) {
            let Some(m) = captures.get(1) else { continue };
            let path = m.as_str().trim().to_string();
            if path.is_empty() || found.iter().any(|(_, p)| *p == path) {
                continue;
            }
            found.push((m.start(), path));
        }
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, path)| path).collect()
}

/// Whether `path` has an extension that can be sent as a photo
#[must_use]
pub fn is_sendable_image(path: &std::path::Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            SENDABLE_IMAGE_EXTENSIONS
                .iter()
                .any(|ok| e.eq_ignore_ascii_case(ok))
        })
}
