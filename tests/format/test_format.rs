//! Tests for message splitting and image path extraction

use claude_chat_relay::format::{hard_cut, is_sendable_image, split_or_truncate};
use claude_chat_relay::{RelayError, extract_image_paths, split_message};
use std::path::Path;

fn assert_chunks_valid(text: &str, max_len: usize) -> Vec<String> {
    let chunks = split_message(text, max_len).unwrap();
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(
            chunk.chars().count() <= max_len,
            "chunk of {} chars exceeds {max_len}",
            chunk.chars().count()
        );
    }
    assert_eq!(chunks.concat(), text);
    chunks
}

#[test]
fn test_short_text_is_single_chunk() {
    assert_eq!(split_message("hello", 4000).unwrap(), vec!["hello"]);
    assert_eq!(split_message("", 10).unwrap(), vec![""]);
    assert_eq!(split_message("exactly10!", 10).unwrap(), vec!["exactly10!"]);
}

#[test]
fn test_chunks_fit_and_reassemble() {
    let paragraph = "The quick brown fox jumps over the lazy dog. ".repeat(12);
    let text = format!("{paragraph}\n\n{paragraph}\nshort line\n{}", "z".repeat(700));

    for max_len in [1, 7, 50, 100, 333, 4000] {
        assert_chunks_valid(&text, max_len);
    }
}

#[test]
fn test_multibyte_text_splits_on_char_boundaries() {
    let text = "héllo wörld ünïcode 日本語のテキスト ".repeat(40);
    for max_len in [3, 16, 64] {
        assert_chunks_valid(&text, max_len);
    }
}

#[test]
fn test_prefers_line_break_over_space() {
    let text = format!("{} {}\n{}", "a".repeat(20), "b".repeat(10), "c".repeat(20));
    let chunks = assert_chunks_valid(&text, 40);
    assert!(chunks[0].ends_with('\n'));
}

#[test]
fn test_zero_length_is_rejected() {
    assert!(matches!(split_message("abc", 0), Err(RelayError::Format(_))));
}

#[test]
fn test_split_or_truncate_always_delivers() {
    assert_eq!(split_or_truncate("abcdef", 3), vec!["abc", "def"]);
    assert_eq!(split_or_truncate("abcdef", 0), vec!["a"]);
}

#[test]
fn test_hard_cut_handles_empty_text() {
    assert_eq!(hard_cut("", 5), vec![String::new()]);
    assert_eq!(hard_cut("日本語", 2), vec!["日本", "語"]);
}

#[test]
fn test_extracts_image_paths_in_order() {
    let reply = "I saved the chart to `/tmp/out/chart.png` and a copy at [plots/copy.JPG].\n\
                 The logo is ~/assets/logo.svg, and the chart again: `/tmp/out/chart.png`.";
    let paths = extract_image_paths(reply);
    assert_eq!(
        paths,
        vec!["/tmp/out/chart.png", "plots/copy.JPG", "~/assets/logo.svg"]
    );
}

#[test]
fn test_no_image_paths_in_plain_text() {
    assert!(extract_image_paths("Nothing to see here. main.rs compiled fine.").is_empty());
}

#[test]
fn test_svg_is_mentioned_but_not_sendable() {
    assert!(is_sendable_image(Path::new("diagram.webp")));
    assert!(!is_sendable_image(Path::new("diagram.svg")));
}
