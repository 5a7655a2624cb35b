//! Paragraph-boundary text chunker.
//!
//! Splits an ingested document into [`Chunk`]s no longer than `max_tokens`
//! (approximated as characters). Splitting happens on blank lines so each
//! excerpt handed to the model stays readable on its own.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunks on paragraph boundaries, respecting `max_tokens`.
///
/// Returns chunks with contiguous indices starting at 0. Blank input yields
/// no chunks.
pub fn chunk_text(file_key: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + 2 + trimmed.len()
        };
        if would_be > max_chars && !current.is_empty() {
            push_chunk(&mut chunks, file_key, &current);
            current.clear();
        }

        if trimmed.len() > max_chars {
            // Oversized paragraph: hard split near max_chars, preferring whitespace.
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = floor_char_boundary(remaining, max_chars);
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind(char::is_whitespace)
                        .filter(|&pos| pos > 0)
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                let piece = remaining[..actual_split].trim();
                if !piece.is_empty() {
                    push_chunk(&mut chunks, file_key, piece);
                }
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        push_chunk(&mut chunks, file_key, &current);
    }

    chunks
}

/// Largest byte index <= `max` that lies on a char boundary (at least one char).
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    if idx == 0 {
        s.chars().next().map(char::len_utf8).unwrap_or(s.len())
    } else {
        idx
    }
}

fn push_chunk(chunks: &mut Vec<Chunk>, file_key: &str, text: &str) {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    chunks.push(Chunk {
        id: Uuid::new_v4().to_string(),
        file_key: file_key.to_string(),
        chunk_index: chunks.len() as i64,
        text: text.to_string(),
        hash,
    });
}
