//! Markdown-boundary text chunker.
//!
//! Splits a note's body into [`Chunk`]s that respect a configurable
//! `max_tokens` limit. Splitting prefers markdown structure: heading lines
//! open a new block, paragraph breaks (`\n\n`) separate blocks, and only
//! blocks that exceed the budget on their own are hard-split.
//!
//! Chunking is deterministic for a given body and configuration. Each chunk
//! carries a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Chunk;

/// Approximate chars-per-token ratio used to turn the token budget into a
/// character budget.
const CHARS_PER_TOKEN: usize = 4;

/// Split a note body into chunks, greedily packing markdown blocks up to
/// `max_tokens`. Returns chunks with contiguous indices starting at 0.
/// Empty or whitespace-only bodies produce no chunks.
pub fn chunk_note(note_path: &str, text: &str, max_tokens: usize) -> Vec<Chunk> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;

    let blocks = split_blocks(text);
    let mut chunks = Vec::new();
    let mut current_buf = String::new();
    let mut chunk_index: i64 = 0;

    for block in &blocks {
        // If adding this block would exceed max, flush the current buffer
        let would_be = if current_buf.is_empty() {
            block.len()
        } else {
            current_buf.len() + 2 + block.len() // +2 for \n\n separator
        };

        if would_be > max_chars && !current_buf.is_empty() {
            chunks.push(make_chunk(note_path, chunk_index, &current_buf));
            chunk_index += 1;
            current_buf.clear();
        }

        // A single block over the budget gets hard-split at line/word
        // boundaries where possible
        if block.len() > max_chars {
            let mut remaining = block.as_str();
            while !remaining.is_empty() {
                let mut split_at = remaining.len().min(max_chars);
                while !remaining.is_char_boundary(split_at) {
                    split_at -= 1;
                }
                let actual_split = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind('\n')
                        .or_else(|| remaining[..split_at].rfind(' '))
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                let piece = remaining[..actual_split].trim();
                if !piece.is_empty() {
                    chunks.push(make_chunk(note_path, chunk_index, piece));
                    chunk_index += 1;
                }
                remaining = &remaining[actual_split..];
            }
        } else {
            if !current_buf.is_empty() {
                current_buf.push_str("\n\n");
            }
            current_buf.push_str(block);
        }
    }

    if !current_buf.is_empty() {
        chunks.push(make_chunk(note_path, chunk_index, &current_buf));
    }

    chunks
}

/// Split text into markdown blocks: paragraph breaks separate blocks, and a
/// heading line always starts a new block so a forced split lands on the
/// heading rather than mid-section.
fn split_blocks(text: &str) -> Vec<String> {
    let mut blocks = Vec::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut buf = String::new();
        for line in trimmed.lines() {
            if line.trim_start().starts_with('#') && !buf.trim().is_empty() {
                blocks.push(buf.trim().to_string());
                buf.clear();
            }
            if !buf.is_empty() {
                buf.push('\n');
            }
            buf.push_str(line);
        }
        if !buf.trim().is_empty() {
            blocks.push(buf.trim().to_string());
        }
    }

    blocks
}

fn make_chunk(note_path: &str, index: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        note_path: note_path.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}
