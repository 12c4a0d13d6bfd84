//! Fixed-window character chunking with overlap.
//!
//! The cursor walks the document in steps of `chunk_size` characters. Every chunk after the first
//! is prefixed with the last `overlap` characters of the chunk produced before it. The prefix is
//! taken from that chunk as emitted (its own prefix included), so when `overlap` exceeds
//! `chunk_size` the carried text grows from one chunk to the next.
//!
//! Lengths and slices are measured in `char`s so multi-byte text never splits a code point.

use super::types::ChunkingError;

/// Split `text` into ordered, overlapping chunks.
///
/// Returns an empty vector for empty input. A `chunk_size` of zero is rejected.
pub fn chunk_text(
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut chunks: Vec<String> = Vec::with_capacity(chars.len().div_ceil(chunk_size));
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let piece = &chars[start..end];

        let chunk = match chunks.last() {
            Some(previous) => {
                let carried = char_tail(previous, overlap);
                let mut combined = String::with_capacity(carried.len() + piece.len());
                combined.push_str(carried);
                combined.extend(piece);
                combined
            }
            None => piece.iter().collect(),
        };

        chunks.push(chunk);
        start = end;
    }

    tracing::trace!(
        chunks = chunks.len(),
        chunk_size,
        overlap,
        "Chunked document"
    );
    Ok(chunks)
}

/// Last `count` characters of `text`, or all of it when shorter.
fn char_tail(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((offset, _)) => &text[offset..],
        None => text,
    }
}
