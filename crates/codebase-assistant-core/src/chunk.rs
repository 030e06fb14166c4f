//! Sentence-boundary text chunker.
//!
//! Splits raw file text into bounded-size segments. The text is split on the
//! `". "` delimiter into sentence-like segments, which are then packed
//! greedily into chunks no longer than `max_length` characters.
//!
//! # Algorithm
//!
//! 1. Split `text` on `". "`.
//! 2. Append each segment to the running buffer while
//!    `len(buffer) + len(segment) + 2 <= max_length` (the `2` reserves room
//!    for the delimiter that joins it to the buffer).
//! 3. When the next segment would overflow, flush the buffer as a chunk
//!    (trimmed) and start a new buffer with that segment.
//! 4. Flush whatever remains at the end.
//!
//! Within a chunk, segments are rejoined with `". "`, so joining all chunks
//! of a file with `". "` yields the original segments in order. Lengths are
//! counted in characters, not bytes.
//!
//! A single segment longer than `max_length` becomes its own oversized
//! chunk; sentences are never truncated. Buffers that are empty after
//! trimming are never emitted, so empty input yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use codebase_assistant_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("A. B. C.", 6);
//! assert_eq!(chunks, vec!["A. B".to_string(), "C.".to_string()]);
//! assert_eq!(chunks.join(". "), "A. B. C.");
//! ```

/// Delimiter separating sentence-like segments.
pub const SENTENCE_DELIMITER: &str = ". ";

/// Default maximum chunk length, in characters.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

const DELIMITER_LEN: usize = 2;

/// Split `text` into ordered chunks of at most `max_length` characters.
///
/// Never fails. The only chunks allowed to exceed `max_length` consist of a
/// single segment that alone exceeds it.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut buffer_len = 0usize;

    for segment in text.split(SENTENCE_DELIMITER) {
        let segment_len = segment.chars().count();

        if buffer_len + segment_len + DELIMITER_LEN <= max_length {
            if !buffer.is_empty() {
                buffer_len += DELIMITER_LEN;
            }
            buffer.push(segment);
            buffer_len += segment_len;
        } else {
            flush(&mut chunks, &buffer);
            buffer.clear();
            buffer.push(segment);
            buffer_len = segment_len;
        }
    }

    flush(&mut chunks, &buffer);
    chunks
}

fn flush(chunks: &mut Vec<String>, buffer: &[&str]) {
    let joined = buffer.join(SENTENCE_DELIMITER);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
