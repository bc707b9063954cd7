//! Heading-aware, paragraph-boundary text chunker.
//!
//! Splits document text into size-bounded segments that keep related
//! content together. Sizes are measured in characters, not bytes.
//!
//! # Algorithm
//!
//! 1. **Heading pass.** Lines starting with a Markdown heading marker
//!    (`#` through `######` followed by whitespace) open a new section.
//!    Text before the first heading is its own leading section. Without
//!    any heading the whole text is one section.
//! 2. **Size pass.** A section longer than `max_chunk_size` is re-split on
//!    blank lines. Paragraphs accumulate into a running chunk until the next
//!    one would overflow; the running chunk is then closed and the next
//!    chunk is seeded with the trailing `chunk_overlap` characters of the
//!    closed one before the triggering paragraph is appended.
//! 3. Sections at or under the limit pass through unchanged.
//! 4. Every chunk is trimmed; empty chunks are dropped.
//!
//! A single paragraph longer than `max_chunk_size` is kept whole. Overlap is
//! only injected inside a section, never across headings.
//!
//! # Example
//!
//! ```rust
//! use vaultsearch_core::chunk::{chunk_text, ChunkingParams};
//!
//! let chunks = chunk_text("# One\nalpha\n# Two\nbeta", &ChunkingParams::default());
//! assert_eq!(chunks, vec!["# One\nalpha", "# Two\nbeta"]);
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{chunk_id, Chunk, DocumentInput};

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;

/// Default number of trailing characters carried into the next chunk.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

static HEADING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^#{1,6}(?:[ \t]|$)").expect("heading regex"));

static BLANK_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("blank line regex"));

/// Tuning constants for [`chunk_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub max_chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Split `text` into trimmed, non-empty chunks.
///
/// Pure function of its inputs: the same text and params always produce
/// the same chunks in the same order.
pub fn chunk_text(text: &str, params: &ChunkingParams) -> Vec<String> {
    let normalized = text.replace("\r\n", "\n");
    let mut chunks = Vec::new();

    for section in split_sections(&normalized) {
        let trimmed = section.trim();
        if trimmed.is_empty() {
            continue;
        }
        if char_len(trimmed) <= params.max_chunk_size {
            chunks.push(trimmed.to_string());
        } else {
            split_by_paragraphs(trimmed, params, &mut chunks);
        }
    }

    chunks
}

/// Chunk a document and wrap each piece in a [`Chunk`] record without an
/// embedding. Ids are `"{path}#{index}"` with contiguous indices.
pub fn build_chunks(doc: &DocumentInput, params: &ChunkingParams) -> Vec<Chunk> {
    chunk_text(&doc.text, params)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: chunk_id(&doc.path, index),
            document_path: doc.path.clone(),
            title: doc.title.clone(),
            text,
            embedding: None,
            last_modified: doc.last_modified,
        })
        .collect()
}

/// Cut `text` at every heading line. Returns the leading section (possibly
/// empty) followed by one section per heading.
fn split_sections(text: &str) -> Vec<&str> {
    let starts: Vec<usize> = HEADING_LINE.find_iter(text).map(|m| m.start()).collect();
    if starts.is_empty() {
        return vec![text];
    }

    let mut sections = Vec::with_capacity(starts.len() + 1);
    if starts[0] > 0 {
        sections.push(&text[..starts[0]]);
    }
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(text.len());
        sections.push(&text[start..end]);
    }
    sections
}

fn split_by_paragraphs(section: &str, params: &ChunkingParams, out: &mut Vec<String>) {
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in BLANK_LINE.split(section) {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }
        let para_len = char_len(para);

        if !current.is_empty() && current_len + 2 + para_len > params.max_chunk_size {
            let closed = current.trim().to_string();
            let seed = tail_chars(&closed, params.chunk_overlap);

            current = String::with_capacity(seed.len() + 2 + para.len());
            current.push_str(seed);
            current_len = char_len(seed);
            if !closed.is_empty() {
                out.push(closed);
            }
        }

        if !current.is_empty() {
            current.push_str("\n\n");
            current_len += 2;
        }
        current.push_str(para);
        current_len += para_len;
    }

    let last = current.trim();
    if !last.is_empty() {
        out.push(last.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s` (all of `s` when it is shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
