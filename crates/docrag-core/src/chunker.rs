use serde::{Deserialize, Serialize};

use crate::types::{Chunk, SourceDocument};

pub const DEFAULT_CHUNK_SIZE: usize = 900;
pub const DEFAULT_OVERLAP: usize = 150;

/// Window size and overlap, both counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_OVERLAP }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self { Self { chunk_size, overlap } }
}

/// Collapse every run of whitespace to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` into overlapping windows of `chunk_size` characters.
///
/// The text is whitespace-normalized first; an empty result yields no chunks.
/// Each window starts `chunk_size - overlap` characters after the previous one
/// and the last window is clipped to the end of the text. Start positions are
/// strictly increasing even when `overlap >= chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return Vec::new();
    }
    let chars: Vec<char> = normalized.chars().collect();
    let len = chars.len();
    let size = chunk_size.max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;
    loop {
        let end = start.saturating_add(size).min(len);
        chunks.push(chars[start..end].iter().collect());
        if end == len {
            break;
        }
        // overlap >= size would stall or step backwards
        start = end.saturating_sub(overlap).max(start + 1);
    }
    chunks
}

/// Chunk one document, numbering its chunks from 0 in production order.
pub fn chunk_document(doc: &SourceDocument, config: &ChunkingConfig) -> Vec<Chunk> {
    chunk_text(&doc.text, config.chunk_size, config.overlap)
        .into_iter()
        .enumerate()
        .map(|(chunk_id, text)| Chunk { source: doc.source.clone(), chunk_id, text })
        .collect()
}
