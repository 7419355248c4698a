//! Domain types shared by the chunker, the embedders and the retrieval engine.

use serde::{Deserialize, Serialize};

/// A readable input document as handed over by the document source.
///
/// - `source`: unique file identifier (the file name)
/// - `text`: full extracted text, not yet normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source: String,
    pub text: String,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source: source.into(), text: text.into() }
    }
}

/// A contiguous fragment of a source document; the unit of retrieval.
///
/// For a fixed `source`, `chunk_id` runs 0..N-1 in the order the chunks were
/// produced. `text` is non-empty and whitespace-normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub source: String,
    pub chunk_id: usize,
    pub text: String,
}

/// A retrieved chunk paired with its inner-product score. Higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Summary of an index held by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub chunks: usize,
    pub sources: usize,
    pub dim: usize,
}
