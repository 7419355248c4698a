#![deny(dead_code)]
#![deny(unused_variables)]

pub mod chunker;
pub mod config;
pub mod context;
pub mod documents;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use chunker::{chunk_document, chunk_text, normalize_whitespace, ChunkingConfig};
pub use traits::Embedder;
pub use types::{Chunk, IndexStats, ScoredChunk, SourceDocument};
