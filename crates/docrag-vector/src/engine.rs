//! The retrieval engine: owns the chunk store and its vector index.
//!
//! An engine starts [`EngineState::Empty`] and only becomes
//! [`EngineState::Ready`] through [`RetrievalEngine::build`] or
//! [`RetrievalEngine::load`]. Both prepare the new `(index, chunks)` pair off
//! to the side and swap it in once everything has succeeded.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use docrag_core::chunker::{chunk_document, normalize_whitespace, ChunkingConfig};
use docrag_core::traits::Embedder;
use docrag_core::types::{Chunk, IndexStats, ScoredChunk, SourceDocument};

use crate::flat_index::{normalize_l2, FlatIndex, IndexError};
use crate::storage::{
    decode_chunks, decode_manifest, encode_chunks, encode_manifest, manifest_path, read_manifest, write_atomic, Manifest,
    MANIFEST_VERSION,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("build failed: no chunks produced")]
    Build,

    #[error("index has not been built")]
    NotBuilt,

    #[error("no saved index in {}", .0.display())]
    NoSavedIndex(PathBuf),

    #[error("corrupt index in {}: {reason}", dir.display())]
    CorruptIndex { dir: PathBuf, reason: String },

    #[error("engine is not ready; build or load an index first")]
    NotReady,

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Empty,
    Ready,
}

struct LoadedIndex {
    index: FlatIndex,
    chunks: Vec<Chunk>,
}

impl LoadedIndex {
    fn stats(&self) -> IndexStats {
        let sources: BTreeSet<&str> = self.chunks.iter().map(|c| c.source.as_str()).collect();
        IndexStats { chunks: self.chunks.len(), sources: sources.len(), dim: self.index.dim().unwrap_or(0) }
    }
}

pub struct RetrievalEngine<E = Box<dyn Embedder>> {
    embedder: E,
    loaded: Option<LoadedIndex>,
}

impl<E: Embedder> RetrievalEngine<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder, loaded: None }
    }

    pub fn state(&self) -> EngineState {
        if self.loaded.is_some() { EngineState::Ready } else { EngineState::Empty }
    }

    /// Chunks in index row order; empty while the engine is not ready.
    pub fn chunks(&self) -> &[Chunk] {
        self.loaded.as_ref().map(|l| l.chunks.as_slice()).unwrap_or(&[])
    }

    pub fn stats(&self) -> Result<IndexStats> {
        self.loaded.as_ref().map(LoadedIndex::stats).ok_or(EngineError::NotReady)
    }

    /// Chunk, embed and index `corpus`, replacing whatever the engine held.
    ///
    /// Chunk ids restart at 0 for each source, in corpus order.
    pub fn build(&mut self, corpus: &[SourceDocument], chunking: &ChunkingConfig) -> Result<IndexStats> {
        let start = Instant::now();
        let chunks: Vec<Chunk> = corpus.iter().flat_map(|doc| chunk_document(doc, chunking)).collect();
        if chunks.is_empty() {
            return Err(EngineError::Build);
        }
        info!("Chunked {} documents into {} chunks", corpus.len(), chunks.len());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embed(&texts)?;

        let mut index = FlatIndex::new();
        index.build(&vectors)?;

        let loaded = LoadedIndex { index, chunks };
        let stats = loaded.stats();
        self.loaded = Some(loaded);
        info!("Built index: {} chunks from {} sources (dim={}) in {:?}", stats.chunks, stats.sources, stats.dim, start.elapsed());
        Ok(stats)
    }

    /// Persist the vector store and chunk metadata under `dir`.
    ///
    /// The previous save stays readable until the manifest naming the new
    /// files has been renamed into place.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let loaded = self.loaded.as_ref().ok_or(EngineError::NotBuilt)?;
        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let previous = read_manifest(dir).map_err(io_error(&manifest_path(dir)))?.and_then(|b| decode_manifest(&b).ok());
        let generation = previous.as_ref().map_or(1, |m| m.generation + 1);
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            generation,
            embedder: self.embedder.name().to_string(),
            dim: loaded.index.dim().unwrap_or(0),
            count: loaded.chunks.len(),
        };

        let vectors_file = manifest.vectors_path(dir);
        let chunks_file = manifest.chunks_path(dir);
        let staged = loaded
            .index
            .save(&vectors_file)
            .map_err(EngineError::from)
            .and_then(|()| encode_chunks(&loaded.chunks).map_err(EngineError::from))
            .and_then(|metadata| write_atomic(&chunks_file, &metadata).map_err(io_error(&chunks_file)))
            .and_then(|()| encode_manifest(&manifest).map_err(EngineError::from))
            .and_then(|bytes| write_atomic(&manifest_path(dir), &bytes).map_err(io_error(&manifest_path(dir))));
        if let Err(e) = staged {
            remove_quietly(&vectors_file);
            remove_quietly(&chunks_file);
            return Err(e);
        }

        if let Some(old) = previous {
            remove_quietly(&old.vectors_path(dir));
            remove_quietly(&old.chunks_path(dir));
        }
        info!("Saved {} chunks to {} (generation {generation})", loaded.chunks.len(), dir.display());
        Ok(())
    }

    /// Replace the engine contents with the index saved under `dir`.
    pub fn load(&mut self, dir: &Path) -> Result<IndexStats> {
        let corrupt = |reason: String| EngineError::CorruptIndex { dir: dir.to_path_buf(), reason };
        let manifest_file = manifest_path(dir);
        let bytes = read_manifest(dir)
            .map_err(|source| EngineError::Io { path: manifest_file.clone(), source })?
            .ok_or_else(|| EngineError::NoSavedIndex(dir.to_path_buf()))?;
        let manifest = decode_manifest(&bytes).map_err(|e| corrupt(format!("{}: {e}", manifest_file.display())))?;
        if manifest.version != MANIFEST_VERSION {
            return Err(corrupt(format!("unsupported manifest version {}", manifest.version)));
        }

        let vectors_file = manifest.vectors_path(dir);
        let chunks_file = manifest.chunks_path(dir);
        if !vectors_file.is_file() || !chunks_file.is_file() {
            return Err(EngineError::NoSavedIndex(dir.to_path_buf()));
        }

        if manifest.embedder != self.embedder.name() || manifest.dim != self.embedder.dim() {
            return Err(corrupt(format!(
                "index was built with {} (dim {}), current embedder is {} (dim {})",
                manifest.embedder,
                manifest.dim,
                self.embedder.name(),
                self.embedder.dim()
            )));
        }

        let index = match FlatIndex::load(&vectors_file) {
            Ok(index) => index,
            Err(IndexError::Io { path, source }) => return Err(EngineError::Io { path, source }),
            Err(e) => return Err(corrupt(format!("{}: {e}", vectors_file.display()))),
        };
        let bytes = fs::read(&chunks_file).map_err(|source| EngineError::Io { path: chunks_file.clone(), source })?;
        let chunks = decode_chunks(&bytes).map_err(|e| corrupt(format!("{}: {e}", chunks_file.display())))?;

        if chunks.len() != index.len() || chunks.len() != manifest.count {
            return Err(corrupt(format!(
                "{} vectors and {} chunks, manifest records {}",
                index.len(),
                chunks.len(),
                manifest.count
            )));
        }
        let dim = index.dim().unwrap_or(0);
        if dim != manifest.dim {
            return Err(corrupt(format!("stored dimension {dim} differs from manifest dimension {}", manifest.dim)));
        }
        validate_chunks(&chunks).map_err(corrupt)?;

        let loaded = LoadedIndex { index, chunks };
        let stats = loaded.stats();
        self.loaded = Some(loaded);
        info!("Loaded {} chunks from {}", stats.chunks, dir.display());
        Ok(stats)
    }

    /// Up to `top_k` chunks most similar to `query`, best first.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>> {
        let loaded = self.loaded.as_ref().ok_or(EngineError::NotReady)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let mut embedded = self.embed(&[query.to_string()])?;
        let query_vec = embedded.pop().unwrap_or_default();
        let hits = loaded.index.search(&query_vec, top_k)?;

        let results: Vec<ScoredChunk> = hits
            .into_iter()
            .filter_map(|(row, score)| loaded.chunks.get(row).map(|chunk| ScoredChunk { chunk: chunk.clone(), score }))
            .collect();
        debug!("Retrieved {} chunks for {:?} in {:?}", results.len(), query, start.elapsed());
        Ok(results)
    }

    /// Like [`retrieve`](Self::retrieve), keeping only hits scoring at least `min_score`.
    pub fn retrieve_with_threshold(&self, query: &str, top_k: usize, min_score: f32) -> Result<Vec<ScoredChunk>> {
        let mut results = self.retrieve(query, top_k)?;
        results.retain(|r| r.score >= min_score);
        Ok(results)
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = self.embedder.embed_batch(texts).map_err(EngineError::Embedding)?;
        if vectors.len() != texts.len() {
            return Err(EngineError::Embedding(anyhow::anyhow!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let dim = self.embedder.dim();
        for v in vectors.iter_mut() {
            if v.len() != dim {
                return Err(EngineError::Embedding(anyhow::anyhow!("embedder returned a {}-dimensional vector, expected {dim}", v.len())));
            }
            normalize_l2(v);
        }
        Ok(vectors)
    }
}

/// Check stored chunk records: non-empty normalized text and per-source ids
/// running 0, 1, 2, ... in row order.
fn validate_chunks(chunks: &[Chunk]) -> std::result::Result<(), String> {
    let mut next_id: HashMap<&str, usize> = HashMap::new();
    for (row, chunk) in chunks.iter().enumerate() {
        if chunk.text.is_empty() || normalize_whitespace(&chunk.text) != chunk.text {
            return Err(format!("chunk at row {row} ({} #{}) has empty or unnormalized text", chunk.source, chunk.chunk_id));
        }
        let expected = next_id.entry(chunk.source.as_str()).or_insert(0);
        if chunk.chunk_id != *expected {
            return Err(format!(
                "chunk at row {row} of {} has id {}, expected {}",
                chunk.source, chunk.chunk_id, expected
            ));
        }
        *expected += 1;
    }
    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> EngineError {
    let path = path.to_path_buf();
    move |source| EngineError::Io { path, source }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!("Could not remove {}: {}", path.display(), e);
        }
    }
}
