//! Persisted layout of a saved engine and crash-safe file replacement.
//!
//! A data directory holds one [`MANIFEST_FILE`] plus the files of the
//! generation it names: a binary vector store (`vectors.<gen>.idx`) and a JSON
//! array of chunk records (`chunks.<gen>.json`), order-aligned. A save writes
//! the next generation's files first and then replaces the manifest with a
//! single rename, so readers see either the old generation or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use docrag_core::types::Chunk;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const MANIFEST_VERSION: u32 = 1;

/// Commit record of a saved index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub generation: u64,
    /// [`Embedder::name`](docrag_core::traits::Embedder::name) of the embedder that produced the vectors.
    pub embedder: String,
    pub dim: usize,
    pub count: usize,
}

impl Manifest {
    pub fn vectors_path(&self, dir: &Path) -> PathBuf { vectors_path(dir, self.generation) }

    pub fn chunks_path(&self, dir: &Path) -> PathBuf { chunks_path(dir, self.generation) }
}

pub fn manifest_path(dir: &Path) -> PathBuf { dir.join(MANIFEST_FILE) }

pub fn vectors_path(dir: &Path, generation: u64) -> PathBuf { dir.join(format!("vectors.{generation}.idx")) }

pub fn chunks_path(dir: &Path, generation: u64) -> PathBuf { dir.join(format!("chunks.{generation}.json")) }

/// Replace `path` with `contents` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read the manifest in `dir`; `Ok(None)` when there is none.
pub fn read_manifest(dir: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(manifest_path(dir)) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn encode_manifest(manifest: &Manifest) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(manifest)
}

pub fn decode_manifest(bytes: &[u8]) -> serde_json::Result<Manifest> {
    serde_json::from_slice(bytes)
}

pub fn encode_chunks(chunks: &[Chunk]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(chunks)
}

pub fn decode_chunks(bytes: &[u8]) -> serde_json::Result<Vec<Chunk>> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_file_names() {
        let dir = Path::new("data");
        assert_eq!(vectors_path(dir, 3), Path::new("data/vectors.3.idx"));
        assert_eq!(chunks_path(dir, 3), Path::new("data/chunks.3.json"));
        assert_eq!(manifest_path(dir), Path::new("data/manifest.json"));
    }

    #[test]
    fn write_atomic_replaces_and_missing_manifest_is_none() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert_eq!(read_manifest(tmp.path()).unwrap(), None);

        let manifest = Manifest { version: MANIFEST_VERSION, generation: 2, embedder: "hash-xxh64".into(), dim: 8, count: 1 };
        write_atomic(&manifest_path(tmp.path()), b"stale").unwrap();
        write_atomic(&manifest_path(tmp.path()), &encode_manifest(&manifest).unwrap()).unwrap();

        let bytes = read_manifest(tmp.path()).unwrap().unwrap();
        assert_eq!(decode_manifest(&bytes).unwrap(), manifest);
    }
}
