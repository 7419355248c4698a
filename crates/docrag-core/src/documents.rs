//! Directory-backed document source.
//!
//! Produces the corpus handed to the retrieval engine: one
//! [`SourceDocument`] per readable plain-text file, in file-name order.
//! Unsupported or unreadable files are skipped, never fatal.

use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::SourceDocument;

/// Extensions read as plain text (compared case-insensitively).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Load every supported document directly under `docs_dir`.
///
/// The directory is created when missing, so a fresh checkout yields an empty
/// corpus instead of an error. Subdirectories are not descended into.
pub fn load_documents(docs_dir: &Path) -> Result<Vec<SourceDocument>> {
    if docs_dir.exists() && !docs_dir.is_dir() {
        return Err(Error::NotADirectory(docs_dir.to_path_buf()));
    }
    fs::create_dir_all(docs_dir).map_err(|e| Error::io(docs_dir, e))?;

    let mut docs = Vec::new();
    let walker = walkdir::WalkDir::new(docs_dir).min_depth(1).max_depth(1).sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => { warn!("Skipping unreadable entry in {}: {}", docs_dir.display(), e); continue; }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_supported(path) {
            debug!("Skipping unsupported file {}", path.display());
            continue;
        }
        let text = match read_text(path) {
            Ok(text) => text,
            Err(e) => { warn!("Skipping {}: {}", path.display(), e); continue; }
        };
        if text.is_empty() {
            debug!("Skipping empty document {}", path.display());
            continue;
        }
        let source = entry.file_name().to_string_lossy().to_string();
        debug!("Loaded {} ({} bytes)", source, text.len());
        docs.push(SourceDocument { source, text });
    }
    info!("Loaded {} documents from {}", docs.len(), docs_dir.display());
    Ok(docs)
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.iter().any(|s| s.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

fn read_text(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).to_string(),
    };
    Ok(text.trim().to_string())
}
