//! Exact inner-product index over dense `f32` rows.
//!
//! On-disk layout, little endian:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | magic `DRFX` |
//! | 4 | 4 | format version (`u32`) |
//! | 8 | 8 | dimension (`u64`) |
//! | 16 | 8 | row count (`u64`) |
//! | 24 | count × dim × 4 | row-major `f32` values |

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::storage::write_atomic;

pub const MAGIC: [u8; 4] = *b"DRFX";
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot build an index from zero vectors")]
    Empty,

    #[error("vectors must have at least one dimension")]
    ZeroDimension,

    #[error("dimension mismatch: expected {expected}, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("vector at row {row} contains non-finite values")]
    NonFinite { row: usize },

    #[error("query vector contains non-finite values")]
    NonFiniteQuery,

    #[error("index has not been built")]
    NotBuilt,

    #[error("invalid index file: {0}")]
    Format(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// Flat store of equal-length vectors searched by brute-force inner product.
///
/// The dimension is fixed by the first successful [`FlatIndex::build`]; later
/// builds must use the same dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dim: Option<usize>,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new() -> Self { Self::default() }

    pub fn dim(&self) -> Option<usize> { self.dim }

    pub fn len(&self) -> usize {
        match self.dim {
            Some(dim) => self.data.len() / dim,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        let dim = self.dim?;
        self.data.get(i * dim..(i + 1) * dim)
    }

    /// Replace all stored rows. On error the index is left untouched.
    pub fn build(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let first = vectors.first().ok_or(IndexError::Empty)?;
        let dim = first.len();
        if dim == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if let Some(fixed) = self.dim {
            if fixed != dim {
                return Err(IndexError::DimensionMismatch { expected: fixed, found: dim });
            }
        }
        let mut data = Vec::with_capacity(dim * vectors.len());
        for (row, v) in vectors.iter().enumerate() {
            if v.len() != dim {
                return Err(IndexError::DimensionMismatch { expected: dim, found: v.len() });
            }
            if !v.iter().all(|x| x.is_finite()) {
                return Err(IndexError::NonFinite { row });
            }
            data.extend_from_slice(v);
        }
        self.dim = Some(dim);
        self.data = data;
        Ok(())
    }

    /// Up to `top_k` `(row, score)` pairs by descending inner product.
    ///
    /// Equal scores keep ascending row order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<(usize, f32)>> {
        let dim = self.dim.ok_or(IndexError::NotBuilt)?;
        if query.len() != dim {
            return Err(IndexError::DimensionMismatch { expected: dim, found: query.len() });
        }
        if !query.iter().all(|x| x.is_finite()) {
            return Err(IndexError::NonFiniteQuery);
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, f32)> = self.data.chunks_exact(dim).map(|row| dot(row, query)).enumerate().collect();
        // stable sort keeps the lower row first among ties
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let dim = self.dim.ok_or(IndexError::NotBuilt)?;
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(dim as u64).to_le_bytes());
        bytes.extend_from_slice(&(self.len() as u64).to_le_bytes());
        for value in &self.data {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(IndexError::Format(format!("truncated header ({} bytes)", bytes.len())));
        }
        if bytes[0..4] != MAGIC {
            return Err(IndexError::Format("bad magic".into()));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(IndexError::Format(format!("unsupported version {version}")));
        }
        let dim = read_len(bytes, 8)?;
        let count = read_len(bytes, 16)?;
        if dim == 0 {
            return Err(IndexError::ZeroDimension);
        }
        if count == 0 {
            return Err(IndexError::Format("index holds no rows".into()));
        }
        let payload = dim
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| IndexError::Format("dimension × count overflows".into()))?;
        if bytes.len() - HEADER_LEN != payload {
            return Err(IndexError::Format(format!(
                "expected {payload} payload bytes, found {}",
                bytes.len() - HEADER_LEN
            )));
        }

        let mut data = Vec::with_capacity(dim * count);
        for (i, chunk) in bytes[HEADER_LEN..].chunks_exact(4).enumerate() {
            let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if !value.is_finite() {
                return Err(IndexError::NonFinite { row: i / dim });
            }
            data.push(value);
        }
        Ok(Self { dim: Some(dim), data })
    }

    /// Atomically replace `path` with the serialized index.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes).map_err(|source| IndexError::Io { path: path.to_path_buf(), source })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| IndexError::Io { path: path.to_path_buf(), source })?;
        Self::from_bytes(&bytes)
    }
}

/// Scale `v` to unit length in place; zero vectors are left as they are.
pub fn normalize_l2(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn read_len(bytes: &[u8], offset: usize) -> Result<usize> {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    usize::try_from(u64::from_le_bytes(buf)).map_err(|_| IndexError::Format(format!("length at offset {offset} does not fit in usize")))
}
