//! Exact vector search and the retrieval engine built on it.

pub mod engine;
pub mod flat_index;
pub mod storage;

pub use engine::{EngineError, EngineState, RetrievalEngine};
pub use flat_index::{normalize_l2, FlatIndex, IndexError};
pub use storage::{Manifest, MANIFEST_FILE};
