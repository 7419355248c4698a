//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nesting, so `APP_RAG__CHUNK_SIZE=600` sets `rag.chunk_size`).
//! Typed views over the `[rag]` and `[logging]` tables fall back to defaults
//! when the table is absent.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use crate::chunker::{ChunkingConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?.validate()?;
        Ok(config)
    }

    /// Wrap an existing figment; used by tests and embedders of the library.
    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[rag]` section, falling back to defaults when absent.
    pub fn settings(&self) -> anyhow::Result<Settings> { self.section("rag") }

    /// The `[logging]` section, falling back to defaults when absent.
    pub fn logging(&self) -> anyhow::Result<LoggingSettings> { self.section("logging") }

    fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(T::default()) }
    }
}

/// Retrieval settings, read from the `[rag]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub docs_dir: String,
    pub data_dir: String,
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
    pub min_score: f32,
    pub model_dir: Option<String>,
    pub use_fake_embeddings: bool,
    pub fake_dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docs_dir: "docs".to_string(),
            data_dir: "data".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
            top_k: 4,
            min_score: 0.0,
            model_dir: None,
            use_fake_embeddings: false,
            fake_dim: 1024,
            max_len: 256,
            batch_size: 16,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("rag.chunk_size must be at least 1".into()));
        }
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("rag.top_k must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("rag.batch_size must be at least 1".into()));
        }
        if self.max_len < 8 {
            return Err(Error::InvalidConfig(format!("rag.max_len must be at least 8, got {}", self.max_len)));
        }
        if self.use_fake_embeddings && self.fake_dim == 0 {
            return Err(Error::InvalidConfig("rag.fake_dim must be at least 1".into()));
        }
        Ok(())
    }

    pub fn chunking(&self) -> ChunkingConfig { ChunkingConfig::new(self.chunk_size, self.overlap) }

    pub fn docs_path(&self) -> PathBuf { expand_path(&self.docs_dir) }

    pub fn data_path(&self) -> PathBuf { expand_path(&self.data_dir) }

    pub fn model_path(&self) -> Option<PathBuf> { self.model_dir.as_deref().map(expand_path) }
}

/// Log filter settings, read from the `[logging]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Level applied to every target without an explicit override.
    pub default: String,
    /// Per-target overrides, e.g. `docrag_vector = "debug"`.
    pub modules: BTreeMap<String, String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { default: "warn".to_string(), modules: BTreeMap::new() }
    }
}

impl LoggingSettings {
    /// Render as an `EnvFilter` directive string.
    pub fn directives(&self) -> String {
        let mut out = self.default.clone();
        for (module, level) in &self.modules {
            out.push_str(&format!(",{module}={level}"));
        }
        out
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
