//! Text embedders for the retrieval engine.
//!
//! [`BgeM3Embedder`] runs a local XLM-RoBERTa checkpoint (BGE-M3) through
//! candle. [`HashEmbedder`] is a deterministic token-hashing stand-in used by
//! tests and offline development; it is selected with
//! `APP_USE_FAKE_EMBEDDINGS=1` or `rag.use_fake_embeddings = true`.

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use indicatif::{ProgressBar, ProgressStyle};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use docrag_core::config::Settings;
pub use docrag_core::traits::Embedder;

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::{tokenize_batch, PAD_TOKEN_ID};

/// Options for loading [`BgeM3Embedder`].
#[derive(Debug, Clone)]
pub struct EmbedderOptions {
    /// Directory holding `tokenizer.json`, `config.json` and the weights.
    pub model_dir: Option<PathBuf>,
    pub max_len: usize,
    pub batch_size: usize,
    pub show_progress: bool,
}

impl Default for EmbedderOptions {
    fn default() -> Self {
        Self { model_dir: None, max_len: 256, batch_size: 16, show_progress: false }
    }
}

impl EmbedderOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self { model_dir: settings.model_path(), max_len: settings.max_len, batch_size: settings.batch_size, show_progress: false }
    }
}

pub struct BgeM3Embedder { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, batch_size: usize, show_progress: bool }

impl BgeM3Embedder {
    pub fn new() -> Result<Self> { Self::with_options(&EmbedderOptions::default()) }

    pub fn with_options(opts: &EmbedderOptions) -> Result<Self> {
        let device = select_device();
        let model_dir = resolve_model_dir(opts.model_dir.as_deref())?;
        info!("Loading BGE-M3 model from {}", model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?;

        let weights = load_weights(&model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("BGE-M3 model loaded (dim={})", config.hidden_size);

        Ok(Self {
            model,
            tokenizer,
            device,
            dim: config.hidden_size,
            max_len: opts.max_len,
            batch_size: opts.batch_size.max(1),
            show_progress: opts.show_progress,
        })
    }

    fn embed_mini_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for BgeM3Embedder {
    fn name(&self) -> &str { "bge-m3" }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let batches = texts.chunks(self.batch_size);
        let pb = if self.show_progress { ProgressBar::new(batches.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg}")?.progress_chars("#>-"));

        let mut out = Vec::with_capacity(texts.len());
        for (i, batch) in batches.enumerate() {
            out.extend(self.embed_mini_batch(batch)?);
            pb.set_position(i as u64 + 1);
            debug!("Embedded batch {} ({} texts)", i + 1, batch.len());
        }
        pb.finish_and_clear();
        let elapsed = start.elapsed();
        if texts.len() == 1 && elapsed.as_millis() > 100 { warn!("Slow embedding: {:?}", elapsed); }
        debug!("Embedded {} texts in {:?}", texts.len(), elapsed);
        Ok(out)
    }
}

/// Deterministic bag-of-tokens embedder.
///
/// Each lowercased alphanumeric token is hashed into one of `dim` buckets with
/// a positive weight, so texts sharing a token always score above zero.
pub struct HashEmbedder { dim: usize }

impl HashEmbedder { pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } } }

impl HashEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += 0.1 + val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashEmbedder {
    fn name(&self) -> &str { "hash-xxh64" }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

/// Pick the embedder described by `settings`, honouring `APP_USE_FAKE_EMBEDDINGS`.
pub fn get_default_embedder(settings: &Settings) -> Result<Box<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if env_fake || settings.use_fake_embeddings {
        info!("Using HashEmbedder (dim={})", settings.fake_dim);
        return Ok(Box::new(HashEmbedder::new(settings.fake_dim)));
    }
    let mut opts = EmbedderOptions::from_settings(settings);
    opts.show_progress = true;
    Ok(Box::new(BgeM3Embedder::with_options(&opts)?))
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        debug!("Loading weights from {}", safetensors.display());
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    debug!("Loading weights from {}", pickle.display());
    let weights = candle_core::pickle::read_all(&pickle).with_context(|| format!("reading {}", pickle.display()))?;
    Ok(weights.into_iter().collect())
}

fn resolve_model_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = explicit {
        if p.exists() { return Ok(p.to_path_buf()); }
        return Err(anyhow!("Configured model directory {} does not exist", p.display()));
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { let p = PathBuf::from(&dir); if p.exists() { debug!("Using {}: {}", var, p.display()); return Ok(p); } }
    }
    for candidate in ["../models/bge-m3", "models/bge-m3"] {
        let p = Path::new(candidate); if p.exists() { return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate BGE-M3 model directory; set rag.model_dir or APP_MODEL_DIR"))
}
