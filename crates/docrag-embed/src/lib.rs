//! docrag-embed
//!
//! Model-backed implementations of the `Encoder` and `Reranker` capabilities,
//! running locally on candle, plus deterministic fakes for tests and offline
//! development (`APP_USE_FAKE_EMBEDDINGS=1`).

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;

use docrag_core::config::{expand_path, ModelsConfig};
use docrag_core::traits::{Encoder, Reranker};

pub mod device;
pub mod pool;
pub mod rerank;
pub mod tokenize;

pub use pool::masked_mean_l2;
pub use rerank::{CrossEncoderReranker, FakeReranker};

use crate::device::select_device;
use crate::tokenize::pad_batch;

/// Mean-pooled XLM-RoBERTa sentence encoder (multilingual-e5, BGE-M3, ...).
pub struct EmbeddingModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, pad_id: u32 }

impl EmbeddingModel {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!("loading encoder from {}", model_dir.display());
        let tokenizer = load_tokenizer(model_dir)?;
        let raw_config = read_config(model_dir)?;
        let dim = config_usize(&raw_config, "hidden_size")?;
        let pad_id = raw_config.get("pad_token_id").and_then(serde_json::Value::as_u64).map_or(1, |v| v as u32);
        let config: XLMRobertaConfig = serde_json::from_value(raw_config)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        tracing::info!(dim, max_len, "encoder loaded");
        Ok(Self { model, tokenizer, device, dim, max_len, pad_id })
    }
}

impl Encoder for EmbeddingModel {
    fn dim(&self) -> usize { self.dim }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let encodings = texts
            .iter()
            .map(|t| self.tokenizer.encode(t.as_str(), true).map_err(|e| anyhow!("Tokenization failed: {}", e)))
            .collect::<Result<Vec<_>>>()?;
        let batch = pad_batch(&encodings, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.attention_mask, &batch.token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        anyhow::ensure!(vectors.iter().all(|v| v.len() == self.dim), "encoder produced vectors of unexpected size");
        tracing::debug!(batch = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "encoded batch");
        Ok(vectors)
    }
}

/// Hashed bag-of-words vectors: deterministic, unit-norm, no model files.
/// Texts sharing words get similar vectors, which is enough for tests.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder { pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } } }

impl FakeEmbedder {
    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() { let mut hasher = XxHash64::with_seed(0); token.to_lowercase().hash(&mut hasher); let h = hasher.finish(); let idx = (h as usize) % self.dim; let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32); v[idx] += 0.5 + val + (i as f32 % 3.0) * 0.01; }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6); for x in &mut v { *x /= norm; } v
    }
}

impl Encoder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

pub fn use_fake_models(cfg: &ModelsConfig) -> bool {
    cfg.use_fake
        || std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn default_encoder(cfg: &ModelsConfig) -> Result<Arc<dyn Encoder>> {
    if use_fake_models(cfg) { tracing::info!("using FakeEmbedder (dim {})", cfg.fake_dim); return Ok(Arc::new(FakeEmbedder::new(cfg.fake_dim))); }
    let dir = resolve_model_dir(cfg.encoder_dir.as_deref(), "APP_ENCODER_DIR", &["models/multilingual-e5-large", "../models/multilingual-e5-large"])?;
    Ok(Arc::new(EmbeddingModel::load(&dir, cfg.max_len)?))
}

pub fn default_reranker(cfg: &ModelsConfig) -> Result<Arc<dyn Reranker>> {
    if use_fake_models(cfg) { tracing::info!("using FakeReranker"); return Ok(Arc::new(FakeReranker)); }
    let dir = resolve_model_dir(cfg.reranker_dir.as_deref(), "APP_RERANKER_DIR", &["models/ms-marco-MiniLM-L-6-v2", "../models/ms-marco-MiniLM-L-6-v2"])?;
    Ok(Arc::new(CrossEncoderReranker::load(&dir, cfg.max_len)?))
}

fn resolve_model_dir(configured: Option<&str>, env_key: &str, fallbacks: &[&str]) -> Result<PathBuf> {
    if let Some(dir) = configured { let p = expand_path(dir); if p.exists() { return Ok(p); } return Err(anyhow!("Configured model directory {} does not exist", p.display())); }
    if let Ok(dir) = std::env::var(env_key) { let p = expand_path(&dir); if p.exists() { tracing::info!("using {}: {}", env_key, p.display()); return Ok(p); } }
    for candidate in fallbacks { let p = Path::new(candidate); if p.exists() { tracing::info!("using model dir: {}", p.display()); return Ok(p.to_path_buf()); } }
    Err(anyhow!("Could not locate a model directory (set {} or configure models.*_dir)", env_key))
}

pub(crate) fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
}

pub(crate) fn read_config(model_dir: &Path) -> Result<serde_json::Value> {
    let config_path = model_dir.join("config.json");
    let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
    Ok(serde_json::from_str(&raw)?)
}

pub(crate) fn config_usize(config: &serde_json::Value, key: &str) -> Result<usize> {
    config.get(key).and_then(serde_json::Value::as_u64).map(|v| v as usize).ok_or_else(|| anyhow!("config.json is missing '{}'", key))
}

/// Weights from `model.safetensors` when present, else `pytorch_model.bin`.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let weights_map: HashMap<String, Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        let weights_path = model_dir.join("pytorch_model.bin");
        candle_core::pickle::read_all(&weights_path)?.into_iter().collect()
    };
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}
