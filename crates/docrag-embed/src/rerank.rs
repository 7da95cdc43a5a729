//! Cross-encoder reranking.
//!
//! `CrossEncoderReranker` runs a BERT sequence-classification checkpoint
//! (ms-marco MiniLM family): `[CLS] query [SEP] passage [SEP]` → pooler →
//! single-logit classifier. The raw logit is the relevance score.

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::path::Path;

use candle_core::{Device, IndexOp};
use candle_nn::{linear, Linear, Module};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams, TruncationStrategy};

use docrag_core::traits::Reranker;

use crate::device::select_device;
use crate::tokenize::pad_batch;
use crate::{config_usize, load_tokenizer, load_weights, read_config};

pub struct CrossEncoderReranker {
    model: BertModel,
    pooler: Linear,
    classifier: Linear,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    pad_id: u32,
}

impl CrossEncoderReranker {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!("loading reranker from {}", model_dir.display());
        let mut tokenizer = load_tokenizer(model_dir)?;
        tokenizer
            .with_truncation(Some(TruncationParams { max_length: max_len, strategy: TruncationStrategy::LongestFirst, ..Default::default() }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        let raw_config = read_config(model_dir)?;
        let hidden = config_usize(&raw_config, "hidden_size")?;
        let pad_id = raw_config.get("pad_token_id").and_then(serde_json::Value::as_u64).map_or(0, |v| v as u32);
        let config: BertConfig = serde_json::from_value(raw_config)?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb.pp("bert"), &config)?;
        let pooler = linear(hidden, hidden, vb.pp("bert.pooler.dense"))?;
        let classifier = linear(hidden, 1, vb.pp("classifier"))?;
        tracing::info!("reranker loaded");
        Ok(Self { model, pooler, classifier, tokenizer, device, max_len, pad_id })
    }
}

impl Reranker for CrossEncoderReranker {
    fn score_pairs(&self, pairs: &[(&str, &str)]) -> Result<Vec<f32>> {
        if pairs.is_empty() { return Ok(Vec::new()); }
        let encodings = pairs
            .iter()
            .map(|&(query, text)| self.tokenizer.encode((query, text), true).map_err(|e| anyhow!("Tokenization failed: {}", e)))
            .collect::<Result<Vec<_>>>()?;
        let batch = pad_batch(&encodings, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?.squeeze(1)?;
        let scores: Vec<f32> = logits.to_device(&Device::Cpu)?.to_vec1()?;
        anyhow::ensure!(scores.len() == pairs.len(), "reranker produced {} scores for {} pairs", scores.len(), pairs.len());
        Ok(scores)
    }
}

/// Share of distinct (lowercased) query words present in the passage.
/// Deterministic stand-in for the cross-encoder.
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeReranker;

impl Reranker for FakeReranker {
    fn score_pairs(&self, pairs: &[(&str, &str)]) -> Result<Vec<f32>> {
        Ok(pairs
            .iter()
            .map(|(query, text)| {
                let query_words: HashSet<String> = query.split_whitespace().map(str::to_lowercase).collect();
                if query_words.is_empty() { return 0.0; }
                let text_words: HashSet<String> = text.split_whitespace().map(str::to_lowercase).collect();
                query_words.intersection(&text_words).count() as f32 / query_words.len() as f32
            })
            .collect())
    }
}
