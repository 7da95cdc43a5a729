#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docrag_core::config::RetrievalConfig;
use docrag_core::progress::NoProgress;
use docrag_core::tokenize::WhitespaceTokenizer;
use docrag_core::traits::{Encoder, ProgressSink, Reranker};
use docrag_core::Passage;
use docrag_embed::FakeEmbedder;
use docrag_hybrid::{DocumentIndexEntry, DocumentRegistry, HybridRetriever, IndexPipeline};

pub fn passages(texts: &[&str]) -> Vec<Passage> {
    texts.iter().enumerate().map(|(i, t)| Passage::new(*t, "doc.txt", Some(i as u32 / 3 + 1), i)).collect()
}

pub fn fake_pipeline() -> IndexPipeline {
    IndexPipeline::new(Arc::new(FakeEmbedder::new(64)), Arc::new(WhitespaceTokenizer))
}

pub fn fake_retriever() -> HybridRetriever {
    HybridRetriever::new(Arc::new(FakeEmbedder::new(64)), RetrievalConfig::default()).expect("valid config")
}

pub fn index(registry: &DocumentRegistry, id: &str, texts: &[&str]) -> Arc<DocumentIndexEntry> {
    fake_pipeline().build_entry(registry, id, passages(texts), &NoProgress).expect("build entry")
}

/// Same vector for every text, so only lexical evidence separates passages.
pub struct ConstantEncoder;

impl Encoder for ConstantEncoder {
    fn dim(&self) -> usize { 2 }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Fake embedder that can be switched into a failing state.
pub struct SwitchableEncoder {
    inner: FakeEmbedder,
    pub failing: AtomicBool,
}

impl SwitchableEncoder {
    pub fn new() -> Self { Self { inner: FakeEmbedder::new(64), failing: AtomicBool::new(false) } }
}

impl Encoder for SwitchableEncoder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::ensure!(!self.failing.load(Ordering::SeqCst), "encoder offline");
        self.inner.encode_batch(texts)
    }
}

/// Returns one vector too few per batch.
pub struct ShortBatchEncoder;

impl Encoder for ShortBatchEncoder {
    fn dim(&self) -> usize { 2 }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().skip(1).map(|_| vec![1.0, 0.0]).collect())
    }
}

/// Advertises a dimension it does not produce.
pub struct WrongDimEncoder;

impl Encoder for WrongDimEncoder {
    fn dim(&self) -> usize { 4 }
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.6, 0.8, 0.0]).collect())
    }
}

/// Scores by passage length and counts how it was called.
#[derive(Default)]
pub struct CountingReranker {
    pub calls: AtomicUsize,
    pub pairs_seen: AtomicUsize,
}

impl Reranker for CountingReranker {
    fn score_pairs(&self, pairs: &[(&str, &str)]) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pairs_seen.fetch_add(pairs.len(), Ordering::SeqCst);
        Ok(pairs.iter().map(|(_, text)| text.len() as f32).collect())
    }
}

/// Always returns a single score.
pub struct TruncatingReranker;

impl Reranker for TruncatingReranker {
    fn score_pairs(&self, _pairs: &[(&str, &str)]) -> anyhow::Result<Vec<f32>> { Ok(vec![1.0]) }
}

#[derive(Default)]
pub struct RecordingProgress {
    pub milestones: Mutex<Vec<(u8, String)>>,
}

impl ProgressSink for RecordingProgress {
    fn report(&self, percent: u8, status: &str) -> anyhow::Result<()> {
        self.milestones.lock().expect("lock").push((percent, status.to_string()));
        Ok(())
    }
}

pub struct BrokenProgress;

impl ProgressSink for BrokenProgress {
    fn report(&self, _percent: u8, _status: &str) -> anyhow::Result<()> { anyhow::bail!("client disconnected") }
}
