//! Turns a document's passages into a published `DocumentIndexEntry`.

use std::sync::Arc;
use std::time::Instant;

use docrag_core::config::IngestConfig;
use docrag_core::error::{Error, Result};
use docrag_core::traits::{Encoder, PassageTokenizer, ProgressSink};
use docrag_core::types::Passage;
use docrag_text::SparseIndex;
use docrag_vector::DenseIndex;

use crate::registry::{DocumentIndexEntry, DocumentRegistry};

pub const DEFAULT_ENCODE_BATCH_SIZE: usize = 32;

pub struct IndexPipeline {
    encoder: Arc<dyn Encoder>,
    tokenizer: Arc<dyn PassageTokenizer>,
    batch_size: usize,
}

impl IndexPipeline {
    pub fn new(encoder: Arc<dyn Encoder>, tokenizer: Arc<dyn PassageTokenizer>) -> Self {
        Self { encoder, tokenizer, batch_size: DEFAULT_ENCODE_BATCH_SIZE }
    }

    pub fn from_settings(encoder: Arc<dyn Encoder>, ingest: &IngestConfig) -> Self {
        Self::new(encoder, ingest.tokenizer.build()).with_batch_size(ingest.encode_batch_size)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Encode, index and publish `passages` under `document_id`.
    ///
    /// Nothing is published unless every stage succeeds; a failed rebuild
    /// leaves the previous entry for `document_id` untouched.
    pub fn build_entry(
        &self,
        registry: &DocumentRegistry,
        document_id: &str,
        passages: Vec<Passage>,
        progress: &dyn ProgressSink,
    ) -> Result<Arc<DocumentIndexEntry>> {
        let start = Instant::now();
        if passages.is_empty() {
            return Err(Error::EmptyInput(format!("document {document_id} produced no passages")));
        }
        if let Some(blank) = passages.iter().position(|p| p.text.trim().is_empty()) {
            return Err(Error::InvalidPassage(format!("passage {blank} of {document_id} is blank")));
        }
        notify(progress, 20, "preparing passages");
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();

        notify(progress, 40, "encoding passages");
        let vectors = self.encode_all(&texts)?;

        notify(progress, 70, "building dense index");
        let expected = self.encoder.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            tracing::error!(document = %document_id, expected, found = bad.len(), "encoder dimension mismatch");
            return Err(Error::DimensionMismatch { expected, found: bad.len() });
        }
        let dense_index = DenseIndex::build(vectors)?;

        notify(progress, 85, "building sparse index");
        let term_lists: Vec<Vec<String>> = texts.iter().map(|t| self.tokenizer.tokenize(t)).collect();
        let sparse_index = SparseIndex::build(&term_lists)?;

        notify(progress, 95, "publishing index");
        let entry = Arc::new(DocumentIndexEntry::assemble(
            document_id,
            passages,
            dense_index,
            sparse_index,
            Arc::clone(&self.tokenizer),
        )?);
        registry.put(Arc::clone(&entry));

        notify(progress, 100, "done");
        tracing::info!(
            document = %document_id,
            passages = entry.len(),
            tokenizer = self.tokenizer.name(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "indexed document"
        );
        Ok(entry)
    }

    fn encode_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for (n, batch) in texts.chunks(self.batch_size).enumerate() {
            let encoded = self
                .encoder
                .encode_batch(batch)
                .map_err(|e| Error::EncodingFailed(format!("batch {n}: {e:#}")))?;
            if encoded.len() != batch.len() {
                return Err(Error::EncodingFailed(format!(
                    "batch {n}: expected {} vectors, got {}",
                    batch.len(),
                    encoded.len()
                )));
            }
            vectors.extend(encoded);
            tracing::debug!(batch = n, done = vectors.len(), total = texts.len(), "encoded passages");
        }
        Ok(vectors)
    }
}

fn notify(progress: &dyn ProgressSink, percent: u8, status: &str) {
    if let Err(e) = progress.report(percent, status) {
        tracing::warn!(percent, "progress report failed: {e:#}");
    }
}
