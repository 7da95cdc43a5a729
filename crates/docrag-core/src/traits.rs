//! Capability boundaries between the retrieval core and its collaborators.
//!
//! Model-backed capabilities report failures as `anyhow::Error`; the core
//! maps them onto its own error kinds at the call site.

/// Turns texts into unit-normalized vectors of a fixed dimension.
pub trait Encoder: Send + Sync {
    fn dim(&self) -> usize;
    /// One vector per input text, in input order.
    fn encode_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn encode_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.encode_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("encoder returned no vector for the query"))
    }
}

/// Cross-encoder scoring of `(query, passage_text)` pairs.
pub trait Reranker: Send + Sync {
    /// One score per pair, same order and length as the input. Higher is better.
    fn score_pairs(&self, pairs: &[(&str, &str)]) -> anyhow::Result<Vec<f32>>;
}

/// Receives coarse ingestion milestones. Delivery is best-effort: callers
/// log and ignore a failed report.
pub trait ProgressSink: Send + Sync {
    fn report(&self, percent: u8, status: &str) -> anyhow::Result<()>;
}

/// Splits text into index terms. The same instance must tokenize both the
/// passages at build time and the query at retrieval time.
pub trait PassageTokenizer: Send + Sync {
    fn name(&self) -> &'static str;
    fn tokenize(&self, text: &str) -> Vec<String>;
}
