//! Question answering on top of retrieval: fetch passages, hand them to a
//! generator, attach citations.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;

use docrag_core::error::{Error, Result};
use docrag_core::types::RankedPassage;

use crate::registry::DocumentRegistry;
use crate::retriever::HybridRetriever;

pub const NO_RELEVANT_INFORMATION: &str = "Sorry, I could not find relevant information in the document to answer this question.";
pub const DOCUMENT_NOT_INDEXED: &str = "Sorry, this document has not been processed yet. Please upload it again.";
pub const SERVICE_UNAVAILABLE: &str = "Sorry, the answering service is temporarily unavailable. Please try again shortly.";
pub const UNEXPECTED_FAILURE: &str = "Sorry, something went wrong while answering your question.";

const EXCERPT_CHARS: usize = 200;

/// Produces answer text from a question and its supporting passages.
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, question: &str, passages: &[RankedPassage]) -> anyhow::Result<String>;
}

/// Numbered reference blocks for a generation prompt, best passage first.
pub fn build_context(passages: &[RankedPassage]) -> String {
    let mut context = String::new();
    for (i, ranked) in passages.iter().enumerate() {
        let page = ranked.passage.page_number.map_or_else(|| "unknown".to_string(), |p| p.to_string());
        let _ = writeln!(context, "--- Reference #{} (file: {}, page: {}) ---", i + 1, ranked.passage.source_id, page);
        let _ = writeln!(context, "{}\n", ranked.passage.text.trim());
    }
    context
}

/// Answers by quoting the best passages verbatim. Needs no model.
#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    max_passages: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self { Self { max_passages: 3 } }
}

impl ExtractiveGenerator {
    pub fn new(max_passages: usize) -> Self { Self { max_passages: max_passages.max(1) } }
}

impl AnswerGenerator for ExtractiveGenerator {
    fn generate(&self, _question: &str, passages: &[RankedPassage]) -> anyhow::Result<String> {
        anyhow::ensure!(!passages.is_empty(), "no passages to quote");
        let mut out = String::from("The most relevant passages in the document:\n");
        for (i, ranked) in passages.iter().take(self.max_passages).enumerate() {
            let _ = write!(out, "\n[{}] {}", i + 1, ranked.passage.text.trim());
            if let Some(page) = ranked.passage.page_number {
                let _ = write!(out, " (page {page})");
            }
            out.push('\n');
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    pub page: Option<u32>,
    pub excerpt: String,
    pub relevance_score: f32,
}

impl From<&RankedPassage> for Citation {
    fn from(ranked: &RankedPassage) -> Self {
        Self {
            source: ranked.passage.source_id.clone(),
            page: ranked.passage.page_number.map(|p| p.get()),
            excerpt: excerpt(&ranked.passage.text),
            relevance_score: ranked.relevance_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Citation>,
}

impl Answer {
    fn without_sources(text: &str) -> Self { Self { answer: text.to_string(), sources: Vec::new() } }
}

pub struct AnswerOrchestrator {
    retriever: HybridRetriever,
    generator: Arc<dyn AnswerGenerator>,
    top_k: usize,
    use_reranker: bool,
}

impl AnswerOrchestrator {
    /// Uses the retriever's configured `top_k` and `use_reranker`. Reranking
    /// enabled without an attached reranker fails at query time; turn it off
    /// explicitly with `with_reranking(false)`.
    pub fn new(retriever: HybridRetriever, generator: Arc<dyn AnswerGenerator>) -> Self {
        let top_k = retriever.config().top_k;
        let use_reranker = retriever.config().use_reranker;
        Self { retriever, generator, top_k, use_reranker }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_reranking(mut self, enabled: bool) -> Self {
        self.use_reranker = enabled;
        self
    }

    pub fn retriever(&self) -> &HybridRetriever { &self.retriever }

    pub fn answer(&self, registry: &DocumentRegistry, document_id: &str, question: &str) -> Result<Answer> {
        if !registry.exists(document_id) {
            return Err(Error::NotFound(document_id.to_string()));
        }
        let passages = self.retriever.retrieve(registry, document_id, question, self.top_k, self.use_reranker)?;
        if passages.is_empty() {
            return Ok(Answer::without_sources(NO_RELEVANT_INFORMATION));
        }
        let text = self
            .generator
            .generate(question, &passages)
            .map_err(|e| Error::GenerationFailed(format!("{e:#}")))?;
        tracing::info!(document = %document_id, sources = passages.len(), "answered question");
        Ok(Answer { answer: text, sources: passages.iter().map(Citation::from).collect() })
    }

    /// Like `answer`, but never fails: errors become an apology to the user.
    pub fn respond(&self, registry: &DocumentRegistry, document_id: &str, question: &str) -> Answer {
        match self.answer(registry, document_id, question) {
            Ok(answer) => answer,
            Err(Error::NotFound(_)) => Answer::without_sources(DOCUMENT_NOT_INDEXED),
            Err(e) if e.is_retryable() => {
                tracing::warn!(document = %document_id, "answer unavailable: {e}");
                Answer::without_sources(SERVICE_UNAVAILABLE)
            }
            Err(e) => {
                tracing::error!(document = %document_id, "answer failed: {e}");
                Answer::without_sources(UNEXPECTED_FAILURE)
            }
        }
    }
}

fn excerpt(text: &str) -> String {
    match text.char_indices().nth(EXCERPT_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
