//! Domain types shared by the index, retrieval and answer layers.

use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;

/// The smallest retrievable unit of a document.
///
/// - `text`: the passage payload, never blank once it reaches an index
/// - `source_id`: identity of the parent document (usually its file name)
/// - `page_number`: 1-based physical page, `None` when the extractor could not tell
/// - `sequence_index`: 0-based position within the document's chunk stream
///
/// Passages are created once by chunking and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source_id: String,
    pub page_number: Option<NonZeroU32>,
    pub sequence_index: usize,
}

impl Passage {
    /// Build a passage; a page number of `0` is treated as unknown.
    pub fn new(text: impl Into<String>, source_id: impl Into<String>, page_number: Option<u32>, sequence_index: usize) -> Self {
        Self {
            text: text.into(),
            source_id: source_id.into(),
            page_number: page_number.and_then(NonZeroU32::new),
            sequence_index,
        }
    }

    /// Groups chunks that were cut from the same page: `"{source}_{page}"`.
    pub fn parent_page_key(&self) -> String {
        match self.page_number {
            Some(page) => format!("{}_{}", self.source_id, page),
            None => format!("{}_unknown", self.source_id),
        }
    }
}

/// Per-passage scores gathered while answering one query.
///
/// `semantic_score` is an inner product of unit vectors (so within [-1, 1]),
/// `lexical_score` is the BM25 score normalized by the query's maximum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub passage_index: usize,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub fused_score: f32,
    pub rerank_score: Option<f32>,
}

impl ScoredCandidate {
    /// The score that decided this candidate's final position.
    pub fn ranking_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.fused_score)
    }
}

/// A retrieval result: the passage plus the score it was ranked by.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedPassage {
    pub passage: Passage,
    pub relevance_score: f32,
    pub scores: ScoredCandidate,
}
