//! Hybrid retrieval over one document: dense candidates, BM25 evidence,
//! weighted fusion and an optional cross-encoder pass.

use std::sync::Arc;
use std::time::Instant;

use docrag_core::config::RetrievalConfig;
use docrag_core::error::{Error, Result};
use docrag_core::traits::{Encoder, Reranker};
use docrag_core::types::{RankedPassage, ScoredCandidate};

use crate::registry::{DocumentIndexEntry, DocumentRegistry};

pub struct HybridRetriever {
    encoder: Arc<dyn Encoder>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    pub fn new(encoder: Arc<dyn Encoder>, config: RetrievalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { encoder, reranker: None, config })
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn config(&self) -> &RetrievalConfig { &self.config }

    /// Top `top_k` passages of `document_id` for `query`, best first.
    ///
    /// An unknown document yields an empty list rather than an error.
    pub fn retrieve(
        &self,
        registry: &DocumentRegistry,
        document_id: &str,
        query: &str,
        top_k: usize,
        use_reranker: bool,
    ) -> Result<Vec<RankedPassage>> {
        let entry = match registry.get(document_id) {
            Ok(entry) => entry,
            Err(Error::NotFound(_)) => {
                tracing::debug!(document = %document_id, "retrieve on unknown document");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        self.retrieve_entry(&entry, query, top_k, use_reranker)
    }

    pub fn retrieve_entry(
        &self,
        entry: &DocumentIndexEntry,
        query: &str,
        top_k: usize,
        use_reranker: bool,
    ) -> Result<Vec<RankedPassage>> {
        if top_k == 0 {
            return Err(Error::InvalidArgument("top_k must be at least 1".into()));
        }
        let reranker = match (use_reranker, &self.reranker) {
            (false, _) => None,
            (true, Some(r)) => Some(r),
            (true, None) => return Err(Error::RetrievalUnavailable("reranking requested but no reranker is configured".into())),
        };
        let start = Instant::now();

        // Dense stage: over-fetch so fusion and reranking have room to reorder.
        let query_vector = self
            .encoder
            .encode_query(query)
            .map_err(|e| Error::RetrievalUnavailable(format!("query encoding failed: {e:#}")))?;
        let dense_k = top_k.saturating_mul(self.config.candidate_multiplier).min(entry.len());
        let dense_hits = entry.dense_index().query(&query_vector, dense_k).map_err(|e| {
            if let Error::DimensionMismatch { expected, found } = &e {
                tracing::error!(document = %entry.document_id(), expected, found, "query vector does not match index");
            }
            e
        })?;

        // Sparse stage: BM25 over the whole document, scaled by the best score.
        let query_terms = entry.tokenizer().tokenize(query);
        let lexical = normalize_by_max(entry.sparse_index().score_all(&query_terms)?);

        let mut candidates: Vec<ScoredCandidate> = dense_hits
            .into_iter()
            .map(|(passage_index, semantic_score)| {
                let lexical_score = lexical.get(passage_index).copied().unwrap_or(0.0);
                ScoredCandidate {
                    passage_index,
                    semantic_score,
                    lexical_score,
                    fused_score: self.config.semantic_weight * semantic_score + self.config.lexical_weight * lexical_score,
                    rerank_score: None,
                }
            })
            .collect();
        candidates.sort_by(|a, b| b.fused_score.total_cmp(&a.fused_score).then_with(|| a.passage_index.cmp(&b.passage_index)));
        tracing::debug!(
            document = %entry.document_id(),
            dense = candidates.len(),
            terms = query_terms.len(),
            "fused candidates"
        );

        if let Some(reranker) = reranker {
            let shortlist = top_k.saturating_mul(self.config.rerank_multiplier).min(candidates.len());
            candidates.truncate(shortlist);
            rerank(reranker.as_ref(), entry, query, &mut candidates)?;
        }

        candidates.truncate(top_k);
        let ranked = candidates
            .into_iter()
            .filter_map(|scores| {
                entry.passage(scores.passage_index).map(|passage| RankedPassage {
                    passage: passage.clone(),
                    relevance_score: scores.ranking_score(),
                    scores,
                })
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            document = %entry.document_id(),
            returned = ranked.len(),
            reranked = reranker.is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "retrieval finished"
        );
        Ok(ranked)
    }
}

/// Rescore `candidates` with the cross-encoder. Stable sort, so equal rerank
/// scores keep their fused order.
fn rerank(reranker: &dyn Reranker, entry: &DocumentIndexEntry, query: &str, candidates: &mut [ScoredCandidate]) -> Result<()> {
    if candidates.is_empty() {
        return Ok(());
    }
    let pairs: Vec<(&str, &str)> = candidates
        .iter()
        .map(|c| (query, entry.passage(c.passage_index).map_or("", |p| p.text.as_str())))
        .collect();
    let scores = reranker
        .score_pairs(&pairs)
        .map_err(|e| Error::RetrievalUnavailable(format!("reranker failed: {e:#}")))?;
    if scores.len() != candidates.len() {
        return Err(Error::RetrievalUnavailable(format!(
            "reranker returned {} scores for {} pairs",
            scores.len(),
            candidates.len()
        )));
    }
    for (candidate, score) in candidates.iter_mut().zip(scores) {
        candidate.rerank_score = Some(score);
    }
    candidates.sort_by(|a, b| b.ranking_score().total_cmp(&a.ranking_score()));
    Ok(())
}

/// Divide by the maximum; an all-zero (or empty) vector stays zero.
fn normalize_by_max(mut scores: Vec<f32>) -> Vec<f32> {
    let max = scores.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for s in &mut scores {
            *s /= max;
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::normalize_by_max;

    #[test]
    fn normalization_scales_to_unit_max() {
        assert_eq!(normalize_by_max(vec![2.0, 1.0, 0.0]), vec![1.0, 0.5, 0.0]);
        assert_eq!(normalize_by_max(vec![0.0, 0.0]), vec![0.0, 0.0]);
        assert!(normalize_by_max(Vec::new()).is_empty());
    }
}
