mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::*;
use docrag_core::config::RetrievalConfig;
use docrag_core::progress::NoProgress;
use docrag_core::tokenize::WhitespaceTokenizer;
use docrag_core::traits::PassageTokenizer;
use docrag_core::Error;
use docrag_embed::FakeReranker;
use docrag_hybrid::{DocumentRegistry, HybridRetriever, IndexPipeline};

fn distinct_corpus(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("section{i} covers item{i} and detail{i}")).collect()
}

#[test]
fn a_passage_retrieves_itself_first() {
    let texts = distinct_corpus(20);
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &refs);
    let retriever = fake_retriever();

    for (i, text) in texts.iter().enumerate() {
        let hits = retriever.retrieve(&registry, "doc", text, 3, false).expect("retrieve");
        assert_eq!(hits[0].passage.sequence_index, i, "query {text:?}");
        assert!(hits[0].scores.rerank_score.is_none());
        assert!((hits[0].scores.semantic_score - 1.0).abs() < 1e-4);
        assert!((hits[0].scores.lexical_score - 1.0).abs() < 1e-6);
    }
}

#[test]
fn large_document_returns_exactly_top_k_sorted() {
    let texts: Vec<String> = (0..1000).map(|i| format!("passage number {i} talks about subject{}", i % 37)).collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let registry = DocumentRegistry::new();
    index(&registry, "big", &refs);

    let hits = fake_retriever().retrieve(&registry, "big", "what about subject12", 5, false).expect("retrieve");
    assert_eq!(hits.len(), 5);
    for pair in hits.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
    for hit in &hits {
        let s = hit.scores;
        assert!((0.0..=1.0).contains(&s.lexical_score));
        assert!((s.fused_score - (0.7 * s.semantic_score + 0.3 * s.lexical_score)).abs() < 1e-5);
    }
}

#[test]
fn fewer_passages_than_top_k_returns_all() {
    let registry = DocumentRegistry::new();
    index(&registry, "small", &["one fish", "two fish"]);
    let hits = fake_retriever().retrieve(&registry, "small", "fish", 5, false).expect("retrieve");
    assert_eq!(hits.len(), 2);
}

#[test]
fn unknown_document_yields_empty_result() {
    let registry = DocumentRegistry::new();
    let hits = fake_retriever().retrieve(&registry, "missing", "anything", 5, false).expect("retrieve");
    assert!(hits.is_empty());
}

#[test]
fn zero_top_k_is_rejected() {
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &["alpha beta"]);
    let err = fake_retriever().retrieve(&registry, "doc", "alpha", 0, false).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
}

#[test]
fn repeated_queries_are_identical() {
    let texts = distinct_corpus(40);
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &refs);
    let retriever = fake_retriever();

    let first = retriever.retrieve(&registry, "doc", "item7 and detail9", 6, false).expect("first");
    let second = retriever.retrieve(&registry, "doc", "item7 and detail9", 6, false).expect("second");
    let key = |hits: &[docrag_core::RankedPassage]| hits.iter().map(|h| (h.scores.passage_index, h.relevance_score)).collect::<Vec<_>>();
    assert_eq!(key(&first), key(&second));
}

#[test]
fn lexical_evidence_breaks_semantic_ties() {
    let registry = DocumentRegistry::new();
    let pipeline = IndexPipeline::new(Arc::new(ConstantEncoder), Arc::new(WhitespaceTokenizer));
    pipeline
        .build_entry(&registry, "fruit", passages(&["apple orange", "banana split", "cherry pie"]), &NoProgress)
        .expect("build");
    let retriever = HybridRetriever::new(Arc::new(ConstantEncoder), RetrievalConfig::default()).expect("retriever");

    let hits = retriever.retrieve(&registry, "fruit", "banana", 1, false).expect("retrieve");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].passage.text, "banana split");
    assert!((hits[0].relevance_score - 1.0).abs() < 1e-5);
}

#[test]
fn banana_recipe_ranks_above_apple_recipe() {
    let registry = DocumentRegistry::new();
    let pipeline = IndexPipeline::new(Arc::new(ConstantEncoder), Arc::new(WhitespaceTokenizer));
    pipeline
        .build_entry(&registry, "recipes", passages(&["apple pie recipe", "banana bread recipe", "car engine repair"]), &NoProgress)
        .expect("build");
    let retriever = HybridRetriever::new(Arc::new(ConstantEncoder), RetrievalConfig::default()).expect("retriever");

    let hits = retriever.retrieve(&registry, "recipes", "banana recipe", 3, false).expect("retrieve");
    let order: Vec<usize> = hits.iter().map(|h| h.scores.passage_index).collect();
    assert_eq!(order, vec![1, 0, 2]);
    assert!((hits[0].scores.lexical_score - 1.0).abs() < 1e-6);
    assert!(hits[1].scores.lexical_score > 0.0);
    assert_eq!(hits[2].scores.lexical_score, 0.0);
}

#[test]
fn reranker_is_consulted_only_when_requested() {
    let texts = distinct_corpus(30);
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &refs);
    let reranker = Arc::new(CountingReranker::default());
    let retriever = fake_retriever().with_reranker(reranker.clone());

    let plain = retriever.retrieve(&registry, "doc", "item3", 4, false).expect("plain");
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 0);
    assert!(plain.iter().all(|h| h.scores.rerank_score.is_none()));

    let reranked = retriever.retrieve(&registry, "doc", "item3", 4, true).expect("reranked");
    assert_eq!(reranker.calls.load(Ordering::SeqCst), 1);
    assert!(reranker.pairs_seen.load(Ordering::SeqCst) <= 8);
    assert_eq!(reranked.len(), 4);
    for hit in &reranked {
        assert_eq!(hit.scores.rerank_score, Some(hit.passage.text.len() as f32));
        assert_eq!(hit.relevance_score, hit.passage.text.len() as f32);
    }
    for pair in reranked.windows(2) {
        assert!(pair[0].relevance_score >= pair[1].relevance_score);
    }
}

#[test]
fn reranker_reorders_fused_shortlist() {
    let registry = DocumentRegistry::new();
    let pipeline = IndexPipeline::new(Arc::new(ConstantEncoder), Arc::new(WhitespaceTokenizer));
    pipeline
        .build_entry(&registry, "fruit", passages(&["apple orange", "banana split", "cherry pie"]), &NoProgress)
        .expect("build");
    let retriever = HybridRetriever::new(Arc::new(ConstantEncoder), RetrievalConfig::default())
        .expect("retriever")
        .with_reranker(Arc::new(FakeReranker));

    let hits = retriever.retrieve(&registry, "fruit", "banana", 1, true).expect("retrieve");
    assert_eq!(hits[0].passage.text, "banana split");
    assert_eq!(hits[0].scores.rerank_score, Some(1.0));
}

#[test]
fn requesting_rerank_without_reranker_fails() {
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &["alpha beta"]);
    let err = fake_retriever().retrieve(&registry, "doc", "alpha", 1, true).unwrap_err();
    assert!(matches!(err, Error::RetrievalUnavailable(_)), "{err}");
}

#[test]
fn reranker_returning_wrong_length_fails() {
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &["alpha beta", "gamma delta", "epsilon zeta"]);
    let retriever = fake_retriever().with_reranker(Arc::new(TruncatingReranker));
    let err = retriever.retrieve(&registry, "doc", "alpha", 2, true).unwrap_err();
    assert!(matches!(err, Error::RetrievalUnavailable(_)), "{err}");
}

#[test]
fn query_encoder_failure_is_retryable() {
    let encoder = Arc::new(SwitchableEncoder::new());
    let registry = DocumentRegistry::new();
    IndexPipeline::new(encoder.clone(), Arc::new(WhitespaceTokenizer))
        .build_entry(&registry, "doc", passages(&["alpha beta", "gamma delta"]), &NoProgress)
        .expect("build");
    let retriever = HybridRetriever::new(encoder.clone(), RetrievalConfig::default()).expect("retriever");

    encoder.failing.store(true, Ordering::SeqCst);
    let err = retriever.retrieve(&registry, "doc", "alpha", 1, false).unwrap_err();
    assert!(matches!(err, Error::RetrievalUnavailable(_)), "{err}");
    assert!(err.is_retryable());

    encoder.failing.store(false, Ordering::SeqCst);
    assert_eq!(retriever.retrieve(&registry, "doc", "alpha", 1, false).expect("recovered").len(), 1);
}

#[test]
fn query_dimension_must_match_index() {
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &["alpha beta"]);
    let retriever = HybridRetriever::new(Arc::new(ConstantEncoder), RetrievalConfig::default()).expect("retriever");
    let err = retriever.retrieve(&registry, "doc", "alpha", 1, false).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 64, found: 2 }), "{err}");
}

#[test]
fn invalid_weights_are_rejected() {
    let config = RetrievalConfig { semantic_weight: -0.7, lexical_weight: 0.3, ..RetrievalConfig::default() };
    assert!(HybridRetriever::new(Arc::new(ConstantEncoder), config).is_err());
}

#[test]
fn concurrent_queries_see_consistent_entries() {
    let texts = distinct_corpus(50);
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let registry = DocumentRegistry::new();
    index(&registry, "doc", &refs);
    let retriever = fake_retriever();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let (registry, retriever, texts) = (&registry, &retriever, &texts);
            scope.spawn(move || {
                for i in (t..50).step_by(4) {
                    let hits = retriever.retrieve(registry, "doc", &texts[i], 2, false).expect("retrieve");
                    assert_eq!(hits[0].passage.sequence_index, i);
                }
            });
        }
        scope.spawn(|| {
            index(&registry, "other", &["unrelated text", "more unrelated text"]);
        });
    });
    assert_eq!(registry.document_ids(), vec!["doc".to_string(), "other".to_string()]);
}

/// Greedy longest match against a fixed word list; unknown characters are skipped.
struct LexiconTokenizer(&'static [&'static str]);

impl PassageTokenizer for LexiconTokenizer {
    fn name(&self) -> &'static str { "lexicon" }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while let Some(first) = rest.chars().next() {
            match self.0.iter().filter(|w| rest.starts_with(**w)).max_by_key(|w| w.len()) {
                Some(word) => {
                    tokens.push((*word).to_string());
                    rest = &rest[word.len()..];
                }
                None => rest = &rest[first.len_utf8()..],
            }
        }
        tokens
    }
}

#[test]
fn thai_text_is_searchable_with_a_segmenting_tokenizer() {
    let tokenizer = LexiconTokenizer(&["กล้วย", "ขนม", "ปัง", "หอม"]);
    assert_eq!(tokenizer.tokenize("ขนมปังหอม"), vec!["ขนม", "ปัง", "หอม"]);

    let registry = DocumentRegistry::new();
    let pipeline = IndexPipeline::new(Arc::new(ConstantEncoder), Arc::new(tokenizer));
    pipeline
        .build_entry(&registry, "thai", passages(&["ขนมปังหอม", "กล้วยหอม", "ขนมปัง"]), &NoProgress)
        .expect("build");
    let retriever = HybridRetriever::new(Arc::new(ConstantEncoder), RetrievalConfig::default()).expect("retriever");

    let hits = retriever.retrieve(&registry, "thai", "กล้วย", 3, false).expect("retrieve");
    assert_eq!(hits[0].passage.text, "กล้วยหอม");
    assert!((hits[0].scores.lexical_score - 1.0).abs() < 1e-6);
    assert!(hits[1..].iter().all(|h| h.scores.lexical_score == 0.0));
}
