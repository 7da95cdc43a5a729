mod common;

use std::sync::Arc;

use common::*;
use docrag_core::config::IngestConfig;
use docrag_core::progress::NoProgress;
use docrag_core::tokenize::{TokenizerKind, WhitespaceTokenizer};
use docrag_core::{Error, Passage};
use docrag_embed::FakeEmbedder;
use docrag_hybrid::{DocumentIndexEntry, DocumentRegistry, IndexPipeline};

const TEXTS: [&str; 7] = [
    "the pump must be primed before use",
    "check the oil level every week",
    "replace filters in early spring",
    "store fuel away from the house",
    "the generator needs an annual service",
    "keep spare fuses in the panel box",
    "solar panels should be cleaned monthly",
];

#[test]
fn build_entry_publishes_aligned_indexes() {
    let registry = DocumentRegistry::new();
    let entry = fake_pipeline().build_entry(&registry, "manual", passages(&TEXTS), &NoProgress).expect("build");

    assert_eq!(entry.document_id(), "manual");
    assert_eq!(entry.len(), TEXTS.len());
    assert_eq!(entry.dense_index().len(), TEXTS.len());
    assert_eq!(entry.sparse_index().len(), TEXTS.len());
    assert_eq!(entry.dense_index().dim(), 64);
    assert_eq!(entry.tokenizer().name(), "whitespace");
    assert!(Arc::ptr_eq(&entry, &registry.get("manual").expect("published")));
}

#[test]
fn progress_milestones_are_reported_in_order() {
    let registry = DocumentRegistry::new();
    let progress = RecordingProgress::default();
    fake_pipeline().build_entry(&registry, "manual", passages(&TEXTS), &progress).expect("build");

    let milestones = progress.milestones.lock().expect("lock");
    let percents: Vec<u8> = milestones.iter().map(|(p, _)| *p).collect();
    assert_eq!(percents, vec![20, 40, 70, 85, 95, 100]);
    assert_eq!(milestones.last().map(|(_, s)| s.as_str()), Some("done"));
}

#[test]
fn failing_progress_sink_does_not_abort_the_build() {
    let registry = DocumentRegistry::new();
    fake_pipeline().build_entry(&registry, "manual", passages(&TEXTS), &BrokenProgress).expect("build");
    assert!(registry.exists("manual"));
}

#[test]
fn empty_document_is_rejected_and_not_published() {
    let registry = DocumentRegistry::new();
    let err = fake_pipeline().build_entry(&registry, "empty", Vec::new(), &NoProgress).unwrap_err();
    assert!(matches!(err, Error::EmptyInput(_)), "{err}");
    assert!(!registry.exists("empty"));
}

#[test]
fn blank_passage_is_rejected() {
    let registry = DocumentRegistry::new();
    let err = fake_pipeline().build_entry(&registry, "doc", passages(&["fine text", "   \n"]), &NoProgress).unwrap_err();
    assert!(matches!(err, Error::InvalidPassage(_)), "{err}");
    assert!(registry.is_empty());
}

#[test]
fn encoder_failure_keeps_previous_entry() {
    let encoder = Arc::new(SwitchableEncoder::new());
    let pipeline = IndexPipeline::new(encoder.clone(), Arc::new(WhitespaceTokenizer));
    let registry = DocumentRegistry::new();
    let original = pipeline.build_entry(&registry, "manual", passages(&TEXTS[..3]), &NoProgress).expect("build");

    encoder.failing.store(true, std::sync::atomic::Ordering::SeqCst);
    let err = pipeline.build_entry(&registry, "manual", passages(&TEXTS), &NoProgress).unwrap_err();
    assert!(matches!(err, Error::EncodingFailed(_)), "{err}");
    assert!(err.is_retryable());
    let current = registry.get("manual").expect("still published");
    assert!(Arc::ptr_eq(&original, &current));
    assert_eq!(current.len(), 3);
}

#[test]
fn short_encoder_batch_is_an_encoding_failure() {
    let registry = DocumentRegistry::new();
    let pipeline = IndexPipeline::new(Arc::new(ShortBatchEncoder), Arc::new(WhitespaceTokenizer));
    let err = pipeline.build_entry(&registry, "doc", passages(&TEXTS), &NoProgress).unwrap_err();
    assert!(matches!(err, Error::EncodingFailed(_)), "{err}");
}

#[test]
fn encoder_dimension_mismatch_is_fatal() {
    let registry = DocumentRegistry::new();
    let pipeline = IndexPipeline::new(Arc::new(WrongDimEncoder), Arc::new(WhitespaceTokenizer));
    let err = pipeline.build_entry(&registry, "doc", passages(&TEXTS), &NoProgress).unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 4, found: 3 }), "{err}");
    assert!(!registry.exists("doc"));
}

#[test]
fn batch_size_does_not_change_vectors() {
    let registry = DocumentRegistry::new();
    let build = |id: &str, batch: usize| {
        IndexPipeline::new(Arc::new(FakeEmbedder::new(32)), Arc::new(WhitespaceTokenizer))
            .with_batch_size(batch)
            .build_entry(&registry, id, passages(&TEXTS), &NoProgress)
            .expect("build")
    };
    let one = build("one", 1);
    let three = build("three", 3);
    let all = build("all", 32);
    for i in 0..TEXTS.len() {
        assert_eq!(one.dense_index().vector(i), three.dense_index().vector(i));
        assert_eq!(one.dense_index().vector(i), all.dense_index().vector(i));
    }
}

#[test]
fn pipeline_from_settings_uses_configured_tokenizer() {
    let ingest = IngestConfig { tokenizer: TokenizerKind::UnicodeWords, encode_batch_size: 2, ..IngestConfig::default() };
    let registry = DocumentRegistry::new();
    let entry = IndexPipeline::from_settings(Arc::new(FakeEmbedder::new(16)), &ingest)
        .build_entry(&registry, "doc", passages(&TEXTS), &NoProgress)
        .expect("build");
    assert_eq!(entry.tokenizer().name(), "unicode_words");
}

#[test]
fn registry_put_replaces_and_returns_previous() {
    let registry = DocumentRegistry::new();
    let first = index(&registry, "doc", &TEXTS[..2]);
    let second = Arc::new(
        DocumentIndexEntry::assemble(
            "doc",
            first.passages().to_vec(),
            docrag_vector::DenseIndex::build(vec![vec![1.0, 0.0]; 2]).expect("dense"),
            docrag_text::SparseIndex::build(&[vec!["a".to_string()], vec!["b".to_string()]]).expect("sparse"),
            Arc::new(WhitespaceTokenizer),
        )
        .expect("assemble"),
    );
    let replaced = registry.put(second.clone()).expect("previous entry");
    assert!(Arc::ptr_eq(&replaced, &first));
    assert!(Arc::ptr_eq(&registry.get("doc").expect("get"), &second));
    assert_eq!(registry.len(), 1);

    // A reader holding the old entry still sees a complete index.
    assert_eq!(first.dense_index().dim(), 64);
    assert_eq!(first.sparse_index().len(), 2);
}

#[test]
fn assemble_rejects_misaligned_indexes() {
    let chunks: Vec<Passage> = passages(&["a b", "c d"]);
    let err = DocumentIndexEntry::assemble(
        "doc",
        chunks,
        docrag_vector::DenseIndex::build(vec![vec![1.0, 0.0]]).expect("dense"),
        docrag_text::SparseIndex::build(&[vec!["a".to_string()], vec!["c".to_string()]]).expect("sparse"),
        Arc::new(WhitespaceTokenizer),
    )
    .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
}

#[test]
fn registry_get_remove_and_ids() {
    let registry = DocumentRegistry::new();
    assert!(matches!(registry.get("nope"), Err(Error::NotFound(id)) if id == "nope"));
    index(&registry, "b", &["beta"]);
    index(&registry, "a", &["alpha"]);
    assert_eq!(registry.document_ids(), vec!["a".to_string(), "b".to_string()]);
    assert!(registry.remove("a").is_some());
    assert!(registry.remove("a").is_none());
    assert!(!registry.exists("a"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn capacity_limit_evicts_oldest_document() {
    let registry = DocumentRegistry::with_capacity_limit(2);
    index(&registry, "a", &["alpha"]);
    std::thread::sleep(std::time::Duration::from_millis(5));
    index(&registry, "b", &["beta"]);
    std::thread::sleep(std::time::Duration::from_millis(5));

    // Rebuilding an existing id never evicts.
    index(&registry, "b", &["beta again"]);
    assert_eq!(registry.document_ids(), vec!["a".to_string(), "b".to_string()]);

    index(&registry, "c", &["gamma"]);
    assert_eq!(registry.document_ids(), vec!["b".to_string(), "c".to_string()]);
}
