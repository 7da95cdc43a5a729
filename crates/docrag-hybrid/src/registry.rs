//! Per-document index entries and the registry that owns them.
//!
//! The registry is one `RwLock<HashMap<..>>` of `Arc` entries. Entries are
//! built outside the lock and swapped in whole, so a reader holding an entry
//! keeps a consistent passages/vectors/terms triple even if the document is
//! re-ingested meanwhile. Two concurrent ingestions of the same document id
//! race: the last `put` wins.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use docrag_core::error::{Error, Result};
use docrag_core::traits::PassageTokenizer;
use docrag_core::types::Passage;
use docrag_text::SparseIndex;
use docrag_vector::DenseIndex;

/// Everything needed to query one document. Position `i` in `passages`, the
/// dense index and the sparse index always refers to the same passage.
pub struct DocumentIndexEntry {
    document_id: String,
    passages: Vec<Passage>,
    dense_index: DenseIndex,
    sparse_index: SparseIndex,
    tokenizer: Arc<dyn PassageTokenizer>,
    created_at: DateTime<Utc>,
}

impl DocumentIndexEntry {
    /// Fails if the three structures do not cover the same number of passages.
    pub fn assemble(
        document_id: impl Into<String>,
        passages: Vec<Passage>,
        dense_index: DenseIndex,
        sparse_index: SparseIndex,
        tokenizer: Arc<dyn PassageTokenizer>,
    ) -> Result<Self> {
        if passages.is_empty() {
            return Err(Error::EmptyInput("document produced no extractable text".into()));
        }
        if dense_index.len() != passages.len() || sparse_index.len() != passages.len() {
            return Err(Error::InvalidArgument(format!(
                "index sizes diverge: {} passages, {} vectors, {} term lists",
                passages.len(),
                dense_index.len(),
                sparse_index.len()
            )));
        }
        Ok(Self { document_id: document_id.into(), passages, dense_index, sparse_index, tokenizer, created_at: Utc::now() })
    }

    pub fn document_id(&self) -> &str { &self.document_id }
    pub fn passages(&self) -> &[Passage] { &self.passages }
    pub fn passage(&self, index: usize) -> Option<&Passage> { self.passages.get(index) }
    pub fn dense_index(&self) -> &DenseIndex { &self.dense_index }
    pub fn sparse_index(&self) -> &SparseIndex { &self.sparse_index }
    pub fn tokenizer(&self) -> &dyn PassageTokenizer { self.tokenizer.as_ref() }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn len(&self) -> usize { self.passages.len() }
    pub fn is_empty(&self) -> bool { self.passages.is_empty() }
}

impl std::fmt::Debug for DocumentIndexEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndexEntry")
            .field("document_id", &self.document_id)
            .field("passages", &self.passages.len())
            .field("dim", &self.dense_index.dim())
            .field("tokenizer", &self.tokenizer.name())
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// `document_id → entry` map shared by ingestion and querying.
///
/// Unbounded by default. With a capacity limit, publishing a new id into a
/// full registry evicts the entry with the oldest `created_at`.
#[derive(Default)]
pub struct DocumentRegistry {
    entries: RwLock<HashMap<String, Arc<DocumentIndexEntry>>>,
    capacity: Option<usize>,
}

impl DocumentRegistry {
    pub fn new() -> Self { Self::default() }

    pub fn with_capacity_limit(max_documents: usize) -> Self {
        Self { entries: RwLock::default(), capacity: Some(max_documents.max(1)) }
    }

    /// Publish `entry` under its document id, returning the entry it replaced.
    pub fn put(&self, entry: Arc<DocumentIndexEntry>) -> Option<Arc<DocumentIndexEntry>> {
        let document_id = entry.document_id().to_string();
        let mut entries = self.entries.write();
        if let Some(limit) = self.capacity {
            if !entries.contains_key(&document_id) && entries.len() >= limit {
                let oldest = entries
                    .values()
                    .min_by(|a, b| a.created_at().cmp(&b.created_at()).then_with(|| a.document_id().cmp(b.document_id())))
                    .map(|e| e.document_id().to_string());
                if let Some(oldest) = oldest {
                    entries.remove(&oldest);
                    tracing::warn!(evicted = %oldest, limit, "registry full, evicted oldest document");
                }
            }
        }
        let previous = entries.insert(document_id.clone(), entry);
        tracing::info!(document = %document_id, replaced = previous.is_some(), "published document index");
        previous
    }

    pub fn get(&self, document_id: &str) -> Result<Arc<DocumentIndexEntry>> {
        self.entries
            .read()
            .get(document_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(document_id.to_string()))
    }

    pub fn exists(&self, document_id: &str) -> bool { self.entries.read().contains_key(document_id) }

    pub fn remove(&self, document_id: &str) -> Option<Arc<DocumentIndexEntry>> { self.entries.write().remove(document_id) }

    pub fn len(&self) -> usize { self.entries.read().len() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }

    /// Sorted ids of all published documents.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
