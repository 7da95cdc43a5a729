//! docrag-text
//!
//! Sparse (BM25) passage index backed by an in-RAM tantivy index. Callers
//! tokenize; the index only counts terms.
pub mod tantivy_utils;
pub mod index;

pub use index::SparseIndex;
