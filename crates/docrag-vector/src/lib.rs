//! docrag-vector
//!
//! Exact inner-product search over one document's passage embeddings. The
//! corpus per document is small (hundreds to low thousands of passages), so a
//! flat scan is both exact and fast enough.
pub mod index;

pub use index::DenseIndex;
