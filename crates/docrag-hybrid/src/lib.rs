//! docrag-hybrid
//!
//! Per-document index registry, the build pipeline that fills it, hybrid
//! retrieval over it and the answer orchestrator on top.

pub mod answer;
pub mod pipeline;
pub mod registry;
pub mod retriever;

pub use answer::{build_context, Answer, AnswerGenerator, AnswerOrchestrator, Citation, ExtractiveGenerator};
pub use pipeline::IndexPipeline;
pub use registry::{DocumentIndexEntry, DocumentRegistry};
pub use retriever::HybridRetriever;
