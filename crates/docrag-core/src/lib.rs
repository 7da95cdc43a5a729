//! docrag-core
//!
//! Domain types, error taxonomy, capability traits, configuration and
//! chunking shared by the index, retrieval and application crates.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod progress;
pub mod tokenize;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use types::{Passage, RankedPassage, ScoredCandidate};
