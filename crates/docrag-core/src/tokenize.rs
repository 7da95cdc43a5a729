use serde::{Deserialize, Serialize};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

use crate::traits::PassageTokenizer;

/// Splits on Unicode whitespace and keeps tokens verbatim (case included).
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl PassageTokenizer for WhitespaceTokenizer {
    fn name(&self) -> &'static str { "whitespace" }

    fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }
}

/// UAX#29 word segmentation with lowercasing. Scripts written without
/// spaces (CJK) still come out as separate words; punctuation is dropped.
///
/// UAX#29 has no word boundaries for Thai, Lao, Khmer or Burmese, which need
/// dictionary segmentation. Index those with a custom `PassageTokenizer`
/// passed to `IndexPipeline::new`.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeWordTokenizer;

impl PassageTokenizer for UnicodeWordTokenizer {
    fn name(&self) -> &'static str { "unicode_words" }

    fn tokenize(&self, text: &str) -> Vec<String> {
        text.unicode_words().map(str::to_lowercase).collect()
    }
}

/// Configurable tokenizer choice.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenizerKind {
    #[default]
    Whitespace,
    UnicodeWords,
}

impl TokenizerKind {
    pub fn build(self) -> Arc<dyn PassageTokenizer> {
        match self {
            Self::Whitespace => Arc::new(WhitespaceTokenizer),
            Self::UnicodeWords => Arc::new(UnicodeWordTokenizer),
        }
    }
}
