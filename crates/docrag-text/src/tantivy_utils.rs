use tantivy::schema::{IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED};
use tantivy::tokenizer::{TextAnalyzer, WhitespaceTokenizer};
use tantivy::Index;

pub const POSITION_FIELD: &str = "position";
pub const TERMS_FIELD: &str = "terms";
pub const TERMS_TOKENIZER: &str = "pretokenized_terms";

/// One document per passage: its position in the build input and its terms.
/// Terms are indexed with frequencies and field norms, which is what BM25 needs;
/// positions are not.
pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	let _position_field = schema_builder.add_u64_field(POSITION_FIELD, STORED);
	let terms_indexing = TextFieldIndexing::default().set_tokenizer(TERMS_TOKENIZER).set_index_option(IndexRecordOption::WithFreqs);
	let terms_options = TextOptions::default().set_indexing_options(terms_indexing);
	let _terms_field = schema_builder.add_text_field(TERMS_FIELD, terms_options);
	schema_builder.build()
}

/// Terms arrive already tokenized and space-joined, so tantivy only has to
/// split on whitespace again. No lowercasing or stop words: vocabulary is
/// decided by the caller's tokenizer alone.
pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(WhitespaceTokenizer::default()).build();
	index.tokenizers().register(TERMS_TOKENIZER, tokenizer);
}
