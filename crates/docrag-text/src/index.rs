use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{doc, Index, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};

use docrag_core::error::{Error, Result};

use crate::tantivy_utils::{build_schema, register_tokenizer, POSITION_FIELD, TERMS_FIELD};

// Single writer thread keeps the whole corpus in one segment.
const WRITER_MEMORY_BYTES: usize = 20_000_000;

fn op_err(e: impl std::fmt::Display) -> Error { Error::Operation(format!("sparse index: {e}")) }

/// BM25 index over one document's pre-tokenized passages, held in RAM.
///
/// Scores follow tantivy's BM25 (k1 = 1.2, b = 0.75): non-negative, zero for
/// passages sharing no term with the query, and non-decreasing in term
/// frequency. Immutable once built.
pub struct SparseIndex {
	searcher: Searcher,
	position_field: Field,
	terms_field: Field,
	len: usize,
}

impl SparseIndex {
	pub fn build(tokenized_passages: &[Vec<String>]) -> Result<Self> {
		if tokenized_passages.is_empty() {
			return Err(Error::EmptyInput("sparse index needs at least one passage".into()));
		}
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let position_field = schema.get_field(POSITION_FIELD).map_err(op_err)?;
		let terms_field = schema.get_field(TERMS_FIELD).map_err(op_err)?;

		let mut index_writer: IndexWriter = index.writer_with_num_threads(1, WRITER_MEMORY_BYTES).map_err(op_err)?;
		for (position, tokens) in tokenized_passages.iter().enumerate() {
			index_writer
				.add_document(doc!(
					position_field => position as u64,
					terms_field => tokens.join(" "),
				))
				.map_err(op_err)?;
		}
		index_writer.commit().map_err(op_err)?;

		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(op_err)?;
		let searcher = reader.searcher();
		tracing::debug!(passages = tokenized_passages.len(), "built sparse index");
		Ok(Self { searcher, position_field, terms_field, len: tokenized_passages.len() })
	}

	pub fn len(&self) -> usize { self.len }

	pub fn is_empty(&self) -> bool { self.len == 0 }

	/// Raw BM25 score of every passage, in build order. Each query token is
	/// one term clause, so repeated query tokens weigh repeatedly.
	pub fn score_all(&self, query_tokens: &[String]) -> Result<Vec<f32>> {
		let mut scores = vec![0.0f32; self.len];
		let clauses: Vec<(Occur, Box<dyn Query>)> = query_tokens
			.iter()
			.flat_map(|t| t.split_whitespace())
			.map(|t| {
				let term = Term::from_field_text(self.terms_field, t);
				(Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs)) as Box<dyn Query>)
			})
			.collect();
		if clauses.is_empty() { return Ok(scores); }

		let query = BooleanQuery::new(clauses);
		let top_docs = self.searcher.search(&query, &TopDocs::with_limit(self.len)).map_err(op_err)?;
		for (score, addr) in top_docs {
			let doc: TantivyDocument = self.searcher.doc(addr).map_err(op_err)?;
			let position = doc
				.get_first(self.position_field)
				.and_then(|v| v.as_u64())
				.ok_or_else(|| op_err("document without a position"))?;
			if let Some(slot) = usize::try_from(position).ok().and_then(|p| scores.get_mut(p)) {
				*slot = score.max(0.0);
			}
		}
		Ok(scores)
	}
}

impl std::fmt::Debug for SparseIndex {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SparseIndex").field("len", &self.len).finish_non_exhaustive()
	}
}
