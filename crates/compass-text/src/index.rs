use anyhow::{anyhow, Result};
use std::sync::{Arc, RwLock};
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Value};
use tantivy::tokenizer::{PreTokenizedString, Token};
use tantivy::{Index, IndexReader, ReloadPolicy, TantivyDocument};

use compass_core::traits::LexicalIndex;
use compass_core::types::{Chunk, IndexedChunk, ScoredChunk, Signal};

use crate::tantivy_utils::{analyze, build_schema, register_tokenizer, ORD_FIELD, TEXT_FIELD};

const WRITER_MEMORY: usize = 50_000_000;

struct Built {
	index: Index,
	reader: IndexReader,
	ord_field: Field,
	text_field: Field,
	chunks: Vec<Arc<Chunk>>,
}

/// BM25 over every chunk of the corpus, held in RAM and rebuilt wholesale by
/// [`LexicalIndex::index`].
#[derive(Default)]
pub struct TantivyLexicalIndex {
	state: RwLock<Option<Built>>,
}

impl TantivyLexicalIndex {
	pub fn new() -> Self { Self::default() }

	pub fn from_chunks(chunks: &[IndexedChunk]) -> Result<Self> {
		let index = Self::new();
		index.index(chunks)?;
		Ok(index)
	}

	pub fn len(&self) -> usize {
		self.state.read().map(|s| s.as_ref().map_or(0, |b| b.chunks.len())).unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool { self.len() == 0 }

	fn build(chunks: &[IndexedChunk]) -> Result<Built> {
		let schema = build_schema();
		let index = Index::create_in_ram(schema.clone());
		register_tokenizer(&index);
		let ord_field = schema.get_field(ORD_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;

		let mut index_writer = index.writer_with_num_threads(1, WRITER_MEMORY)?;
		for (ord, c) in chunks.iter().enumerate() {
			let terms = if c.terms.is_empty() { analyze(&c.chunk.text) } else { c.terms.clone() };
			let tokens = terms
				.into_iter()
				.enumerate()
				.map(|(position, text)| Token { offset_from: 0, offset_to: 0, position, text, position_length: 1 })
				.collect();
			let mut doc = TantivyDocument::default();
			doc.add_u64(ord_field, ord as u64);
			doc.add_pre_tokenized_text(text_field, PreTokenizedString { text: c.chunk.text.clone(), tokens });
			index_writer.add_document(doc)?;
		}
		index_writer.commit()?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		let chunks = chunks.iter().map(|c| Arc::clone(&c.chunk)).collect();
		Ok(Built { index, reader, ord_field, text_field, chunks })
	}
}

impl LexicalIndex for TantivyLexicalIndex {
	fn index(&self, chunks: &[IndexedChunk]) -> Result<()> {
		let built = Self::build(chunks)?;
		let mut state = self.state.write().map_err(|_| anyhow!("lexical index lock poisoned"))?;
		*state = Some(built);
		tracing::info!(chunks = chunks.len(), "built lexical index");
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
		let state = self.state.read().map_err(|_| anyhow!("lexical index lock poisoned"))?;
		let built = state.as_ref().ok_or_else(|| anyhow!("lexical index has not been built"))?;
		if k == 0 || query.trim().is_empty() { return Ok(vec![]); }

		let searcher = built.reader.searcher();
		let qp = QueryParser::for_index(&built.index, vec![built.text_field]);
		let (q, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() { tracing::debug!(?errors, query, "lenient query parse dropped parts of the query"); }
		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::new();
		for (score, addr) in top_docs {
			if score <= 0.0 { continue; }
			let doc: TantivyDocument = searcher.doc(addr)?;
			let ord = doc.get_first(built.ord_field).and_then(|v| v.as_u64()).ok_or_else(|| anyhow!("indexed document without ord"))?;
			let chunk = built.chunks.get(ord as usize).ok_or_else(|| anyhow!("ord {ord} out of range"))?;
			hits.push(ScoredChunk { chunk: Arc::clone(chunk), score, signal: Signal::Lexical });
		}
		Ok(hits)
	}

	fn is_ready(&self) -> bool {
		self.state.read().map(|s| s.is_some()).unwrap_or(false)
	}

	fn all_chunks(&self) -> Vec<Arc<Chunk>> {
		self.state.read().map(|s| s.as_ref().map(|b| b.chunks.clone()).unwrap_or_default()).unwrap_or_default()
	}
}
