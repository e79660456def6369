//! compass-text
//!
//! Lexical signal of the retriever: an in-memory tantivy BM25 index over all
//! chunks, and the analyzer shared by documents and queries.

pub mod index;
pub mod tantivy_utils;

pub use index::TantivyLexicalIndex;
pub use tantivy_utils::analyze;
