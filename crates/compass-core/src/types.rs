//! Domain types shared by the chunker, the indices and the retriever.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

pub type Meta = HashMap<String, String>;

/// Raw extracted text of one course file, as produced by the ingestion step.
///
/// - `breadcrumb`: hierarchical location label (e.g. "Week 2 > Syllabus")
/// - `source_file`: path of the file relative to the course root
/// - `file_type`: extension tag such as ".pdf"
/// - `metadata`: free-form string pairs, e.g. `url`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub breadcrumb: String,
    pub source_file: String,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Meta>,
}

impl Document {
    pub fn url(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("url").map(String::as_str)
    }
}

/// A contiguous span of a [`Document`].
///
/// Offsets are character (not byte) positions into the parent text, `end_char`
/// exclusive. `chunk_id` is the ordinal of the chunk within its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub breadcrumb: String,
    pub source_file: String,
    pub chunk_id: usize,
    pub start_char: usize,
    pub end_char: usize,
}

impl Chunk {
    pub const BREADCRUMB: &'static str = "breadcrumb";
    pub const SOURCE_FILE: &'static str = "source_file";
    pub const CHUNK_ID: &'static str = "chunk_id";
    pub const START_CHAR: &'static str = "start_char";
    pub const END_CHAR: &'static str = "end_char";

    /// String-typed key/value view used by persisted stores.
    pub fn to_metadata(&self) -> Meta {
        let mut meta = Meta::with_capacity(5);
        meta.insert(Self::BREADCRUMB.to_string(), self.breadcrumb.clone());
        meta.insert(Self::SOURCE_FILE.to_string(), self.source_file.clone());
        meta.insert(Self::CHUNK_ID.to_string(), self.chunk_id.to_string());
        meta.insert(Self::START_CHAR.to_string(), self.start_char.to_string());
        meta.insert(Self::END_CHAR.to_string(), self.end_char.to_string());
        meta
    }

    pub fn from_metadata(text: impl Into<String>, meta: &Meta) -> Result<Self> {
        let field = |key: &str| {
            meta.get(key)
                .cloned()
                .ok_or_else(|| Error::Malformed(format!("chunk metadata is missing '{key}'")))
        };
        let number = |key: &str| -> Result<usize> {
            let raw = field(key)?;
            raw.parse()
                .map_err(|_| Error::Malformed(format!("chunk metadata '{key}' is not a number: {raw:?}")))
        };
        Ok(Self {
            text: text.into(),
            breadcrumb: field(Self::BREADCRUMB)?,
            source_file: field(Self::SOURCE_FILE)?,
            chunk_id: number(Self::CHUNK_ID)?,
            start_char: number(Self::START_CHAR)?,
            end_char: number(Self::END_CHAR)?,
        })
    }
}

/// A chunk ready for both indices: its unit-length embedding and its analyzed
/// terms. Read-only once built; indices are rebuilt wholesale, never patched.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: Arc<Chunk>,
    pub embedding: Vec<f32>,
    pub terms: Vec<String>,
}

impl IndexedChunk {
    pub fn new(chunk: impl Into<Arc<Chunk>>, embedding: Vec<f32>, terms: Vec<String>) -> Self {
        Self { chunk: chunk.into(), embedding, terms }
    }
}

/// Which retrieval signal produced a score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Dense,
    Lexical,
}

/// Where a fused result came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Dense,
    Lexical,
    Both,
}

impl From<Signal> for Provenance {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Dense => Provenance::Dense,
            Signal::Lexical => Provenance::Lexical,
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Provenance::Dense => "dense",
            Provenance::Lexical => "lexical",
            Provenance::Both => "both",
        };
        f.write_str(label)
    }
}

/// Raw output of a dense store: the chunk and its cosine distance to the query.
#[derive(Debug, Clone)]
pub struct DenseMatch {
    pub chunk: Arc<Chunk>,
    pub distance: f32,
}

/// One entry of a single-signal ranking. Higher `score` is always better;
/// dense scores are similarities in [0,1], lexical scores are unbounded.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Arc<Chunk>,
    pub score: f32,
    pub signal: Signal,
}

/// A fused, per-query result.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub chunk: Arc<Chunk>,
    pub raw_score: f32,
    pub normalized_score: f32,
    pub hybrid_score: f32,
    pub provenance: Provenance,
}

impl RetrievalResult {
    pub fn text(&self) -> &str { &self.chunk.text }
    pub fn breadcrumb(&self) -> &str { &self.chunk.breadcrumb }
    pub fn source(&self) -> &str { &self.chunk.source_file }
    pub fn score(&self) -> f32 { self.hybrid_score }
}

/// Ranked results, best first, plus the top hybrid score as confidence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RetrievalOutcome {
    pub results: Vec<RetrievalResult>,
    pub confidence: f32,
}

impl RetrievalOutcome {
    pub fn empty() -> Self { Self::default() }

    pub fn from_results(results: Vec<RetrievalResult>) -> Self {
        let confidence = results.first().map_or(0.0, |r| r.hybrid_score.clamp(0.0, 1.0));
        Self { results, confidence }
    }

    pub fn is_empty(&self) -> bool { self.results.is_empty() }

    /// Whether the caller should answer rather than decline.
    pub fn is_confident(&self, threshold: f32) -> bool {
        !self.results.is_empty() && self.confidence >= threshold
    }
}
