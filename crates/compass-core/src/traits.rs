//! Collaborator seams of the retriever. Implementations live in the
//! `compass-embed`, `compass-text` and `compass-vector` crates.

use std::sync::Arc;

use crate::types::{Chunk, DenseMatch, IndexedChunk, ScoredChunk};

/// Text to fixed-length, unit-length vector.
pub trait Embedder: Send + Sync {
    /// Recorded in the dense store manifest.
    fn id(&self) -> String { "custom".to_string() }
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Bag-of-words ranking over every chunk of the corpus.
pub trait LexicalIndex: Send + Sync {
    /// Full rebuild; replaces whatever was indexed before.
    fn index(&self, chunks: &[IndexedChunk]) -> anyhow::Result<()>;
    /// Best first. Scores are non-negative and unranged.
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<ScoredChunk>>;
    fn is_ready(&self) -> bool;
    fn all_chunks(&self) -> Vec<Arc<Chunk>>;
}

/// Embedding similarity store.
pub trait DenseIndex: Send + Sync {
    /// Full rebuild; replaces whatever was indexed before.
    fn index(&self, chunks: &[IndexedChunk]) -> anyhow::Result<()>;
    /// Nearest first, by cosine distance in [0,2].
    fn search_vec(&self, query_vec: &[f32], k: usize) -> anyhow::Result<Vec<DenseMatch>>;
    fn is_ready(&self) -> bool;
}
