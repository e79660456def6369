//! Offline indexing: documents to chunks to embedded, analyzed chunks, then
//! a wholesale rebuild of the dense store.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

use compass_core::chunker::ChunkingConfig;
use compass_core::corpus::CorpusProcessor;
use compass_core::error::{Error, Result};
use compass_core::traits::{DenseIndex, Embedder, LexicalIndex};
use compass_core::types::{Document, IndexedChunk};
use compass_text::analyze;

const EMBED_BATCH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub dim: usize,
}

pub struct IndexingPipeline {
    corpus: CorpusProcessor,
    embedder: Arc<dyn Embedder>,
    progress: bool,
}

impl IndexingPipeline {
    pub fn new(chunking: ChunkingConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        Ok(Self { corpus: CorpusProcessor::new(chunking)?, embedder, progress: false })
    }

    /// Show a progress bar while embedding.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn prepare(&self, documents: &[Document]) -> Result<Vec<IndexedChunk>> {
        let chunks = self.corpus.create_chunks(documents);
        let dim = self.embedder.dim();
        let pb = if self.progress { ProgressBar::new(chunks.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );

        let mut indexed = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts)
                .map_err(|e| Error::Operation(format!("embedding failed: {e:#}")))?;
            if vectors.len() != batch.len() {
                return Err(Error::Operation(format!("embedder returned {} vectors for {} texts", vectors.len(), batch.len())));
            }
            for (chunk, vector) in batch.iter().zip(vectors) {
                if vector.len() != dim {
                    return Err(Error::InvalidConfig(format!(
                        "embedder '{}' declares {dim} dimensions but produced {}",
                        self.embedder.id(),
                        vector.len()
                    )));
                }
                let terms = analyze(&chunk.text);
                indexed.push(IndexedChunk::new(chunk.clone(), vector, terms));
            }
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("embedded");
        Ok(indexed)
    }

    /// Rebuilds `dense` from `documents`.
    pub fn build(&self, documents: &[Document], dense: &dyn DenseIndex) -> Result<IndexStats> {
        let indexed = self.prepare(documents)?;
        dense.index(&indexed).map_err(|e| Error::Operation(format!("dense index build failed: {e:#}")))?;
        let stats = IndexStats { documents: documents.len(), chunks: indexed.len(), dim: self.embedder.dim() };
        tracing::info!(documents = stats.documents, chunks = stats.chunks, dim = stats.dim, "index build complete");
        Ok(stats)
    }

    /// Rebuilds both indices in memory; used where nothing is persisted.
    pub fn build_both(&self, documents: &[Document], dense: &dyn DenseIndex, lexical: &dyn LexicalIndex) -> Result<IndexStats> {
        let indexed = self.prepare(documents)?;
        dense.index(&indexed).map_err(|e| Error::Operation(format!("dense index build failed: {e:#}")))?;
        lexical.index(&indexed).map_err(|e| Error::Operation(format!("lexical index build failed: {e:#}")))?;
        Ok(IndexStats { documents: documents.len(), chunks: indexed.len(), dim: self.embedder.dim() })
    }
}
