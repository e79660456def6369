use std::fs;
use std::path::Path;

use crate::chunker::{Chunker, ChunkingConfig};
use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

/// Reads the JSONL document dump written by ingestion and cuts it into chunks.
#[derive(Debug, Clone)]
pub struct CorpusProcessor {
    chunker: Chunker,
}

impl CorpusProcessor {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        Ok(Self { chunker: Chunker::new(config)? })
    }

    pub fn process_file(&self, jsonl_path: &Path) -> Result<Vec<Chunk>> {
        let documents = load_documents(jsonl_path)?;
        Ok(self.create_chunks(&documents))
    }

    pub fn create_chunks(&self, documents: &[Document]) -> Vec<Chunk> {
        let mut all_chunks = Vec::new();
        for doc in documents {
            let chunks = self.chunker.chunk_document(doc);
            tracing::debug!(source = %doc.source_file, chunks = chunks.len(), "chunked document");
            all_chunks.extend(chunks);
        }
        tracing::info!(documents = documents.len(), chunks = all_chunks.len(), "created chunks");
        all_chunks
    }
}

/// One [`Document`] per non-blank line.
pub fn load_documents(jsonl_path: &Path) -> Result<Vec<Document>> {
    if !jsonl_path.exists() {
        return Err(Error::NotFound(format!("{} (run ingestion first)", jsonl_path.display())));
    }
    let content = fs::read_to_string(jsonl_path)?;
    let mut documents = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() { continue; }
        let doc = serde_json::from_str::<Document>(line)
            .map_err(|e| Error::Malformed(format!("{} line {}: {}", jsonl_path.display(), line_no + 1, e)))?;
        documents.push(doc);
    }
    tracing::info!(path = %jsonl_path.display(), documents = documents.len(), "loaded documents");
    Ok(documents)
}
