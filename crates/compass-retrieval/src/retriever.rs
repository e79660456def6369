use std::sync::Arc;
use std::time::Duration;

use compass_core::config::{FusionPolicy, RetrievalSettings, Settings};
use compass_core::error::{Error, Result};
use compass_core::traits::{DenseIndex, Embedder, LexicalIndex};
use compass_core::types::{Provenance, RetrievalOutcome, RetrievalResult, ScoredChunk, Signal};
use compass_text::{analyze, TantivyLexicalIndex};
use compass_vector::{IndexManifest, LanceDenseIndex};

use crate::fusion::{distance_to_similarity, ScoreFuser};

#[derive(Debug, Clone)]
pub struct RetrieverOptions {
    /// Bound on each signal's search; a signal that overruns counts as empty.
    pub search_timeout: Duration,
    /// Candidates fetched per signal, as a multiple of `k`.
    pub candidate_factor: usize,
}

impl Default for RetrieverOptions {
    fn default() -> Self { Self { search_timeout: Duration::from_secs(2), candidate_factor: 2 } }
}

impl From<&RetrievalSettings> for RetrieverOptions {
    fn from(s: &RetrievalSettings) -> Self {
        Self { search_timeout: s.search_timeout(), ..Self::default() }
    }
}

/// Hybrid retrieval over a built corpus: one dense and one lexical search
/// per query, fused into a single ranking. Cheap to share behind an `Arc`;
/// `retrieve` takes `&self` and never mutates the indices.
pub struct Retriever {
    lexical: Arc<dyn LexicalIndex>,
    dense: Arc<dyn DenseIndex>,
    embedder: Arc<dyn Embedder>,
    fuser: ScoreFuser,
    options: RetrieverOptions,
    manifest: Option<IndexManifest>,
}

impl Retriever {
    pub fn new(
        lexical: Arc<dyn LexicalIndex>,
        dense: Arc<dyn DenseIndex>,
        embedder: Arc<dyn Embedder>,
        policy: FusionPolicy,
        options: RetrieverOptions,
    ) -> Self {
        Self { lexical, dense, embedder, fuser: ScoreFuser::new(policy), options, manifest: None }
    }

    /// Opens the persisted dense store named by `settings` and rebuilds the
    /// lexical index from its rows. Blocks; call it outside async contexts
    /// or through `spawn_blocking`.
    pub fn open(settings: &Settings, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let dir = settings.data.index_path();
        let dense = LanceDenseIndex::open(&dir, &settings.data.table)?;
        let manifest = dense.manifest();
        if let Some(m) = &manifest {
            if m.dim != embedder.dim() {
                return Err(Error::InvalidConfig(format!(
                    "store at {} was built with {}-dim embeddings ({}), embedder '{}' produces {}",
                    dir.display(), m.dim, m.embedder_id, embedder.id(), embedder.dim()
                )));
            }
        }

        let mut chunks = dense.load_indexed().map_err(|e| Error::Operation(format!("{e:#}")))?;
        for c in &mut chunks {
            c.terms = analyze(&c.chunk.text);
        }
        let lexical = TantivyLexicalIndex::from_chunks(&chunks).map_err(|e| Error::Operation(format!("{e:#}")))?;
        tracing::info!(chunks = chunks.len(), dir = %dir.display(), "retriever ready");

        let mut retriever = Self::new(
            Arc::new(lexical),
            Arc::new(dense),
            embedder,
            settings.fusion.clone(),
            RetrieverOptions::from(&settings.retrieval),
        );
        retriever.manifest = manifest;
        Ok(retriever)
    }

    pub fn fuser(&self) -> &ScoreFuser { &self.fuser }

    pub fn options(&self) -> &RetrieverOptions { &self.options }

    /// Manifest of the persisted store, when opened from one.
    pub fn manifest(&self) -> Option<&IndexManifest> { self.manifest.as_ref() }

    pub fn is_ready(&self) -> bool { self.lexical.is_ready() && self.dense.is_ready() }

    /// Top `k` chunks for `query` with a confidence in `[0, 1]`.
    ///
    /// Errors only with [`Error::NotReady`]. A failing or slow signal is
    /// logged and treated as empty; an empty query or corpus gives an empty
    /// outcome.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalOutcome> {
        if !self.is_ready() {
            return Err(Error::NotReady("indices have not been built; run the indexer".into()));
        }
        let query = query.trim();
        if query.is_empty() || k == 0 {
            return Ok(RetrievalOutcome::empty());
        }
        let candidates = k.saturating_mul(self.options.candidate_factor.max(1));

        let dense_task = {
            let (dense, embedder, q) = (Arc::clone(&self.dense), Arc::clone(&self.embedder), query.to_string());
            tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<ScoredChunk>> {
                let query_vec = embedder.embed_one(&q)?;
                Ok(dense
                    .search_vec(&query_vec, candidates)?
                    .into_iter()
                    .map(|m| ScoredChunk { chunk: m.chunk, score: distance_to_similarity(m.distance), signal: Signal::Dense })
                    .collect())
            })
        };
        let lexical_task = {
            let (lexical, q) = (Arc::clone(&self.lexical), query.to_string());
            tokio::task::spawn_blocking(move || lexical.search(&q, candidates))
        };

        let timeout = self.options.search_timeout;
        let (dense, lexical) = tokio::join!(
            bounded(Signal::Dense, timeout, dense_task),
            bounded(Signal::Lexical, timeout, lexical_task),
        );

        let results = self.fuser.fuse(query, &dense, &lexical, k);
        let outcome = RetrievalOutcome::from_results(results);
        tracing::debug!(query, k, dense = dense.len(), lexical = lexical.len(), confidence = outcome.confidence, "retrieved");
        Ok(outcome)
    }

    /// Every chunk of the corpus at score 1.0, for callers that send the
    /// whole corpus instead of a ranking.
    pub fn all_chunks(&self) -> Vec<RetrievalResult> {
        self.lexical
            .all_chunks()
            .into_iter()
            .map(|chunk| RetrievalResult { chunk, raw_score: 1.0, normalized_score: 1.0, hybrid_score: 1.0, provenance: Provenance::Both })
            .collect()
    }

    pub fn chunk_count(&self) -> usize { self.lexical.all_chunks().len() }
}

async fn bounded(
    signal: Signal,
    timeout: Duration,
    task: tokio::task::JoinHandle<anyhow::Result<Vec<ScoredChunk>>>,
) -> Vec<ScoredChunk> {
    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(hits))) => hits,
        Ok(Ok(Err(e))) => {
            tracing::warn!(?signal, error = format!("{e:#}"), "search failed, continuing without this signal");
            vec![]
        }
        Ok(Err(join)) => {
            tracing::warn!(?signal, error = %join, "search task panicked, continuing without this signal");
            vec![]
        }
        Err(_) => {
            tracing::warn!(?signal, timeout_ms = timeout.as_millis() as u64, "search timed out, continuing without this signal");
            vec![]
        }
    }
}
