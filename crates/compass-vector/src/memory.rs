use anyhow::{anyhow, ensure, Result};
use std::sync::{Arc, RwLock};

use compass_core::traits::DenseIndex;
use compass_core::types::{Chunk, DenseMatch, IndexedChunk};

/// Brute-force cosine search over vectors held in memory.
#[derive(Default)]
pub struct MemoryDenseIndex {
	rows: RwLock<Option<Vec<(Arc<Chunk>, Vec<f32>)>>>,
}

impl MemoryDenseIndex {
	pub fn new() -> Self { Self::default() }

	pub fn from_chunks(chunks: &[IndexedChunk]) -> Result<Self> {
		let index = Self::new();
		index.index(chunks)?;
		Ok(index)
	}
}

/// `1 - cos(a, b)`, in `[0, 2]`. Zero vectors are at distance 1 from everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if na <= f32::EPSILON || nb <= f32::EPSILON { return 1.0; }
	(1.0 - dot / (na * nb)).clamp(0.0, 2.0)
}

impl DenseIndex for MemoryDenseIndex {
	fn index(&self, chunks: &[IndexedChunk]) -> Result<()> {
		if let Some(first) = chunks.first() {
			let dim = first.embedding.len();
			ensure!(chunks.iter().all(|c| c.embedding.len() == dim), "embeddings of mixed dimension");
		}
		let rows = chunks.iter().map(|c| (Arc::clone(&c.chunk), c.embedding.clone())).collect();
		*self.rows.write().map_err(|_| anyhow!("dense index lock poisoned"))? = Some(rows);
		Ok(())
	}

	fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<DenseMatch>> {
		let guard = self.rows.read().map_err(|_| anyhow!("dense index lock poisoned"))?;
		let rows = guard.as_ref().ok_or_else(|| anyhow!("dense index has not been built"))?;
		if let Some((_, v)) = rows.first() {
			ensure!(v.len() == query_vec.len(), "query has {} dims, index has {}", query_vec.len(), v.len());
		}
		let mut hits: Vec<DenseMatch> = rows
			.iter()
			.map(|(chunk, v)| DenseMatch { chunk: Arc::clone(chunk), distance: cosine_distance(query_vec, v) })
			.collect();
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		hits.truncate(k);
		Ok(hits)
	}

	fn is_ready(&self) -> bool {
		self.rows.read().map(|r| r.is_some()).unwrap_or(false)
	}
}
