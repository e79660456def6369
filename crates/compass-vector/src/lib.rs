//! compass-vector
//!
//! Dense signal of the retriever. [`LanceDenseIndex`] persists chunks and
//! their embeddings in LanceDB and searches them by cosine distance;
//! [`MemoryDenseIndex`] does the same in memory for tests and small corpora.

pub mod memory;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

use anyhow::{anyhow, Result};
use lancedb::Table;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::runtime::Runtime;

use compass_core::error::Error;
use compass_core::traits::DenseIndex;
use compass_core::types::{Chunk, DenseMatch, IndexedChunk};

pub use memory::MemoryDenseIndex;
pub use table::IndexManifest;

const RUNTIME_THREADS: usize = 2;

fn operation(e: anyhow::Error) -> Error { Error::Operation(format!("{e:#}")) }

/// Open handle on a built store. `table` is `None` for an empty corpus.
struct Store {
	table: Option<Table>,
	manifest: Option<IndexManifest>,
}

/// A LanceDB store at `dir` holding one chunk table plus a `meta` table.
/// Rebuilding wipes the directory and rewrites both.
///
/// The connection and table are opened once and reused by every search on
/// a runtime owned by the index. The dense trait is synchronous; callers
/// inside async code reach it through `spawn_blocking`.
pub struct LanceDenseIndex {
	dir: PathBuf,
	table: String,
	embedder_id: String,
	runtime: Option<Runtime>,
	store: RwLock<Option<Store>>,
}

impl LanceDenseIndex {
	/// Empty, unbuilt store; any previous content of `dir` is removed.
	pub fn create(dir: &Path, table: &str, embedder_id: &str) -> Result<Self> {
		wipe(dir)?;
		Ok(Self {
			dir: dir.to_path_buf(),
			table: table.to_string(),
			embedder_id: embedder_id.to_string(),
			runtime: Some(new_runtime()?),
			store: RwLock::new(None),
		})
	}

	/// Opens a previously built store. Absent directory, absent table or an
	/// empty table are all [`Error::NotReady`].
	pub fn open(dir: &Path, table: &str) -> compass_core::Result<Self> {
		if !dir.exists() {
			return Err(Error::NotReady(format!("no dense store at {}", dir.display())));
		}
		let runtime = new_runtime().map_err(operation)?;
		let probe = runtime.block_on(table::probe(&dir.to_string_lossy(), table)).map_err(operation)?;
		let Some((handle, rows)) = probe.table else {
			return Err(Error::NotReady(format!("table '{table}' not found in {}", dir.display())));
		};
		if rows == 0 {
			return Err(Error::NotReady(format!("table '{table}' in {} is empty", dir.display())));
		}
		let embedder_id = probe.manifest.as_ref().map(|m| m.embedder_id.clone()).unwrap_or_default();
		tracing::info!(dir = %dir.display(), table, rows, "opened dense store");
		Ok(Self {
			dir: dir.to_path_buf(),
			table: table.to_string(),
			embedder_id,
			runtime: Some(runtime),
			store: RwLock::new(Some(Store { table: Some(handle), manifest: probe.manifest })),
		})
	}

	pub fn dir(&self) -> &Path { &self.dir }

	pub fn table(&self) -> &str { &self.table }

	/// `None` for stores written without a meta table.
	pub fn manifest(&self) -> Option<IndexManifest> {
		self.store.read().ok().and_then(|s| s.as_ref().and_then(|s| s.manifest.clone()))
	}

	fn block_on<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
		self.runtime.as_ref().ok_or_else(|| anyhow!("dense store runtime is shut down"))?.block_on(fut)
	}

	/// The built store's manifest and table handle. Errors when nothing has
	/// been indexed yet.
	fn handle(&self) -> Result<(Option<Table>, Option<IndexManifest>)> {
		let guard = self.store.read().map_err(|_| anyhow!("dense store lock poisoned"))?;
		let store = guard.as_ref().ok_or_else(|| anyhow!("dense store at {} has not been built", self.dir.display()))?;
		Ok((store.table.clone(), store.manifest.clone()))
	}

	pub fn count(&self) -> Result<usize> {
		match self.handle()?.0 {
			Some(t) => self.block_on(search::count_rows(&t)),
			None => Ok(0),
		}
	}

	/// Every stored chunk with its embedding.
	pub fn load_all(&self) -> Result<Vec<(Chunk, Vec<f32>)>> {
		match self.handle()?.0 {
			Some(t) => self.block_on(search::load_all(&t)),
			None => Ok(vec![]),
		}
	}

	/// Stored chunks ready to rebuild a lexical index from.
	pub fn load_indexed(&self) -> Result<Vec<IndexedChunk>> {
		Ok(self.load_all()?.into_iter().map(|(chunk, v)| IndexedChunk::new(chunk, v, vec![])).collect())
	}
}

impl Drop for LanceDenseIndex {
	fn drop(&mut self) {
		// may be dropped from async code, where a blocking shutdown panics
		if let Some(rt) = self.runtime.take() { rt.shutdown_background(); }
	}
}

fn new_runtime() -> Result<Runtime> {
	Ok(tokio::runtime::Builder::new_multi_thread()
		.worker_threads(RUNTIME_THREADS)
		.thread_name("compass-lance")
		.enable_all()
		.build()?)
}

fn wipe(dir: &Path) -> Result<()> {
	if dir.exists() { std::fs::remove_dir_all(dir)?; }
	std::fs::create_dir_all(dir)?;
	Ok(())
}

impl DenseIndex for LanceDenseIndex {
	fn index(&self, chunks: &[IndexedChunk]) -> Result<()> {
		let mut store = self.store.write().map_err(|_| anyhow!("dense store lock poisoned"))?;
		*store = None;
		let dim = chunks.first().map_or(0, |c| c.embedding.len());
		wipe(&self.dir)?;
		let uri = self.dir.to_string_lossy().to_string();
		let (table, manifest) = self.block_on(writer::write_store(&uri, &self.table, chunks, dim, &self.embedder_id))?;
		*store = Some(Store { table, manifest: Some(manifest) });
		Ok(())
	}

	fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<DenseMatch>> {
		let (table, manifest) = self.handle()?;
		if let Some(m) = manifest {
			if m.chunk_count == 0 { return Ok(vec![]); }
			anyhow::ensure!(m.dim == query_vec.len(), "query has {} dims, store has {}", query_vec.len(), m.dim);
		}
		let Some(table) = table else { return Ok(vec![]) };
		self.block_on(search::vector_search(&table, query_vec, k))
	}

	fn is_ready(&self) -> bool {
		self.store.read().is_ok_and(|s| s.is_some())
	}
}
