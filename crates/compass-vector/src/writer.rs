use anyhow::{ensure, Result};
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{Connection, Table};
use std::sync::Arc;

use compass_core::types::IndexedChunk;

use crate::schema::build_chunk_schema;
use crate::table::{open_db, IndexManifest};

const BATCH_ROWS: usize = 1000;

/// Row ids are `source_file#chunk_id`, unique within a corpus.
pub fn row_id(chunk: &IndexedChunk) -> String {
	format!("{}#{}", chunk.chunk.source_file, chunk.chunk.chunk_id)
}

pub fn chunks_to_record_batch(chunks: &[IndexedChunk], dim: usize) -> Result<RecordBatch> {
	let dim_i32 = i32::try_from(dim)?;
	let schema = build_chunk_schema(dim_i32);
	let mut ids = Vec::with_capacity(chunks.len());
	let mut texts = Vec::with_capacity(chunks.len());
	let mut breadcrumbs = Vec::with_capacity(chunks.len());
	let mut sources = Vec::with_capacity(chunks.len());
	let mut chunk_ids = Vec::with_capacity(chunks.len());
	let mut starts = Vec::with_capacity(chunks.len());
	let mut ends = Vec::with_capacity(chunks.len());
	let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
	for c in chunks {
		ensure!(c.embedding.len() == dim, "chunk {} has a {}-dim embedding, store expects {}", row_id(c), c.embedding.len(), dim);
		ids.push(row_id(c));
		texts.push(c.chunk.text.clone());
		breadcrumbs.push(c.chunk.breadcrumb.clone());
		sources.push(c.chunk.source_file.clone());
		chunk_ids.push(c.chunk.chunk_id.to_string());
		starts.push(c.chunk.start_char.to_string());
		ends.push(c.chunk.end_char.to_string());
		vectors.push(Some(c.embedding.iter().map(|&x| Some(x)).collect()));
	}
	let record_batch = RecordBatch::try_new(schema, vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(texts)),
		Arc::new(StringArray::from(breadcrumbs)),
		Arc::new(StringArray::from(sources)),
		Arc::new(StringArray::from(chunk_ids)),
		Arc::new(StringArray::from(starts)),
		Arc::new(StringArray::from(ends)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim_i32)),
	])?;
	Ok(record_batch)
}

/// Creates `table` holding every chunk, then records the manifest. `uri`
/// must point at a freshly wiped store. An empty corpus gets a manifest but
/// no chunk table.
pub async fn write_store(uri: &str, table: &str, chunks: &[IndexedChunk], dim: usize, embedder_id: &str) -> Result<(Option<Table>, IndexManifest)> {
	let conn = open_db(uri).await?;
	let handle = if chunks.is_empty() { None } else { Some(create_chunk_table(&conn, table, chunks, dim).await?) };
	let manifest = IndexManifest::new(embedder_id, dim, chunks.len());
	manifest.write(&conn).await?;
	tracing::info!(table, chunks = chunks.len(), dim, "wrote dense store");
	Ok((handle, manifest))
}

async fn create_chunk_table(conn: &Connection, table: &str, chunks: &[IndexedChunk], dim: usize) -> Result<Table> {
	let batches = chunks
		.chunks(BATCH_ROWS)
		.map(|batch| chunks_to_record_batch(batch, dim))
		.collect::<Result<Vec<_>>>()?;
	let schema = build_chunk_schema(i32::try_from(dim)?);
	let reader = Box::new(RecordBatchIterator::new(batches.into_iter().map(Ok), schema));
	Ok(conn.create_table(table, reader).execute().await?)
}
