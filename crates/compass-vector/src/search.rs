use anyhow::{anyhow, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::sync::Arc;

use compass_core::types::{Chunk, DenseMatch, Meta};

use crate::schema::{DISTANCE_COL, META_COLS, TEXT_COL, VECTOR_COL};

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("column '{name}' missing or not utf8"))
}

/// The chunk stored in row `i`, rebuilt from its text and string metadata.
pub fn row_to_chunk(batch: &RecordBatch, i: usize) -> Result<Chunk> {
	let text = string_col(batch, TEXT_COL)?.value(i).to_string();
	let mut meta = Meta::with_capacity(META_COLS.len());
	for name in META_COLS {
		meta.insert(name.to_string(), string_col(batch, name)?.value(i).to_string());
	}
	Ok(Chunk::from_metadata(text, &meta)?)
}

/// Nearest rows to `query` by cosine distance, nearest first.
pub async fn vector_search(table: &Table, query: &[f32], k: usize) -> Result<Vec<DenseMatch>> {
	if k == 0 { return Ok(vec![]); }
	let mut stream = table
		.vector_search(query.to_vec())?
		.distance_type(DistanceType::Cosine)
		.limit(k)
		.execute()
		.await?;
	let mut hits = Vec::new();
	while let Some(batch) = stream.try_next().await? {
		let distances = batch
			.column_by_name(DISTANCE_COL)
			.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
			.ok_or_else(|| anyhow!("vector search returned no {DISTANCE_COL} column"))?;
		for i in 0..batch.num_rows() {
			hits.push(DenseMatch { chunk: Arc::new(row_to_chunk(&batch, i)?), distance: distances.value(i) });
		}
	}
	hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
	hits.truncate(k);
	Ok(hits)
}

/// Every stored chunk with its vector, in storage order.
pub async fn load_all(table: &Table) -> Result<Vec<(Chunk, Vec<f32>)>> {
	let mut stream = table.query().execute().await?;
	let mut rows = Vec::new();
	while let Some(batch) = stream.try_next().await? {
		let vectors = batch
			.column_by_name(VECTOR_COL)
			.and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
			.ok_or_else(|| anyhow!("column '{VECTOR_COL}' missing"))?;
		for i in 0..batch.num_rows() {
			let values = vectors.value(i);
			let floats = values
				.as_any()
				.downcast_ref::<Float32Array>()
				.ok_or_else(|| anyhow!("vector column is not float32"))?;
			rows.push((row_to_chunk(&batch, i)?, floats.values().to_vec()));
		}
	}
	Ok(rows)
}

pub async fn count_rows(table: &Table) -> Result<usize> {
	Ok(table.count_rows(None).await?)
}
