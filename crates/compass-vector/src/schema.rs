use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

use compass_core::types::Chunk;

pub const ID_COL: &str = "id";
pub const TEXT_COL: &str = "text";
pub const VECTOR_COL: &str = "vector";
pub const DISTANCE_COL: &str = "_distance";

/// Metadata columns, stored as strings in the same key/value form as
/// [`Chunk::to_metadata`].
pub const META_COLS: [&str; 5] = [Chunk::BREADCRUMB, Chunk::SOURCE_FILE, Chunk::CHUNK_ID, Chunk::START_CHAR, Chunk::END_CHAR];

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	let mut fields = vec![Field::new(ID_COL, DataType::Utf8, false), Field::new(TEXT_COL, DataType::Utf8, false)];
	fields.extend(META_COLS.iter().map(|name| Field::new(*name, DataType::Utf8, false)));
	fields.push(Field::new(VECTOR_COL, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true));
	Arc::new(Schema::new(fields))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
		Field::new("updated_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
	]))
}
