//! LanceDB connection and housekeeping helpers.
//!
//! Provides database open, table existence checks, and a small key/value
//! metadata table from which the [`IndexManifest`] of a built store is read.
use anyhow::Result;
use lancedb::{connect, Connection, Table};
use lancedb::query::{QueryBase, ExecutableQuery};
use arrow_array::{RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use std::sync::Arc;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::schema::build_meta_schema;

pub const META_TABLE: &str = "meta";

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

pub async fn set_meta(conn: &Connection, table: &str, key: &str, value: &str) -> Result<()> {
    ensure_table(conn, table, build_meta_schema()).await?;
    let t = conn.open_table(table).execute().await?;
    let rb = RecordBatch::try_new(
        build_meta_schema(),
        vec![
            Arc::new(StringArray::from(vec![key.to_string()])),
            Arc::new(StringArray::from(vec![value.to_string()])),
            Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
    // key is unique
    let mut mi = t.merge_insert(&["key"]);
    mi.when_matched_update_all(None).when_not_matched_insert_all();
    let _ = mi.execute(reader).await?;
    Ok(())
}

pub async fn get_meta(conn: &Connection, table: &str, key: &str) -> Result<Option<String>> {
    if !table_exists(conn, table).await? { return Ok(None); }
    let t = conn.open_table(table).execute().await?;
    let mut stream = t.query().only_if(format!("key = '{}'", key.replace('\'', "''"))).execute().await?;
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        if batch.num_rows() == 0 { continue; }
        let val = batch.column_by_name("value").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow::anyhow!("meta.value column missing"))?;
        return Ok(Some(val.value(0).to_string()));
    }
    Ok(None)
}

/// What was indexed, with which embedder, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_count: usize,
    /// RFC 3339 timestamp.
    pub built_at: String,
}

impl IndexManifest {
    pub fn new(embedder_id: impl Into<String>, dim: usize, chunk_count: usize) -> Self {
        Self { embedder_id: embedder_id.into(), dim, chunk_count, built_at: Utc::now().to_rfc3339() }
    }

    pub async fn write(&self, conn: &Connection) -> Result<()> {
        set_meta(conn, META_TABLE, "embedder_id", &self.embedder_id).await?;
        set_meta(conn, META_TABLE, "dim", &self.dim.to_string()).await?;
        set_meta(conn, META_TABLE, "chunk_count", &self.chunk_count.to_string()).await?;
        set_meta(conn, META_TABLE, "built_at", &self.built_at).await?;
        Ok(())
    }

    /// `None` when the store has no meta table or any key is missing.
    pub async fn read(conn: &Connection) -> Result<Option<Self>> {
        let (Some(embedder_id), Some(dim), Some(chunk_count), Some(built_at)) = (
            get_meta(conn, META_TABLE, "embedder_id").await?,
            get_meta(conn, META_TABLE, "dim").await?,
            get_meta(conn, META_TABLE, "chunk_count").await?,
            get_meta(conn, META_TABLE, "built_at").await?,
        ) else {
            return Ok(None);
        };
        Ok(Some(Self { embedder_id, dim: dim.parse()?, chunk_count: chunk_count.parse()?, built_at }))
    }
}

/// State of a store on disk: the chunk table with its row count (`None`
/// when the table is absent) and the manifest, if any.
pub struct StoreProbe {
    pub table: Option<(Table, usize)>,
    pub manifest: Option<IndexManifest>,
}

pub async fn probe(uri: &str, table: &str) -> Result<StoreProbe> {
    let conn = open_db(uri).await?;
    let manifest = IndexManifest::read(&conn).await?;
    let table = if table_exists(&conn, table).await? {
        let t = conn.open_table(table).execute().await?;
        let rows = t.count_rows(None).await?;
        Some((t, rows))
    } else {
        None
    };
    Ok(StoreProbe { table, manifest })
}
