//! `LanceDB` implementation of `VectorStore`.

use arrow_array::builder::{FixedSizeListBuilder, Float32Builder, ListBuilder, UInt32Builder};
use arrow_array::{
    Array, ArrayRef, Float32Array, ListArray, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zotrag_core::{
    DistanceMetric, PassageRecord, RecordMetadata, SearchQuery, SearchResult, StoreError,
    VectorStore,
};

use crate::schema::passages_schema;
use crate::TABLE_NAME;

/// LanceDB-based vector store.
pub struct LanceStore {
    /// Path to the `LanceDB` database
    db_path: PathBuf,
    /// Embedding dimension
    embedding_dim: usize,
    /// Database connection (lazy initialized)
    connection: RwLock<Option<Connection>>,
    /// Table handle
    table: RwLock<Option<Table>>,
}

impl LanceStore {
    /// Create a new `LanceStore`.
    #[must_use]
    pub fn new(db_path: PathBuf, embedding_dim: usize) -> Self {
        Self {
            db_path,
            embedding_dim,
            connection: RwLock::new(None),
            table: RwLock::new(None),
        }
    }

    /// Get the database path.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Get the embedding dimension.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Get or create connection.
    async fn get_connection(&self) -> Result<Connection, StoreError> {
        {
            let conn = self.connection.read().await;
            if let Some(ref c) = *conn {
                return Ok(c.clone());
            }
        }

        let mut conn = self.connection.write().await;
        if let Some(ref c) = *conn {
            return Ok(c.clone());
        }
        let db_path_str = self.db_path.to_string_lossy().to_string();
        let new_conn = connect(&db_path_str)
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to connect to LanceDB: {e}")))?;
        *conn = Some(new_conn.clone());
        Ok(new_conn)
    }

    /// Get or open the passages table.
    async fn get_table(&self) -> Result<Table, StoreError> {
        {
            let table = self.table.read().await;
            if let Some(ref t) = *table {
                return Ok(t.clone());
            }
        }

        let conn = self.get_connection().await?;
        let mut table_lock = self.table.write().await;
        if let Some(ref t) = *table_lock {
            return Ok(t.clone());
        }

        let t = conn
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to open {TABLE_NAME} table: {e}")))?;
        *table_lock = Some(t.clone());
        Ok(t)
    }

    /// Convert records to an Arrow `RecordBatch`.
    fn records_to_batch(&self, records: &[PassageRecord]) -> Result<RecordBatch, StoreError> {
        if let Some(bad) = records.iter().find(|r| r.vector.len() != self.embedding_dim) {
            return Err(StoreError::Schema(format!(
                "record {} has dimension {}, expected {}",
                bad.id,
                bad.vector.len(),
                self.embedding_dim
            )));
        }

        let ids: Vec<_> = records.iter().map(|r| r.id.to_string()).collect();
        let texts: Vec<_> = records.iter().map(|r| r.text.clone()).collect();
        let creators: Vec<_> = records.iter().map(|r| r.metadata.creators.clone()).collect();
        let dates: Vec<_> = records.iter().map(|r| r.metadata.date.clone()).collect();
        let item_types: Vec<_> = records
            .iter()
            .map(|r| r.metadata.item_type.clone())
            .collect();
        let titles: Vec<_> = records.iter().map(|r| r.metadata.title.clone()).collect();
        let keys: Vec<_> = records
            .iter()
            .map(|r| r.metadata.zotero_key.clone())
            .collect();

        let schema = Arc::new(passages_schema(self.embedding_dim));

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(ids)),
                Arc::new(StringArray::from(texts)),
                build_vector_array(records, self.embedding_dim),
                Arc::new(StringArray::from(creators)),
                Arc::new(StringArray::from(dates)),
                Arc::new(StringArray::from(item_types)),
                build_pages_array(records),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(keys)),
            ],
        )
        .map_err(|e| StoreError::Insert(format!("Failed to create RecordBatch: {e}")))
    }
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn init(&self) -> Result<(), StoreError> {
        info!("Initializing LanceDB at {:?}", self.db_path);

        tokio::fs::create_dir_all(&self.db_path)
            .await
            .map_err(|e| StoreError::Init(format!("Failed to create db directory: {e}")))?;

        let conn = self.get_connection().await?;
        let tables = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| StoreError::Init(format!("Failed to list tables: {e}")))?;

        if !tables.iter().any(|t| t == TABLE_NAME) {
            info!("Creating {TABLE_NAME} table");
            let schema = Arc::new(passages_schema(self.embedding_dim));
            conn.create_empty_table(TABLE_NAME, schema)
                .execute()
                .await
                .map_err(|e| StoreError::Init(format!("Failed to create table: {e}")))?;
        }

        Ok(())
    }

    async fn reset(&self) -> Result<(), StoreError> {
        let conn = self.get_connection().await?;
        let tables = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| StoreError::Delete(format!("Failed to list tables: {e}")))?;

        if tables.iter().any(|t| t == TABLE_NAME) {
            conn.drop_table(TABLE_NAME)
                .await
                .map_err(|e| StoreError::Delete(format!("Failed to drop table: {e}")))?;
            info!("Dropped {TABLE_NAME} table");
        }
        *self.table.write().await = None;

        self.init().await
    }

    async fn insert(&self, records: &[PassageRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        debug!("Inserting {} records", records.len());

        let table = self.get_table().await?;
        let batch = self.records_to_batch(records)?;
        let schema = batch.schema();

        let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .map_err(|e| StoreError::Insert(format!("Failed to insert records: {e}")))?;

        Ok(())
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>, StoreError> {
        debug!("Searching with limit {}", query.limit);

        let table = self.get_table().await?;

        let mut results = table
            .vector_search(query.embedding.clone())
            .map_err(|e| StoreError::Query(format!("Failed to create search query: {e}")))?
            .distance_type(distance_type(query.metric))
            .limit(query.limit)
            .execute()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to execute search: {e}")))?;

        let mut search_results = Vec::new();

        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| StoreError::Query(format!("Failed to fetch results: {e}")))?
        {
            search_results.extend(batch_to_search_results(&batch, query.metric)?);
        }

        debug!("Found {} results", search_results.len());
        Ok(search_results)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let table = self.get_table().await?;
        let rows = table
            .count_rows(None)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to count rows: {e}")))?;
        Ok(rows as u64)
    }
}

fn distance_type(metric: DistanceMetric) -> DistanceType {
    match metric {
        DistanceMetric::Cosine => DistanceType::Cosine,
        DistanceMetric::L2 => DistanceType::L2,
        DistanceMetric::Dot => DistanceType::Dot,
    }
}

/// Turn a `_distance` value into a higher-is-closer score.
fn distance_to_score(metric: DistanceMetric, distance: f32) -> f32 {
    match metric {
        DistanceMetric::Cosine | DistanceMetric::Dot => 1.0 - distance,
        DistanceMetric::L2 => 1.0 / (1.0 + distance),
    }
}

fn build_vector_array(records: &[PassageRecord], dim: usize) -> ArrayRef {
    let mut builder = FixedSizeListBuilder::new(Float32Builder::new(), dim as i32);

    for record in records {
        builder.values().append_slice(&record.vector);
        builder.append(true);
    }

    Arc::new(builder.finish())
}

fn build_pages_array(records: &[PassageRecord]) -> ArrayRef {
    let mut builder = ListBuilder::new(UInt32Builder::new());

    for record in records {
        match &record.metadata.page_numbers {
            Some(pages) => {
                builder.values().append_slice(pages);
                builder.append(true);
            }
            None => builder.append(false),
        }
    }

    Arc::new(builder.finish())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

fn optional_string(column: Option<&StringArray>, i: usize) -> Option<String> {
    column.and_then(|c| (!c.is_null(i)).then(|| c.value(i).to_string()))
}

fn batch_to_search_results(
    batch: &RecordBatch,
    metric: DistanceMetric,
) -> Result<Vec<SearchResult>, StoreError> {
    let (Some(ids), Some(texts)) = (string_column(batch, "id"), string_column(batch, "text"))
    else {
        return Err(StoreError::Query("Missing required columns".to_string()));
    };

    let creators = string_column(batch, "creators");
    let dates = string_column(batch, "date");
    let item_types = string_column(batch, "item_type");
    let titles = string_column(batch, "title");
    let keys = string_column(batch, "zotero_key");
    let pages = batch
        .column_by_name("page_numbers")
        .and_then(|c| c.as_any().downcast_ref::<ListArray>());
    let distances = batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());

    for i in 0..batch.num_rows() {
        let id = Uuid::parse_str(ids.value(i)).unwrap_or_else(|e| {
            warn!("Invalid record id {:?}: {e}", ids.value(i));
            Uuid::nil()
        });

        let page_numbers = pages.and_then(|p| {
            if p.is_null(i) {
                return None;
            }
            let values = p.value(i);
            values
                .as_any()
                .downcast_ref::<UInt32Array>()
                .map(|v| v.values().to_vec())
        });

        let score = distances.map_or(0.0, |d| distance_to_score(metric, d.value(i)));

        results.push(SearchResult {
            id,
            text: texts.value(i).to_string(),
            metadata: RecordMetadata {
                creators: optional_string(creators, i),
                date: optional_string(dates, i),
                item_type: optional_string(item_types, i),
                page_numbers,
                title: optional_string(titles, i),
                zotero_key: optional_string(keys, i),
            },
            score,
        });
    }

    Ok(results)
}
