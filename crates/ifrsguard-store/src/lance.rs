//! LanceDB passage search over embedded standard and document chunks.
//!
//! One table, `passages`: chunk text, the four metadata columns, and a
//! fixed-size `vector` column. Query embedding is delegated to a
//! [`QueryEmbedder`] so the model stays outside this crate.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::DistanceType;
use lancedb::query::{ExecutableQuery, QueryBase};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};

use crate::search::metadata_keys;
use crate::{Chunk, PassageSearch, SearchHit, StoreError};

const PASSAGES_TABLE: &str = "passages";
const VECTOR_COLUMN: &str = "vector";
const DISTANCE_COLUMN: &str = "_distance";

/// Turns a query string into the vector space the passages were embedded in.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

pub struct LanceSearch {
    db: lancedb::Connection,
    embedder: Arc<dyn QueryEmbedder>,
}

impl LanceSearch {
    /// Connect to a LanceDB database at the given path, creating it if absent.
    pub async fn open(path: &Path, embedder: Arc<dyn QueryEmbedder>) -> Result<Self, StoreError> {
        let uri = path
            .to_str()
            .ok_or_else(|| StoreError::Other("non-UTF8 database path".into()))?;
        let db = lancedb::connect(uri).execute().await?;
        Ok(Self { db, embedder })
    }

    pub async fn table_names(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.db.table_names().execute().await?)
    }

    pub async fn passage_count(&self) -> Result<usize, StoreError> {
        let table = self.passages().await?;
        Ok(table.count_rows(None).await?)
    }

    /// Create (or replace) the `passages` table from chunks and their embeddings.
    pub async fn create_passages(
        &self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), StoreError> {
        let batch = passages_batch(chunks, embeddings, self.embedder.dimension())?;
        self.replace_table(vec![batch]).await
    }

    /// Create (or replace) the `passages` table from a Parquet file that
    /// already carries the metadata columns and a `vector` column.
    pub async fn create_passages_from_parquet(
        &self,
        parquet_path: &Path,
    ) -> Result<(), StoreError> {
        if !parquet_path.exists() {
            return Err(StoreError::ParquetNotFound(parquet_path.to_path_buf()));
        }
        let batches = read_parquet(parquet_path)?;
        if batches.is_empty() {
            return Err(StoreError::Other(format!(
                "no record batches in {parquet_path:?}"
            )));
        }
        self.replace_table(batches).await
    }

    async fn passages(&self) -> Result<lancedb::Table, StoreError> {
        Ok(self.db.open_table(PASSAGES_TABLE).execute().await?)
    }

    async fn replace_table(&self, batches: Vec<RecordBatch>) -> Result<(), StoreError> {
        let total_rows: usize = batches.iter().map(|b| b.num_rows()).sum();
        let schema = batches[0].schema();
        let reader = RecordBatchIterator::new(batches.into_iter().map(Ok), schema);

        let existing = self.db.table_names().execute().await?;
        if existing.iter().any(|name| name == PASSAGES_TABLE) {
            self.db.drop_table(PASSAGES_TABLE, &[]).await?;
        }
        self.db
            .create_table(PASSAGES_TABLE, Box::new(reader))
            .execute()
            .await?;

        info!(table = PASSAGES_TABLE, rows = total_rows, "created passage table");
        Ok(())
    }
}

#[async_trait]
impl PassageSearch for LanceSearch {
    async fn search(
        &self,
        query: &str,
        filter: &BTreeMap<String, String>,
        k: usize,
        score_threshold: f32,
    ) -> Result<Vec<SearchHit>, StoreError> {
        let vector = self
            .embedder
            .embed(query)
            .await
            .map_err(|e| StoreError::Unavailable(format!("query embedding failed: {e}")))?;
        let table = self.passages().await?;

        let mut search = table
            .vector_search(vector)?
            .distance_type(DistanceType::Cosine)
            .limit(k);
        if let Some(predicate) = filter_predicate(filter) {
            debug!(%predicate, "lance prefilter");
            search = search.only_if(predicate);
        }
        let batches: Vec<RecordBatch> = search.execute().await?.try_collect().await?;

        let mut hits = Vec::new();
        for batch in &batches {
            hits.extend(hits_from_batch(batch)?);
        }
        hits.retain(|h| h.score >= score_threshold);
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        Ok(hits)
    }
}

/// SQL predicate for exact-match metadata constraints.
fn filter_predicate(filter: &BTreeMap<String, String>) -> Option<String> {
    if filter.is_empty() {
        return None;
    }
    let clauses: Vec<String> = filter
        .iter()
        .map(|(key, value)| format!("{key} = '{}'", value.replace('\'', "''")))
        .collect();
    Some(clauses.join(" AND "))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, StoreError> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| StoreError::Other(format!("passage table missing utf8 column {name}")))
}

fn hits_from_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>, StoreError> {
    let text = string_column(batch, "text")?;
    let keys = [
        metadata_keys::STANDARD,
        metadata_keys::SECTION,
        metadata_keys::PARAGRAPH,
        metadata_keys::SOURCE_DOCUMENT_ID,
    ];
    let columns = keys
        .iter()
        .map(|k| string_column(batch, k).map(|c| (*k, c)))
        .collect::<Result<Vec<_>, _>>()?;
    let distance = batch
        .column_by_name(DISTANCE_COLUMN)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| StoreError::Other("search result missing _distance".into()))?;

    Ok((0..batch.num_rows())
        .map(|i| {
            let metadata = columns
                .iter()
                .filter(|(_, col)| !col.is_null(i))
                .map(|(key, col)| (key.to_string(), col.value(i).to_string()))
                .collect();
            SearchHit {
                text: text.value(i).to_string(),
                metadata,
                // Cosine distance lies in [0, 2].
                score: (1.0 - distance.value(i)).clamp(0.0, 1.0),
            }
        })
        .collect())
}

fn passages_batch(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    dimension: usize,
) -> Result<RecordBatch, StoreError> {
    if chunks.is_empty() {
        return Err(StoreError::Other("no chunks provided".into()));
    }
    if chunks.len() != embeddings.len() {
        return Err(StoreError::Other(format!(
            "{} chunks but {} embeddings",
            chunks.len(),
            embeddings.len()
        )));
    }
    if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
        return Err(StoreError::Other(format!(
            "embedding has {} dimensions, expected {dimension}",
            bad.len()
        )));
    }

    let item = Arc::new(Field::new("item", DataType::Float32, true));
    let schema = Arc::new(Schema::new(vec![
        Field::new("text", DataType::Utf8, false),
        Field::new(metadata_keys::STANDARD, DataType::Utf8, false),
        Field::new(metadata_keys::SECTION, DataType::Utf8, true),
        Field::new(metadata_keys::PARAGRAPH, DataType::Utf8, true),
        Field::new(metadata_keys::SOURCE_DOCUMENT_ID, DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(item.clone(), dimension as i32),
            false,
        ),
    ]));

    let utf8 = |f: fn(&Chunk) -> &str| -> Arc<dyn Array> {
        Arc::new(StringArray::from(chunks.iter().map(f).collect::<Vec<_>>()))
    };
    let values = Float32Array::from(embeddings.concat());
    let vectors = FixedSizeListArray::try_new(item, dimension as i32, Arc::new(values), None)?;

    Ok(RecordBatch::try_new(
        schema,
        vec![
            utf8(|c| c.text.as_str()),
            utf8(|c| c.standard.as_str()),
            utf8(|c| c.section.as_str()),
            utf8(|c| c.paragraph.as_str()),
            utf8(|c| c.source_document_id.as_str()),
            Arc::new(vectors),
        ],
    )?)
}

/// Read a Parquet file into Arrow RecordBatches.
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>, StoreError> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let batches: Result<Vec<RecordBatch>, _> = reader.collect();
    Ok(batches?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Three-axis embedder: fair value, credit loss, lease.
    struct AxisEmbedder;

    #[async_trait]
    impl QueryEmbedder for AxisEmbedder {
        fn dimension(&self) -> usize {
            3
        }

        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            let t = text.to_lowercase();
            let axis = |word: &str| if t.contains(word) { 1.0 } else { 0.0 };
            Ok(vec![axis("fair value"), axis("credit"), axis("lease")])
        }
    }

    fn chunk(text: &str, standard: &str, doc: &str) -> Chunk {
        Chunk {
            text: text.into(),
            standard: standard.into(),
            section: "Scope".into(),
            paragraph: "1".into(),
            source_document_id: doc.into(),
        }
    }

    async fn seeded(tmp: &TempDir) -> LanceSearch {
        let search = LanceSearch::open(&tmp.path().join("lancedb"), Arc::new(AxisEmbedder))
            .await
            .unwrap();
        let chunks = vec![
            chunk("Fair value hierarchy levels", "IFRS 13", "ifrs13"),
            chunk("Expected credit loss staging", "IFRS 9", "ifrs9"),
            chunk("Lease term and options", "IFRS 16", "ifrs16"),
        ];
        let embeddings = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        search.create_passages(&chunks, &embeddings).await.unwrap();
        search
    }

    #[test]
    fn filter_predicate_escapes_quotes() {
        let filter = BTreeMap::from([
            ("source_document_id".to_string(), "o'neil".to_string()),
            ("standard".to_string(), "IFRS 13".to_string()),
        ]);
        assert_eq!(
            filter_predicate(&filter).unwrap(),
            "source_document_id = 'o''neil' AND standard = 'IFRS 13'"
        );
        assert!(filter_predicate(&BTreeMap::new()).is_none());
    }

    #[test]
    fn passages_batch_rejects_dimension_mismatch() {
        let chunks = vec![chunk("x", "IFRS 9", "d")];
        let err = passages_batch(&chunks, &[vec![1.0, 0.0]], 3).unwrap_err();
        assert!(err.to_string().contains("expected 3"));
    }

    #[tokio::test]
    async fn vector_search_ranks_nearest_first() {
        let tmp = TempDir::new().unwrap();
        let search = seeded(&tmp).await;
        assert_eq!(search.passage_count().await.unwrap(), 3);

        let hits = search
            .search("what is fair value?", &BTreeMap::new(), 2, 0.5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["standard"], "IFRS 13");
        assert!(hits[0].score > 0.99);
    }

    #[tokio::test]
    async fn filter_restricts_to_matching_metadata() {
        let tmp = TempDir::new().unwrap();
        let search = seeded(&tmp).await;
        let filter = BTreeMap::from([("standard".to_string(), "IFRS 9".to_string())]);
        let hits = search
            .search("fair value", &filter, 5, 0.5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn missing_parquet_errors() {
        let tmp = TempDir::new().unwrap();
        let search = LanceSearch::open(&tmp.path().join("lancedb"), Arc::new(AxisEmbedder))
            .await
            .unwrap();
        let result = search
            .create_passages_from_parquet(Path::new("/nonexistent/passages.parquet"))
            .await;
        assert!(matches!(result, Err(StoreError::ParquetNotFound(_))));
    }
}
