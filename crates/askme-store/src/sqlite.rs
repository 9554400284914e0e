//! SQLite-backed vector table.
//!
//! Vectors are stored as f32 BLOBs and ranked by cosine similarity in
//! process. Inserts for one document run in a single transaction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::embedding::{bytes_to_vector, rank_by_cosine, vector_to_bytes};
use crate::filter::MetadataFilter;
use crate::schema;
use crate::store::VectorStore;
use crate::types::{NewChunk, SearchHit};
use askme_core::{Error, Result, TableConfig};

/// SQLite store holding the shared vector table.
pub struct SqliteStore {
    /// `None` once the store has been closed.
    conn: Mutex<Option<Connection>>,
    db_path: PathBuf,
    table: TableConfig,
}

struct RawRow {
    id: String,
    content: String,
    metadata: serde_json::Value,
    vector: Vec<u8>,
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::Database(e.to_string())
}

impl SqliteStore {
    /// Open or create the SQLite store.
    ///
    /// `db_dir` is the directory (e.g., `data/vectordb/`). The file will be `db_dir/askme.db`.
    pub fn open(db_dir: impl AsRef<Path>, table: TableConfig) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("askme.db");

        let conn = Connection::open(&db_path).map_err(db_err)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(db_err)?;

        let store = Self::with_connection(conn, db_path, table)?;
        info!(
            "SqliteStore initialized: table={}, path={}",
            store.table.table_name,
            store.db_path.display()
        );
        Ok(store)
    }

    /// A private in-memory store, for tests and throwaway runs.
    pub fn open_in_memory(table: TableConfig) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::with_connection(conn, PathBuf::from(":memory:"), table)
    }

    fn with_connection(conn: Connection, db_path: PathBuf, table: TableConfig) -> Result<Self> {
        table.validate()?;
        conn.execute_batch(&schema::sqlite_schema(&table))
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            db_path,
            table,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `f` with the open connection, or fail if the store was closed.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::Storage("vector store is closed".into()))?;
        f(conn)
    }

    /// Width of vectors already in the table, if any.
    fn stored_dimension(&self, conn: &Connection) -> Result<Option<usize>> {
        let bytes: Option<i64> = conn
            .query_row(&schema::sqlite_vector_width(&self.table), [], |row| row.get(0))
            .optional()
            .map_err(db_err)?;
        Ok(bytes.map(|b| b as usize / 4))
    }

    fn load_rows(&self, conn: &Connection) -> Result<Vec<RawRow>> {
        let mut stmt = conn
            .prepare_cached(&schema::sqlite_select_all(&self.table))
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| {
                let metadata: String = row.get(2)?;
                Ok(RawRow {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    metadata: serde_json::from_str(&metadata).unwrap_or_default(),
                    vector: row.get(3)?,
                })
            })
            .map_err(db_err)?;
        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(db_err)
    }
}

/// All vectors in a batch must share one non-zero width.
fn batch_dimension(chunks: &[NewChunk]) -> Result<usize> {
    let dim = chunks[0].embedding.len();
    if dim == 0 {
        return Err(Error::Storage("empty embedding vector".into()));
    }
    if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
        return Err(Error::Storage(format!(
            "embedding dimension mismatch in batch: {} vs {}",
            dim,
            bad.embedding.len()
        )));
    }
    Ok(dim)
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn add_documents(&self, chunks: &[NewChunk]) -> Result<Vec<String>> {
        if chunks.is_empty() {
            return Ok(Vec::new());
        }
        let dim = batch_dimension(chunks)?;
        let now = chrono::Utc::now().timestamp_millis();

        self.with_conn(|conn| {
            if let Some(existing) = self.stored_dimension(conn)? {
                if existing != dim {
                    return Err(Error::Storage(format!(
                        "embedding dimension {} does not match table dimension {}",
                        dim, existing
                    )));
                }
            }

            let tx = conn.transaction().map_err(db_err)?;
            let mut ids = Vec::with_capacity(chunks.len());
            {
                let mut stmt = tx
                    .prepare_cached(&schema::sqlite_insert(&self.table))
                    .map_err(db_err)?;
                for chunk in chunks {
                    let id = uuid::Uuid::new_v4().to_string();
                    let meta_json = serde_json::to_string(&chunk.metadata)?;
                    stmt.execute(params![
                        id,
                        chunk.content,
                        meta_json,
                        vector_to_bytes(&chunk.embedding),
                        now,
                    ])
                    .map_err(db_err)?;
                    ids.push(id);
                }
            }
            tx.commit().map_err(db_err)?;
            debug!("Inserted {} rows into {}", ids.len(), self.table.table_name);
            Ok(ids)
        })
    }

    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let rows = self.with_conn(|conn| self.load_rows(conn))?;

        let mut candidates = Vec::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());
        for row in rows {
            if filter.is_some_and(|f| !f.matches(&row.metadata)) {
                continue;
            }
            match bytes_to_vector(&row.vector) {
                Some(v) if v.len() == query.len() => {
                    vectors.push(v);
                    candidates.push(row);
                }
                _ => warn!("Skipping row {} with incompatible vector", row.id),
            }
        }

        let ranked = rank_by_cosine(query, &vectors, k);
        let mut slots: Vec<Option<RawRow>> = candidates.into_iter().map(Some).collect();
        Ok(ranked
            .into_iter()
            .filter_map(|(i, score)| {
                slots[i].take().map(|row| SearchHit {
                    id: row.id,
                    content: row.content,
                    metadata: row.metadata,
                    score: score as f64,
                })
            })
            .collect())
    }

    async fn delete(&self, filter: &MetadataFilter) -> Result<usize> {
        if filter.is_empty() {
            return Err(Error::InvalidRequest(
                "refusing to delete with an empty filter".into(),
            ));
        }

        self.with_conn(|conn| {
            let doomed: Vec<String> = {
                let mut stmt = conn
                    .prepare_cached(&schema::sqlite_select_metadata(&self.table))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })
                    .map_err(db_err)?;
                let mut ids = Vec::new();
                for row in rows {
                    let (id, meta) = row.map_err(db_err)?;
                    let meta: serde_json::Value = serde_json::from_str(&meta).unwrap_or_default();
                    if filter.matches(&meta) {
                        ids.push(id);
                    }
                }
                ids
            };

            let tx = conn.transaction().map_err(db_err)?;
            {
                let mut stmt = tx
                    .prepare_cached(&schema::sqlite_delete_by_id(&self.table))
                    .map_err(db_err)?;
                for id in &doomed {
                    stmt.execute(params![id]).map_err(db_err)?;
                }
            }
            tx.commit().map_err(db_err)?;
            info!("Deleted {} rows from {}", doomed.len(), self.table.table_name);
            Ok(doomed.len())
        })
    }

    async fn count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            conn.query_row(&schema::count(&self.table), [], |row| row.get(0))
                .map_err(db_err)
        })
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().take() {
            conn.close().map_err(|(_, e)| db_err(e))?;
            info!("SqliteStore closed: {}", self.db_path.display());
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), TableConfig::default()).unwrap();
        (store, dir)
    }

    fn chunk(content: &str, metadata: serde_json::Value, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            content: content.into(),
            metadata,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_round_trip_by_own_vector() {
        let (store, _dir) = test_store();
        let ids = store
            .add_documents(&[
                chunk("what's this", json!({"a": 2}), vec![0.0, 1.0, 0.2]),
                chunk("Cat drinks milk", json!({"a": 1}), vec![1.0, 0.1, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);

        let hits = store
            .similarity_search(&[1.0, 0.1, 0.0], 1, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "Cat drinks milk");
        assert_eq!(hits[0].id, ids[1]);
        assert_eq!(hits[0].metadata, json!({"a": 1}));
        assert!(hits[0].score > 0.999);
    }

    #[tokio::test]
    async fn test_filtered_search() {
        let (store, _dir) = test_store();
        store
            .add_documents(&[
                chunk("what's this", json!({"a": 2}), vec![0.0, 1.0]),
                chunk("Cat drinks milk", json!({"a": 1}), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let eq = MetadataFilter::new().eq("a", 2);
        let hits = store.similarity_search(&[1.0, 0.0], 1, Some(&eq)).await.unwrap();
        assert_eq!(hits[0].content, "what's this");

        let within = MetadataFilter::new().one_of("a", vec![json!(2)]);
        let hits = store.similarity_search(&[1.0, 0.0], 4, Some(&within)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "what's this");
    }

    #[tokio::test]
    async fn test_delete_by_filter() {
        let (store, _dir) = test_store();
        store
            .add_documents(&[
                chunk("keep", json!({"a": 2}), vec![0.0, 1.0]),
                chunk("drop", json!({"a": 1}), vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let deleted = store.delete(&MetadataFilter::new().eq("a", 1)).await.unwrap();
        assert_eq!(deleted, 1);

        let hits = store.similarity_search(&[1.0, 0.0], 4, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "keep");
    }

    #[tokio::test]
    async fn test_empty_filter_delete_is_rejected() {
        let (store, _dir) = test_store();
        let err = store.delete(&MetadataFilter::new()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_mixed_dimensions_insert_nothing() {
        let (store, _dir) = test_store();
        let err = store
            .add_documents(&[
                chunk("one", json!({}), vec![1.0, 0.0]),
                chunk("two", json!({}), vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(store.count().await.unwrap(), 0);

        store
            .add_documents(&[chunk("one", json!({}), vec![1.0, 0.0])])
            .await
            .unwrap();
        let err = store
            .add_documents(&[chunk("wide", json!({}), vec![1.0, 0.0, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_results_follow_similarity_order() {
        let (store, _dir) = test_store();
        store
            .add_documents(&[
                chunk("far", json!({}), vec![0.0, 1.0]),
                chunk("near", json!({}), vec![1.0, 0.2]),
                chunk("middle", json!({}), vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let hits = store.similarity_search(&[1.0, 0.0], 4, None).await.unwrap();
        let order: Vec<&str> = hits.iter().map(|h| h.content.as_str()).collect();
        assert_eq!(order, vec!["near", "middle", "far"]);
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let (store, _dir) = test_store();
        store.close().await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(store.count().await.unwrap_err(), Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_reopen_keeps_rows() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open(dir.path(), TableConfig::default()).unwrap();
            store
                .add_documents(&[chunk("persisted", json!({"f": "a.txt"}), vec![0.5, 0.5])])
                .await
                .unwrap();
            store.close().await.unwrap();
        }
        let store = SqliteStore::open(dir.path(), TableConfig::default()).unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_batches_stay_whole() {
        let (store, _dir) = test_store();
        let store = Arc::new(store);

        let batch = |name: &'static str| -> Vec<NewChunk> {
            (0..25)
                .map(|i| chunk(&format!("{} {}", name, i), json!({"filename": name}), vec![1.0, i as f32]))
                .collect()
        };

        let (a, b) = tokio::join!(
            {
                let store = store.clone();
                let rows = batch("a.txt");
                tokio::spawn(async move { store.add_documents(&rows).await })
            },
            {
                let store = store.clone();
                let rows = batch("b.txt");
                tokio::spawn(async move { store.add_documents(&rows).await })
            }
        );
        assert_eq!(a.unwrap().unwrap().len(), 25);
        assert_eq!(b.unwrap().unwrap().len(), 25);

        for name in ["a.txt", "b.txt"] {
            let filter = MetadataFilter::new().eq("filename", name);
            let hits = store.similarity_search(&[1.0, 1.0], 100, Some(&filter)).await.unwrap();
            assert_eq!(hits.len(), 25);
            assert!(hits.iter().all(|h| h.content.starts_with(name)));
        }
    }
}
