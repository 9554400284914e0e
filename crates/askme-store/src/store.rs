//! The vector store seam shared by ingestion and retrieval.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::filter::MetadataFilter;
use crate::sqlite::SqliteStore;
use crate::types::{NewChunk, SearchHit};
use askme_core::{AskMeConfig, Result, StoreBackend};

/// A table of (id, vector, content, metadata) rows.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert all chunks atomically. Returns the generated ids in input order.
    async fn add_documents(&self, chunks: &[NewChunk]) -> Result<Vec<String>>;

    /// The `k` rows closest to `query`, best first, restricted by `filter`.
    async fn similarity_search(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>>;

    /// Delete every row matching a non-empty filter. Returns the row count.
    async fn delete(&self, filter: &MetadataFilter) -> Result<usize>;

    /// Total number of rows.
    async fn count(&self) -> Result<i64>;

    /// Release the underlying connection(s). Later calls fail.
    async fn close(&self) -> Result<()>;

    fn backend_name(&self) -> &'static str;
}

/// Open the store selected by configuration.
pub async fn open_store(config: &AskMeConfig) -> Result<Arc<dyn VectorStore>> {
    config.table.validate()?;
    let store: Arc<dyn VectorStore> = match &config.backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::open(
            &config.data_paths.vectordb,
            config.table.clone(),
        )?),
        #[cfg(feature = "pgvector")]
        StoreBackend::Pgvector(pg) => {
            let store =
                crate::pgvector::PgVectorStore::connect(&pg.connection_url(), config.table.clone())
                    .await?;
            info!("Connected to pgvector at {}:{}/{}", pg.host, pg.port, pg.database);
            Arc::new(store)
        }
        #[cfg(not(feature = "pgvector"))]
        StoreBackend::Pgvector(_) => {
            return Err(askme_core::Error::Config(
                "pgvector backend requested but askme-store was built without the `pgvector` feature"
                    .into(),
            ));
        }
    };
    info!("Vector store ready ({})", store.backend_name());
    Ok(store)
}
