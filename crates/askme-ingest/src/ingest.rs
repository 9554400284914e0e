//! Document ingestion pipeline: file → text → chunks → embeddings → store.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::loader::{LoadedDocument, Loader};
use crate::splitter::{RecursiveSplitter, TextChunk};
use askme_core::{Error, Result};
use askme_infer::EmbedderBackend;
use askme_store::{NewChunk, VectorStore};

/// Outcome of one ingested document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub chunks: usize,
    pub ids: Vec<String>,
}

/// Loads, splits, embeds and stores uploaded documents.
pub struct Ingester {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbedderBackend>,
    splitter: RecursiveSplitter,
}

impl Ingester {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbedderBackend>,
        splitter: RecursiveSplitter,
    ) -> Self {
        Self {
            store,
            embedder,
            splitter,
        }
    }

    /// Ingest a stored upload.
    ///
    /// `declared_mime` picks the loader; `original_name` is recorded as the
    /// `filename` metadata and used for extension fallback.
    pub async fn ingest_file(
        &self,
        path: &Path,
        declared_mime: Option<&str>,
        original_name: &str,
    ) -> Result<IngestReport> {
        let loader = Loader::detect(declared_mime, original_name)?;
        let bytes = tokio::fs::read(path).await?;
        let sha256 = content_hash(&bytes);

        let source = path.to_path_buf();
        let docs = tokio::task::spawn_blocking(move || loader.load(&source, &bytes))
            .await
            .map_err(|e| Error::Parse(format!("loader task failed: {}", e)))??;

        let mime = declared_mime
            .filter(|m| !m.is_empty())
            .unwrap_or(loader.mime_type());
        let extra = json!({
            "filename": original_name,
            "mimeType": mime,
            "sha256": sha256,
        });

        let documents = docs.len();
        let report = self.ingest_documents(docs, &extra).await?;
        info!(
            "Ingested {} ({:?}, {} documents): {} chunks",
            original_name, loader, documents, report.chunks
        );
        Ok(report)
    }

    /// Split, embed and store already loaded documents as one batch.
    ///
    /// Each document is split on its own, so no chunk crosses a document
    /// boundary. Every chunk gets its document's metadata, the fields of
    /// `extra`, a `chunkIndex` running across the batch and its line range
    /// under `loc.lines`. Nothing is written if any embedding fails.
    pub async fn ingest_documents(
        &self,
        docs: Vec<LoadedDocument>,
        extra: &serde_json::Value,
    ) -> Result<IngestReport> {
        let chunks: Vec<(usize, TextChunk)> = docs
            .iter()
            .enumerate()
            .flat_map(|(i, doc)| self.splitter.chunk(&doc.text).into_iter().map(move |c| (i, c)))
            .collect();
        if chunks.is_empty() {
            debug!("No text to ingest");
            return Ok(IngestReport::default());
        }

        let texts: Vec<&str> = chunks.iter().map(|(_, c)| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::Embedding(format!(
                "expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let rows: Vec<NewChunk> = chunks
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, ((doc, chunk), embedding))| NewChunk {
                metadata: chunk_metadata(&docs[doc].metadata, extra, index, &chunk),
                content: chunk.text,
                embedding,
            })
            .collect();

        let ids = self.store.add_documents(&rows).await?;
        debug!(
            "Stored {} chunks with {} ({})",
            ids.len(),
            self.embedder.model(),
            self.store.backend_name()
        );
        Ok(IngestReport {
            chunks: ids.len(),
            ids,
        })
    }
}

fn chunk_metadata(
    doc: &serde_json::Value,
    extra: &serde_json::Value,
    index: usize,
    chunk: &TextChunk,
) -> serde_json::Value {
    let mut metadata = doc.clone();
    if let Some(target) = metadata.as_object_mut() {
        if let Some(fields) = extra.as_object() {
            for (k, v) in fields {
                target.insert(k.clone(), v.clone());
            }
        }
        target.insert("chunkIndex".into(), json!(index));

        let lines = json!({ "from": chunk.line_from, "to": chunk.line_to });
        match target.get_mut("loc").and_then(|loc| loc.as_object_mut()) {
            Some(loc) => {
                loc.insert("lines".into(), lines);
            }
            None => {
                target.insert("loc".into(), json!({ "lines": lines }));
            }
        }
    }
    metadata
}

/// Hex SHA-256 of the uploaded bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use askme_core::TableConfig;
    use askme_store::{MetadataFilter, SqliteStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Letter-frequency vector; deterministic and cheap.
    struct StubEmbedder {
        calls: AtomicUsize,
        fail_after: Option<usize>,
    }

    impl StubEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_after: None,
            }
        }
    }

    #[async_trait]
    impl EmbedderBackend for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_after.is_some_and(|limit| n >= limit) {
                return Err(Error::Embedding("connection refused".into()));
            }
            let mut v = vec![0.0f32; 26];
            for c in text.to_ascii_lowercase().bytes() {
                if c.is_ascii_lowercase() {
                    v[(c - b'a') as usize] += 1.0;
                }
            }
            v[0] += 0.01;
            Ok(v)
        }

        fn model(&self) -> &str {
            "stub"
        }
    }

    fn setup(embedder: StubEmbedder) -> (Ingester, Arc<dyn VectorStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store: Arc<dyn VectorStore> =
            Arc::new(SqliteStore::open(dir.path(), TableConfig::default()).unwrap());
        let ingester = Ingester::new(
            store.clone(),
            Arc::new(embedder),
            RecursiveSplitter::default(),
        );
        (ingester, store, dir)
    }

    fn write_file(dir: &TempDir, name: &str, content: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_chunk_count_matches_splitter() {
        let (ingester, store, dir) = setup(StubEmbedder::new());
        let text = "lorem ipsum dolor ".repeat(150);
        let path = write_file(&dir, "upload-1", text.as_bytes());

        let report = ingester
            .ingest_file(&path, Some("text/plain"), "lorem.txt")
            .await
            .unwrap();

        let expected = RecursiveSplitter::default().chunk(&text).len();
        assert!(expected > 1);
        assert_eq!(report.chunks, expected);
        assert_eq!(report.ids.len(), expected);
        assert_eq!(store.count().await.unwrap(), expected as i64);
    }

    #[tokio::test]
    async fn test_chunk_metadata() {
        let (ingester, store, dir) = setup(StubEmbedder::new());
        let path = write_file(&dir, "upload-2", b"Cat drinks milk");

        ingester.ingest_file(&path, None, "cat.txt").await.unwrap();

        let query = StubEmbedder::new().embed("Cat drinks milk").await.unwrap();
        let hits = store.similarity_search(&query, 1, None).await.unwrap();
        let meta = &hits[0].metadata;
        assert_eq!(hits[0].content, "Cat drinks milk");
        assert_eq!(meta["filename"], "cat.txt");
        assert_eq!(meta["mimeType"], "text/plain");
        assert_eq!(meta["sha256"], content_hash(b"Cat drinks milk"));
        assert_eq!(meta["chunkIndex"], 0);
        assert_eq!(meta["loc"]["lines"]["from"], 1);
        assert!(meta["loc"].get("pageNumber").is_none());
        assert_eq!(meta["source"], path.to_string_lossy().into_owned());
    }

    #[tokio::test]
    async fn test_pdf_chunks_carry_page_numbers() {
        let (ingester, store, dir) = setup(StubEmbedder::new());
        let bytes = include_bytes!("../tests/fixtures/two_pages.pdf");
        let path = write_file(&dir, "upload-pdf", bytes);

        let report = ingester
            .ingest_file(&path, Some("application/pdf"), "pets.pdf")
            .await
            .unwrap();
        assert_eq!(report.chunks, 2);

        let query = StubEmbedder::new().embed("pets").await.unwrap();
        let mut hits = store.similarity_search(&query, 10, None).await.unwrap();
        hits.sort_by_key(|h| h.metadata["chunkIndex"].as_u64());
        assert_eq!(hits.len(), 2);

        let words = |text: &str| text.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(words(&hits[0].content).contains("Cat drinks milk"));
        assert!(words(&hits[1].content).contains("Dog chases ball"));
        for (i, hit) in hits.iter().enumerate() {
            let meta = &hit.metadata;
            assert_eq!(meta["chunkIndex"], i);
            assert_eq!(meta["loc"]["pageNumber"], i + 1);
            assert!(meta["loc"]["lines"]["from"].is_u64());
            assert_eq!(meta["pdf"]["totalPages"], 2);
            assert_eq!(meta["filename"], "pets.pdf");
            assert_eq!(meta["mimeType"], "application/pdf");
            assert_eq!(meta["sha256"], content_hash(bytes));
        }
    }

    #[tokio::test]
    async fn test_unsupported_type_writes_nothing() {
        let (ingester, store, dir) = setup(StubEmbedder::new());
        let path = write_file(&dir, "upload-3", b"\x89PNG");

        let err = ingester
            .ingest_file(&path, Some("image/png"), "cat.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_document_is_zero_chunks() {
        let (ingester, store, dir) = setup(StubEmbedder::new());
        let path = write_file(&dir, "upload-4", b"  \n\n  ");

        let report = ingester
            .ingest_file(&path, Some("text/plain"), "blank.txt")
            .await
            .unwrap();
        assert_eq!(report.chunks, 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_all_or_nothing() {
        let (ingester, store, dir) = setup(StubEmbedder {
            calls: AtomicUsize::new(0),
            fail_after: Some(1),
        });
        let text = "word ".repeat(600);
        let path = write_file(&dir, "upload-5", text.as_bytes());

        let err = ingester
            .ingest_file(&path, Some("text/plain"), "words.txt")
            .await
            .unwrap_err();
        assert!(err.is_upstream());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_ingests_stay_distinguishable() {
        let (ingester, store, dir) = setup(StubEmbedder::new());
        let ingester = Arc::new(ingester);
        let a = write_file(&dir, "upload-a", "alpha ".repeat(500).as_bytes());
        let b = write_file(&dir, "upload-b", "beta ".repeat(500).as_bytes());

        let (ra, rb) = tokio::join!(
            {
                let ingester = ingester.clone();
                async move { ingester.ingest_file(&a, Some("text/plain"), "a.txt").await }
            },
            {
                let ingester = ingester.clone();
                async move { ingester.ingest_file(&b, Some("text/plain"), "b.txt").await }
            }
        );
        let (ra, rb) = (ra.unwrap(), rb.unwrap());

        let total = store.count().await.unwrap();
        assert_eq!(total, (ra.chunks + rb.chunks) as i64);

        let only_a = MetadataFilter::new().eq("filename", "a.txt");
        let query = StubEmbedder::new().embed("alpha").await.unwrap();
        let hits = store
            .similarity_search(&query, total as usize, Some(&only_a))
            .await
            .unwrap();
        assert_eq!(hits.len(), ra.chunks);
        assert!(hits.iter().all(|h| h.content.contains("alpha")));
    }
}
