//! Shared application state.

use std::sync::Arc;

use askme_chat::{CompletionBackend, RagPipeline};
use askme_core::AskMeConfig;
use askme_infer::EmbedderBackend;
use askme_ingest::{Ingester, RecursiveSplitter};
use askme_store::VectorStore;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: AskMeConfig,
    pub store: Arc<dyn VectorStore>,
    pub ingester: Ingester,
    pub rag: RagPipeline,
}

impl AppState {
    pub fn new(
        config: AskMeConfig,
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbedderBackend>,
        llm: Arc<dyn CompletionBackend>,
    ) -> Self {
        let splitter = RecursiveSplitter::new(config.chunk_size, config.chunk_overlap);
        let ingester = Ingester::new(store.clone(), embedder.clone(), splitter);
        let rag = RagPipeline::new(embedder, llm, store.clone(), config.top_k);
        Self {
            config,
            store,
            ingester,
            rag,
        }
    }
}
