//! Retrieval-augmented answering: rewrite → embed → search → answer.

use std::sync::Arc;

use tracing::{debug, info};

use crate::prompts::{answer_prompt, standalone_prompt};
use crate::providers::CompletionBackend;
use crate::types::Answer;
use askme_core::{Error, Result};
use askme_infer::EmbedderBackend;
use askme_store::{MetadataFilter, SearchHit, VectorStore};

/// Join passage texts with a blank line, in retrieval order.
pub fn combine_documents(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub struct RagPipeline {
    embedder: Arc<dyn EmbedderBackend>,
    llm: Arc<dyn CompletionBackend>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbedderBackend>,
        llm: Arc<dyn CompletionBackend>,
        store: Arc<dyn VectorStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            llm,
            store,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embed `query` and return the `k` closest chunks.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>> {
        let vector = self.embedder.embed(query).await?;
        self.store.similarity_search(&vector, k, filter).await
    }

    /// Answer `question` from the stored documents.
    ///
    /// The model's rewrite is used verbatim as the retrieval query; the
    /// answer prompt always carries the original question.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(Error::InvalidRequest("question must not be empty".into()));
        }

        let standalone_question = self.llm.complete(&standalone_prompt(question)).await?;
        debug!("Standalone question: {}", standalone_question.trim());

        let sources = self.retrieve(&standalone_question, self.top_k, None).await?;
        let context = combine_documents(&sources);

        let message = self
            .llm
            .complete(&answer_prompt(&context, question))
            .await?;
        info!(
            "Answered with {} passages (model={})",
            sources.len(),
            self.llm.model()
        );

        Ok(Answer {
            message,
            standalone_question,
            sources,
        })
    }
}
