//! RAG question answering with a local Ollama model.
//!
//! A question is rewritten into a standalone question, used to retrieve
//! passages from the vector table, and answered from those passages.

pub mod prompts;
pub mod providers;
pub mod rag;
pub mod types;

pub use providers::{CompletionBackend, OllamaLlm};
pub use rag::{combine_documents, RagPipeline};
pub use types::*;
