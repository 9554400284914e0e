//! Ask Me Ingest — uploaded file to stored, embedded chunks.
//!
//! Pipeline: pick a [`Loader`] from the declared MIME type, extract text,
//! split it with [`RecursiveSplitter`], embed each chunk and insert all rows
//! for the document in one store transaction.

pub mod ingest;
pub mod loader;
pub mod splitter;

pub use ingest::{content_hash, IngestReport, Ingester};
pub use loader::{LoadedDocument, Loader};
pub use splitter::{RecursiveSplitter, TextChunk, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
