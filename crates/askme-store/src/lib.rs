//! Ask Me Store — the shared vector table behind ingestion and retrieval.
//!
//! [`VectorStore`] is the seam; [`SqliteStore`] is always available and
//! `PgVectorStore` is compiled in with the `pgvector` feature.

pub mod embedding;
pub mod filter;
#[cfg(feature = "pgvector")]
pub mod pgvector;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod types;

pub use filter::{Condition, MetadataFilter};
#[cfg(feature = "pgvector")]
pub use pgvector::PgVectorStore;
pub use sqlite::SqliteStore;
pub use store::{open_store, VectorStore};
pub use types::*;
