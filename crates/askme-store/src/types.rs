//! Row types for the vector table.

use serde::{Deserialize, Serialize};

/// A chunk ready to be inserted: text, metadata and its embedding.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub metadata: serde_json::Value,
    pub embedding: Vec<f32>,
}

/// A stored chunk returned by a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Cosine similarity to the query vector; higher is closer.
    pub score: f64,
}

impl SearchHit {
    /// Look up a string field in the hit's metadata.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}
