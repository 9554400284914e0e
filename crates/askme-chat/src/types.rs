//! Pipeline and API surface types.

use serde::{Deserialize, Serialize};

use askme_store::SearchHit;

/// Query string of `GET /api/ask`.
#[derive(Debug, Clone, Deserialize)]
pub struct AskQuery {
    #[serde(default)]
    pub q: String,
}

/// Result of one question.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Raw model output for the answer prompt.
    pub message: String,
    /// Raw model output for the rewrite prompt, used as the retrieval query.
    pub standalone_question: String,
    /// Retrieved passages, best first.
    pub sources: Vec<SearchHit>,
}
