//! Vector encoding for BLOB columns and cosine ranking.

use ndarray::{Array1, Array2};

/// Serialize an embedding as little-endian f32 bytes.
pub fn vector_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Deserialize little-endian f32 bytes. Returns None if the length is not a multiple of 4.
pub fn bytes_to_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Rank `rows` by cosine similarity to `query`.
///
/// Returns `(row_index, similarity)` pairs, best first, at most `top_k`.
/// Ties keep row order. A zero query vector matches nothing.
pub fn rank_by_cosine(query: &[f32], rows: &[Vec<f32>], top_k: usize) -> Vec<(usize, f32)> {
    let dim = query.len();
    if rows.is_empty() || dim == 0 || top_k == 0 {
        return Vec::new();
    }

    let q = Array1::from_vec(query.to_vec());
    let q_norm = q.dot(&q).sqrt();
    if q_norm < 1e-9 {
        return Vec::new();
    }
    let q = q / q_norm;

    // Normalize rows for cosine similarity via dot product
    let mut matrix = Array2::<f32>::zeros((rows.len(), dim));
    for (i, row) in rows.iter().enumerate() {
        let mut view = matrix.row_mut(i);
        view.assign(&Array1::from_vec(row.clone()));
        let norm = view.dot(&view).sqrt();
        if norm > 1e-9 {
            view /= norm;
        }
    }

    // (N, dim) @ (dim,) → (N,)
    let similarities = matrix.dot(&q);

    let mut indexed: Vec<(usize, f32)> = similarities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed.truncate(top_k);
    indexed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_roundtrip() {
        let emb = vec![0.1, 0.2, -0.3, 0.4];
        let bytes = vector_to_bytes(&emb);
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes_to_vector(&bytes).unwrap(), emb);
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        assert!(bytes_to_vector(&[0, 0, 0]).is_none());
    }

    #[test]
    fn test_rank_prefers_closest() {
        let rows = vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.1, 0.0], vec![-1.0, 0.0, 0.0]];
        let ranked = rank_by_cosine(&[1.0, 0.0, 0.0], &rows, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].0, 1);
        assert_eq!(ranked[1].0, 0);
        assert!(ranked[0].1 > 0.99);
    }

    #[test]
    fn test_zero_query_matches_nothing() {
        let rows = vec![vec![1.0, 0.0]];
        assert!(rank_by_cosine(&[0.0, 0.0], &rows, 4).is_empty());
    }
}
