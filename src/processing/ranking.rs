//! Cosine-similarity ranking of chunk embeddings against the query embedding.
//!
//! The last vector of the input is the query; every vector before it is a candidate. Scores are
//! computed in the full embedding space. Candidates are ordered by descending score with ties
//! resolved by ascending index.

use super::types::{RankingError, ScoredIndex};

/// Indices of the `result_size` candidates most similar to the query, best first.
pub fn rank(vectors: &[Vec<f32>], result_size: usize) -> Result<Vec<usize>, RankingError> {
    Ok(rank_with_scores(vectors, result_size)?
        .into_iter()
        .map(|scored| scored.index)
        .collect())
}

/// Like [`rank`], but keeps the similarity score next to each index.
pub fn rank_with_scores(
    vectors: &[Vec<f32>],
    result_size: usize,
) -> Result<Vec<ScoredIndex>, RankingError> {
    select_top(score_candidates(vectors)?, result_size)
}

/// Order scored candidates best first and keep the first `result_size`.
pub fn select_top(
    mut scored: Vec<ScoredIndex>,
    result_size: usize,
) -> Result<Vec<ScoredIndex>, RankingError> {
    if result_size == 0 {
        return Err(RankingError::InvalidResultSize);
    }
    // `sort_by` is stable, so equal scores keep ascending index order.
    scored.sort_by(|left, right| right.score.total_cmp(&left.score));
    scored.truncate(result_size);
    Ok(scored)
}

/// Cosine similarity of every candidate against the query, in candidate order.
pub fn score_candidates(vectors: &[Vec<f32>]) -> Result<Vec<ScoredIndex>, RankingError> {
    let (query, candidates) = vectors.split_last().ok_or(RankingError::MissingQuery)?;
    let query_index = candidates.len();
    let query_norm = magnitude(query);
    if query_norm == 0.0 {
        return Err(RankingError::DegenerateVector { index: query_index });
    }

    candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| {
            if candidate.len() != query.len() {
                return Err(RankingError::InconsistentDimension {
                    index,
                    expected: query.len(),
                    actual: candidate.len(),
                });
            }
            let norm = magnitude(candidate);
            if norm == 0.0 {
                return Err(RankingError::DegenerateVector { index });
            }
            Ok(ScoredIndex {
                index,
                score: (dot(candidate, query) / (norm * query_norm)) as f32,
            })
        })
        .collect()
}

// Accumulated in f64 so large components cannot overflow to infinity.
fn dot(left: &[f32], right: &[f32]) -> f64 {
    left.iter()
        .zip(right)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum()
}

fn magnitude(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|value| f64::from(*value).powi(2))
        .sum::<f64>()
        .sqrt()
}
