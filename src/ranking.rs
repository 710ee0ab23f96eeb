//! Turns raw per-class scores into a confidence-sorted prediction list.
//!
//! Scores are passed through untouched: the model's final layer is expected to
//! emit a normalised distribution already, so the ranker never rescales.

use thiserror::Error;

use crate::api::ClassPrediction;

/// Errors returned by [`rank`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RankError {
    /// The score vector and the label list disagree in length.
    #[error("model produced {scores} scores for {labels} labels")]
    DimensionMismatch { scores: usize, labels: usize },
}

/// Pair each label with its score and sort by descending confidence.
///
/// The sort is stable, so equal scores keep the label order.
///
/// # Examples
///
/// ```
/// use classify_serve::ranking::rank;
///
/// let labels = vec!["cat".to_owned(), "dog".to_owned(), "fox".to_owned()];
/// let ranked = rank(&[0.2, 0.5, 0.3], &labels).unwrap();
/// assert_eq!(ranked[0].class_name, "dog");
/// assert_eq!(ranked[2].class_name, "cat");
/// ```
///
/// # Errors
///
/// Returns [`RankError::DimensionMismatch`] when `scores` and `labels` have
/// different lengths.
pub fn rank(scores: &[f32], labels: &[String]) -> Result<Vec<ClassPrediction>, RankError> {
    if scores.len() != labels.len() {
        return Err(RankError::DimensionMismatch {
            scores: scores.len(),
            labels: labels.len(),
        });
    }
    let mut ranked: Vec<ClassPrediction> = labels
        .iter()
        .zip(scores)
        .map(|(label, score)| ClassPrediction::new(label.clone(), *score))
        .collect();
    ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    Ok(ranked)
}
