//! Small supervised-learning toolkit used by the risk predictors
//!
//! - Column preprocessing (median imputation, standardization, one-hot)
//! - Seeded train/test split
//! - CART classification trees and a bagged random forest
//!
//! Everything is deterministic for a given seed.

mod forest;
mod preprocess;
mod split;

pub use forest::*;
pub use preprocess::*;
pub use split::*;

use thiserror::Error;

/// Dense row-major feature matrix
pub type Matrix = Vec<Vec<f64>>;

/// Errors raised while fitting or applying a model
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("no rows to fit")]
    EmptyDataset,

    #[error("need at least 2 rows to split, got {0}")]
    TooFewRows(usize),

    #[error("target has a single class; need both outcomes to fit a classifier")]
    SingleClass,

    #[error("expected {expected} features, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("non-finite value in row {row}, column {column}")]
    NonFinite { row: usize, column: usize },

    #[error("{rows} rows but {labels} labels")]
    LabelMismatch { rows: usize, labels: usize },
}

/// Share of predictions equal to the truth (0 for empty input)
pub fn accuracy(predicted: &[bool], truth: &[bool]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(truth)
        .filter(|(p, t)| p == t)
        .count();
    correct as f64 / truth.len() as f64
}

/// Check that every row has `width` finite values
pub(crate) fn check_matrix(x: &[Vec<f64>], width: usize) -> Result<(), ModelError> {
    for (r, row) in x.iter().enumerate() {
        if row.len() != width {
            return Err(ModelError::ShapeMismatch {
                expected: width,
                found: row.len(),
            });
        }
        if let Some(c) = row.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite { row: r, column: c });
        }
    }
    Ok(())
}

/// Gather rows by index
pub fn take_rows<T: Clone>(rows: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| rows[i].clone()).collect()
}
