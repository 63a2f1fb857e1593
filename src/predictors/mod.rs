//! Risk predictors
//!
//! Three independent estimators share one lifecycle: a fresh instance is
//! untrained and scores every row with the sentinel (0, Low); `train` fits a
//! random forest and reports hold-out accuracy; `predict` attaches a score and
//! level to each input row. Neither call returns an error. Training failures
//! come back as [`TrainingOutcome::Failed`] and keep any previous fit; inference
//! failures come back as a degraded [`PredictionBatch`] of sentinel rows.

mod fall;
mod health;
mod reminder;

pub use fall::*;
pub use health::*;
pub use reminder::*;

use crate::types::{LevelBands, RiskPrediction};
use serde::Serialize;
use tracing::warn;

pub const MODEL_TYPE: &str = "Random Forest";

/// Health risk: <=0.3 Low, <=0.7 Medium, else High
pub const HEALTH_RISK_BANDS: LevelBands = LevelBands::new(0.3, 0.7);
/// Fall risk: <=0.3 Low, <=0.6 Medium, else High
pub const FALL_RISK_BANDS: LevelBands = LevelBands::new(0.3, 0.6);
/// Reminder effectiveness: <=0.3 Low, <=0.7 Medium, else High
pub const EFFECTIVENESS_BANDS: LevelBands = LevelBands::new(0.3, 0.7);

/// Result of a `train` call
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TrainingOutcome {
    Trained {
        /// Accuracy on the held-out split
        accuracy: f64,
        model_type: String,
        feature_count: usize,
    },
    Failed {
        error: String,
        model_type: String,
        feature_count: usize,
    },
}

impl TrainingOutcome {
    pub(crate) fn trained(accuracy: f64, feature_count: usize) -> Self {
        TrainingOutcome::Trained {
            accuracy,
            model_type: MODEL_TYPE.to_string(),
            feature_count,
        }
    }

    pub(crate) fn failed(model: &str, error: impl Into<String>, feature_count: usize) -> Self {
        let error = error.into();
        warn!(model, error = %error, "training failed");
        TrainingOutcome::Failed {
            error,
            model_type: MODEL_TYPE.to_string(),
            feature_count,
        }
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, TrainingOutcome::Trained { .. })
    }

    pub fn accuracy(&self) -> Option<f64> {
        match self {
            TrainingOutcome::Trained { accuracy, .. } => Some(*accuracy),
            TrainingOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TrainingOutcome::Trained { .. } => None,
            TrainingOutcome::Failed { error, .. } => Some(error),
        }
    }

    pub fn feature_count(&self) -> usize {
        match self {
            TrainingOutcome::Trained { feature_count, .. }
            | TrainingOutcome::Failed { feature_count, .. } => *feature_count,
        }
    }
}

/// How the rows of a [`PredictionBatch`] were produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PredictionStatus {
    /// Scored by a fitted model
    Scored,
    /// No model yet; every row carries the sentinel
    Untrained,
    /// Inference failed; every row carries the sentinel
    Degraded { reason: String },
}

/// Input rows augmented with a score and level
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionBatch<T> {
    pub rows: Vec<RiskPrediction<T>>,
    pub status: PredictionStatus,
}

impl<T: Clone> PredictionBatch<T> {
    pub(crate) fn untrained(records: &[T]) -> Self {
        Self {
            rows: records.iter().cloned().map(RiskPrediction::sentinel).collect(),
            status: PredictionStatus::Untrained,
        }
    }

    pub(crate) fn degraded(model: &str, records: &[T], reason: impl ToString) -> Self {
        let reason = reason.to_string();
        warn!(model, reason = %reason, rows = records.len(), "prediction degraded to sentinel scores");
        Self {
            rows: records.iter().cloned().map(RiskPrediction::sentinel).collect(),
            status: PredictionStatus::Degraded { reason },
        }
    }

    pub(crate) fn scored(records: &[T], scores: Vec<f64>, bands: LevelBands) -> Self {
        let rows = records
            .iter()
            .cloned()
            .zip(scores)
            .map(|(record, score)| RiskPrediction {
                record,
                score,
                level: bands.level(score),
            })
            .collect();
        Self {
            rows,
            status: PredictionStatus::Scored,
        }
    }
}

impl<T> PredictionBatch<T> {
    pub fn is_scored(&self) -> bool {
        self.status == PredictionStatus::Scored
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Shared train/predict surface of the three estimators
pub trait RiskModel {
    type Record: Clone;

    /// Re-fit on historical records
    fn train(&mut self, data: &[Self::Record]) -> TrainingOutcome;

    /// Score new records; never fails
    fn predict(&self, data: &[Self::Record]) -> PredictionBatch<Self::Record>;

    fn is_trained(&self) -> bool;
}
