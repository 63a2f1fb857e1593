//! Health risk predictor
//!
//! Trained on the merged cross-domain table; the target is "any alert that
//! day". Numeric features are median-imputed then standardized, movement
//! activity is one-hot encoded with a placeholder for missing values.
//!
//! A feature is used only if at least one training row carries a value.

use super::{PredictionBatch, RiskModel, TrainingOutcome, HEALTH_RISK_BANDS};
use crate::config::ForestConfig;
use crate::merger::MergedRow;
use crate::ml::{
    accuracy, take_rows, train_test_split, Matrix, MedianImputer, ModelError, OneHotEncoder,
    RandomForest, StandardScaler,
};
use crate::types::HealthEvent;
use tracing::{info, warn};

const MODEL: &str = "health_risk";

/// Placeholder category for a missing movement activity
pub const MISSING_CATEGORY: &str = "missing";

/// Numeric feature names, in column order
pub const NUMERIC_FEATURES: [&str; 8] = [
    "Heart Rate",
    "Systolic",
    "Diastolic",
    "Glucose Levels",
    "SpO2",
    "Fall Detected",
    "Reminder Sent",
    "Acknowledged",
];

pub const MOVEMENT_FEATURE: &str = "Movement Activity";

/// Feature values for one row; `None` marks a missing value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthFeatures {
    pub heart_rate: Option<f64>,
    pub systolic: Option<f64>,
    pub diastolic: Option<f64>,
    pub glucose: Option<f64>,
    pub spo2: Option<f64>,
    pub movement_activity: Option<String>,
    pub fall_detected: Option<f64>,
    pub reminder_sent: Option<f64>,
    pub acknowledged: Option<f64>,
}

impl HealthFeatures {
    /// Values in [`NUMERIC_FEATURES`] order
    pub fn numeric(&self) -> [Option<f64>; 8] {
        [
            self.heart_rate,
            self.systolic,
            self.diastolic,
            self.glucose,
            self.spo2,
            self.fall_detected,
            self.reminder_sent,
            self.acknowledged,
        ]
    }
}

/// Anything the health model can score
pub trait HealthFeatureSource {
    fn health_features(&self) -> HealthFeatures;
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

impl HealthFeatureSource for HealthEvent {
    fn health_features(&self) -> HealthFeatures {
        HealthFeatures {
            heart_rate: self.heart_rate.map(f64::from),
            systolic: Some(f64::from(self.systolic)),
            diastolic: Some(f64::from(self.diastolic)),
            glucose: self.glucose_level,
            spo2: self.spo2().map(f64::from),
            ..Default::default()
        }
    }
}

impl HealthFeatureSource for MergedRow {
    fn health_features(&self) -> HealthFeatures {
        let mut features = self
            .health
            .as_ref()
            .map(HealthFeatureSource::health_features)
            .unwrap_or_default();

        if let Some(safety) = &self.safety {
            features.movement_activity = safety.movement_activity.clone();
            features.fall_detected = Some(flag(safety.fall_detected));
        }
        if let Some(reminder) = &self.reminder {
            features.reminder_sent = Some(flag(reminder.sent));
            features.acknowledged = Some(flag(reminder.acknowledged));
        }
        features
    }
}

/// Column selection and transforms learned from the training split
#[derive(Debug, Clone)]
struct Preprocessor {
    /// Indices into [`NUMERIC_FEATURES`]
    numeric: Vec<usize>,
    movement: Option<OneHotEncoder>,
    imputer: MedianImputer,
    scaler: StandardScaler,
}

impl Preprocessor {
    fn matrix(&self, features: &[HealthFeatures]) -> Matrix {
        let imputed = self.imputer.transform(&select_numeric(features, &self.numeric));
        let mut rows = self.scaler.transform(&imputed);
        if let Some(encoder) = &self.movement {
            for (row, f) in rows.iter_mut().zip(features) {
                row.extend(encoder.encode(Some(movement_or_placeholder(f))));
            }
        }
        rows
    }

    fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .numeric
            .iter()
            .map(|&i| NUMERIC_FEATURES[i].to_string())
            .collect();
        if self.movement.is_some() {
            names.push(MOVEMENT_FEATURE.to_string());
        }
        names
    }
}

#[derive(Debug, Clone)]
struct FittedHealthModel {
    prep: Preprocessor,
    forest: RandomForest,
}

fn select_numeric(features: &[HealthFeatures], columns: &[usize]) -> Vec<Vec<Option<f64>>> {
    features
        .iter()
        .map(|f| {
            let all = f.numeric();
            columns.iter().map(|&c| all[c]).collect()
        })
        .collect()
}

fn movement_or_placeholder(features: &HealthFeatures) -> &str {
    features
        .movement_activity
        .as_deref()
        .unwrap_or(MISSING_CATEGORY)
}

#[derive(Debug, Clone, Default)]
pub struct HealthRiskPredictor {
    config: ForestConfig,
    model: Option<FittedHealthModel>,
}

impl HealthRiskPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForestConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Names of the features the fitted model uses
    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.model.as_ref().map(|m| m.prep.feature_names())
    }

    /// Score any feature source, e.g. plain health events without a merge
    pub fn predict_records<R>(&self, records: &[R]) -> PredictionBatch<R>
    where
        R: HealthFeatureSource + Clone,
    {
        let Some(model) = &self.model else {
            return PredictionBatch::untrained(records);
        };

        let features: Vec<HealthFeatures> =
            records.iter().map(HealthFeatureSource::health_features).collect();
        warn_missing_features(&model.prep, &features);

        match model.forest.predict_proba(&model.prep.matrix(&features)) {
            Ok(scores) => PredictionBatch::scored(records, scores, HEALTH_RISK_BANDS),
            Err(e) => PredictionBatch::degraded(MODEL, records, e),
        }
    }

    fn fit(&self, rows: &[MergedRow]) -> Result<(FittedHealthModel, f64), (String, usize)> {
        let features: Vec<HealthFeatures> =
            rows.iter().map(HealthFeatureSource::health_features).collect();

        let numeric: Vec<usize> = (0..NUMERIC_FEATURES.len())
            .filter(|&c| features.iter().any(|f| f.numeric()[c].is_some()))
            .collect();
        let has_movement = features.iter().any(|f| f.movement_activity.is_some());
        let feature_count = numeric.len() + usize::from(has_movement);

        let fail = |e: ModelError| (e.to_string(), feature_count);

        if feature_count == 0 {
            return Err(("No usable features in the merged data".to_string(), 0));
        }

        let labels: Vec<bool> = rows.iter().map(|r| r.has_any_alert).collect();
        let split =
            train_test_split(rows.len(), self.config.test_fraction, self.config.seed).map_err(fail)?;

        let train_features = take_rows(&features, &split.train);
        let test_features = take_rows(&features, &split.test);

        let imputer = MedianImputer::fit(&select_numeric(&train_features, &numeric), numeric.len())
            .or_fallback(&MedianImputer::fit(
                &select_numeric(&features, &numeric),
                numeric.len(),
            ));
        let imputed = imputer.transform(&select_numeric(&train_features, &numeric));
        let scaler = StandardScaler::fit(&imputed, numeric.len());

        let movement = has_movement.then(|| {
            OneHotEncoder::fit(
                MOVEMENT_FEATURE,
                train_features.iter().map(movement_or_placeholder),
                false,
            )
        });

        let prep = Preprocessor {
            numeric,
            movement,
            imputer,
            scaler,
        };

        let x_train = prep.matrix(&train_features);
        let y_train = take_rows(&labels, &split.train);
        let forest = RandomForest::fit(&x_train, &y_train, &self.config).map_err(fail)?;

        let predicted = forest.predict(&prep.matrix(&test_features)).map_err(fail)?;
        let score = accuracy(&predicted, &take_rows(&labels, &split.test));

        Ok((FittedHealthModel { prep, forest }, score))
    }
}

fn warn_missing_features(prep: &Preprocessor, features: &[HealthFeatures]) {
    if features.is_empty() {
        return;
    }
    for &c in &prep.numeric {
        if features.iter().all(|f| f.numeric()[c].is_none()) {
            warn!(
                model = MODEL,
                feature = NUMERIC_FEATURES[c],
                "feature missing from batch, imputing training median"
            );
        }
    }
    if prep.movement.is_some() && features.iter().all(|f| f.movement_activity.is_none()) {
        warn!(
            model = MODEL,
            feature = MOVEMENT_FEATURE,
            "feature missing from batch, using placeholder category"
        );
    }
}

impl RiskModel for HealthRiskPredictor {
    type Record = MergedRow;

    fn train(&mut self, data: &[MergedRow]) -> TrainingOutcome {
        match self.fit(data) {
            Ok((model, score)) => {
                let feature_count = model.prep.feature_names().len();
                info!(model = MODEL, rows = data.len(), feature_count, accuracy = score, "trained");
                self.model = Some(model);
                TrainingOutcome::trained(score, feature_count)
            }
            Err((error, feature_count)) => TrainingOutcome::failed(MODEL, error, feature_count),
        }
    }

    fn predict(&self, data: &[MergedRow]) -> PredictionBatch<MergedRow> {
        self.predict_records(data)
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}
