//! Fall risk predictor
//!
//! Scores the chance that a device records a fall within the next 24 hours.
//! Features are hour of day, day of week, and dummy columns for movement
//! activity and location (lowest level dropped).

use super::{PredictionBatch, RiskModel, TrainingOutcome, FALL_RISK_BANDS};
use crate::config::ForestConfig;
use crate::ml::{fit_and_score, FeatureFrame, RandomForest};
use crate::types::SafetyEvent;
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use std::collections::HashMap;
use tracing::{debug, info};

const MODEL: &str = "fall_risk";

/// Look-ahead window for the label
pub const FALL_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone)]
struct FittedFallModel {
    columns: Vec<String>,
    forest: RandomForest,
}

#[derive(Debug, Clone, Default)]
pub struct FallRiskPredictor {
    config: ForestConfig,
    model: Option<FittedFallModel>,
}

impl FallRiskPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForestConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    /// Feature column names of the fitted model
    pub fn feature_names(&self) -> Option<&[String]> {
        self.model.as_ref().map(|m| m.columns.as_slice())
    }
}

impl RiskModel for FallRiskPredictor {
    type Record = SafetyEvent;

    fn train(&mut self, data: &[SafetyEvent]) -> TrainingOutcome {
        if data.is_empty() {
            return TrainingOutcome::failed(MODEL, "No valid safety data for training", 0);
        }

        let mut ordered: Vec<&SafetyEvent> = data.iter().collect();
        ordered.sort_by(|a, b| {
            a.device_id
                .cmp(&b.device_id)
                .then(a.timestamp.cmp(&b.timestamp))
        });
        let ordered: Vec<SafetyEvent> = ordered.into_iter().cloned().collect();

        let labels = label_next_day_falls(&ordered);
        let frame = feature_frame(&ordered, true);
        let feature_count = frame.width();

        match fit_and_score(&frame.to_rows(), &labels, &self.config) {
            Ok((forest, accuracy)) => {
                info!(model = MODEL, rows = ordered.len(), feature_count, accuracy, "trained");
                self.model = Some(FittedFallModel {
                    columns: frame.names().to_vec(),
                    forest,
                });
                TrainingOutcome::trained(accuracy, feature_count)
            }
            Err(e) => TrainingOutcome::failed(MODEL, e.to_string(), feature_count),
        }
    }

    fn predict(&self, data: &[SafetyEvent]) -> PredictionBatch<SafetyEvent> {
        let Some(model) = &self.model else {
            return PredictionBatch::untrained(data);
        };

        // every level keeps its own column so a row encodes the same way in any
        // batch; the trained baseline level is dropped by the alignment below
        let frame = feature_frame(data, false);
        let missing = model
            .columns
            .iter()
            .filter(|c| !frame.names().contains(c))
            .count();
        if missing > 0 {
            debug!(model = MODEL, missing, "trained columns absent from batch, filled with 0");
        }

        match model.forest.predict_proba(&frame.aligned_rows(&model.columns)) {
            Ok(scores) => PredictionBatch::scored(data, scores, FALL_RISK_BANDS),
            Err(e) => PredictionBatch::degraded(MODEL, data, e),
        }
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

fn feature_frame(events: &[SafetyEvent], drop_first: bool) -> FeatureFrame {
    let mut frame = FeatureFrame::new(events.len());
    frame.push_numeric(
        "Hour",
        events.iter().map(|e| e.timestamp.hour() as f64).collect(),
    );
    frame.push_numeric(
        "DayOfWeek",
        events
            .iter()
            .map(|e| e.timestamp.weekday().num_days_from_monday() as f64)
            .collect(),
    );

    let movement: Vec<Option<&str>> = events.iter().map(|e| e.movement_activity.as_deref()).collect();
    frame.push_dummies("Movement Activity", &movement, drop_first);
    let location: Vec<Option<&str>> = events.iter().map(|e| e.location.as_deref()).collect();
    frame.push_dummies("Location", &location, drop_first);
    frame
}

/// Next-day fall label for each event, aligned with the input order.
///
/// An event is positive when the same device records a fall at a time `t`
/// with `anchor < t <= anchor + 24h`. Events sharing the anchor's timestamp
/// do not count.
pub fn label_next_day_falls(events: &[SafetyEvent]) -> Vec<bool> {
    let window = Duration::hours(FALL_WINDOW_HOURS);
    let mut labels = vec![false; events.len()];

    let mut by_device: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, event) in events.iter().enumerate() {
        by_device.entry(event.device_id.as_str()).or_default().push(idx);
    }

    for mut indices in by_device.into_values() {
        indices.sort_by_key(|&i| events[i].timestamp);
        let times: Vec<NaiveDateTime> = indices.iter().map(|&i| events[i].timestamp).collect();

        // falls_before[k] = falls among the first k events
        let mut falls_before = Vec::with_capacity(indices.len() + 1);
        falls_before.push(0usize);
        for &i in &indices {
            let last = falls_before[falls_before.len() - 1];
            falls_before.push(last + usize::from(events[i].fall_detected));
        }

        for (pos, &i) in indices.iter().enumerate() {
            let anchor = times[pos];
            let start = times.partition_point(|t| *t <= anchor);
            let end = times.partition_point(|t| *t <= anchor + window);
            labels[i] = falls_before[end] > falls_before[start];
        }
    }

    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictors::PredictionStatus;
    use crate::types::RiskLevel;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn event(device: &str, ts: NaiveDateTime, fall: bool, location: &str) -> SafetyEvent {
        SafetyEvent {
            device_id: device.to_string(),
            timestamp: ts,
            movement_activity: Some(if fall { "No Movement" } else { "Walking" }.to_string()),
            fall_detected: fall,
            impact_force: None,
            inactivity_seconds: 0,
            location: Some(location.to_string()),
            alert_triggered: fall,
            caregiver_notified: false,
        }
    }

    #[test]
    fn test_label_window_boundaries() {
        let events = vec![
            event("U", t0(), false, "Hall"),
            event("U", t0() + Duration::hours(2), true, "Hall"),
            event("U", t0() + Duration::hours(30), false, "Hall"),
        ];
        assert_eq!(label_next_day_falls(&events), vec![true, false, false]);
    }

    #[test]
    fn test_label_upper_bound_inclusive_and_same_time_excluded() {
        let events = vec![
            event("U", t0() + Duration::hours(24), true, "Hall"),
            event("U", t0(), false, "Hall"),
            event("U", t0(), true, "Hall"),
            event("V", t0() + Duration::hours(1), true, "Hall"),
        ];
        // U@t0 events see the fall at exactly +24h; the simultaneous fall does not count
        // and device V never affects device U
        assert_eq!(label_next_day_falls(&events), vec![false, true, true, false]);
    }

    #[test]
    fn test_label_matches_quadratic_scan() {
        let mut events = Vec::new();
        for i in 0..40i64 {
            let device = if i % 3 == 0 { "A" } else { "B" };
            events.push(event(device, t0() + Duration::hours((i * 7) % 50), i % 5 == 0, "Hall"));
        }

        let expected: Vec<bool> = events
            .iter()
            .map(|anchor| {
                events.iter().any(|other| {
                    other.device_id == anchor.device_id
                        && other.fall_detected
                        && other.timestamp > anchor.timestamp
                        && other.timestamp <= anchor.timestamp + Duration::hours(24)
                })
            })
            .collect();

        assert_eq!(label_next_day_falls(&events), expected);
    }

    #[test]
    fn test_untrained_returns_sentinel() {
        let predictor = FallRiskPredictor::new();
        let batch = predictor.predict(&[event("U", t0(), false, "Hall")]);
        assert_eq!(batch.status, PredictionStatus::Untrained);
        assert_eq!(batch.rows[0].score, 0.0);
        assert_eq!(batch.rows[0].level, RiskLevel::Low);
    }

    #[test]
    fn test_empty_training_data_fails() {
        let mut predictor = FallRiskPredictor::new();
        let outcome = predictor.train(&[]);
        assert_eq!(outcome.error(), Some("No valid safety data for training"));
        assert!(!predictor.is_trained());
    }

    fn history() -> Vec<SafetyEvent> {
        let locations = ["Bathroom", "Kitchen", "Bedroom"];
        (0..48i64)
            .map(|i| {
                let location = locations[(i % 3) as usize];
                // falls cluster in the bathroom
                let fall = location == "Bathroom" && i % 2 == 0;
                event("U", t0() + Duration::hours(i * 5), fall, location)
            })
            .collect()
    }

    #[test]
    fn test_train_and_predict() {
        let mut predictor = FallRiskPredictor::with_config(ForestConfig {
            n_trees: 20,
            ..ForestConfig::default()
        });
        let outcome = predictor.train(&history());
        assert!(outcome.is_trained(), "{:?}", outcome);
        // Hour, DayOfWeek, 1 movement dummy, 2 location dummies
        assert_eq!(outcome.feature_count(), 5);

        // a batch with a single location only gets aligned to the trained columns
        let batch = predictor.predict(&[event("U", t0(), false, "Kitchen")]);
        assert!(batch.is_scored());
        assert_eq!(batch.len(), 1);
        assert!((0.0..=1.0).contains(&batch.rows[0].score));
    }

    #[test]
    fn test_prediction_encoding_ignores_batch_composition() {
        let mut predictor = FallRiskPredictor::with_config(ForestConfig {
            n_trees: 20,
            ..ForestConfig::default()
        });
        assert!(predictor.train(&history()).is_trained());

        let kitchen = event("U", t0(), false, "Kitchen");
        let bathroom = event("U", t0(), false, "Bathroom");

        let alone = predictor.predict(&[kitchen.clone()]);
        let mixed = predictor.predict(&[bathroom, kitchen.clone()]);
        assert_eq!(alone.rows[0].score, mixed.rows[1].score);

        // a lone row keeps its own location column
        let columns = predictor.feature_names().unwrap().to_vec();
        let row = &feature_frame(&[kitchen], false).aligned_rows(&columns)[0];
        let kitchen_col = columns.iter().position(|c| c == "Location_Kitchen").unwrap();
        assert_eq!(row[kitchen_col], 1.0);
    }

    #[test]
    fn test_failed_retrain_keeps_previous_model() {
        let mut predictor = FallRiskPredictor::with_config(ForestConfig {
            n_trees: 10,
            ..ForestConfig::default()
        });
        assert!(predictor.train(&history()).is_trained());

        // no falls at all: single-class target
        let calm: Vec<SafetyEvent> = (0..10i64)
            .map(|i| event("U", t0() + Duration::hours(i), false, "Hall"))
            .collect();
        let outcome = predictor.train(&calm);
        assert!(!outcome.is_trained());
        assert!(predictor.is_trained());
    }
}
