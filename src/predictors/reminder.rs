//! Reminder effectiveness predictor
//!
//! Scores the chance that a sent reminder gets acknowledged, from the
//! scheduled hour, the weekday and the reminder kind.

use super::{PredictionBatch, RiskModel, TrainingOutcome, EFFECTIVENESS_BANDS};
use crate::config::ForestConfig;
use crate::ml::{fit_and_score, Matrix, RandomForest};
use crate::types::{ReminderEvent, ReminderType};
use chrono::{Datelike, Timelike};
use tracing::info;

const MODEL: &str = "reminder_effectiveness";

#[derive(Debug, Clone)]
struct FittedReminderModel {
    /// Kinds with a `Type_*` column, in column order
    kinds: Vec<ReminderType>,
    forest: RandomForest,
}

#[derive(Debug, Clone, Default)]
pub struct ReminderEffectivenessPredictor {
    config: ForestConfig,
    model: Option<FittedReminderModel>,
}

impl ReminderEffectivenessPredictor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ForestConfig) -> Self {
        Self {
            config,
            model: None,
        }
    }

    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.model.as_ref().map(|m| feature_names(&m.kinds))
    }
}

/// Known kinds that occur at least once in `events`
fn kinds_present(events: &[ReminderEvent]) -> Vec<ReminderType> {
    ReminderType::KNOWN
        .iter()
        .filter(|kind| events.iter().any(|e| &e.reminder_type == *kind))
        .cloned()
        .collect()
}

fn feature_names(kinds: &[ReminderType]) -> Vec<String> {
    let mut names = vec!["Hour".to_string(), "DayOfWeek".to_string()];
    names.extend(kinds.iter().map(|k| format!("Type_{}", k)));
    names
}

fn feature_rows(events: &[ReminderEvent], kinds: &[ReminderType]) -> Matrix {
    events
        .iter()
        .map(|e| {
            let mut row = vec![
                e.scheduled_time.hour() as f64,
                e.timestamp.weekday().num_days_from_monday() as f64,
            ];
            row.extend(
                kinds
                    .iter()
                    .map(|k| if &e.reminder_type == k { 1.0 } else { 0.0 }),
            );
            row
        })
        .collect()
}

impl RiskModel for ReminderEffectivenessPredictor {
    type Record = ReminderEvent;

    fn train(&mut self, data: &[ReminderEvent]) -> TrainingOutcome {
        if data.is_empty() {
            return TrainingOutcome::failed(MODEL, "No valid reminder data for training", 0);
        }

        // type columns come from the full batch, rows from sent reminders only
        let kinds = kinds_present(data);
        let feature_count = kinds.len() + 2;

        let sent: Vec<ReminderEvent> = data.iter().filter(|e| e.sent).cloned().collect();
        if sent.is_empty() {
            return TrainingOutcome::failed(MODEL, "No sent reminders in the data", feature_count);
        }

        let x = feature_rows(&sent, &kinds);
        let y: Vec<bool> = sent.iter().map(|e| e.acknowledged).collect();

        match fit_and_score(&x, &y, &self.config) {
            Ok((forest, accuracy)) => {
                info!(model = MODEL, rows = sent.len(), feature_count, accuracy, "trained");
                self.model = Some(FittedReminderModel { kinds, forest });
                TrainingOutcome::trained(accuracy, feature_count)
            }
            Err(e) => TrainingOutcome::failed(MODEL, e.to_string(), feature_count),
        }
    }

    fn predict(&self, data: &[ReminderEvent]) -> PredictionBatch<ReminderEvent> {
        let Some(model) = &self.model else {
            return PredictionBatch::untrained(data);
        };

        match model.forest.predict_proba(&feature_rows(data, &model.kinds)) {
            Ok(scores) => PredictionBatch::scored(data, scores, EFFECTIVENESS_BANDS),
            Err(e) => PredictionBatch::degraded(MODEL, data, e),
        }
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictors::PredictionStatus;
    use crate::types::RiskLevel;
    use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
    use pretty_assertions::assert_eq;

    fn ts(i: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(7, 0, 0)
            .unwrap()
            + Duration::hours(i * 13)
    }

    fn reminder(i: i64, kind: ReminderType, hour: u32, sent: bool, acknowledged: bool) -> ReminderEvent {
        ReminderEvent {
            device_id: "D1".to_string(),
            timestamp: ts(i),
            reminder_type: kind,
            scheduled_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            sent,
            acknowledged,
        }
    }

    /// Morning reminders get acknowledged, evening ones do not
    fn history() -> Vec<ReminderEvent> {
        (0..40i64)
            .map(|i| {
                let kind = if i % 2 == 0 {
                    ReminderType::Medication
                } else {
                    ReminderType::Hydration
                };
                let hour = if i % 4 < 2 { 8 } else { 21 };
                reminder(i, kind, hour, i % 10 != 9, hour == 8)
            })
            .collect()
    }

    #[test]
    fn test_feature_columns_follow_present_kinds() {
        let kinds = kinds_present(&history());
        assert_eq!(kinds, vec![ReminderType::Medication, ReminderType::Hydration]);
        assert_eq!(
            feature_names(&kinds),
            vec!["Hour", "DayOfWeek", "Type_Medication", "Type_Hydration"]
        );
    }

    #[test]
    fn test_untrained_predict_is_sentinel() {
        let predictor = ReminderEffectivenessPredictor::new();
        let batch = predictor.predict(&history());
        assert_eq!(batch.status, PredictionStatus::Untrained);
        assert!(batch.rows.iter().all(|r| r.score == 0.0 && r.level == RiskLevel::Low));
    }

    #[test]
    fn test_training_failures() {
        let mut predictor = ReminderEffectivenessPredictor::new();
        assert_eq!(
            predictor.train(&[]).error(),
            Some("No valid reminder data for training")
        );

        let unsent = vec![reminder(0, ReminderType::Exercise, 8, false, false)];
        let outcome = predictor.train(&unsent);
        assert_eq!(outcome.error(), Some("No sent reminders in the data"));
        assert_eq!(outcome.feature_count(), 3);
    }

    #[test]
    fn test_train_and_predict() {
        let mut predictor = ReminderEffectivenessPredictor::with_config(ForestConfig {
            n_trees: 20,
            ..ForestConfig::default()
        });
        let outcome = predictor.train(&history());
        assert!(outcome.is_trained(), "{:?}", outcome);
        assert_eq!(outcome.feature_count(), 4);

        // an unseen kind has no type column and still scores
        let batch = predictor.predict(&[
            reminder(0, ReminderType::Medication, 8, true, false),
            reminder(1, ReminderType::Appointment, 21, true, false),
        ]);
        assert!(batch.is_scored());
        assert!(batch.rows[0].score > batch.rows[1].score);
    }
}
