//! Pipeline orchestration
//!
//! This module provides the public entry points of Carewatch: a stateless
//! helper that turns raw batches straight into alerts, and
//! [`MonitoringSession`], which owns the loaded data and the trained models
//! for the lifetime of one dashboard session.

use crate::config::{CareConfig, ForestConfig};
use crate::error::CareError;
use crate::filter::{device_ids, DashboardFilter};
use crate::merger::{merge, MergedRow};
use crate::normalizer::Normalizer;
use crate::notify::Notifier;
use crate::predictors::{
    FallRiskPredictor, HealthRiskPredictor, PredictionBatch, ReminderEffectivenessPredictor,
    RiskModel, TrainingOutcome,
};
use crate::rules::{should_notify_caregiver, AlertEngine, AlertReport};
use crate::schema::{RawHealthRecord, RawReminderRecord, RawSafetyRecord};
use crate::stats::{health_stats, reminder_stats, safety_stats, DashboardStats};
use crate::store::AlertSink;
use crate::types::{Alert, AlertKey, AlertStatus, HealthEvent, ReminderEvent, SafetyEvent};
use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

/// Raw input for one load; a missing domain is `None`
#[derive(Debug, Clone, Default)]
pub struct RawBatches {
    pub health: Option<Vec<RawHealthRecord>>,
    pub safety: Option<Vec<RawSafetyRecord>>,
    pub reminders: Option<Vec<RawReminderRecord>>,
}

/// Normalize every supplied batch and run the rule engine.
///
/// Malformed records abort with [`CareError::MalformedField`]; events the rule
/// engine cannot use are reported in [`AlertReport::skipped`].
pub fn generate_alert_report(raw: &RawBatches) -> Result<AlertReport, CareError> {
    let data = NormalizedData::from_raw(raw)?;
    Ok(AlertEngine::generate_alerts(
        data.health.as_deref(),
        data.safety.as_deref(),
        data.reminders.as_deref(),
    ))
}

#[derive(Debug, Clone, Default)]
struct NormalizedData {
    health: Option<Vec<HealthEvent>>,
    safety: Option<Vec<SafetyEvent>>,
    reminders: Option<Vec<ReminderEvent>>,
}

impl NormalizedData {
    fn from_raw(raw: &RawBatches) -> Result<Self, CareError> {
        Ok(Self {
            health: raw
                .health
                .as_deref()
                .map(Normalizer::normalize_health)
                .transpose()?,
            safety: raw
                .safety
                .as_deref()
                .map(Normalizer::normalize_safety)
                .transpose()?,
            reminders: raw
                .reminders
                .as_deref()
                .map(Normalizer::normalize_reminders)
                .transpose()?,
        })
    }
}

/// What one `refresh` did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub alerts: usize,
    /// Events the rule engine could not turn into alerts
    pub skipped: usize,
    pub saved: usize,
    pub persistence_failures: usize,
    pub refreshed_at: NaiveDateTime,
}

/// Everything the overview page renders for one filter selection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub stats: DashboardStats,
    pub alerts: Vec<Alert>,
    pub active_alerts: usize,
    pub device_ids: Vec<String>,
    pub last_refresh: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingSummary {
    pub health: TrainingOutcome,
    pub fall: TrainingOutcome,
    pub reminder: TrainingOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionTables {
    pub health: PredictionBatch<MergedRow>,
    pub fall: PredictionBatch<SafetyEvent>,
    pub reminder: PredictionBatch<ReminderEvent>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotifyReport {
    pub attempted: usize,
    pub delivered: usize,
}

/// Loaded data, current alerts and trained models for one session.
///
/// Train and predict calls take `&mut self` / `&self`, so one session is never
/// trained and queried at the same time.
#[derive(Debug, Clone, Default)]
pub struct MonitoringSession {
    data: NormalizedData,
    alerts: Vec<Alert>,
    last_refresh: Option<NaiveDateTime>,
    health_model: HealthRiskPredictor,
    fall_model: FallRiskPredictor,
    reminder_model: ReminderEffectivenessPredictor,
}

impl MonitoringSession {
    /// Empty session with default model settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &CareConfig) -> Self {
        let forest: &ForestConfig = &config.forest;
        Self {
            health_model: HealthRiskPredictor::with_config(forest.clone()),
            fall_model: FallRiskPredictor::with_config(forest.clone()),
            reminder_model: ReminderEffectivenessPredictor::with_config(forest.clone()),
            ..Self::default()
        }
    }

    /// Create a session from raw batches
    pub fn load(raw: &RawBatches, config: &CareConfig) -> Result<Self, CareError> {
        let mut session = Self::with_config(config);
        session.replace_data(raw)?;
        Ok(session)
    }

    /// Swap in freshly loaded data, keeping the trained models.
    ///
    /// On error the session is left unchanged.
    pub fn replace_data(&mut self, raw: &RawBatches) -> Result<(), CareError> {
        let data = NormalizedData::from_raw(raw)?;
        info!(
            health = data.health.as_ref().map_or(0, Vec::len),
            safety = data.safety.as_ref().map_or(0, Vec::len),
            reminders = data.reminders.as_ref().map_or(0, Vec::len),
            "loaded monitoring data"
        );
        self.data = data;
        self.alerts.clear();
        Ok(())
    }

    pub fn health(&self) -> &[HealthEvent] {
        self.data.health.as_deref().unwrap_or(&[])
    }

    pub fn safety(&self) -> &[SafetyEvent] {
        self.data.safety.as_deref().unwrap_or(&[])
    }

    pub fn reminders(&self) -> &[ReminderEvent] {
        self.data.reminders.as_deref().unwrap_or(&[])
    }

    /// Current alerts, most recent first
    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn last_refresh(&self) -> Option<NaiveDateTime> {
        self.last_refresh
    }

    /// Regenerate alerts from the loaded data and save each one to `sink`
    pub fn refresh(&mut self, sink: &mut dyn AlertSink, now: NaiveDateTime) -> RefreshReport {
        let report = AlertEngine::generate_alerts(
            self.data.health.as_deref(),
            self.data.safety.as_deref(),
            self.data.reminders.as_deref(),
        );

        let mut alerts = report.alerts;
        let mut saved = 0;
        let mut persistence_failures = 0;
        for alert in alerts.iter_mut() {
            if sink.save(alert) {
                saved += 1;
            } else {
                persistence_failures += 1;
                warn!(
                    device_id = %alert.device_id,
                    alert_type = %alert.alert_type,
                    "failed to persist alert"
                );
            }

            // a stored alert may already be notified or resolved
            if let Some(stored) = sink.status_of(alert) {
                if alert.status.can_transition_to(stored) {
                    alert.status = stored;
                }
            }
        }

        self.alerts = alerts;
        self.last_refresh = Some(now);

        info!(
            alerts = self.alerts.len(),
            skipped = report.skipped.len(),
            persistence_failures,
            "alerts refreshed"
        );

        RefreshReport {
            alerts: self.alerts.len(),
            skipped: report.skipped.len(),
            saved,
            persistence_failures,
            refreshed_at: now,
        }
    }

    /// Statistics tiles and alert list for a filter selection
    pub fn summary(&self, filter: &DashboardFilter) -> DashboardSummary {
        let health = filter.apply(self.health());
        let safety = filter.apply(self.safety());
        let reminders = filter.apply(self.reminders());
        let alerts = filter.apply(&self.alerts);

        let mut ids = device_ids(self.health());
        ids.extend(device_ids(self.safety()));
        ids.extend(device_ids(self.reminders()));
        ids.sort();
        ids.dedup();

        DashboardSummary {
            stats: DashboardStats {
                health: health_stats(&health),
                safety: safety_stats(&safety),
                reminders: reminder_stats(&reminders),
            },
            active_alerts: alerts
                .iter()
                .filter(|a| a.status == AlertStatus::Active)
                .count(),
            alerts,
            device_ids: ids,
            last_refresh: self.last_refresh,
        }
    }

    /// Merged cross-domain table of the loaded data
    pub fn merged(&self) -> Vec<MergedRow> {
        merge(self.health(), self.safety(), self.reminders())
    }

    /// Fit all three models on the loaded data
    pub fn train_models(&mut self) -> TrainingSummary {
        let merged = self.merged();
        let safety = self.data.safety.as_deref().unwrap_or(&[]);
        let reminders = self.data.reminders.as_deref().unwrap_or(&[]);
        let summary = TrainingSummary {
            health: self.health_model.train(&merged),
            fall: self.fall_model.train(safety),
            reminder: self.reminder_model.train(reminders),
        };
        info!(
            health = summary.health.is_trained(),
            fall = summary.fall.is_trained(),
            reminder = summary.reminder.is_trained(),
            "model training finished"
        );
        summary
    }

    pub fn models_trained(&self) -> bool {
        self.health_model.is_trained()
            && self.fall_model.is_trained()
            && self.reminder_model.is_trained()
    }

    /// Score the filtered data with every model; untrained models yield sentinels
    pub fn predict_all(&self, filter: &DashboardFilter) -> PredictionTables {
        let merged = filter.apply(&self.merged());
        PredictionTables {
            health: self.health_model.predict(&merged),
            fall: self.fall_model.predict(&filter.apply(self.safety())),
            reminder: self.reminder_model.predict(&filter.apply(self.reminders())),
        }
    }

    /// Mark one alert resolved in the sink and locally, then tell the caregiver.
    ///
    /// Returns `Ok(false)` when the sink rejects the update; local state is
    /// left as it was.
    pub fn mark_resolved(
        &mut self,
        key: &AlertKey,
        sink: &mut dyn AlertSink,
        notifier: &mut dyn Notifier,
    ) -> Result<bool, CareError> {
        let alert = self
            .alerts
            .iter_mut()
            .find(|a| &a.dedup_key() == key)
            .ok_or_else(|| CareError::NotFound(format!("alert for {}", key.device_id)))?;

        let id = sink.find(alert).ok_or_else(|| {
            CareError::NotFound(format!("stored alert for {}", key.device_id))
        })?;

        if !sink.update_status(&id, AlertStatus::Resolved) {
            warn!(device_id = %alert.device_id, "alert store rejected status update");
            return Ok(false);
        }

        alert.status = AlertStatus::Resolved;
        if !notifier.notify(alert) {
            warn!(device_id = %alert.device_id, "resolution notification failed");
        }
        Ok(true)
    }

    /// Notify for every active alert that warrants a caregiver notification
    pub fn notify_pending(&self, notifier: &mut dyn Notifier) -> NotifyReport {
        let mut report = NotifyReport::default();
        for alert in self
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Active && should_notify_caregiver(a))
        {
            report.attempted += 1;
            if notifier.notify(alert) {
                report.delivered += 1;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::LogNotifier;
    use crate::predictors::PredictionStatus;
    use crate::schema::{FieldValue, RecordParser};
    use crate::store::{MemoryAlertStore, StoredAlert};
    use crate::types::{AlertType, Priority, ReminderType, RiskLevel};
    use chrono::{Duration, NaiveDate, NaiveTime};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 16)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn sample_health_json() -> &'static str {
        r#"[
            {
                "Device-ID/User-ID": "U1",
                "Timestamp": "2025-01-15 08:30:00",
                "Heart Rate": 180,
                "Heart Rate Below/Above Threshold (Yes/No)": "Yes",
                "Blood Pressure": "150/95",
                "Blood Pressure Below/Above Threshold (Yes/No)": "Yes",
                "Glucose Levels": 95,
                "Glucose Levels Below/Above Threshold (Yes/No)": "No",
                "Oxygen Saturation (SpO₂%)": 98,
                "SpO₂ Below Threshold (Yes/No)": "No",
                "Alert Triggered (Yes/No)": "Yes",
                "Caregiver Notified (Yes/No)": "No"
            },
            {
                "Device-ID/User-ID": "U1",
                "Timestamp": "2025-01-14 08:30:00",
                "Heart Rate": 72,
                "Heart Rate Below/Above Threshold (Yes/No)": "No",
                "Blood Pressure": "120/80",
                "Blood Pressure Below/Above Threshold (Yes/No)": "No",
                "Glucose Levels": 100,
                "Glucose Levels Below/Above Threshold (Yes/No)": "No",
                "Oxygen Saturation (SpO₂%)": 97,
                "SpO₂ Below Threshold (Yes/No)": "No",
                "Alert Triggered (Yes/No)": "No",
                "Caregiver Notified (Yes/No)": "No"
            }
        ]"#
    }

    fn sample_safety_ndjson() -> &'static str {
        concat!(
            r#"{"device_id": "U2", "timestamp": "2025-01-15 21:05:00", "movement_activity": "No Movement", "fall_detected": "Yes", "impact_force": "Low", "inactivity_seconds": 45, "location": "Bathroom", "alert_triggered": "Yes", "caregiver_notified": "Yes"}"#,
            "\n",
            r#"{"device_id": "U2", "timestamp": "2025-01-15 10:00:00", "movement_activity": "Walking", "fall_detected": "No", "location": "Kitchen"}"#,
            "\n"
        )
    }

    fn raw_batches() -> RawBatches {
        RawBatches {
            health: Some(RecordParser::parse_array(sample_health_json()).unwrap()),
            safety: Some(RecordParser::parse_ndjson(sample_safety_ndjson()).unwrap()),
            reminders: Some(vec![RawReminderRecord {
                device_id: Some("U1".into()),
                timestamp: Some("2025-01-15 07:55:00".into()),
                reminder_type: Some("Medication".into()),
                scheduled_time: Some("08:00:00".into()),
                sent: Some("Yes".into()),
                acknowledged: Some("No".into()),
            }]),
        }
    }

    /// Sink whose writes always fail
    struct BrokenSink;

    impl AlertSink for BrokenSink {
        fn save(&mut self, _alert: &Alert) -> bool {
            false
        }

        fn update_status(&mut self, _id: &Uuid, _status: AlertStatus) -> bool {
            false
        }

        fn list_all(&self) -> Vec<StoredAlert> {
            Vec::new()
        }

        fn find(&self, _alert: &Alert) -> Option<Uuid> {
            None
        }

        fn status_of(&self, _alert: &Alert) -> Option<AlertStatus> {
            None
        }
    }

    #[test]
    fn test_generate_alert_report() {
        let report = generate_alert_report(&raw_batches()).unwrap();
        let types: Vec<AlertType> = report.alerts.iter().map(|a| a.alert_type).collect();
        assert_eq!(types, vec![AlertType::Fall, AlertType::Health, AlertType::Reminder]);

        let health = &report.alerts[1];
        assert_eq!(health.priority, Priority::High);
        assert_eq!(health.status, AlertStatus::Active);

        let fall = &report.alerts[0];
        assert_eq!(fall.priority, Priority::Medium);
        assert_eq!(fall.status, AlertStatus::Notified);
    }

    #[test]
    fn test_malformed_batch_aborts_load() {
        let mut raw = raw_batches();
        if let Some(health) = raw.health.as_mut() {
            health[0].blood_pressure = Some(FieldValue::from("high"));
        }
        let err = MonitoringSession::load(&raw, &CareConfig::default()).unwrap_err();
        assert!(matches!(err, CareError::MalformedField { .. }));
    }

    #[test]
    fn test_absent_domain_contributes_nothing() {
        let raw = RawBatches {
            safety: raw_batches().safety,
            ..RawBatches::default()
        };
        let report = generate_alert_report(&raw).unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].alert_type, AlertType::Fall);
    }

    #[test]
    fn test_refresh_twice_does_not_duplicate() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        let mut store = MemoryAlertStore::new();

        let first = session.refresh(&mut store, now());
        assert_eq!(first.alerts, 3);
        assert_eq!(first.saved, 3);
        assert_eq!(first.persistence_failures, 0);

        session.refresh(&mut store, now());
        assert_eq!(store.len(), 3);
        assert_eq!(session.last_refresh(), Some(now()));
    }

    #[test]
    fn test_persistence_failures_are_counted() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        let report = session.refresh(&mut BrokenSink, now());
        assert_eq!(report.saved, 0);
        assert_eq!(report.persistence_failures, 3);
        // alerts are still shown
        assert_eq!(session.alerts().len(), 3);
    }

    #[test]
    fn test_summary_respects_filter() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        session.refresh(&mut MemoryAlertStore::new(), now());

        let all = session.summary(&DashboardFilter::all());
        assert_eq!(all.device_ids, vec!["U1".to_string(), "U2".to_string()]);
        assert_eq!(all.alerts.len(), 3);
        assert_eq!(all.stats.health.abnormal_hr, 50);
        assert_eq!(all.stats.safety.fall_count, 1);

        let u2 = session.summary(&DashboardFilter::device("U2"));
        assert_eq!(u2.alerts.len(), 1);
        assert_eq!(u2.stats.health.abnormal_hr, 0);
        assert_eq!(u2.active_alerts, 0);
    }

    #[test]
    fn test_mark_resolved_updates_store_and_notifies() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        let mut store = MemoryAlertStore::new();
        let mut notifier = LogNotifier::new();
        session.refresh(&mut store, now());

        let key = session.alerts()[1].dedup_key();
        assert!(session.mark_resolved(&key, &mut store, &mut notifier).unwrap());
        assert_eq!(session.alerts()[1].status, AlertStatus::Resolved);
        assert_eq!(notifier.sent().len(), 1);

        let stored: Vec<AlertStatus> = store.list_all().iter().map(|s| s.alert.status).collect();
        assert!(stored.contains(&AlertStatus::Resolved));
    }

    #[test]
    fn test_mark_resolved_unknown_alert() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        session.refresh(&mut MemoryAlertStore::new(), now());

        let mut key = session.alerts()[0].dedup_key();
        key.message = "something else".to_string();
        let result = session.mark_resolved(&key, &mut MemoryAlertStore::new(), &mut LogNotifier::new());
        assert!(matches!(result, Err(CareError::NotFound(_))));
    }

    #[test]
    fn test_notify_pending_only_active_notifiable() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        session.refresh(&mut MemoryAlertStore::new(), now());

        let mut notifier = LogNotifier::new();
        let report = session.notify_pending(&mut notifier);
        // the High health alert only: the fall is already Notified and the
        // medication reminder never qualifies
        assert_eq!(report, NotifyReport { attempted: 1, delivered: 1 });
        assert!(notifier.sent()[0].starts_with("ALERT for U1: Health - "));
    }

    #[test]
    fn test_resolved_alert_stays_resolved_across_refresh() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        let mut store = MemoryAlertStore::new();
        let mut notifier = LogNotifier::new();
        session.refresh(&mut store, now());

        let key = session.alerts()[1].dedup_key();
        assert!(session.mark_resolved(&key, &mut store, &mut notifier).unwrap());

        let report = session.refresh(&mut store, now());
        assert_eq!(report.alerts, 3);
        assert_eq!(session.alerts()[1].dedup_key(), key);
        assert_eq!(session.alerts()[1].status, AlertStatus::Resolved);

        // the only notifiable alert is resolved now
        let pending = session.notify_pending(&mut notifier);
        assert_eq!(pending, NotifyReport { attempted: 0, delivered: 0 });
        assert_eq!(notifier.sent().len(), 1);
    }

    /// Forty days for one device with both outcomes in every domain
    fn training_batches() -> RawBatches {
        let start = NaiveDate::from_ymd_opt(2025, 2, 3).unwrap();
        let mut health = Vec::new();
        let mut safety = Vec::new();
        let mut reminders = Vec::new();

        for i in 0..40i64 {
            let date = start + Duration::days(i);
            let at = |hour: u32| date.and_hms_opt(hour, 0, 0).unwrap();

            let abnormal = i % 3 == 0;
            health.push(RawHealthRecord::from(&HealthEvent {
                device_id: "U1".to_string(),
                timestamp: at(8),
                heart_rate: Some(if abnormal { 130 } else { 70 }),
                heart_rate_abnormal: abnormal,
                blood_pressure: "120/80".to_string(),
                systolic: 120,
                diastolic: 80,
                blood_pressure_abnormal: false,
                glucose_level: Some(100.0 + (i % 7) as f64),
                glucose_abnormal: false,
                oxygen_saturation: Some(97),
                oxygen_low: false,
                alert_triggered: abnormal,
                caregiver_notified: false,
            }));

            let fall = i % 4 == 0;
            safety.push(RawSafetyRecord::from(&SafetyEvent {
                device_id: "U1".to_string(),
                timestamp: at(10),
                movement_activity: Some(if fall { "No Movement" } else { "Walking" }.to_string()),
                fall_detected: fall,
                impact_force: None,
                inactivity_seconds: 0,
                location: Some(if i % 2 == 0 { "Bathroom" } else { "Kitchen" }.to_string()),
                alert_triggered: fall,
                caregiver_notified: false,
            }));

            let morning = i % 2 == 0;
            reminders.push(RawReminderRecord::from(&ReminderEvent {
                device_id: "U1".to_string(),
                timestamp: at(7),
                reminder_type: ReminderType::Medication,
                scheduled_time: NaiveTime::from_hms_opt(if morning { 8 } else { 21 }, 0, 0)
                    .unwrap(),
                sent: true,
                acknowledged: morning,
            }));
        }

        RawBatches {
            health: Some(health),
            safety: Some(safety),
            reminders: Some(reminders),
        }
    }

    #[test]
    fn test_train_then_predict_scores_every_table() {
        let config = CareConfig {
            forest: ForestConfig {
                n_trees: 10,
                ..ForestConfig::default()
            },
            ..CareConfig::default()
        };
        let mut session = MonitoringSession::load(&training_batches(), &config).unwrap();

        let summary = session.train_models();
        assert!(summary.health.is_trained(), "{:?}", summary.health);
        assert!(summary.fall.is_trained(), "{:?}", summary.fall);
        assert!(summary.reminder.is_trained(), "{:?}", summary.reminder);
        assert!(session.models_trained());

        let tables = session.predict_all(&DashboardFilter::all());
        assert_eq!(tables.health.status, PredictionStatus::Scored);
        assert_eq!(tables.fall.status, PredictionStatus::Scored);
        assert_eq!(tables.reminder.status, PredictionStatus::Scored);
        assert_eq!(tables.health.len(), 40);
        assert_eq!(tables.fall.len(), 40);
        assert_eq!(tables.reminder.len(), 40);
    }

    #[test]
    fn test_predict_before_training_is_sentinel() {
        let session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        let tables = session.predict_all(&DashboardFilter::all());
        assert_eq!(tables.health.status, PredictionStatus::Untrained);
        assert_eq!(tables.fall.len(), 2);
        assert!(tables
            .fall
            .rows
            .iter()
            .all(|r| r.score == 0.0 && r.level == RiskLevel::Low));
    }

    #[test]
    fn test_train_on_tiny_data_reports_failures() {
        let mut session = MonitoringSession::load(&raw_batches(), &CareConfig::default()).unwrap();
        let summary = session.train_models();
        // one sent reminder cannot be split
        assert!(summary.reminder.error().is_some());
        assert!(!session.models_trained());
    }
}
