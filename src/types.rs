//! Core types for the Carewatch pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: normalized monitoring events, alerts, and risk predictions.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared view over every record that belongs to a device at a point in time
pub trait MonitoringEvent {
    fn device_id(&self) -> &str;
    fn timestamp(&self) -> NaiveDateTime;

    /// Calendar date used for cross-domain joins and date-range filters
    fn date(&self) -> NaiveDate {
        self.timestamp().date()
    }
}

/// A normalized vital-signs reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthEvent {
    /// Device / user identifier
    pub device_id: String,
    /// When the reading was taken
    pub timestamp: NaiveDateTime,
    /// Heart rate (bpm)
    pub heart_rate: Option<u32>,
    /// Heart rate outside the configured band
    pub heart_rate_abnormal: bool,
    /// Blood pressure as recorded ("SSS/DDD")
    pub blood_pressure: String,
    /// Systolic pressure, split from `blood_pressure`
    pub systolic: u32,
    /// Diastolic pressure, split from `blood_pressure`
    pub diastolic: u32,
    /// Blood pressure outside the configured band
    pub blood_pressure_abnormal: bool,
    /// Glucose level (mg/dL)
    pub glucose_level: Option<f64>,
    /// Glucose outside the configured band
    pub glucose_abnormal: bool,
    /// Oxygen saturation (percentage, 0-100)
    pub oxygen_saturation: Option<u32>,
    /// Oxygen saturation below threshold
    pub oxygen_low: bool,
    /// Device raised an alert for this reading
    pub alert_triggered: bool,
    /// A caregiver was already notified
    pub caregiver_notified: bool,
}

impl HealthEvent {
    /// Short alias for the oxygen saturation reading
    pub fn spo2(&self) -> Option<u32> {
        self.oxygen_saturation
    }
}

impl MonitoringEvent for HealthEvent {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Impact force reported by the fall sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImpactLevel::Low => "Low",
            ImpactLevel::Medium => "Medium",
            ImpactLevel::High => "High",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(ImpactLevel::Low),
            "medium" => Some(ImpactLevel::Medium),
            "high" => Some(ImpactLevel::High),
            _ => None,
        }
    }
}

impl fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized movement / fall-detection record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    pub device_id: String,
    pub timestamp: NaiveDateTime,
    /// Movement activity (e.g. "Walking", "Sitting", "No Movement")
    pub movement_activity: Option<String>,
    pub fall_detected: bool,
    /// Impact force; absent when no fall was measured
    pub impact_force: Option<ImpactLevel>,
    /// Seconds of inactivity after a fall (0 when absent)
    pub inactivity_seconds: u32,
    /// Room where the event happened
    pub location: Option<String>,
    pub alert_triggered: bool,
    pub caregiver_notified: bool,
}

impl MonitoringEvent for SafetyEvent {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Kind of daily reminder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReminderType {
    Medication,
    Appointment,
    Exercise,
    Hydration,
    /// Any reminder kind outside the known set
    Other(String),
}

impl ReminderType {
    /// Reminder kinds with a dedicated feature column
    pub const KNOWN: [ReminderType; 4] = [
        ReminderType::Medication,
        ReminderType::Appointment,
        ReminderType::Exercise,
        ReminderType::Hydration,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ReminderType::Medication => "Medication",
            ReminderType::Appointment => "Appointment",
            ReminderType::Exercise => "Exercise",
            ReminderType::Hydration => "Hydration",
            ReminderType::Other(name) => name.as_str(),
        }
    }
}

impl From<String> for ReminderType {
    fn from(value: String) -> Self {
        match value.trim() {
            "Medication" => ReminderType::Medication,
            "Appointment" => ReminderType::Appointment,
            "Exercise" => ReminderType::Exercise,
            "Hydration" => ReminderType::Hydration,
            other => ReminderType::Other(other.to_string()),
        }
    }
}

impl From<ReminderType> for String {
    fn from(value: ReminderType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ReminderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized reminder record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderEvent {
    pub device_id: String,
    pub timestamp: NaiveDateTime,
    pub reminder_type: ReminderType,
    /// Time of day the reminder was scheduled for
    pub scheduled_time: NaiveTime,
    pub sent: bool,
    pub acknowledged: bool,
}

impl MonitoringEvent for ReminderEvent {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// Domain that produced an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertType {
    Health,
    Fall,
    Reminder,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Health => "Health",
            AlertType::Fall => "Fall",
            AlertType::Reminder => "Reminder",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert lifecycle status; only moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AlertStatus {
    Active,
    Notified,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "Active",
            AlertStatus::Notified => "Notified",
            AlertStatus::Resolved => "Resolved",
        }
    }

    /// Whether a stored alert may move from `self` to `next`
    pub fn can_transition_to(&self, next: AlertStatus) -> bool {
        next >= *self
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An alert derived from a single monitoring event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub device_id: String,
    pub alert_type: AlertType,
    /// Copied from the source event
    pub timestamp: NaiveDateTime,
    pub status: AlertStatus,
    /// Triggered reasons, human readable
    pub message: String,
    pub priority: Priority,
}

impl Alert {
    /// Identity used by alert stores to recognise a re-generated alert
    pub fn dedup_key(&self) -> AlertKey {
        AlertKey {
            device_id: self.device_id.clone(),
            alert_type: self.alert_type,
            timestamp: self.timestamp,
            message: self.message.clone(),
        }
    }
}

impl MonitoringEvent for Alert {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }
}

/// De-duplication key: device + type + timestamp + message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlertKey {
    pub device_id: String,
    pub alert_type: AlertType,
    pub timestamp: NaiveDateTime,
    pub message: String,
}

/// Discretized risk (or effectiveness) bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bounds (inclusive) of the Low and Medium buckets
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelBands {
    pub low_max: f64,
    pub medium_max: f64,
}

impl LevelBands {
    pub const fn new(low_max: f64, medium_max: f64) -> Self {
        Self { low_max, medium_max }
    }

    /// Bucket a score: `<= low_max` Low, `<= medium_max` Medium, else High
    pub fn level(&self, score: f64) -> RiskLevel {
        if score <= self.low_max {
            RiskLevel::Low
        } else if score <= self.medium_max {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// A source record augmented with a score in [0, 1] and its bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction<T> {
    #[serde(flatten)]
    pub record: T,
    pub score: f64,
    pub level: RiskLevel,
}

impl<T> RiskPrediction<T> {
    /// Degraded result used before training or after a failed inference
    pub fn sentinel(record: T) -> Self {
        Self {
            record,
            score: 0.0,
            level: RiskLevel::Low,
        }
    }
}

impl<T: MonitoringEvent> MonitoringEvent for RiskPrediction<T> {
    fn device_id(&self) -> &str {
        self.record.device_id()
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.record.timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bands_boundaries() {
        let bands = LevelBands::new(0.3, 0.7);
        assert_eq!(bands.level(0.0), RiskLevel::Low);
        assert_eq!(bands.level(0.3), RiskLevel::Low);
        assert_eq!(bands.level(0.31), RiskLevel::Medium);
        assert_eq!(bands.level(0.7), RiskLevel::Medium);
        assert_eq!(bands.level(0.71), RiskLevel::High);
        assert_eq!(bands.level(1.0), RiskLevel::High);
    }

    #[test]
    fn test_status_transitions_only_move_forward() {
        assert!(AlertStatus::Active.can_transition_to(AlertStatus::Notified));
        assert!(AlertStatus::Active.can_transition_to(AlertStatus::Resolved));
        assert!(AlertStatus::Notified.can_transition_to(AlertStatus::Resolved));
        assert!(AlertStatus::Resolved.can_transition_to(AlertStatus::Resolved));
        assert!(!AlertStatus::Resolved.can_transition_to(AlertStatus::Active));
        assert!(!AlertStatus::Notified.can_transition_to(AlertStatus::Active));
    }

    #[test]
    fn test_reminder_type_round_trips_through_string() {
        assert_eq!(ReminderType::from("Medication".to_string()), ReminderType::Medication);
        assert_eq!(
            ReminderType::from("Social Call".to_string()),
            ReminderType::Other("Social Call".to_string())
        );
        assert_eq!(String::from(ReminderType::Hydration), "Hydration");
    }

    #[test]
    fn test_impact_level_parse() {
        assert_eq!(ImpactLevel::parse(" high "), Some(ImpactLevel::High));
        assert_eq!(ImpactLevel::parse("Medium"), Some(ImpactLevel::Medium));
        assert_eq!(ImpactLevel::parse("severe"), None);
    }
}
