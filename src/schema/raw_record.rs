//! Raw monitoring record schema
//!
//! Boundary shape of the three monitoring exports (health, safety, reminder).
//! Field names follow the export column headers; snake_case aliases are accepted
//! so hand-written JSON fixtures stay readable. Values are loosely typed here and
//! only become typed in the normalizer.

use serde::{Deserialize, Serialize};

/// Loosely-typed cell value as it appears in an export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Number(f64),
    Text(String),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl FieldValue {
    /// Textual rendering used in error messages and string-typed fields
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Boolean(b) => b.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    /// Empty strings are treated like missing cells
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Text(s) if s.trim().is_empty())
    }
}

/// One row of the health monitoring export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawHealthRecord {
    #[serde(rename = "Device-ID/User-ID", alias = "device_id")]
    pub device_id: Option<FieldValue>,
    #[serde(rename = "Timestamp", alias = "timestamp")]
    pub timestamp: Option<FieldValue>,
    #[serde(rename = "Heart Rate", alias = "heart_rate", skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<FieldValue>,
    #[serde(
        rename = "Heart Rate Below/Above Threshold (Yes/No)",
        alias = "heart_rate_abnormal",
        skip_serializing_if = "Option::is_none"
    )]
    pub heart_rate_abnormal: Option<FieldValue>,
    #[serde(rename = "Blood Pressure", alias = "blood_pressure")]
    pub blood_pressure: Option<FieldValue>,
    #[serde(
        rename = "Blood Pressure Below/Above Threshold (Yes/No)",
        alias = "blood_pressure_abnormal",
        skip_serializing_if = "Option::is_none"
    )]
    pub blood_pressure_abnormal: Option<FieldValue>,
    #[serde(rename = "Glucose Levels", alias = "glucose_level", skip_serializing_if = "Option::is_none")]
    pub glucose_level: Option<FieldValue>,
    #[serde(
        rename = "Glucose Levels Below/Above Threshold (Yes/No)",
        alias = "glucose_abnormal",
        skip_serializing_if = "Option::is_none"
    )]
    pub glucose_abnormal: Option<FieldValue>,
    #[serde(
        rename = "Oxygen Saturation (SpO₂%)",
        alias = "oxygen_saturation",
        skip_serializing_if = "Option::is_none"
    )]
    pub oxygen_saturation: Option<FieldValue>,
    #[serde(
        rename = "SpO₂ Below Threshold (Yes/No)",
        alias = "oxygen_low",
        skip_serializing_if = "Option::is_none"
    )]
    pub oxygen_low: Option<FieldValue>,
    #[serde(
        rename = "Alert Triggered (Yes/No)",
        alias = "alert_triggered",
        skip_serializing_if = "Option::is_none"
    )]
    pub alert_triggered: Option<FieldValue>,
    #[serde(
        rename = "Caregiver Notified (Yes/No)",
        alias = "caregiver_notified",
        skip_serializing_if = "Option::is_none"
    )]
    pub caregiver_notified: Option<FieldValue>,
}

/// One row of the safety monitoring export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSafetyRecord {
    #[serde(rename = "Device-ID/User-ID", alias = "device_id")]
    pub device_id: Option<FieldValue>,
    #[serde(rename = "Timestamp", alias = "timestamp")]
    pub timestamp: Option<FieldValue>,
    #[serde(
        rename = "Movement Activity",
        alias = "movement_activity",
        skip_serializing_if = "Option::is_none"
    )]
    pub movement_activity: Option<FieldValue>,
    #[serde(
        rename = "Fall Detected (Yes/No)",
        alias = "fall_detected",
        skip_serializing_if = "Option::is_none"
    )]
    pub fall_detected: Option<FieldValue>,
    #[serde(
        rename = "Impact Force Level",
        alias = "impact_force",
        skip_serializing_if = "Option::is_none"
    )]
    pub impact_force: Option<FieldValue>,
    #[serde(
        rename = "Post-Fall Inactivity Duration (Seconds)",
        alias = "inactivity_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub inactivity_seconds: Option<FieldValue>,
    #[serde(rename = "Location", alias = "location", skip_serializing_if = "Option::is_none")]
    pub location: Option<FieldValue>,
    #[serde(
        rename = "Alert Triggered (Yes/No)",
        alias = "alert_triggered",
        skip_serializing_if = "Option::is_none"
    )]
    pub alert_triggered: Option<FieldValue>,
    #[serde(
        rename = "Caregiver Notified (Yes/No)",
        alias = "caregiver_notified",
        skip_serializing_if = "Option::is_none"
    )]
    pub caregiver_notified: Option<FieldValue>,
}

/// One row of the daily reminder export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReminderRecord {
    #[serde(rename = "Device-ID/User-ID", alias = "device_id")]
    pub device_id: Option<FieldValue>,
    #[serde(rename = "Timestamp", alias = "timestamp")]
    pub timestamp: Option<FieldValue>,
    #[serde(rename = "Reminder Type", alias = "reminder_type")]
    pub reminder_type: Option<FieldValue>,
    #[serde(rename = "Scheduled Time", alias = "scheduled_time")]
    pub scheduled_time: Option<FieldValue>,
    #[serde(
        rename = "Reminder Sent (Yes/No)",
        alias = "sent",
        skip_serializing_if = "Option::is_none"
    )]
    pub sent: Option<FieldValue>,
    #[serde(
        rename = "Acknowledged (Yes/No)",
        alias = "acknowledged",
        skip_serializing_if = "Option::is_none"
    )]
    pub acknowledged: Option<FieldValue>,
}

/// Which export a batch came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Health,
    Safety,
    Reminder,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Health => "health",
            Domain::Safety => "safety",
            Domain::Reminder => "reminder",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export_column_names() {
        let json = r#"{
            "Device-ID/User-ID": "D1000",
            "Timestamp": "2025-01-01 08:00:00",
            "Heart Rate": 72,
            "Heart Rate Below/Above Threshold (Yes/No)": "No",
            "Blood Pressure": "120/80",
            "Oxygen Saturation (SpO₂%)": 97,
            "Alert Triggered (Yes/No)": "No"
        }"#;

        let record: RawHealthRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.device_id, Some(FieldValue::Text("D1000".to_string())));
        assert_eq!(record.heart_rate, Some(FieldValue::Integer(72)));
        assert_eq!(record.oxygen_saturation, Some(FieldValue::Integer(97)));
        assert!(record.glucose_level.is_none());
    }

    #[test]
    fn test_parse_snake_case_aliases() {
        let json = r#"{
            "device_id": "D2",
            "timestamp": "2025-01-01T10:00:00",
            "fall_detected": true,
            "inactivity_seconds": 45.0,
            "location": "Bathroom"
        }"#;

        let record: RawSafetyRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.fall_detected, Some(FieldValue::Boolean(true)));
        assert_eq!(record.inactivity_seconds, Some(FieldValue::Number(45.0)));
    }

    #[test]
    fn test_blank_text_is_blank() {
        assert!(FieldValue::from("  ").is_blank());
        assert!(!FieldValue::from("Low").is_blank());
        assert!(!FieldValue::from(0i64).is_blank());
    }
}
