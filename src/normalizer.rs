//! Record normalization
//!
//! This module coerces raw export rows into typed monitoring events.
//! - Timestamps parsed into a single instant type (calendar date derived on demand)
//! - Blood pressure split into systolic / diastolic
//! - Yes/No flags converted to booleans
//! - Missing post-fall inactivity filled with 0
//! - Scheduled reminder time parsed into a time of day
//!
//! Malformed values fail fast with [`CareError::MalformedField`]; the caller
//! decides whether to skip the row or abort the batch.

use crate::error::CareError;
use crate::schema::{
    Domain, FieldValue, RawHealthRecord, RawReminderRecord, RawSafetyRecord,
};
use crate::types::{HealthEvent, ImpactLevel, ReminderEvent, ReminderType, SafetyEvent};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

/// Timestamp layouts accepted on input, tried in order
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Layout used when writing timestamps back out
const TIMESTAMP_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

const TIME_OF_DAY_FORMATS: [&str; 2] = ["%H:%M:%S%.f", "%H:%M"];

/// Normalizer for converting raw export rows to typed events
pub struct Normalizer;

impl Normalizer {
    /// Normalize a health batch, failing on the first malformed row
    pub fn normalize_health(records: &[RawHealthRecord]) -> Result<Vec<HealthEvent>, CareError> {
        normalize_batch(records, Self::health_record)
    }

    /// Normalize a safety batch, failing on the first malformed row
    pub fn normalize_safety(records: &[RawSafetyRecord]) -> Result<Vec<SafetyEvent>, CareError> {
        normalize_batch(records, Self::safety_record)
    }

    /// Normalize a reminder batch, failing on the first malformed row
    pub fn normalize_reminders(
        records: &[RawReminderRecord],
    ) -> Result<Vec<ReminderEvent>, CareError> {
        normalize_batch(records, Self::reminder_record)
    }

    /// Normalize a single health row
    pub fn health_record(record: &RawHealthRecord) -> Result<HealthEvent, CareError> {
        let device_id = required_text("Device-ID/User-ID", record.device_id.as_ref())?;
        let timestamp = required_timestamp(record.timestamp.as_ref())?;

        let blood_pressure = required_text("Blood Pressure", record.blood_pressure.as_ref())?;
        let (systolic, diastolic) = split_blood_pressure(&blood_pressure)?;

        Ok(HealthEvent {
            device_id,
            timestamp,
            heart_rate: parse_count("Heart Rate", record.heart_rate.as_ref())?,
            heart_rate_abnormal: parse_flag(
                "Heart Rate Below/Above Threshold (Yes/No)",
                record.heart_rate_abnormal.as_ref(),
            )?,
            blood_pressure: format!("{}/{}", systolic, diastolic),
            systolic,
            diastolic,
            blood_pressure_abnormal: parse_flag(
                "Blood Pressure Below/Above Threshold (Yes/No)",
                record.blood_pressure_abnormal.as_ref(),
            )?,
            glucose_level: parse_number("Glucose Levels", record.glucose_level.as_ref())?,
            glucose_abnormal: parse_flag(
                "Glucose Levels Below/Above Threshold (Yes/No)",
                record.glucose_abnormal.as_ref(),
            )?,
            oxygen_saturation: parse_count(
                "Oxygen Saturation (SpO₂%)",
                record.oxygen_saturation.as_ref(),
            )?,
            oxygen_low: parse_flag("SpO₂ Below Threshold (Yes/No)", record.oxygen_low.as_ref())?,
            alert_triggered: parse_flag(
                "Alert Triggered (Yes/No)",
                record.alert_triggered.as_ref(),
            )?,
            caregiver_notified: parse_flag(
                "Caregiver Notified (Yes/No)",
                record.caregiver_notified.as_ref(),
            )?,
        })
    }

    /// Normalize a single safety row
    pub fn safety_record(record: &RawSafetyRecord) -> Result<SafetyEvent, CareError> {
        let device_id = required_text("Device-ID/User-ID", record.device_id.as_ref())?;
        let timestamp = required_timestamp(record.timestamp.as_ref())?;

        let impact_force = match optional_text(record.impact_force.as_ref()) {
            None => None,
            Some(text) => Some(ImpactLevel::parse(&text).ok_or_else(|| {
                CareError::malformed(
                    "Impact Force Level",
                    text.clone(),
                    "expected Low, Medium or High",
                )
            })?),
        };

        let inactivity_seconds = parse_duration_seconds(
            "Post-Fall Inactivity Duration (Seconds)",
            record.inactivity_seconds.as_ref(),
        )?
        .unwrap_or(0);

        Ok(SafetyEvent {
            device_id,
            timestamp,
            movement_activity: optional_text(record.movement_activity.as_ref()),
            fall_detected: parse_flag("Fall Detected (Yes/No)", record.fall_detected.as_ref())?,
            impact_force,
            inactivity_seconds,
            location: optional_text(record.location.as_ref()),
            alert_triggered: parse_flag(
                "Alert Triggered (Yes/No)",
                record.alert_triggered.as_ref(),
            )?,
            caregiver_notified: parse_flag(
                "Caregiver Notified (Yes/No)",
                record.caregiver_notified.as_ref(),
            )?,
        })
    }

    /// Normalize a single reminder row
    pub fn reminder_record(record: &RawReminderRecord) -> Result<ReminderEvent, CareError> {
        let device_id = required_text("Device-ID/User-ID", record.device_id.as_ref())?;
        let timestamp = required_timestamp(record.timestamp.as_ref())?;
        let reminder_type = required_text("Reminder Type", record.reminder_type.as_ref())?;
        let scheduled = required_text("Scheduled Time", record.scheduled_time.as_ref())?;

        Ok(ReminderEvent {
            device_id,
            timestamp,
            reminder_type: ReminderType::from(reminder_type),
            scheduled_time: parse_time_of_day(&scheduled)?,
            sent: parse_flag("Reminder Sent (Yes/No)", record.sent.as_ref())?,
            acknowledged: parse_flag("Acknowledged (Yes/No)", record.acknowledged.as_ref())?,
        })
    }

    /// Check every health row, collecting problems instead of stopping
    pub fn validate_health(records: &[RawHealthRecord]) -> Vec<RowIssue> {
        validate_batch(Domain::Health, records, Self::health_record, |r| {
            r.device_id.as_ref()
        })
    }

    /// Check every safety row, collecting problems instead of stopping
    pub fn validate_safety(records: &[RawSafetyRecord]) -> Vec<RowIssue> {
        validate_batch(Domain::Safety, records, Self::safety_record, |r| {
            r.device_id.as_ref()
        })
    }

    /// Check every reminder row, collecting problems instead of stopping
    pub fn validate_reminders(records: &[RawReminderRecord]) -> Vec<RowIssue> {
        validate_batch(Domain::Reminder, records, Self::reminder_record, |r| {
            r.device_id.as_ref()
        })
    }
}

/// A row that failed normalization
#[derive(Debug, Clone, Serialize)]
pub struct RowIssue {
    pub domain: Domain,
    pub index: usize,
    pub device_id: Option<String>,
    pub error: String,
}

fn normalize_batch<R, E>(
    records: &[R],
    normalize: impl Fn(&R) -> Result<E, CareError>,
) -> Result<Vec<E>, CareError> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| normalize(record).map_err(|e| at_row(idx, e)))
        .collect()
}

fn validate_batch<R, E>(
    domain: Domain,
    records: &[R],
    normalize: impl Fn(&R) -> Result<E, CareError>,
    device_of: impl Fn(&R) -> Option<&FieldValue>,
) -> Vec<RowIssue> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| {
            normalize(record).err().map(|e| RowIssue {
                domain,
                index,
                device_id: device_of(record).map(FieldValue::to_text),
                error: e.to_string(),
            })
        })
        .collect()
}

fn at_row(idx: usize, err: CareError) -> CareError {
    match err {
        CareError::MalformedField {
            field,
            value,
            reason,
        } => CareError::MalformedField {
            field,
            value,
            reason: format!("row {}: {}", idx, reason),
        },
        CareError::MissingField(field) => CareError::MissingField(format!("{} (row {})", field, idx)),
        other => other,
    }
}

/// Parse a timestamp in any of the accepted layouts
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, CareError> {
    let trimmed = value.trim();

    for format in TIMESTAMP_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }

    Err(CareError::malformed(
        "Timestamp",
        trimmed,
        "unrecognised date/time layout",
    ))
}

/// Parse a reminder's scheduled time of day ("HH:MM:SS" or "HH:MM")
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, CareError> {
    let trimmed = value.trim();
    TIME_OF_DAY_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| CareError::malformed("Scheduled Time", trimmed, "expected HH:MM:SS"))
}

/// Split a "SSS/DDD" blood-pressure reading into positive integers
pub fn split_blood_pressure(value: &str) -> Result<(u32, u32), CareError> {
    let trimmed = value.trim();
    let malformed = || CareError::malformed("Blood Pressure", trimmed, "expected N/N");

    let (systolic, diastolic) = trimmed.split_once('/').ok_or_else(malformed)?;
    let parse_part = |part: &str| -> Result<u32, CareError> {
        let part = part.trim();
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }
        match part.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(malformed()),
        }
    };

    Ok((parse_part(systolic)?, parse_part(diastolic)?))
}

fn required_text(field: &str, value: Option<&FieldValue>) -> Result<String, CareError> {
    optional_text(value).ok_or_else(|| CareError::MissingField(field.to_string()))
}

fn optional_text(value: Option<&FieldValue>) -> Option<String> {
    value
        .filter(|v| !v.is_blank())
        .map(|v| v.to_text().trim().to_string())
}

fn required_timestamp(value: Option<&FieldValue>) -> Result<NaiveDateTime, CareError> {
    match value.filter(|v| !v.is_blank()) {
        None => Err(CareError::MissingField("Timestamp".to_string())),
        Some(FieldValue::Text(text)) => parse_timestamp(text),
        Some(other) => Err(CareError::malformed(
            "Timestamp",
            other.to_text(),
            "expected a date/time string",
        )),
    }
}

/// Yes/No flag; a missing cell reads as "No"
fn parse_flag(field: &str, value: Option<&FieldValue>) -> Result<bool, CareError> {
    match value.filter(|v| !v.is_blank()) {
        None => Ok(false),
        Some(FieldValue::Boolean(b)) => Ok(*b),
        Some(FieldValue::Integer(0)) => Ok(false),
        Some(FieldValue::Integer(1)) => Ok(true),
        Some(FieldValue::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "yes" | "y" | "true" | "1" => Ok(true),
            "no" | "n" | "false" | "0" => Ok(false),
            _ => Err(CareError::malformed(field, text.clone(), "expected Yes or No")),
        },
        Some(other) => Err(CareError::malformed(field, other.to_text(), "expected Yes or No")),
    }
}

fn parse_number(field: &str, value: Option<&FieldValue>) -> Result<Option<f64>, CareError> {
    let number = match value.filter(|v| !v.is_blank()) {
        None => return Ok(None),
        Some(FieldValue::Integer(i)) => *i as f64,
        Some(FieldValue::Number(n)) => *n,
        Some(FieldValue::Text(text)) => text
            .trim()
            .trim_end_matches('%')
            .parse::<f64>()
            .map_err(|_| CareError::malformed(field, text.clone(), "expected a number"))?,
        Some(other) => {
            return Err(CareError::malformed(field, other.to_text(), "expected a number"))
        }
    };

    if !number.is_finite() {
        return Err(CareError::malformed(field, number.to_string(), "expected a finite number"));
    }
    Ok(Some(number))
}

/// Whole, non-negative reading such as heart rate or SpO2
fn parse_count(field: &str, value: Option<&FieldValue>) -> Result<Option<u32>, CareError> {
    match parse_number(field, value)? {
        None => Ok(None),
        Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(Some(n as u32)),
        Some(n) => Err(CareError::malformed(
            field,
            n.to_string(),
            "expected a non-negative whole number",
        )),
    }
}

/// Non-negative seconds; fractional seconds are truncated
fn parse_duration_seconds(field: &str, value: Option<&FieldValue>) -> Result<Option<u32>, CareError> {
    match parse_number(field, value)? {
        None => Ok(None),
        Some(n) if n >= 0.0 && n <= u32::MAX as f64 => Ok(Some(n.trunc() as u32)),
        Some(n) => Err(CareError::malformed(field, n.to_string(), "expected seconds >= 0")),
    }
}

fn format_timestamp(ts: &NaiveDateTime) -> FieldValue {
    FieldValue::Text(ts.format(TIMESTAMP_OUTPUT_FORMAT).to_string())
}

impl From<&HealthEvent> for RawHealthRecord {
    fn from(event: &HealthEvent) -> Self {
        RawHealthRecord {
            device_id: Some(FieldValue::from(event.device_id.as_str())),
            timestamp: Some(format_timestamp(&event.timestamp)),
            heart_rate: event.heart_rate.map(|v| FieldValue::Integer(v as i64)),
            heart_rate_abnormal: Some(event.heart_rate_abnormal.into()),
            blood_pressure: Some(FieldValue::from(event.blood_pressure.as_str())),
            blood_pressure_abnormal: Some(event.blood_pressure_abnormal.into()),
            glucose_level: event.glucose_level.map(FieldValue::Number),
            glucose_abnormal: Some(event.glucose_abnormal.into()),
            oxygen_saturation: event.oxygen_saturation.map(|v| FieldValue::Integer(v as i64)),
            oxygen_low: Some(event.oxygen_low.into()),
            alert_triggered: Some(event.alert_triggered.into()),
            caregiver_notified: Some(event.caregiver_notified.into()),
        }
    }
}

impl From<&SafetyEvent> for RawSafetyRecord {
    fn from(event: &SafetyEvent) -> Self {
        RawSafetyRecord {
            device_id: Some(FieldValue::from(event.device_id.as_str())),
            timestamp: Some(format_timestamp(&event.timestamp)),
            movement_activity: event.movement_activity.clone().map(FieldValue::Text),
            fall_detected: Some(event.fall_detected.into()),
            impact_force: event.impact_force.map(|i| FieldValue::from(i.as_str())),
            inactivity_seconds: Some(FieldValue::Integer(event.inactivity_seconds as i64)),
            location: event.location.clone().map(FieldValue::Text),
            alert_triggered: Some(event.alert_triggered.into()),
            caregiver_notified: Some(event.caregiver_notified.into()),
        }
    }
}

impl From<&ReminderEvent> for RawReminderRecord {
    fn from(event: &ReminderEvent) -> Self {
        RawReminderRecord {
            device_id: Some(FieldValue::from(event.device_id.as_str())),
            timestamp: Some(format_timestamp(&event.timestamp)),
            reminder_type: Some(FieldValue::from(event.reminder_type.as_str())),
            scheduled_time: Some(FieldValue::Text(
                event.scheduled_time.format("%H:%M:%S%.f").to_string(),
            )),
            sent: Some(event.sent.into()),
            acknowledged: Some(event.acknowledged.into()),
        }
    }
}
