//! Alert rule engine
//!
//! Scans normalized events for alert-triggering conditions and builds
//! prioritized alerts. Each domain has its own rule; the combined list is
//! ordered most recent first.
//!
//! An event that cannot be turned into an alert (a threshold flag with no
//! reading, a fall with no location) is skipped with a warning and reported in
//! [`AlertReport::skipped`]; the remaining events are still processed.

use crate::error::RuleError;
use crate::types::{
    Alert, AlertStatus, AlertType, HealthEvent, Priority, ReminderEvent, ReminderType,
    SafetyEvent,
};
use tracing::warn;

/// Inactivity after a fall above which the alert is escalated
pub const FALL_INACTIVITY_ESCALATION_SECS: u32 = 300;

/// Alerts produced by one engine pass plus the events that were skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertReport {
    pub alerts: Vec<Alert>,
    pub skipped: Vec<RuleError>,
}

/// Rule engine over the three monitoring domains
pub struct AlertEngine;

impl AlertEngine {
    /// Generate alerts for every supplied domain, most recent first.
    ///
    /// An absent domain contributes no alerts. Ties on timestamp keep the
    /// health, safety, reminder order of generation.
    pub fn generate_alerts(
        health: Option<&[HealthEvent]>,
        safety: Option<&[SafetyEvent]>,
        reminders: Option<&[ReminderEvent]>,
    ) -> AlertReport {
        let mut report = AlertReport::default();

        if let Some(events) = health {
            collect(&mut report, events.iter().map(health_alert));
        }
        if let Some(events) = safety {
            collect(&mut report, events.iter().map(fall_alert));
        }
        if let Some(events) = reminders {
            collect(&mut report, events.iter().map(|e| Ok(reminder_alert(e))));
        }

        // sort_by is stable
        report
            .alerts
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        report
    }
}

/// Convenience wrapper returning only the ordered alerts
pub fn generate_alerts(
    health: Option<&[HealthEvent]>,
    safety: Option<&[SafetyEvent]>,
    reminders: Option<&[ReminderEvent]>,
) -> Vec<Alert> {
    AlertEngine::generate_alerts(health, safety, reminders).alerts
}

fn collect(
    report: &mut AlertReport,
    results: impl Iterator<Item = Result<Option<Alert>, RuleError>>,
) {
    for result in results {
        match result {
            Ok(Some(alert)) => report.alerts.push(alert),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "skipping event during alert generation");
                report.skipped.push(e);
            }
        }
    }
}

fn status_for(caregiver_notified: bool) -> AlertStatus {
    if caregiver_notified {
        AlertStatus::Notified
    } else {
        AlertStatus::Active
    }
}

/// Health rule: one reason per breached threshold, High when two or more
pub fn health_alert(event: &HealthEvent) -> Result<Option<Alert>, RuleError> {
    if !event.alert_triggered {
        return Ok(None);
    }

    let missing = |field: &'static str| RuleError::MissingReading {
        device_id: event.device_id.clone(),
        timestamp: event.timestamp,
        field,
    };

    let mut reasons = Vec::new();
    if event.heart_rate_abnormal {
        let hr = event.heart_rate.ok_or_else(|| missing("heart_rate"))?;
        reasons.push(format!("Abnormal heart rate: {}", hr));
    }
    if event.blood_pressure_abnormal {
        reasons.push(format!("Abnormal blood pressure: {}", event.blood_pressure));
    }
    if event.glucose_abnormal {
        let glucose = event.glucose_level.ok_or_else(|| missing("glucose_level"))?;
        reasons.push(format!("Abnormal glucose level: {}", glucose));
    }
    if event.oxygen_low {
        let spo2 = event.spo2().ok_or_else(|| missing("oxygen_saturation"))?;
        reasons.push(format!("Low oxygen saturation: {}%", spo2));
    }

    let priority = if reasons.len() >= 2 {
        Priority::High
    } else {
        Priority::Medium
    };

    Ok(Some(Alert {
        device_id: event.device_id.clone(),
        alert_type: AlertType::Health,
        timestamp: event.timestamp,
        status: status_for(event.caregiver_notified),
        message: reasons.join("; "),
        priority,
    }))
}

/// Safety rule: every detected fall raises an alert
pub fn fall_alert(event: &SafetyEvent) -> Result<Option<Alert>, RuleError> {
    if !event.fall_detected {
        return Ok(None);
    }

    let location = event
        .location
        .as_deref()
        .ok_or_else(|| RuleError::MissingField {
            device_id: event.device_id.clone(),
            timestamp: event.timestamp,
            field: "location",
        })?;
    let impact = event.impact_force.map(|i| i.as_str()).unwrap_or("");

    let escalated = impact == "High" || event.inactivity_seconds > FALL_INACTIVITY_ESCALATION_SECS;

    Ok(Some(Alert {
        device_id: event.device_id.clone(),
        alert_type: AlertType::Fall,
        timestamp: event.timestamp,
        status: status_for(event.caregiver_notified),
        message: format!(
            "Fall detected in {} with {} impact. {} seconds of inactivity.",
            location, impact, event.inactivity_seconds
        ),
        priority: if escalated { Priority::High } else { Priority::Medium },
    }))
}

/// Reminder rule: unacknowledged medication and appointment reminders only
pub fn reminder_alert(event: &ReminderEvent) -> Option<Alert> {
    if !event.sent || event.acknowledged {
        return None;
    }

    let priority = match event.reminder_type {
        ReminderType::Medication => Priority::Medium,
        ReminderType::Appointment => Priority::Low,
        _ => return None,
    };

    Some(Alert {
        device_id: event.device_id.clone(),
        alert_type: AlertType::Reminder,
        timestamp: event.timestamp,
        status: AlertStatus::Active,
        message: format!(
            "{} reminder scheduled for {} was not acknowledged.",
            event.reminder_type,
            event.scheduled_time.format("%H:%M:%S")
        ),
        priority,
    })
}

/// Advisory check consulted before contacting a caregiver.
///
/// Medication reminder alerts never qualify on their own; a repeated-miss rule
/// would go here.
pub fn should_notify_caregiver(alert: &Alert) -> bool {
    if alert.priority == Priority::High {
        return true;
    }

    match alert.alert_type {
        AlertType::Health => alert.message.to_lowercase().contains("heart rate"),
        AlertType::Fall => alert.message.contains("High") || alert.message.contains("Medium"),
        AlertType::Reminder => false,
    }
}
