//! Summary statistics for the dashboard tiles
//!
//! Empty input always yields all-zero tiles.

use crate::types::{HealthEvent, ImpactLevel, ReminderEvent, ReminderType, SafetyEvent};
use serde::{Deserialize, Serialize};

/// Percentage of health readings with each threshold flag set (rounded)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStats {
    pub abnormal_hr: u32,
    pub abnormal_bp: u32,
    pub abnormal_glucose: u32,
    pub low_spo2: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyStats {
    pub fall_count: usize,
    pub high_impact_falls: usize,
    /// Mean post-fall inactivity over detected falls (seconds)
    pub avg_inactivity_duration: f64,
    pub alerts_triggered: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReminderStats {
    pub medication_count: usize,
    pub appointment_count: usize,
    /// Percentage of reminders that were sent
    pub sent_rate: f64,
    /// Percentage of sent reminders that were acknowledged
    pub ack_rate: f64,
}

/// All three tile groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub health: HealthStats,
    pub safety: SafetyStats,
    pub reminders: ReminderStats,
}

pub fn health_stats(events: &[HealthEvent]) -> HealthStats {
    let pct = |flag: fn(&HealthEvent) -> bool| -> u32 {
        let rate = percentage(events.iter().filter(|e| flag(e)).count(), events.len());
        rate.round_ties_even() as u32
    };

    HealthStats {
        abnormal_hr: pct(|e| e.heart_rate_abnormal),
        abnormal_bp: pct(|e| e.blood_pressure_abnormal),
        abnormal_glucose: pct(|e| e.glucose_abnormal),
        low_spo2: pct(|e| e.oxygen_low),
    }
}

pub fn safety_stats(events: &[SafetyEvent]) -> SafetyStats {
    let falls: Vec<&SafetyEvent> = events.iter().filter(|e| e.fall_detected).collect();

    let avg_inactivity_duration = if falls.is_empty() {
        0.0
    } else {
        falls.iter().map(|e| e.inactivity_seconds as f64).sum::<f64>() / falls.len() as f64
    };

    SafetyStats {
        fall_count: falls.len(),
        high_impact_falls: falls
            .iter()
            .filter(|e| e.impact_force == Some(ImpactLevel::High))
            .count(),
        avg_inactivity_duration,
        alerts_triggered: events.iter().filter(|e| e.alert_triggered).count(),
    }
}

pub fn reminder_stats(events: &[ReminderEvent]) -> ReminderStats {
    let count_of = |kind: &ReminderType| events.iter().filter(|e| &e.reminder_type == kind).count();
    let sent = events.iter().filter(|e| e.sent).count();
    let acknowledged = events.iter().filter(|e| e.sent && e.acknowledged).count();

    ReminderStats {
        medication_count: count_of(&ReminderType::Medication),
        appointment_count: count_of(&ReminderType::Appointment),
        sent_rate: percentage(sent, events.len()),
        ack_rate: percentage(acknowledged, sent),
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
