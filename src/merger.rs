//! Cross-domain merge
//!
//! Joins health, safety and reminder events on (device, calendar date) with an
//! outer join. Within one key every combination of the three domains' events
//! becomes a row; a domain with no events for the key contributes `None`.
//! Rows are ordered by device, then date, then health/safety/reminder input
//! order.

use crate::types::{HealthEvent, MonitoringEvent, ReminderEvent, SafetyEvent};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the merged analysis table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRow {
    pub device_id: String,
    pub date: NaiveDate,
    /// Timestamp of the first event present in the row
    pub timestamp: NaiveDateTime,
    pub health: Option<HealthEvent>,
    pub safety: Option<SafetyEvent>,
    pub reminder: Option<ReminderEvent>,
    pub has_health_alert: bool,
    pub has_safety_alert: bool,
    pub has_any_alert: bool,
}

impl MonitoringEvent for MergedRow {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn date(&self) -> NaiveDate {
        self.date
    }
}

#[derive(Default)]
struct KeyGroup<'a> {
    health: Vec<&'a HealthEvent>,
    safety: Vec<&'a SafetyEvent>,
    reminders: Vec<&'a ReminderEvent>,
}

/// Build the merged table used as the health-risk feature source
pub fn merge(
    health: &[HealthEvent],
    safety: &[SafetyEvent],
    reminders: &[ReminderEvent],
) -> Vec<MergedRow> {
    let mut groups: BTreeMap<(String, NaiveDate), KeyGroup<'_>> = BTreeMap::new();

    for event in health {
        groups.entry(key_of(event)).or_default().health.push(event);
    }
    for event in safety {
        groups.entry(key_of(event)).or_default().safety.push(event);
    }
    for event in reminders {
        groups.entry(key_of(event)).or_default().reminders.push(event);
    }

    let mut rows = Vec::new();
    for ((device_id, date), group) in groups {
        let health_side = or_missing(&group.health);
        let safety_side = or_missing(&group.safety);
        let reminder_side = or_missing(&group.reminders);

        for h in &health_side {
            for s in &safety_side {
                for r in &reminder_side {
                    rows.push(build_row(&device_id, date, *h, *s, *r));
                }
            }
        }
    }
    rows
}

fn key_of<E: MonitoringEvent>(event: &E) -> (String, NaiveDate) {
    (event.device_id().to_string(), event.date())
}

/// A domain with no events still takes part in the product once
fn or_missing<'a, T>(events: &[&'a T]) -> Vec<Option<&'a T>> {
    if events.is_empty() {
        vec![None]
    } else {
        events.iter().map(|e| Some(*e)).collect()
    }
}

fn build_row(
    device_id: &str,
    date: NaiveDate,
    health: Option<&HealthEvent>,
    safety: Option<&SafetyEvent>,
    reminder: Option<&ReminderEvent>,
) -> MergedRow {
    let has_health_alert = health.map_or(false, |h| h.alert_triggered);
    let has_safety_alert = safety.map_or(false, |s| s.alert_triggered);

    // the group exists, so at least one side is present
    let timestamp = health
        .map(|h| h.timestamp)
        .or_else(|| safety.map(|s| s.timestamp))
        .or_else(|| reminder.map(|r| r.timestamp))
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN));

    MergedRow {
        device_id: device_id.to_string(),
        date,
        timestamp,
        health: health.cloned(),
        safety: safety.cloned(),
        reminder: reminder.cloned(),
        has_health_alert,
        has_safety_alert,
        has_any_alert: has_health_alert || has_safety_alert,
    }
}
