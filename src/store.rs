//! Alert persistence boundary
//!
//! [`AlertSink`] is the write-through store the session saves alerts into.
//! Writes report success as a `bool`; the caller logs failures and moves on.
//! [`MemoryAlertStore`] is the in-process implementation. It treats device,
//! type, timestamp and message as the alert identity, so saving the same
//! alert on every refresh does not create duplicates.

use crate::types::{Alert, AlertKey, AlertStatus};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// An alert as held by a store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAlert {
    pub id: Uuid,
    #[serde(flatten)]
    pub alert: Alert,
}

pub trait AlertSink {
    /// Persist an alert; `true` if it is stored after the call
    fn save(&mut self, alert: &Alert) -> bool;

    /// Move a stored alert to `status`; `false` if unknown or not allowed
    fn update_status(&mut self, id: &Uuid, status: AlertStatus) -> bool;

    /// Every stored alert in insertion order
    fn list_all(&self) -> Vec<StoredAlert>;

    /// Id of the stored alert with the same identity
    fn find(&self, alert: &Alert) -> Option<Uuid>;

    /// Status of the stored alert with the same identity
    fn status_of(&self, alert: &Alert) -> Option<AlertStatus>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryAlertStore {
    alerts: Vec<StoredAlert>,
    by_key: HashMap<AlertKey, usize>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }

    pub fn get(&self, id: &Uuid) -> Option<&StoredAlert> {
        self.alerts.iter().find(|a| &a.id == id)
    }
}

impl AlertSink for MemoryAlertStore {
    fn save(&mut self, alert: &Alert) -> bool {
        let key = alert.dedup_key();
        if self.by_key.contains_key(&key) {
            // the stored status may have moved on; keep it
            debug!(device_id = %alert.device_id, "alert already stored");
            return true;
        }

        self.by_key.insert(key, self.alerts.len());
        self.alerts.push(StoredAlert {
            id: Uuid::new_v4(),
            alert: alert.clone(),
        });
        true
    }

    fn update_status(&mut self, id: &Uuid, status: AlertStatus) -> bool {
        match self.alerts.iter_mut().find(|a| &a.id == id) {
            Some(stored) if stored.alert.status.can_transition_to(status) => {
                stored.alert.status = status;
                true
            }
            _ => false,
        }
    }

    fn list_all(&self) -> Vec<StoredAlert> {
        self.alerts.clone()
    }

    fn find(&self, alert: &Alert) -> Option<Uuid> {
        self.by_key
            .get(&alert.dedup_key())
            .map(|&idx| self.alerts[idx].id)
    }

    fn status_of(&self, alert: &Alert) -> Option<AlertStatus> {
        self.by_key
            .get(&alert.dedup_key())
            .map(|&idx| self.alerts[idx].alert.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertType, Priority};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn alert(message: &str) -> Alert {
        Alert {
            device_id: "U1".to_string(),
            alert_type: AlertType::Health,
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 15)
                .unwrap()
                .and_hms_opt(8, 30, 0)
                .unwrap(),
            status: AlertStatus::Active,
            message: message.to_string(),
            priority: Priority::Medium,
        }
    }

    #[test]
    fn test_save_deduplicates() {
        let mut store = MemoryAlertStore::new();
        assert!(store.save(&alert("Abnormal heart rate: 180")));
        assert!(store.save(&alert("Abnormal heart rate: 180")));
        assert!(store.save(&alert("Abnormal glucose level: 250")));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_resave_keeps_advanced_status() {
        let mut store = MemoryAlertStore::new();
        let a = alert("Abnormal heart rate: 180");
        store.save(&a);
        let id = store.find(&a).unwrap();
        assert!(store.update_status(&id, AlertStatus::Resolved));

        store.save(&a);
        assert_eq!(store.get(&id).unwrap().alert.status, AlertStatus::Resolved);
        assert_eq!(store.status_of(&a), Some(AlertStatus::Resolved));
        assert_eq!(store.status_of(&alert("never saved")), None);
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut store = MemoryAlertStore::new();
        let a = alert("x");
        store.save(&a);
        let id = store.find(&a).unwrap();

        assert!(store.update_status(&id, AlertStatus::Notified));
        assert!(store.update_status(&id, AlertStatus::Notified));
        assert!(!store.update_status(&id, AlertStatus::Active));
        assert!(store.update_status(&id, AlertStatus::Resolved));
        assert!(!store.update_status(&Uuid::new_v4(), AlertStatus::Resolved));
    }

    #[test]
    fn test_list_all_in_insertion_order() {
        let mut store = MemoryAlertStore::new();
        store.save(&alert("first"));
        store.save(&alert("second"));
        let messages: Vec<String> = store.list_all().into_iter().map(|s| s.alert.message).collect();
        assert_eq!(messages, vec!["first".to_string(), "second".to_string()]);
    }
}
