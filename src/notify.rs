//! Caregiver notification boundary

use crate::types::Alert;
use tracing::info;

pub trait Notifier {
    /// Send a notification for `alert`; `true` on success
    fn notify(&mut self, alert: &Alert) -> bool;
}

/// Text sent to the caregiver
pub fn notification_message(alert: &Alert) -> String {
    format!(
        "ALERT for {}: {} - {} at {}",
        alert.device_id,
        alert.alert_type,
        alert.message,
        alert.timestamp.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Writes notifications to the log and keeps a copy of each message
#[derive(Debug, Clone, Default)]
pub struct LogNotifier {
    sent: Vec<String>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> &[String] {
        &self.sent
    }
}

impl Notifier for LogNotifier {
    fn notify(&mut self, alert: &Alert) -> bool {
        let message = notification_message(alert);
        info!(device_id = %alert.device_id, notification = %message, "caregiver notified");
        self.sent.push(message);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertStatus, AlertType, Priority};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_format() {
        let alert = Alert {
            device_id: "U2".to_string(),
            alert_type: AlertType::Fall,
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 15)
                .unwrap()
                .and_hms_opt(21, 5, 0)
                .unwrap(),
            status: AlertStatus::Active,
            message: "Fall detected in Bathroom with High impact. 400 seconds of inactivity."
                .to_string(),
            priority: Priority::High,
        };

        let mut notifier = LogNotifier::new();
        assert!(notifier.notify(&alert));
        assert_eq!(
            notifier.sent(),
            &["ALERT for U2: Fall - Fall detected in Bathroom with High impact. 400 seconds of inactivity. at 2025-01-15 21:05:00".to_string()]
        );
    }
}
