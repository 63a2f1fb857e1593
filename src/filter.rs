//! Dashboard filter selections
//!
//! A filter picks one device (or all) and an optional inclusive date range. It
//! applies to anything that implements [`MonitoringEvent`].

use crate::types::MonitoringEvent;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSelection {
    #[default]
    All,
    Device(String),
}

impl DeviceSelection {
    /// "All" (any case) selects every device
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            DeviceSelection::All
        } else {
            DeviceSelection::Device(trimmed.to_string())
        }
    }

    pub fn matches(&self, device_id: &str) -> bool {
        match self {
            DeviceSelection::All => true,
            DeviceSelection::Device(id) => id == device_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardFilter {
    pub device: DeviceSelection,
    /// Inclusive
    pub from: Option<NaiveDate>,
    /// Inclusive
    pub to: Option<NaiveDate>,
}

impl DashboardFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn device(id: impl Into<String>) -> Self {
        Self {
            device: DeviceSelection::Device(id.into()),
            ..Self::default()
        }
    }

    pub fn between(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn matches<E: MonitoringEvent>(&self, event: &E) -> bool {
        if !self.device.matches(event.device_id()) {
            return false;
        }
        let date = event.date();
        self.from.map_or(true, |from| date >= from) && self.to.map_or(true, |to| date <= to)
    }

    /// Matching events, cloned, in input order
    pub fn apply<E: MonitoringEvent + Clone>(&self, events: &[E]) -> Vec<E> {
        events.iter().filter(|e| self.matches(*e)).cloned().collect()
    }
}

/// Sorted distinct device ids, for the device selector
pub fn device_ids<'a, E: MonitoringEvent + 'a>(events: impl IntoIterator<Item = &'a E>) -> Vec<String> {
    events
        .into_iter()
        .map(|e| e.device_id().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
