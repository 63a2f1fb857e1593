//! Carewatch - alert generation and risk scoring for elderly-care monitoring
//!
//! Carewatch turns health, safety (fall-detection) and reminder records into
//! prioritized alerts and per-event risk scores through a deterministic
//! pipeline: raw records → normalization → {rule engine → alerts; cross-domain
//! merge → risk predictors → scored records}.
//!
//! ## Modules
//!
//! - **Ingestion**: raw export schema, JSON/NDJSON parsing, normalization
//! - **Alerts**: rule engine, caregiver notification policy, alert store
//! - **Risk scoring**: health risk, fall risk and reminder effectiveness models
//! - **Session**: [`MonitoringSession`] ties loaded data, alerts and models together

pub mod config;
pub mod error;
pub mod filter;
pub mod insights;
pub mod merger;
pub mod ml;
pub mod normalizer;
pub mod notify;
pub mod pipeline;
pub mod predictors;
pub mod rules;
pub mod schema;
pub mod stats;
pub mod store;
pub mod types;

pub use config::{CareConfig, ForestConfig};
pub use error::{CareError, RuleError};
pub use filter::{DashboardFilter, DeviceSelection};
pub use normalizer::Normalizer;
pub use notify::{LogNotifier, Notifier};
pub use pipeline::{generate_alert_report, MonitoringSession, RawBatches};
pub use predictors::{
    FallRiskPredictor, HealthRiskPredictor, PredictionBatch, ReminderEffectivenessPredictor,
    RiskModel, TrainingOutcome,
};
pub use rules::{generate_alerts, should_notify_caregiver, AlertEngine, AlertReport};
pub use schema::{RawHealthRecord, RawReminderRecord, RawSafetyRecord, RecordParser};
pub use store::{AlertSink, MemoryAlertStore};

/// Carewatch version
pub const CAREWATCH_VERSION: &str = env!("CARGO_PKG_VERSION");
