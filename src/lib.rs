//! Customer churn pipeline: activity log to leakage-free per-user features,
//! train/test split, classifier training, drift monitoring and serving.
//!
//! Modules:
//! - [`events`]: NDJSON event log loading, cleaning, per-user/session grouping
//! - [`features`]: point-in-time user feature snapshots
//! - [`split`]: temporal holdout and stratified train/test split
//! - [`model`] / [`evaluation`]: classifier seam and metrics
//! - [`monitoring`]: PSI / KS data drift and performance drift
//! - [`storage`]: SQLite feature store and on-disk artifacts
//! - [`training`] / [`serving`]: end-to-end run and single-user prediction
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod error;
pub mod evaluation;
pub mod events;
pub mod features;
pub mod logging;
pub mod model;
pub mod monitoring;
pub mod serving;
pub mod split;
pub mod storage;
pub mod training;

pub use config::PipelineConfig;
pub use error::{ChurnError, Result};
pub use events::{EventLog, EventRecord, RawEvent};
pub use features::{FeatureBuilder, FeatureTable, UserFeatureSnapshot};
pub use logging::StructuredLogger;
pub use monitoring::{compute_data_drift_report, DriftReport};
pub use serving::{PredictionResponse, PredictionService};
pub use split::{DatasetSplit, DatasetSplitter};
pub use training::{TrainingOrchestrator, TrainingReport};
