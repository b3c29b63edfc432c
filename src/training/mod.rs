//! End-to-end training run: load, clean, build features, split, fit, evaluate, persist.

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::evaluation::compute_classification_metrics;
use crate::events::{load_event_log, EventLog};
use crate::features::FeatureBuilder;
use crate::model::{Classifier, LogisticRegression, TrainedModel};
use crate::split::{AppliedSplit, DatasetSplitter};
use crate::storage::{ArtifactStore, RegisteredModel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub users: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub split: AppliedSplit,
    pub fell_back: bool,
    pub feature_names: Vec<String>,
    pub metrics: BTreeMap<String, f64>,
    /// `[[tn, fp], [fn, tp]]` on the test partition
    pub confusion_matrix: [[u64; 2]; 2],
    pub model_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered: Option<RegisteredModel>,
}

/// Drives one training run with any [`Classifier`] whose fitted model can be
/// written as JSON. Defaults to [`LogisticRegression`].
pub struct TrainingOrchestrator<C = LogisticRegression> {
    classifier: C,
    register: bool,
}

impl TrainingOrchestrator {
    pub fn new() -> Self {
        Self::with_classifier(LogisticRegression::default())
    }
}

impl Default for TrainingOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TrainingOrchestrator<C>
where
    C: Classifier,
    C::Model: Serialize,
{
    pub fn with_classifier(classifier: C) -> Self {
        Self {
            classifier,
            register: false,
        }
    }

    /// Copy the fitted model into `model_registry` after a successful run.
    pub fn with_registration(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    /// Train from the event log at `config.data_path`.
    pub fn run(&self, config: &PipelineConfig) -> Result<TrainingReport> {
        config.validate()?;
        let raw = load_event_log(&config.data_path)?;
        let (log, _) = EventLog::clean(raw);
        self.run_on_log(&log, config)
    }

    /// Train from an already-cleaned log.
    pub fn run_on_log(&self, log: &EventLog, config: &PipelineConfig) -> Result<TrainingReport> {
        config.validate()?;
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, events = log.len(), "training run started");

        let table = FeatureBuilder::new(config.features.clone()).build(log)?;
        let split =
            DatasetSplitter::new(config.split.clone(), config.random_state).split(&table)?;
        if split.applied == AppliedSplit::StratifiedFallback {
            warn!(%run_id, "temporal holdout too narrow, trained on stratified split");
        }

        let feature_names = table.feature_columns();
        let x_train = split.train.design_matrix(&feature_names);
        let model = self
            .classifier
            .fit(&feature_names, &x_train, &split.train.labels())?;

        let x_test = split.test.design_matrix(&feature_names);
        let y_test = split.test.labels();
        let scores = model.predict_proba(&x_test)?;
        let y_pred = model.predict(&x_test)?;
        let evaluation = compute_classification_metrics(&y_test, &y_pred, Some(&scores));

        let store = ArtifactStore::open(&config.artifacts_dir, &config.model_registry)?;
        let model_path = store.save_model(&model)?;
        store.save_metrics(&evaluation.metrics)?;
        store.export_table("features", &table)?;
        store.export_table("evaluation_set", &split.test)?;
        let registered = if self.register {
            Some(store.register_model()?)
        } else {
            None
        };

        info!(
            %run_id,
            users = table.len(),
            train = split.train.len(),
            test = split.test.len(),
            features = feature_names.len(),
            f1 = evaluation.metrics.get("f1").copied().unwrap_or(f64::NAN),
            "training run complete"
        );

        Ok(TrainingReport {
            run_id,
            started_at,
            users: table.len(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            split: split.applied,
            fell_back: split.applied == AppliedSplit::StratifiedFallback,
            feature_names,
            metrics: evaluation.metrics,
            confusion_matrix: evaluation.confusion_matrix,
            model_path,
            registered,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SplitConfig, SplitMethod};
    use crate::error::ChurnError;
    use crate::features::TARGET_COLUMN;
    use crate::events::EventRecord;
    use chrono::Duration;
    use ndarray::Array2;

    fn synthetic_log(users: usize) -> EventLog {
        let base = DateTime::<Utc>::from_timestamp_millis(1_538_352_000_000).unwrap();
        let mut records = Vec::new();
        for u in 0..users {
            let churner = u % 3 == 0;
            let id = format!("{}", 100 + u);
            let n = if churner { 4 } else { 12 };
            for i in 0..n {
                let ts = base + Duration::hours((u * 7 + i * 3) as i64);
                let page = if churner && i % 2 == 0 { "Thumbs Down" } else { "NextSong" };
                let mut r = EventRecord::new(ts, &id, (i / 4) as i64, page);
                r.length = 200.0;
                records.push(r);
            }
            if churner {
                let ts = base + Duration::hours((u * 7 + n * 3) as i64);
                records.push(EventRecord::new(ts, &id, 9, crate::events::CHURN_EVENT));
            }
        }
        EventLog::from_records(records)
    }

    fn config(dir: &std::path::Path) -> PipelineConfig {
        let mut c = PipelineConfig::default();
        c.artifacts_dir = dir.join("artifacts");
        c.model_registry = dir.join("registry");
        c.features.lookback_days = 0;
        c.features.min_events_per_user = 1;
        c.split = SplitConfig {
            method: SplitMethod::Stratified,
            ..SplitConfig::default()
        };
        c
    }

    #[test]
    fn run_persists_model_metrics_and_tables() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let report = TrainingOrchestrator::new()
            .with_registration(true)
            .run_on_log(&synthetic_log(30), &cfg)
            .unwrap();

        assert_eq!(report.users, 30);
        assert_eq!(report.train_rows + report.test_rows, 30);
        assert_eq!(report.split, AppliedSplit::Stratified);
        assert!(!report.feature_names.iter().any(|c| c == TARGET_COLUMN));
        assert!(report.metrics.contains_key("roc_auc"));

        let store = ArtifactStore::open(&cfg.artifacts_dir, &cfg.model_registry).unwrap();
        assert_eq!(store.load_model().unwrap().feature_names, report.feature_names);
        assert!(store.table_path("features").exists());
        assert!(store.table_path("evaluation_set").exists());
        assert!(report.registered.unwrap().path.exists());
    }

    /// Scores every row with the training churn rate.
    #[derive(Serialize)]
    struct BaseRateModel {
        feature_names: Vec<String>,
        rate: f64,
    }

    impl TrainedModel for BaseRateModel {
        fn feature_names(&self) -> &[String] {
            &self.feature_names
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
            Ok(vec![self.rate; x.nrows()])
        }
    }

    struct BaseRate;

    impl Classifier for BaseRate {
        type Model = BaseRateModel;

        fn fit(&self, feature_names: &[String], _x: &Array2<f64>, y: &[u8]) -> Result<BaseRateModel> {
            let positives = y.iter().filter(|&&v| v != 0).count();
            Ok(BaseRateModel {
                feature_names: feature_names.to_vec(),
                rate: positives as f64 / y.len() as f64,
            })
        }
    }

    #[test]
    fn any_classifier_can_drive_a_run() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let report = TrainingOrchestrator::with_classifier(BaseRate)
            .run_on_log(&synthetic_log(30), &cfg)
            .unwrap();

        // constant scores rank every pair as a tie
        assert_eq!(report.metrics["roc_auc"], 0.5);
        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report.model_path).unwrap()).unwrap();
        assert!((saved["rate"].as_f64().unwrap() - 8.0 / 24.0).abs() < 1e-12);
        assert_eq!(saved["feature_names"].as_array().unwrap().len(), report.feature_names.len());
    }

    #[test]
    fn temporal_request_on_small_table_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.split.method = SplitMethod::Temporal;
        let report = TrainingOrchestrator::new()
            .run_on_log(&synthetic_log(12), &cfg)
            .unwrap();
        assert!(report.fell_back);
        assert!(report.registered.is_none());
    }

    #[test]
    fn empty_log_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let r = TrainingOrchestrator::new()
            .run_on_log(&EventLog::from_records(Vec::new()), &config(dir.path()));
        assert!(matches!(r, Err(ChurnError::InsufficientData(_))));
    }

    #[test]
    fn unknown_target_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path());
        cfg.target_column = "label".into();
        let r = TrainingOrchestrator::new().run_on_log(&synthetic_log(6), &cfg);
        assert!(matches!(r, Err(ChurnError::Configuration(_))));
    }
}
