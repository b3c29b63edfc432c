//! Pipeline configuration. Every section has defaults so partial files are accepted.

use crate::error::{ChurnError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Newline-delimited JSON event log used for training
    pub data_path: PathBuf,
    /// Model, metrics and exported tables
    pub artifacts_dir: PathBuf,
    /// Registered ("latest") models
    pub model_registry: PathBuf,
    /// Seed for the stratified split
    pub random_state: u64,
    pub target_column: String,
    /// Feature aggregation parameters
    pub features: FeatureConfig,
    /// Train/test partitioning
    pub split: SplitConfig,
    /// Drift thresholds and monitored tables
    pub monitoring: MonitoringConfig,
    pub serving: ServingConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureConfig {
    /// Days of history before the label cutoff; 0 = unbounded
    pub lookback_days: u32,
    /// Users with fewer working events are dropped
    pub min_events_per_user: usize,
    /// Users with fewer distinct sessions are dropped
    pub min_sessions_per_user: usize,
    pub include_gender: bool,
    pub include_level: bool,
    pub include_location: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    Temporal,
    Stratified,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub method: SplitMethod,
    /// Fraction of users held out, exclusive (0, 1)
    pub test_ratio: f64,
    /// Temporal split falls back to stratified below this many train users
    pub min_train_users: usize,
    pub temporal_holdout_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitoringConfig {
    pub baseline_features_path: Option<PathBuf>,
    pub current_features_path: Option<PathBuf>,
    pub baseline_metrics_path: Option<PathBuf>,
    pub current_metrics_path: Option<PathBuf>,
    pub psi_threshold: f64,
    pub ks_threshold: f64,
    /// Quantile bins for PSI
    pub buckets: usize,
    /// Relative metric drop that triggers a retrain
    pub performance_drop_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServingConfig {
    /// Probability at or above which a user is labelled as churning
    pub decision_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("customer_churn_mini.json"),
            artifacts_dir: PathBuf::from("artifacts"),
            model_registry: PathBuf::from("models"),
            random_state: 42,
            target_column: "churned".to_string(),
            features: FeatureConfig::default(),
            split: SplitConfig::default(),
            monitoring: MonitoringConfig::default(),
            serving: ServingConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            min_events_per_user: 10,
            min_sessions_per_user: 1,
            include_gender: true,
            include_level: true,
            include_location: false,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            method: SplitMethod::Temporal,
            test_ratio: 0.2,
            min_train_users: 50,
            temporal_holdout_days: 14,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            baseline_features_path: None,
            current_features_path: None,
            baseline_metrics_path: None,
            current_metrics_path: None,
            psi_threshold: 0.2,
            ks_threshold: 0.1,
            buckets: 10,
            performance_drop_threshold: 0.1,
        }
    }
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            decision_threshold: 0.5,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

impl PipelineConfig {
    /// Load from JSON file if present, otherwise defaults. A file that exists but
    /// cannot be read or parsed is a configuration error, as is a failed validation.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let data = std::fs::read_to_string(path).map_err(|e| {
                ChurnError::Configuration(format!("cannot read {}: {}", path.display(), e))
            })?;
            serde_json::from_str::<PipelineConfig>(&data).map_err(|e| {
                ChurnError::Configuration(format!("cannot parse {}: {}", path.display(), e))
            })?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.split.validate()?;
        self.monitoring.validate()?;
        self.serving.validate()?;
        if self.target_column != "churned" {
            return Err(ChurnError::Configuration(format!(
                "unsupported target column {:?}; only \"churned\" is produced",
                self.target_column
            )));
        }
        Ok(())
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.test_ratio > 0.0 && self.test_ratio < 1.0) {
            return Err(ChurnError::Configuration(format!(
                "split.test_ratio must be in (0, 1), got {}",
                self.test_ratio
            )));
        }
        if self.min_train_users == 0 {
            return Err(ChurnError::Configuration(
                "split.min_train_users must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(ChurnError::Configuration(
                "monitoring.buckets must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("psi_threshold", self.psi_threshold),
            ("ks_threshold", self.ks_threshold),
            ("performance_drop_threshold", self.performance_drop_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ChurnError::Configuration(format!(
                    "monitoring.{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl ServingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            return Err(ChurnError::Configuration(format!(
                "serving.decision_threshold must be in [0, 1], got {}",
                self.decision_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let c: PipelineConfig =
            serde_json::from_str(r#"{"features": {"lookback_days": 7}, "split": {"method": "stratified"}}"#)
                .unwrap();
        assert_eq!(c.features.lookback_days, 7);
        assert_eq!(c.features.min_events_per_user, 10);
        assert_eq!(c.split.method, SplitMethod::Stratified);
        assert_eq!(c.split.test_ratio, 0.2);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn unknown_split_method_is_rejected() {
        let r = serde_json::from_str::<PipelineConfig>(r#"{"split": {"method": "random"}}"#);
        assert!(r.is_err());
    }

    #[test]
    fn out_of_range_ratio_fails_validation() {
        let mut c = PipelineConfig::default();
        c.split.test_ratio = 1.0;
        assert!(matches!(c.validate(), Err(ChurnError::Configuration(_))));
        c.split.test_ratio = 0.0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn negative_threshold_fails_validation() {
        let mut c = PipelineConfig::default();
        c.monitoring.psi_threshold = -0.1;
        assert!(c.validate().is_err());
        c.monitoring.psi_threshold = 0.2;
        c.serving.decision_threshold = 1.5;
        assert!(c.validate().is_err());
    }
}
