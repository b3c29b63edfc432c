//! Data drift (PSI / KS per feature column) and performance drift (relative metric deltas).

mod stats;

pub use stats::{
    kolmogorov_smirnov_statistic, population_stability_index, quantile_edges, DEFAULT_BUCKETS,
    DEFAULT_EPSILON,
};

use crate::config::MonitoringConfig;
use crate::error::{ChurnError, Result};
use crate::features::FeatureTable;
use crate::storage;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Drift scores for one column. NaN marks a column whose distribution was empty.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureDrift {
    pub feature: String,
    pub psi: f64,
    pub ks: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DriftFlags {
    pub psi: bool,
    pub ks: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    /// Sorted by descending PSI; undefined PSI sorts last
    pub feature_metrics: Vec<FeatureDrift>,
    pub aggregate_flags: DriftFlags,
}

impl DriftReport {
    pub fn drifted(&self) -> bool {
        self.aggregate_flags.psi || self.aggregate_flags.ks
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DriftThresholds {
    pub psi: f64,
    pub ks: f64,
    pub buckets: usize,
}

impl Default for DriftThresholds {
    fn default() -> Self {
        Self {
            psi: 0.2,
            ks: 0.1,
            buckets: DEFAULT_BUCKETS,
        }
    }
}

impl From<&MonitoringConfig> for DriftThresholds {
    fn from(c: &MonitoringConfig) -> Self {
        Self {
            psi: c.psi_threshold,
            ks: c.ks_threshold,
            buckets: c.buckets,
        }
    }
}

fn present_values(column: Vec<Option<f64>>) -> Vec<f64> {
    column.into_iter().flatten().collect()
}

/// Compare every numeric column shared by both tables (or only `columns`, when given).
pub fn compute_data_drift_report(
    baseline: &FeatureTable,
    current: &FeatureTable,
    columns: Option<&[String]>,
    thresholds: DriftThresholds,
) -> DriftReport {
    let candidates: Vec<String> = match columns {
        Some(cols) => cols.to_vec(),
        None => baseline.columns().into_iter().map(String::from).collect(),
    };

    let mut flags = DriftFlags::default();
    let mut metrics = Vec::with_capacity(candidates.len());
    for col in candidates {
        let (Some(base), Some(cur)) = (baseline.column(&col), current.column(&col)) else {
            continue;
        };
        let base = present_values(base);
        let cur = present_values(cur);
        let psi = population_stability_index(&base, &cur, thresholds.buckets, DEFAULT_EPSILON);
        let ks = kolmogorov_smirnov_statistic(&base, &cur);

        if !psi.is_nan() && psi > thresholds.psi {
            flags.psi = true;
        }
        if !ks.is_nan() && ks > thresholds.ks {
            flags.ks = true;
        }
        metrics.push(FeatureDrift {
            feature: col,
            psi,
            ks,
        });
    }

    metrics.sort_by(|a, b| match (a.psi.is_nan(), b.psi.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.psi.total_cmp(&a.psi),
    });

    DriftReport {
        feature_metrics: metrics,
        aggregate_flags: flags,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceDrift {
    /// (current - baseline) / |baseline| per shared metric; NaN when the baseline is 0
    pub deltas: BTreeMap<String, f64>,
    pub needs_retrain: bool,
}

/// Relative change of every metric present in both maps. Only defined deltas below
/// `-|degrade_threshold|` trigger a retrain.
pub fn performance_drift(
    baseline: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
    degrade_threshold: f64,
) -> PerformanceDrift {
    let mut deltas = BTreeMap::new();
    for (metric, &base) in baseline {
        let Some(&cur) = current.get(metric) else {
            continue;
        };
        let delta = if base == 0.0 {
            f64::NAN
        } else {
            (cur - base) / base.abs()
        };
        deltas.insert(metric.clone(), delta);
    }
    let limit = -degrade_threshold.abs();
    let needs_retrain = deltas.values().any(|d| !d.is_nan() && *d < limit);
    PerformanceDrift {
        deltas,
        needs_retrain,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitoringOutcome {
    pub data_drift: DriftReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performance: Option<PerformanceDrift>,
}

/// Load the configured baseline/current tables (and metrics, if both paths are set)
/// and compute the drift signals.
pub fn run_monitoring(config: &MonitoringConfig) -> Result<MonitoringOutcome> {
    config.validate()?;
    let (Some(baseline_path), Some(current_path)) = (
        config.baseline_features_path.as_ref(),
        config.current_features_path.as_ref(),
    ) else {
        return Err(ChurnError::Configuration(
            "monitoring.baseline_features_path and monitoring.current_features_path are required"
                .into(),
        ));
    };

    let baseline = storage::load_table(baseline_path)?;
    let current = storage::load_table(current_path)?;
    let data_drift =
        compute_data_drift_report(&baseline, &current, None, DriftThresholds::from(config));
    if data_drift.drifted() {
        warn!(flags = ?data_drift.aggregate_flags, "data drift detected");
    }

    let performance = match (&config.baseline_metrics_path, &config.current_metrics_path) {
        (Some(b), Some(c)) => {
            let base = storage::load_metrics(b)?;
            let cur = storage::load_metrics(c)?;
            let drift = performance_drift(&base, &cur, config.performance_drop_threshold);
            if drift.needs_retrain {
                warn!(deltas = ?drift.deltas, "performance degraded beyond threshold");
            }
            Some(drift)
        }
        _ => None,
    };

    info!(
        columns = data_drift.feature_metrics.len(),
        psi_flag = data_drift.aggregate_flags.psi,
        ks_flag = data_drift.aggregate_flags.ks,
        "monitoring complete"
    );
    Ok(MonitoringOutcome {
        data_drift,
        performance,
    })
}
