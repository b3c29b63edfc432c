//! Train/test partitioning of a feature table: temporal holdout with stratified fallback.

use crate::config::{SplitConfig, SplitMethod};
use crate::error::{ChurnError, Result};
use crate::features::FeatureTable;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{info, warn};

/// Which partitioning was actually applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedSplit {
    Temporal,
    Stratified,
    /// Temporal was requested but was too narrow; stratified was used instead
    StratifiedFallback,
}

#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: FeatureTable,
    pub test: FeatureTable,
    pub applied: AppliedSplit,
}

pub struct DatasetSplitter {
    config: SplitConfig,
    seed: u64,
}

impl DatasetSplitter {
    pub fn new(config: SplitConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    pub fn split(&self, features: &FeatureTable) -> Result<DatasetSplit> {
        self.config.validate()?;
        if features.len() < 2 {
            return Err(ChurnError::InsufficientData(format!(
                "at least 2 users are needed to split, got {}",
                features.len()
            )));
        }

        let split = match self.config.method {
            SplitMethod::Stratified => {
                let (train, test) = self.stratified_indices(features);
                DatasetSplit {
                    train: features.select(&train),
                    test: features.select(&test),
                    applied: AppliedSplit::Stratified,
                }
            }
            SplitMethod::Temporal => self.temporal(features),
        };
        info!(
            train = split.train.len(),
            test = split.test.len(),
            applied = ?split.applied,
            "dataset split"
        );
        Ok(split)
    }

    fn temporal(&self, features: &FeatureTable) -> DatasetSplit {
        let rows = features.rows();
        let max_label = rows.iter().map(|r| r.label_ts).max();
        let mut train = Vec::new();
        let mut test = Vec::new();
        if let Some(max_label) = max_label {
            let cutoff = max_label
                .checked_sub_signed(Duration::days(i64::from(self.config.temporal_holdout_days)))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            for (i, r) in rows.iter().enumerate() {
                if r.label_ts < cutoff {
                    train.push(i);
                } else {
                    test.push(i);
                }
            }
        }

        if train.len() < self.config.min_train_users || test.is_empty() {
            warn!(
                train = train.len(),
                test = test.len(),
                min_train_users = self.config.min_train_users,
                "temporal split too narrow, falling back to stratified"
            );
            let (train, test) = self.stratified_indices(features);
            return DatasetSplit {
                train: features.select(&train),
                test: features.select(&test),
                applied: AppliedSplit::StratifiedFallback,
            };
        }
        DatasetSplit {
            train: features.select(&train),
            test: features.select(&test),
            applied: AppliedSplit::Temporal,
        }
    }

    /// Seeded shuffle within each label class, taking `round(n_class * test_ratio)`
    /// of every class for test. Both partitions are kept non-empty and keep the
    /// table's original row order.
    fn stratified_indices(&self, features: &FeatureTable) -> (Vec<usize>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let labels = features.labels();
        let mut train = Vec::new();
        let mut test = Vec::new();

        for class in [0u8, 1u8] {
            let mut members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|&(_, &l)| if class == 0 { l == 0 } else { l != 0 })
                .map(|(i, _)| i)
                .collect();
            members.shuffle(&mut rng);
            let n_test = (members.len() as f64 * self.config.test_ratio).round() as usize;
            let (t, r) = members.split_at(n_test.min(members.len()));
            test.extend_from_slice(t);
            train.extend_from_slice(r);
        }

        // tiny tables can round a partition down to nothing
        if test.is_empty() {
            if let Some(i) = train.pop() {
                test.push(i);
            }
        } else if train.is_empty() {
            if let Some(i) = test.pop() {
                train.push(i);
            }
        }

        train.sort_unstable();
        test.sort_unstable();
        (train, test)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::sample_row;
    use std::collections::HashSet;

    const DAY: i64 = 86_400_000;

    fn table(n: usize, churn_every: usize, day_step: i64) -> FeatureTable {
        let rows = (0..n)
            .map(|i| {
                sample_row(
                    &format!("u{:03}", i),
                    i as i64 * day_step * DAY,
                    u8::from(i % churn_every == 0),
                )
            })
            .collect();
        FeatureTable::new(rows)
    }

    fn assert_partition(full: &FeatureTable, split: &DatasetSplit) {
        assert_eq!(split.train.len() + split.test.len(), full.len());
        let train: HashSet<&str> = split.train.user_ids().into_iter().collect();
        let test: HashSet<&str> = split.test.user_ids().into_iter().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), full.len());
    }

    #[test]
    fn temporal_holds_out_recent_labels() {
        let t = table(100, 4, 1);
        let config = SplitConfig {
            method: SplitMethod::Temporal,
            min_train_users: 10,
            temporal_holdout_days: 14,
            ..Default::default()
        };
        let s = DatasetSplitter::new(config, 42).split(&t).unwrap();
        assert_eq!(s.applied, AppliedSplit::Temporal);
        // max label is day 99, cutoff day 85
        assert_eq!(s.test.len(), 15);
        assert_partition(&t, &s);
        let max_train = s.train.rows().iter().map(|r| r.label_ts).max().unwrap();
        let min_test = s.test.rows().iter().map(|r| r.label_ts).min().unwrap();
        assert!(max_train < min_test);
    }

    #[test]
    fn narrow_temporal_range_falls_back() {
        let t = table(40, 4, 0);
        let config = SplitConfig {
            method: SplitMethod::Temporal,
            min_train_users: 5,
            ..Default::default()
        };
        let s = DatasetSplitter::new(config, 42).split(&t).unwrap();
        assert_eq!(s.applied, AppliedSplit::StratifiedFallback);
        assert_partition(&t, &s);
    }

    #[test]
    fn oversized_holdout_puts_everything_in_test_and_falls_back() {
        let t = table(20, 4, 1);
        let config = SplitConfig {
            method: SplitMethod::Temporal,
            min_train_users: 1,
            temporal_holdout_days: 1_000_000_000,
            ..Default::default()
        };
        let s = DatasetSplitter::new(config, 0).split(&t).unwrap();
        assert_eq!(s.applied, AppliedSplit::StratifiedFallback);
        assert_partition(&t, &s);
    }

    #[test]
    fn too_few_train_users_falls_back() {
        let t = table(30, 3, 1);
        let config = SplitConfig {
            method: SplitMethod::Temporal,
            min_train_users: 50,
            ..Default::default()
        };
        let s = DatasetSplitter::new(config, 1).split(&t).unwrap();
        assert_eq!(s.applied, AppliedSplit::StratifiedFallback);
    }

    #[test]
    fn stratified_preserves_base_rate_and_is_seeded() {
        let t = table(100, 4, 1);
        let config = SplitConfig {
            method: SplitMethod::Stratified,
            test_ratio: 0.2,
            ..Default::default()
        };
        let a = DatasetSplitter::new(config.clone(), 7).split(&t).unwrap();
        let b = DatasetSplitter::new(config, 7).split(&t).unwrap();
        assert_partition(&t, &a);
        assert_eq!(a.test.user_ids(), b.test.user_ids());
        assert_eq!(a.test.len(), 20);
        let churned_test = a.test.labels().iter().filter(|&&l| l == 1).count();
        assert_eq!(churned_test, 5);
    }

    #[test]
    fn tiny_table_keeps_both_sides() {
        let t = table(2, 2, 1);
        let config = SplitConfig {
            method: SplitMethod::Stratified,
            test_ratio: 0.2,
            ..Default::default()
        };
        let s = DatasetSplitter::new(config, 0).split(&t).unwrap();
        assert_eq!(s.train.len(), 1);
        assert_eq!(s.test.len(), 1);
    }

    #[test]
    fn single_row_is_insufficient() {
        let t = table(1, 1, 1);
        let r = DatasetSplitter::new(SplitConfig::default(), 0).split(&t);
        assert!(matches!(r, Err(ChurnError::InsufficientData(_))));
    }
}
