//! Binary classifier seam. Training code depends only on [`Classifier`] and
//! [`TrainedModel`]; [`LogisticRegression`] is the bundled backend.

mod logistic;

pub use logistic::{LogisticModel, LogisticRegression};

use crate::error::Result;
use ndarray::Array2;

/// Probability at or above which `predict` returns 1.
pub const DEFAULT_DECISION_THRESHOLD: f64 = 0.5;

pub trait TrainedModel: Send + Sync {
    /// Column order the model was fitted on.
    fn feature_names(&self) -> &[String];

    /// Churn probability in [0, 1] per row.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>>;

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p >= DEFAULT_DECISION_THRESHOLD))
            .collect())
    }
}

pub trait Classifier {
    type Model: TrainedModel;

    /// Fit on `x` (rows = users, columns = `feature_names`) against 0/1 labels.
    /// Missing cells are NaN.
    fn fit(&self, feature_names: &[String], x: &Array2<f64>, y: &[u8]) -> Result<Self::Model>;
}
