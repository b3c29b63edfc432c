//! L2-regularised logistic regression over median-imputed, standard-scaled inputs.
//! Fitting is full-batch gradient descent from a zero start, so it is deterministic.

use super::{Classifier, TrainedModel};
use crate::error::{ChurnError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub l2: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_iter: 1000,
            l2: 1e-3,
        }
    }
}

/// Fitted parameters plus the preprocessing learned from the training rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub feature_names: Vec<String>,
    pub medians: Vec<f64>,
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn nan_median(column: impl Iterator<Item = f64>) -> f64 {
    let mut v: Vec<f64> = column.filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return 0.0;
    }
    v.sort_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

fn impute(x: &Array2<f64>, medians: &[f64]) -> Array2<f64> {
    let mut out = x.clone();
    for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
        col.mapv_inplace(|v| if v.is_finite() { v } else { medians[j] });
    }
    out
}

impl LogisticModel {
    fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.feature_names.len() {
            return Err(ChurnError::Model(format!(
                "expected {} feature columns, got {}",
                self.feature_names.len(),
                x.ncols()
            )));
        }
        let mut z = impute(x, &self.medians);
        for (j, mut col) in z.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.means[j], self.scales[j]);
            col.mapv_inplace(|v| (v - m) / s);
        }
        Ok(z)
    }
}

impl TrainedModel for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let z = self.transform(x)?;
        let w = Array1::from(self.weights.clone());
        Ok(z.dot(&w).iter().map(|v| sigmoid(v + self.bias)).collect())
    }
}

impl Classifier for LogisticRegression {
    type Model = LogisticModel;

    fn fit(&self, feature_names: &[String], x: &Array2<f64>, y: &[u8]) -> Result<LogisticModel> {
        let (n, d) = x.dim();
        if n == 0 {
            return Err(ChurnError::Model("cannot fit on zero rows".into()));
        }
        if y.len() != n {
            return Err(ChurnError::Model(format!(
                "{} rows but {} labels",
                n,
                y.len()
            )));
        }
        if feature_names.len() != d {
            return Err(ChurnError::Model(format!(
                "{} columns but {} feature names",
                d,
                feature_names.len()
            )));
        }

        let medians: Vec<f64> = x
            .axis_iter(Axis(1))
            .map(|col| nan_median(col.iter().copied()))
            .collect();
        let imputed = impute(x, &medians);
        let means: Vec<f64> = imputed
            .axis_iter(Axis(1))
            .map(|col| col.sum() / n as f64)
            .collect();
        let scales: Vec<f64> = imputed
            .axis_iter(Axis(1))
            .zip(&means)
            .map(|(col, m)| {
                let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
                let s = var.sqrt();
                if s > 0.0 && s.is_finite() {
                    s
                } else {
                    1.0
                }
            })
            .collect();

        let mut model = LogisticModel {
            feature_names: feature_names.to_vec(),
            medians,
            means,
            scales,
            weights: vec![0.0; d],
            bias: 0.0,
        };
        let xs = model.transform(x)?;
        let target = Array1::from_iter(y.iter().map(|&v| f64::from(u8::from(v != 0))));
        let mut w = Array1::<f64>::zeros(d);
        let mut b = 0.0;

        for _ in 0..self.max_iter {
            let p = (xs.dot(&w) + b).mapv(sigmoid);
            let err = &p - &target;
            let grad_w = xs.t().dot(&err) / n as f64 + &w * self.l2;
            let grad_b = err.sum() / n as f64;
            w = w - grad_w * self.learning_rate;
            b -= grad_b * self.learning_rate;
        }

        debug!(rows = n, features = d, bias = b, "logistic regression fitted");
        model.weights = w.to_vec();
        model.bias = b;
        Ok(model)
    }
}
