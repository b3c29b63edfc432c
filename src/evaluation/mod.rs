//! Classification metrics for the held-out set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub metrics: BTreeMap<String, f64>,
    /// `[[tn, fp], [fn, tp]]`
    pub confusion_matrix: [[u64; 2]; 2],
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Accuracy, precision, recall and f1 (zero-division → 0), plus `roc_auc` and
/// `pr_auc` when scores are supplied.
pub fn compute_classification_metrics(
    y_true: &[u8],
    y_pred: &[u8],
    y_score: Option<&[f64]>,
) -> EvaluationResult {
    let mut cm = [[0u64; 2]; 2];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        cm[usize::from(t != 0)][usize::from(p != 0)] += 1;
    }
    let [[tn, fp], [fn_, tp]] = cm;

    let precision = ratio(tp, tp + fp);
    let recall = ratio(tp, tp + fn_);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    let mut metrics = BTreeMap::new();
    metrics.insert("accuracy".to_string(), ratio(tp + tn, tp + tn + fp + fn_));
    metrics.insert("precision".to_string(), precision);
    metrics.insert("recall".to_string(), recall);
    metrics.insert("f1".to_string(), f1);

    if let Some(scores) = y_score {
        metrics.insert("roc_auc".to_string(), roc_auc(y_true, scores));
        metrics.insert("pr_auc".to_string(), pr_auc(y_true, scores));
    }

    EvaluationResult {
        metrics,
        confusion_matrix: cm,
    }
}

/// Mann-Whitney estimate of ROC AUC with tied scores sharing their average rank.
/// NaN when only one class is present.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    let n = y_true.len().min(scores.len());
    let n_pos = y_true[..n].iter().filter(|&&y| y != 0).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = (0..n).filter(|&k| y_true[k] != 0).map(|k| ranks[k]).sum();
    let u = pos_rank_sum - (n_pos * (n_pos + 1)) as f64 / 2.0;
    u / (n_pos * n_neg) as f64
}

/// Trapezoidal area under the precision-recall curve, thresholding at each
/// distinct score. NaN when there are no positives.
pub fn pr_auc(y_true: &[u8], scores: &[f64]) -> f64 {
    let n = y_true.len().min(scores.len());
    let total_pos = y_true[..n].iter().filter(|&&y| y != 0).count();
    if total_pos == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    // (recall, precision) starting at the (0, 1) anchor
    let mut curve = vec![(0.0, 1.0)];
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < n {
        let s = scores[order[i]];
        while i < n && scores[order[i]] == s {
            if y_true[order[i]] != 0 {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        curve.push((tp as f64 / total_pos as f64, tp as f64 / (tp + fp) as f64));
        if tp == total_pos {
            break;
        }
    }

    curve
        .windows(2)
        .map(|w| (w[1].0 - w[0].0) * (w[1].1 + w[0].1) / 2.0)
        .sum()
}
