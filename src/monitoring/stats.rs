//! Distribution distances: population stability index and two-sample KS statistic.
//! Both drop NaN inputs and return NaN when either side is left empty.

pub const DEFAULT_BUCKETS: usize = 10;
pub const DEFAULT_EPSILON: f64 = 1e-6;

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut v: Vec<f64> = values.iter().copied().filter(|x| !x.is_nan()).collect();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// Linear-interpolated quantile of sorted, non-empty data.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Bin index for `x`: edges[i] <= x < edges[i + 1], with values outside the
/// edge range clipped into the first/last bin.
fn bin_of(edges: &[f64], x: f64) -> usize {
    let pos = edges.partition_point(|e| *e <= x);
    pos.saturating_sub(1).min(edges.len() - 2)
}

/// Quantile edges of `expected`, deduplicated.
pub fn quantile_edges(expected: &[f64], buckets: usize) -> Vec<f64> {
    let sorted = sorted_finite(expected);
    if sorted.is_empty() || buckets == 0 {
        return Vec::new();
    }
    let mut edges: Vec<f64> = (0..=buckets)
        .map(|i| quantile(&sorted, i as f64 / buckets as f64))
        .collect();
    edges.dedup();
    edges
}

/// Population stability index of `actual` against bins fitted on `expected`.
/// Constant `expected` distributions have no bins to compare and give 0.0.
pub fn population_stability_index(
    expected: &[f64],
    actual: &[f64],
    buckets: usize,
    epsilon: f64,
) -> f64 {
    let expected = sorted_finite(expected);
    let actual = sorted_finite(actual);
    if expected.is_empty() || actual.is_empty() {
        return f64::NAN;
    }

    let edges = quantile_edges(&expected, buckets);
    if edges.len() < 2 {
        return 0.0;
    }

    let n_bins = edges.len() - 1;
    let mut exp_counts = vec![0usize; n_bins];
    let mut act_counts = vec![0usize; n_bins];
    for &x in &expected {
        exp_counts[bin_of(&edges, x)] += 1;
    }
    for &x in &actual {
        act_counts[bin_of(&edges, x)] += 1;
    }

    exp_counts
        .iter()
        .zip(&act_counts)
        .map(|(&e, &a)| {
            let exp_ratio = (e as f64 / expected.len() as f64).max(epsilon);
            let act_ratio = (a as f64 / actual.len() as f64).max(epsilon);
            (act_ratio - exp_ratio) * (act_ratio / exp_ratio).ln()
        })
        .sum()
}

/// Maximum absolute gap between the two empirical CDFs over every observed value.
pub fn kolmogorov_smirnov_statistic(expected: &[f64], actual: &[f64]) -> f64 {
    let expected = sorted_finite(expected);
    let actual = sorted_finite(actual);
    if expected.is_empty() || actual.is_empty() {
        return f64::NAN;
    }

    let mut points: Vec<f64> = expected.iter().chain(&actual).copied().collect();
    points.sort_by(|a, b| a.total_cmp(b));
    points.dedup();

    let n_exp = expected.len() as f64;
    let n_act = actual.len() as f64;
    points
        .iter()
        .map(|&x| {
            let exp_cdf = expected.partition_point(|v| *v <= x) as f64 / n_exp;
            let act_cdf = actual.partition_point(|v| *v <= x) as f64 / n_act;
            (exp_cdf - act_cdf).abs()
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(start: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + i as f64 / n as f64).collect()
    }

    #[test]
    fn quantile_matches_linear_interpolation() {
        let s = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&s, 0.0), 1.0);
        assert_eq!(quantile(&s, 1.0), 4.0);
        assert!((quantile(&s, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn self_comparison_has_no_drift() {
        let x = uniform(0.0, 500);
        let psi = population_stability_index(&x, &x, DEFAULT_BUCKETS, DEFAULT_EPSILON);
        assert!(psi.abs() < 1e-12);
        assert_eq!(kolmogorov_smirnov_statistic(&x, &x), 0.0);
    }

    #[test]
    fn disjoint_ranges_score_higher_than_near_identical() {
        let base = uniform(0.0, 1000);
        let shifted = uniform(10.0, 1000);
        let near: Vec<f64> = base.iter().map(|v| v + 1e-4).collect();
        let far = population_stability_index(&base, &shifted, DEFAULT_BUCKETS, DEFAULT_EPSILON);
        let close = population_stability_index(&base, &near, DEFAULT_BUCKETS, DEFAULT_EPSILON);
        assert!(far > 0.0);
        assert!(far > close);
        assert_eq!(kolmogorov_smirnov_statistic(&base, &shifted), 1.0);
    }

    #[test]
    fn constant_expected_collapses_to_zero() {
        let c = vec![3.0; 50];
        let other = uniform(0.0, 50);
        assert_eq!(
            population_stability_index(&c, &other, DEFAULT_BUCKETS, DEFAULT_EPSILON),
            0.0
        );
    }

    #[test]
    fn empty_side_is_undefined() {
        let x = uniform(0.0, 10);
        assert!(population_stability_index(&[], &x, 10, DEFAULT_EPSILON).is_nan());
        assert!(population_stability_index(&x, &[f64::NAN], 10, DEFAULT_EPSILON).is_nan());
        assert!(kolmogorov_smirnov_statistic(&x, &[]).is_nan());
    }

    #[test]
    fn ks_half_shift() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [3.0, 4.0, 5.0, 6.0];
        assert!((kolmogorov_smirnov_statistic(&a, &b) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_values_clip_to_edge_bins() {
        let edges = [0.0, 1.0, 2.0];
        assert_eq!(bin_of(&edges, -5.0), 0);
        assert_eq!(bin_of(&edges, 0.5), 0);
        assert_eq!(bin_of(&edges, 1.0), 1);
        assert_eq!(bin_of(&edges, 2.0), 1);
        assert_eq!(bin_of(&edges, 9.0), 1);
    }
}
