//! Statistics reduction over scenario-level NPVs (C6, §4.4).

use crate::error::CoreError;

/// Percentiles reported by a run, §3/§6.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentiles {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Summary statistics over the `S` scenario-level portfolio NPVs (§3,
/// §4.4). Degenerate inputs (empty portfolio or empty scenario set)
/// yield every field at 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationResult {
    pub mean: f64,
    pub std_dev: f64,
    pub percentiles: Percentiles,
    pub cte95: f64,
    pub scenario_count: usize,
    /// Present only when the run requested `retain_distribution`.
    pub distribution: Option<Vec<f64>>,
}

impl ValuationResult {
    /// Arbitrary percentile `p` (§4.7 `result_percentile(p)`). The five
    /// canonical percentiles are answered from the precomputed fields;
    /// any other `p` requires the retained distribution to be
    /// recomputed from, and returns `None` if it wasn't retained.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        const EPS: f64 = 1e-9;
        if (p - 50.0).abs() < EPS {
            return Some(self.percentiles.p50);
        }
        if (p - 75.0).abs() < EPS {
            return Some(self.percentiles.p75);
        }
        if (p - 90.0).abs() < EPS {
            return Some(self.percentiles.p90);
        }
        if (p - 95.0).abs() < EPS {
            return Some(self.percentiles.p95);
        }
        if (p - 99.0).abs() < EPS {
            return Some(self.percentiles.p99);
        }
        let distribution = self.distribution.as_ref()?;
        if distribution.is_empty() {
            return Some(0.0);
        }
        let mut sorted = distribution.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        Some(interpolated_percentile(&sorted, p))
    }
}

/// Linear-interpolated percentile of a *sorted* slice: rank
/// `r = (p/100)·(n-1)`, interpolating between `sorted[floor(r)]` and
/// `sorted[ceil(r)]` (§4.4).
fn interpolated_percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let r = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = r.floor() as usize;
    let hi = r.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = r - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Conditional tail expectation at 95%: the mean of the worst
/// `k = max(1, floor(0.05·S))` scenarios, where "worst" means smallest
/// NPV (see DESIGN.md for the floor-vs-ceiling resolution).
fn cte95(sorted_ascending: &[f64]) -> f64 {
    let s = sorted_ascending.len();
    let k = (0.05 * s as f64).floor().max(1.0) as usize;
    let k = k.min(s);
    sorted_ascending[..k].iter().sum::<f64>() / k as f64
}

/// Reduce a vector of per-scenario portfolio NPVs to summary statistics
/// (§4.4). `retain_distribution` controls whether the (unsorted, in
/// original scenario order) vector is kept in the result.
pub fn compute_statistics(
    npvs: Vec<f64>,
    retain_distribution: bool,
) -> Result<ValuationResult, CoreError> {
    let scenario_count = npvs.len();

    if scenario_count == 0 {
        return Ok(ValuationResult {
            mean: 0.0,
            std_dev: 0.0,
            percentiles: Percentiles {
                p50: 0.0,
                p75: 0.0,
                p90: 0.0,
                p95: 0.0,
                p99: 0.0,
            },
            cte95: 0.0,
            scenario_count: 0,
            distribution: if retain_distribution {
                Some(Vec::new())
            } else {
                None
            },
        });
    }

    for (i, v) in npvs.iter().enumerate() {
        if !v.is_finite() {
            return Err(CoreError::NonFiniteResult {
                policy_index: 0,
                scenario_index: i,
                value: *v,
            });
        }
    }

    let mean = npvs.iter().sum::<f64>() / scenario_count as f64;
    let variance = npvs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / scenario_count as f64;
    let std_dev = variance.sqrt();

    let mut sorted = npvs.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let percentiles = Percentiles {
        p50: interpolated_percentile(&sorted, 50.0),
        p75: interpolated_percentile(&sorted, 75.0),
        p90: interpolated_percentile(&sorted, 90.0),
        p95: interpolated_percentile(&sorted, 95.0),
        p99: interpolated_percentile(&sorted, 99.0),
    };

    Ok(ValuationResult {
        mean,
        std_dev,
        percentiles,
        cte95: cte95(&sorted),
        scenario_count,
        distribution: if retain_distribution { Some(npvs) } else { None },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_zeroed_statistics() {
        let result = compute_statistics(Vec::new(), false).unwrap();
        assert_eq!(result.mean, 0.0);
        assert_eq!(result.std_dev, 0.0);
        assert_eq!(result.cte95, 0.0);
        assert_eq!(result.scenario_count, 0);
    }

    #[test]
    fn percentile_and_cte_match_spec_example() {
        // NPVs are exactly 100, 99, ..., 1 (100 scenarios).
        let npvs: Vec<f64> = (1..=100).rev().map(|v| v as f64).collect();
        let result = compute_statistics(npvs, false).unwrap();
        assert!((result.percentiles.p50 - 50.5).abs() < 1e-9);
        assert!((result.percentiles.p95 - 95.05).abs() < 1e-9);
        assert!((result.cte95 - 3.0).abs() < 1e-9);
    }

    #[test]
    fn scenario_reordering_leaves_statistics_unchanged() {
        let ascending: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let mut shuffled = ascending.clone();
        shuffled.reverse();
        let a = compute_statistics(ascending, false).unwrap();
        let b = compute_statistics(shuffled, false).unwrap();
        assert_eq!(a.mean, b.mean);
        assert_eq!(a.std_dev, b.std_dev);
        assert_eq!(a.percentiles, b.percentiles);
        assert_eq!(a.cte95, b.cte95);
    }

    #[test]
    fn retain_distribution_preserves_original_order() {
        let npvs = vec![3.0, 1.0, 2.0];
        let result = compute_statistics(npvs.clone(), true).unwrap();
        assert_eq!(result.distribution, Some(npvs));
    }

    #[test]
    fn cte95_tail_size_rounds_down_a_fractional_fraction() {
        // S = 110: 0.05*110 = 5.5, tail is floor(5.5) = 5 scenarios.
        let npvs: Vec<f64> = (1..=110).map(|v| v as f64).collect();
        let result = compute_statistics(npvs, false).unwrap();
        let expected_mean_of_worst_five = (1..=5).sum::<i64>() as f64 / 5.0;
        assert!((result.cte95 - expected_mean_of_worst_five).abs() < 1e-9);
    }

    #[test]
    fn cte95_tail_is_never_smaller_than_one_scenario() {
        let npvs = vec![10.0, 20.0, 30.0]; // 0.05*3 = 0.15, floor = 0
        let result = compute_statistics(npvs, false).unwrap();
        assert!((result.cte95 - 10.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let err = compute_statistics(vec![1.0, f64::NAN], false).unwrap_err();
        assert_eq!(err.code(), "E_NON_FINITE");
    }

    #[test]
    fn percentile_method_answers_canonical_values_without_distribution() {
        let npvs: Vec<f64> = (1..=100).rev().map(|v| v as f64).collect();
        let result = compute_statistics(npvs, false).unwrap();
        assert!((result.percentile(50.0).unwrap() - 50.5).abs() < 1e-9);
        assert!(result.percentile(42.0).is_none());
    }

    #[test]
    fn percentile_method_recomputes_arbitrary_p_from_retained_distribution() {
        let npvs: Vec<f64> = (1..=100).rev().map(|v| v as f64).collect();
        let result = compute_statistics(npvs, true).unwrap();
        let p42 = result.percentile(42.0).unwrap();
        assert!((p42 - 42.58).abs() < 1e-6, "p42 = {p42}");
    }
}
