//! Rosenbaum bounds for matched pairs.
//!
//! Wilcoxon signed-rank statistic on the paired differences, bounded under a
//! hidden confounder that multiplies the odds of treatment by at most Γ.
//! P-values use the normal approximation; zero differences are dropped and
//! tied magnitudes share their average rank.

use ck_core::{Error, Result};
use serde::Serialize;

/// Sensitivity of the matched effect to unobserved confounding.
#[derive(Debug, Clone, Serialize)]
pub struct RosenbaumResult {
    /// Γ values tested (each ≥ 1).
    pub gammas: Vec<f64>,
    /// Worst-case one-sided p-value at each Γ.
    pub p_upper: Vec<f64>,
    /// Best-case one-sided p-value at each Γ.
    pub p_lower: Vec<f64>,
    /// First Γ whose worst-case p-value exceeds `alpha`; `None` if none does.
    pub gamma_critical: Option<f64>,
    /// Significance level used for `gamma_critical`.
    pub alpha: f64,
    /// Non-zero pair differences entering the statistic.
    pub n_nonzero: usize,
}

/// Average ranks (1-based) of `values`, ties sharing the mean of their positions.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut idx: Vec<usize> = (0..values.len()).collect();
    idx.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < idx.len() {
        let mut j = i;
        while j + 1 < idx.len() && values[idx[j + 1]] == values[idx[i]] {
            j += 1;
        }
        let r = (i + j) as f64 / 2.0 + 1.0;
        for &k in &idx[i..=j] {
            ranks[k] = r;
        }
        i = j + 1;
    }
    ranks
}

/// Rosenbaum bounds on paired outcomes `(y_treated[i], y_control[i])`.
pub fn rosenbaum_bounds(
    y_treated: &[f64],
    y_control: &[f64],
    gammas: &[f64],
    alpha: f64,
) -> Result<RosenbaumResult> {
    let n = y_treated.len();
    if n == 0 {
        return Err(Error::Validation("matched pairs must be non-empty".into()));
    }
    if y_control.len() != n {
        return Err(Error::Validation(format!(
            "y_treated and y_control must have the same length, got {n} and {}",
            y_control.len()
        )));
    }
    if gammas.is_empty() {
        return Err(Error::Validation("gammas must be non-empty".into()));
    }
    if let Some(g) = gammas.iter().find(|g| !(g.is_finite() && **g >= 1.0)) {
        return Err(Error::Validation(format!("gamma values must be finite and >= 1, got {g}")));
    }
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::Validation(format!("alpha must be in (0, 1), got {alpha}")));
    }

    let diffs: Vec<f64> =
        y_treated.iter().zip(y_control).map(|(t, c)| t - c).filter(|d| *d != 0.0).collect();
    let m = diffs.len();
    if m == 0 {
        return Ok(RosenbaumResult {
            gammas: gammas.to_vec(),
            p_upper: vec![1.0; gammas.len()],
            p_lower: vec![1.0; gammas.len()],
            gamma_critical: Some(gammas[0]),
            alpha,
            n_nonzero: 0,
        });
    }

    let abs: Vec<f64> = diffs.iter().map(|d| d.abs()).collect();
    let ranks = average_ranks(&abs);
    let t_obs: f64 = diffs.iter().zip(&ranks).filter(|(d, _)| **d > 0.0).map(|(_, r)| r).sum();
    let sum_r: f64 = ranks.iter().sum();
    let sum_r2: f64 = ranks.iter().map(|r| r * r).sum();

    let tail = |p_plus: f64| -> Result<f64> {
        let e = sum_r * p_plus;
        let var = sum_r2 * p_plus * (1.0 - p_plus);
        let z = if var > 0.0 { (t_obs - e) / var.sqrt() } else { 0.0 };
        ck_prob::normal::sf(z)
    };

    let mut p_upper = Vec::with_capacity(gammas.len());
    let mut p_lower = Vec::with_capacity(gammas.len());
    let mut gamma_critical = None;
    for &gamma in gammas {
        let hi = tail(gamma / (1.0 + gamma))?;
        let lo = tail(1.0 / (1.0 + gamma))?;
        if gamma_critical.is_none() && hi > alpha {
            gamma_critical = Some(gamma);
        }
        p_upper.push(hi);
        p_lower.push(lo);
    }

    Ok(RosenbaumResult { gammas: gammas.to_vec(), p_upper, p_lower, gamma_critical, alpha, n_nonzero: m })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_ranks_with_ties() {
        assert_eq!(average_ranks(&[3.0, 1.0, 3.0, 2.0]), vec![3.5, 1.0, 3.5, 2.0]);
    }

    #[test]
    fn test_clear_effect_breaks_at_moderate_gamma() {
        let y_treated = [10.0, 12.0, 15.0, 11.0, 13.0];
        let y_control = [5.0, 6.0, 7.0, 5.5, 6.5];
        let gammas = [1.0, 1.5, 2.0, 3.0];
        let r = rosenbaum_bounds(&y_treated, &y_control, &gammas, 0.05).unwrap();
        // Γ = 1: T = 15, E = 7.5, Var = 13.75.
        assert!((r.p_upper[0] - 0.0217).abs() < 1e-3);
        assert_eq!(r.p_upper[0], r.p_lower[0]);
        assert_eq!(r.gamma_critical, Some(2.0));
        assert_eq!(r.n_nonzero, 5);
    }

    #[test]
    fn test_bounds_widen_with_gamma() {
        let y_treated = [3.0, 1.0, 4.0, 1.5, 5.0, 9.0, 2.0, 6.0];
        let y_control = [1.0, 2.0, 1.0, 1.0, 2.0, 3.0, 2.5, 1.0];
        let gammas = [1.0, 1.25, 1.5, 2.0, 4.0];
        let r = rosenbaum_bounds(&y_treated, &y_control, &gammas, 0.05).unwrap();
        for w in r.p_upper.windows(2) {
            assert!(w[1] >= w[0]);
        }
        for w in r.p_lower.windows(2) {
            assert!(w[1] <= w[0]);
        }
    }

    #[test]
    fn test_all_zero_differences() {
        let r = rosenbaum_bounds(&[1.0, 2.0], &[1.0, 2.0], &[1.0, 2.0], 0.05).unwrap();
        assert_eq!(r.p_upper, vec![1.0, 1.0]);
        assert_eq!(r.gamma_critical, Some(1.0));
    }

    #[test]
    fn test_validation() {
        assert!(rosenbaum_bounds(&[], &[], &[1.0], 0.05).is_err());
        assert!(rosenbaum_bounds(&[1.0], &[2.0], &[0.5], 0.05).is_err());
        assert!(rosenbaum_bounds(&[1.0], &[2.0, 3.0], &[1.0], 0.05).is_err());
        assert!(rosenbaum_bounds(&[1.0], &[2.0], &[1.0], 0.0).is_err());
    }
}
