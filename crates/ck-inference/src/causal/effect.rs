//! ATT from matched pairs.
//!
//! The estimate is the mean of per-pair outcome differences; it is never
//! re-derived from group means.

use ck_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::matching::MatchingResult;
use super::units::{Covariates, Population};

/// Reference distribution for the confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    /// Student-t with `n_pairs - 1` degrees of freedom.
    StudentT,
    /// Standard normal.
    Normal,
}

/// Estimator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Interval level is `1 - alpha`.
    pub alpha: f64,
    /// Reference distribution.
    pub interval: IntervalMethod,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { alpha: 0.05, interval: IntervalMethod::StudentT }
    }
}

/// Average treatment effect on the treated, with uncertainty.
#[derive(Debug, Clone, Serialize)]
pub struct AttEstimate {
    /// Mean per-pair difference `y_treated - y_control`.
    pub att: f64,
    /// SD of the differences over `sqrt(n_pairs)`; infinite for one pair.
    pub se: f64,
    /// Lower interval bound.
    pub ci_lower: f64,
    /// Upper interval bound.
    pub ci_upper: f64,
    /// Interval level is `1 - alpha`.
    pub alpha: f64,
    /// Reference distribution used.
    pub interval: IntervalMethod,
    /// Pairs contributing to the estimate.
    pub n_pairs: usize,
    /// Treated units dropped by the caliper.
    pub n_unmatched_treated: usize,
    /// Mean outcome of the matched treated units (descriptive).
    pub mean_treated_outcome: f64,
    /// Mean outcome of the matched controls (descriptive).
    pub mean_control_outcome: f64,
}

/// ATT and interval from already-paired differences.
pub fn paired_difference_estimate(diffs: &[f64], config: &EstimatorConfig) -> Result<AttEstimate> {
    if !(config.alpha > 0.0 && config.alpha < 1.0) {
        return Err(Error::Validation(format!("alpha must be in (0, 1), got {}", config.alpha)));
    }
    if diffs.is_empty() {
        return Err(Error::Validation("paired differences must be non-empty".into()));
    }
    if diffs.iter().any(|d| !d.is_finite()) {
        return Err(Error::Validation("paired differences must be finite".into()));
    }

    let n = diffs.len();
    let att = diffs.iter().sum::<f64>() / n as f64;

    let (se, half_width) = if n < 2 {
        (f64::INFINITY, f64::INFINITY)
    } else {
        let var = diffs.iter().map(|d| (d - att).powi(2)).sum::<f64>() / (n - 1) as f64;
        let se = (var / n as f64).sqrt();
        let crit = match config.interval {
            IntervalMethod::StudentT => ck_prob::student_t::critical_value(config.alpha, (n - 1) as f64)?,
            IntervalMethod::Normal => ck_prob::normal::critical_value(config.alpha)?,
        };
        (se, crit * se)
    };

    Ok(AttEstimate {
        att,
        se,
        ci_lower: att - half_width,
        ci_upper: att + half_width,
        alpha: config.alpha,
        interval: config.interval,
        n_pairs: n,
        n_unmatched_treated: 0,
        mean_treated_outcome: f64::NAN,
        mean_control_outcome: f64::NAN,
    })
}

/// Outcomes of each matched pair as `(y_treated, y_control)`.
pub fn pair_outcomes<C: Covariates>(
    population: &Population<C>,
    matching: &MatchingResult,
) -> Result<Vec<(f64, f64)>> {
    matching
        .pairs
        .iter()
        .map(|p| {
            let t = population.get(p.treated_id).ok_or_else(|| {
                Error::Validation(format!("matched treated unit {} not in population", p.treated_id))
            })?;
            let c = population.get(p.control_id).ok_or_else(|| {
                Error::Validation(format!("matched control unit {} not in population", p.control_id))
            })?;
            Ok((t.outcome(), c.outcome()))
        })
        .collect()
}

/// Estimate the ATT over a matched cohort.
///
/// Fails with [`Error::InsufficientOverlap`] when no pair survived the caliper.
pub fn estimate_att<C: Covariates>(
    population: &Population<C>,
    matching: &MatchingResult,
    config: &EstimatorConfig,
) -> Result<AttEstimate> {
    if matching.pairs.is_empty() {
        return Err(Error::InsufficientOverlap {
            n_treated: matching.n_treated(),
            caliper: matching.caliper,
        });
    }
    let outcomes = pair_outcomes(population, matching)?;
    let diffs: Vec<f64> = outcomes.iter().map(|(t, c)| t - c).collect();

    let mut est = paired_difference_estimate(&diffs, config)?;
    let n = outcomes.len() as f64;
    est.n_unmatched_treated = matching.unmatched_treated.len();
    est.mean_treated_outcome = outcomes.iter().map(|(t, _)| t).sum::<f64>() / n;
    est.mean_control_outcome = outcomes.iter().map(|(_, c)| c).sum::<f64>() / n;
    Ok(est)
}
