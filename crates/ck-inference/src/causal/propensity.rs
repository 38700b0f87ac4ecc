//! Propensity model: P(treated = 1 | covariates) via logistic regression.
//!
//! Covariates are standardized (z-scored) before fitting so one ridge penalty
//! means the same thing for every column; reported coefficients are on that
//! standardized scale. Scoring is in-sample.

use ck_core::{Error, FitResult, Result};
use serde::{Deserialize, Serialize};

use super::units::{Covariates, Population};
use crate::regression::{LogisticFitConfig, LogisticRegressionModel};

/// A fitted score closer than this to 0 or 1 counts as saturated.
pub const SATURATION_EPS: f64 = 1e-10;

/// What to do when the covariates separate the treatment arms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SeparationPolicy {
    /// Report [`Error::Separation`].
    Fail,
    /// Refit once with the given ridge penalty; fail only if that still saturates.
    Regularize {
        /// Ridge penalty used for the refit.
        l2_penalty: f64,
    },
}

/// Propensity fitter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PropensityConfig {
    /// Ridge penalty on standardized slopes (0 = plain MLE).
    pub l2_penalty: f64,
    /// Maximum Newton iterations.
    pub max_iter: usize,
    /// Newton step tolerance.
    pub tol: f64,
    /// Separation handling.
    pub separation: SeparationPolicy,
}

impl Default for PropensityConfig {
    fn default() -> Self {
        Self { l2_penalty: 0.0, max_iter: 100, tol: 1e-8, separation: SeparationPolicy::Fail }
    }
}

/// Score range of one treatment arm.
#[derive(Debug, Clone, Serialize)]
pub struct ArmScoreSummary {
    /// Units in the arm.
    pub n: usize,
    /// Minimum score.
    pub min: f64,
    /// Mean score.
    pub mean: f64,
    /// Maximum score.
    pub max: f64,
}

/// Common-support diagnostics for the fitted scores.
#[derive(Debug, Clone, Serialize)]
pub struct OverlapSummary {
    /// Treated-arm score range.
    pub treated: ArmScoreSummary,
    /// Control-arm score range.
    pub control: ArmScoreSummary,
    /// Treated units scored outside `[control.min, control.max]`.
    pub n_treated_off_support: usize,
}

/// Fitted propensity scores for every unit of a population.
#[derive(Debug, Clone, Serialize)]
pub struct PropensityScores {
    /// Unit identifiers, in population order.
    pub unit_ids: Vec<u64>,
    /// Treatment flags, in population order.
    pub treated: Vec<bool>,
    /// Scores in (0, 1), in population order.
    pub scores: Vec<f64>,
    /// Logistic fit on standardized covariates (`intercept` + covariate names).
    pub model: FitResult,
    /// Whether the separation fallback refit was used.
    pub regularized: bool,
}

impl PropensityScores {
    /// Number of scored units.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// True when no unit was scored.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Score of the unit with identifier `id` (linear scan).
    pub fn get(&self, id: u64) -> Option<f64> {
        self.unit_ids.iter().position(|&u| u == id).map(|i| self.scores[i])
    }

    /// `(id, score)` pairs of one arm, in population order.
    pub fn arm(&self, treated: bool) -> Vec<(u64, f64)> {
        self.unit_ids
            .iter()
            .zip(&self.treated)
            .zip(&self.scores)
            .filter(|((_, t), _)| **t == treated)
            .map(|((id, _), s)| (*id, *s))
            .collect()
    }

    /// Sample standard deviation of all scores (0 for fewer than two units).
    pub fn std_dev(&self) -> f64 {
        crate::causal::sample_variance(&self.scores).sqrt()
    }

    /// Per-arm score ranges and off-support count.
    pub fn overlap(&self) -> OverlapSummary {
        let summarize = |arm: &[(u64, f64)]| {
            let n = arm.len();
            let (mut lo, mut hi, mut sum) = (f64::INFINITY, f64::NEG_INFINITY, 0.0);
            for &(_, s) in arm {
                lo = lo.min(s);
                hi = hi.max(s);
                sum += s;
            }
            let mean = if n > 0 { sum / n as f64 } else { f64::NAN };
            ArmScoreSummary { n, min: lo, mean, max: hi }
        };
        let t = self.arm(true);
        let c = self.arm(false);
        let control = summarize(&c);
        let n_off = t.iter().filter(|&&(_, s)| s < control.min || s > control.max).count();
        OverlapSummary { treated: summarize(&t), control, n_treated_off_support: n_off }
    }
}

fn standardize(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = rows.len() as f64;
    let p = rows.first().map_or(0, Vec::len);
    let mut mean = vec![0.0; p];
    for r in rows {
        for (m, v) in mean.iter_mut().zip(r) {
            *m += v / n;
        }
    }
    let mut sd = vec![0.0; p];
    for r in rows {
        for j in 0..p {
            sd[j] += (r[j] - mean[j]).powi(2) / n;
        }
    }
    for s in &mut sd {
        *s = s.sqrt();
    }
    rows.iter()
        .map(|r| {
            (0..p).map(|j| if sd[j] > 0.0 { (r[j] - mean[j]) / sd[j] } else { 0.0 }).collect()
        })
        .collect()
}

fn n_saturated(scores: &[f64]) -> usize {
    scores.iter().filter(|&&s| s < SATURATION_EPS || s > 1.0 - SATURATION_EPS).count()
}

fn fit_once(
    model: &LogisticRegressionModel,
    l2_penalty: f64,
    config: &PropensityConfig,
) -> Result<(FitResult, Vec<f64>)> {
    let fit_cfg = LogisticFitConfig { l2_penalty, max_iter: config.max_iter, tol: config.tol };
    let fit = model.fit(&fit_cfg)?;
    let scores = model.predict_proba(&fit.parameters)?;
    Ok((fit, scores))
}

/// Fit the propensity model and score every unit in-sample.
///
/// Fails with [`Error::DegenerateTreatment`] when an arm is empty and with
/// [`Error::Separation`] when scores saturate at 0/1 (after the optional
/// regularized refit).
pub fn fit_propensity<C: Covariates>(
    population: &Population<C>,
    config: &PropensityConfig,
) -> Result<PropensityScores> {
    population.require_both_arms()?;

    let rows: Vec<Vec<f64>> = population.units().iter().map(|u| u.row().to_vec()).collect();
    let labels: Vec<u8> = population.units().iter().map(|u| u8::from(u.treated())).collect();
    let model = LogisticRegressionModel::new(standardize(&rows), labels, true)?;

    let names: Vec<String> = std::iter::once("intercept".to_string())
        .chain(population.covariate_names().iter().map(|s| s.to_string()))
        .collect();

    let (mut fit, mut scores) = fit_once(&model, config.l2_penalty, config)?;
    let mut regularized = false;

    let saturated = n_saturated(&scores);
    if saturated > 0 {
        if let SeparationPolicy::Regularize { l2_penalty } = config.separation {
            log::warn!(
                "propensity: {saturated} saturated scores; refitting with l2_penalty={l2_penalty}"
            );
            (fit, scores) = fit_once(&model, l2_penalty, config)?;
            regularized = true;
        }
    }

    let saturated = n_saturated(&scores);
    if saturated > 0 {
        let covariate = fit
            .argmax_abs(1)
            .and_then(|j| names.get(j).cloned())
            .unwrap_or_else(|| "<unknown>".to_string());
        return Err(Error::Separation {
            n_saturated: saturated,
            n_units: population.len(),
            covariate,
        });
    }
    if !fit.converged {
        return Err(Error::Computation(format!(
            "propensity fit did not converge in {} iterations",
            fit.n_iter
        )));
    }

    fit.names = names;
    log::debug!(
        "propensity: fitted {} units in {} iterations (nll={:.4})",
        population.len(),
        fit.n_iter,
        fit.nll
    );

    Ok(PropensityScores {
        unit_ids: population.units().iter().map(|u| u.id()).collect(),
        treated: population.units().iter().map(|u| u.treated()).collect(),
        scores,
        model: fit,
        regularized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::units::tests::unit;
    use crate::causal::units::Unit;

    #[test]
    fn test_scores_strictly_inside_unit_interval() {
        let units: Vec<_> = (0..40)
            .map(|i| {
                let x = (i as f64 * 0.37).sin() * 2.0;
                let treated = (i * 7) % 5 < 2 || x > 1.5;
                unit(i, x, treated, 0.0)
            })
            .collect();
        let pop = Population::new(units).unwrap();
        let ps = fit_propensity(&pop, &PropensityConfig::default()).unwrap();
        assert_eq!(ps.len(), 40);
        assert!(ps.scores.iter().all(|&s| s > 0.0 && s < 1.0));
        assert!(!ps.regularized);
        assert_eq!(ps.model.names, vec!["intercept", "x", "z"]);
    }

    #[test]
    fn test_empty_arm_is_degenerate() {
        let pop = Population::new((0..5).map(|i| unit(i, i as f64, true, 0.0)).collect()).unwrap();
        let err = fit_propensity(&pop, &PropensityConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DegenerateTreatment { n_treated: 5, n_control: 0 }));
    }

    fn separated_population() -> Population<crate::causal::units::tests::Xy> {
        let units: Vec<Unit<_>> =
            (0..20).map(|i| unit(i, if i < 10 { i as f64 } else { 20.0 + i as f64 }, i >= 10, 0.0)).collect();
        Population::new(units).unwrap()
    }

    #[test]
    fn test_separation_is_reported() {
        let err = fit_propensity(&separated_population(), &PropensityConfig::default()).unwrap_err();
        match err {
            Error::Separation { n_saturated, n_units, .. } => {
                assert!(n_saturated > 0);
                assert_eq!(n_units, 20);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_separation_fallback_regularizes() {
        let cfg = PropensityConfig {
            separation: SeparationPolicy::Regularize { l2_penalty: 1.0 },
            ..Default::default()
        };
        let ps = fit_propensity(&separated_population(), &cfg).unwrap();
        assert!(ps.regularized);
        assert!(ps.scores.iter().all(|&s| s > SATURATION_EPS && s < 1.0 - SATURATION_EPS));
        let ov = ps.overlap();
        assert!(ov.treated.mean > ov.control.mean);
    }

    #[test]
    fn test_arm_partition_and_lookup() {
        let units: Vec<_> = (0..12).map(|i| unit(i, (i % 4) as f64, i % 2 == 0, 0.0)).collect();
        let pop = Population::new(units).unwrap();
        let ps = fit_propensity(&pop, &PropensityConfig::default()).unwrap();
        assert_eq!(ps.arm(true).len(), 6);
        assert_eq!(ps.arm(false).len(), 6);
        assert_eq!(ps.get(3), Some(ps.scores[3]));
        assert!(ps.std_dev() >= 0.0);
    }
}
