//! End-to-end matched-cohort analysis: fit, match, check balance, estimate.

use ck_core::{FitResult, Result};
use serde::{Deserialize, Serialize};

use super::balance::{BalanceTable, balance_table};
use super::effect::{AttEstimate, EstimatorConfig, estimate_att, pair_outcomes};
use super::matching::{MatchingConfig, MatchingResult, match_units};
use super::naive::{WelchResult, welch_t_test};
use super::propensity::{OverlapSummary, PropensityConfig, fit_propensity};
use super::sensitivity::{RosenbaumResult, rosenbaum_bounds};
use super::units::{Covariates, Population};

/// Settings for every stage of the analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Propensity model.
    pub propensity: PropensityConfig,
    /// Matcher.
    pub matching: MatchingConfig,
    /// ATT estimator.
    pub estimator: EstimatorConfig,
    /// Γ grid for Rosenbaum bounds; empty disables them.
    pub rosenbaum_gammas: Vec<f64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            propensity: PropensityConfig::default(),
            matching: MatchingConfig::default(),
            estimator: EstimatorConfig::default(),
            rosenbaum_gammas: vec![1.0, 1.25, 1.5, 2.0, 3.0],
        }
    }
}

/// Everything the analysis produced.
#[derive(Debug, Clone, Serialize)]
pub struct AttReport {
    /// Matched ATT.
    pub estimate: AttEstimate,
    /// Unadjusted Welch comparison of all treated vs all controls.
    pub naive: Option<WelchResult>,
    /// Covariate balance before and after matching.
    pub balance: BalanceTable,
    /// Propensity score ranges per arm.
    pub overlap: OverlapSummary,
    /// Matched pairs and unmatched treated units.
    pub matching: MatchingResult,
    /// Sensitivity of the matched effect to hidden confounding.
    pub sensitivity: Option<RosenbaumResult>,
    /// Propensity model on standardized covariates.
    pub propensity_model: FitResult,
    /// Whether the separation fallback refit was used.
    pub regularized: bool,
}

/// Run the full analysis on `population`.
///
/// Stage errors propagate unchanged: [`ck_core::Error::DegenerateTreatment`],
/// [`ck_core::Error::Separation`] and [`ck_core::Error::InsufficientOverlap`].
/// The naive comparison and Rosenbaum bounds are descriptive extras and are
/// left out (with a warning) when their inputs are too small.
pub fn run_pipeline<C: Covariates>(
    population: &Population<C>,
    config: &PipelineConfig,
) -> Result<AttReport> {
    let (n_treated, n_control) = population.arm_sizes();
    log::info!("pipeline: {} units ({n_treated} treated, {n_control} control)", population.len());

    let scores = fit_propensity(population, &config.propensity)?;
    let matching = match_units(&scores, &config.matching)?;
    let balance = balance_table(population, &matching)?;
    let estimate = estimate_att(population, &matching, &config.estimator)?;

    let naive = match welch_t_test(
        &population.outcomes(true),
        &population.outcomes(false),
        config.estimator.alpha,
    ) {
        Ok(r) => Some(r),
        Err(e) => {
            log::warn!("pipeline: naive comparison skipped: {e}");
            None
        }
    };

    let sensitivity = if config.rosenbaum_gammas.is_empty() {
        None
    } else {
        let (yt, yc): (Vec<f64>, Vec<f64>) = pair_outcomes(population, &matching)?.into_iter().unzip();
        Some(rosenbaum_bounds(&yt, &yc, &config.rosenbaum_gammas, config.estimator.alpha)?)
    };

    log::info!(
        "pipeline: att={:.4} (se={:.4}) from {} pairs; max |smd| {:.3} -> {:.3}",
        estimate.att,
        estimate.se,
        estimate.n_pairs,
        balance.max_abs_smd_pre(),
        balance.max_abs_smd_post()
    );

    Ok(AttReport {
        estimate,
        naive,
        balance,
        overlap: scores.overlap(),
        matching,
        sensitivity,
        regularized: scores.regularized,
        propensity_model: scores.model,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::causal::matching::Caliper;
    use crate::causal::units::tests::unit;
    use ck_core::Error;

    fn overlapping_population() -> Population<crate::causal::units::tests::Xy> {
        let units = (0..60u64)
            .map(|i| {
                let x = ((i * 37) % 60) as f64 / 10.0;
                let treated = (i * 13) % 7 < 3;
                let y = x + if treated { 2.0 } else { 0.0 } + ((i % 5) as f64 - 2.0) * 0.01;
                unit(i, x, treated, y)
            })
            .collect();
        Population::new(units).unwrap()
    }

    #[test]
    fn test_pipeline_produces_consistent_report() {
        let pop = overlapping_population();
        let cfg = PipelineConfig {
            matching: MatchingConfig { caliper: Caliper::StdDevMultiple(0.5), replacement: true },
            ..Default::default()
        };
        let report = run_pipeline(&pop, &cfg).unwrap();
        assert_eq!(report.estimate.n_pairs, report.matching.pairs.len());
        assert_eq!(report.balance.n_pairs, report.matching.pairs.len());
        assert_eq!(report.propensity_model.names, vec!["intercept", "x", "z"]);
        assert!(report.naive.is_some());
        let sens = report.sensitivity.unwrap();
        assert_eq!(sens.gammas.len(), 5);
    }

    #[test]
    fn test_pipeline_propagates_degenerate_treatment() {
        let pop = Population::new((0..4).map(|i| unit(i, i as f64, false, 0.0)).collect()).unwrap();
        let err = run_pipeline(&pop, &PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, Error::DegenerateTreatment { n_treated: 0, n_control: 4 }));
    }

    #[test]
    fn test_empty_gamma_grid_disables_sensitivity() {
        let cfg = PipelineConfig { rosenbaum_gammas: Vec::new(), ..Default::default() };
        let cfg = PipelineConfig {
            matching: MatchingConfig { caliper: Caliper::Absolute(1.0), replacement: false },
            ..cfg
        };
        let report = run_pipeline(&overlapping_population(), &cfg).unwrap();
        assert!(report.sensitivity.is_none());
        assert!(report.estimate.n_pairs > 0);
    }
}
