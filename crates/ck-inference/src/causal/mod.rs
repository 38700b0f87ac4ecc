//! Observational causal inference on unit-level data.
//!
//! The matched-cohort workflow runs in four stages, each a plain function over
//! the previous stage's output:
//!
//! 1. [`propensity::fit_propensity`] scores every unit with a logistic model.
//! 2. [`matching::match_units`] pairs treated units with controls under a caliper.
//! 3. [`balance::balance_table`] reports covariate SMDs before and after matching.
//! 4. [`effect::estimate_att`] averages per-pair outcome differences.
//!
//! [`pipeline::run_pipeline`] chains them and adds the naive Welch contrast and
//! Rosenbaum bounds. [`did`] is the separate 2×2 difference-in-differences
//! estimator for before/after panels.

pub mod balance;
pub mod did;
pub mod effect;
pub mod matching;
pub mod naive;
pub mod pipeline;
pub mod propensity;
pub mod sensitivity;
pub mod units;

pub use balance::{BalanceTable, CovariateBalance, balance_table};
pub use did::{DidResult, did_two_by_two};
pub use effect::{AttEstimate, EstimatorConfig, IntervalMethod, estimate_att};
pub use matching::{Caliper, MatchedPair, MatchingConfig, MatchingResult, match_nearest, match_units};
pub use naive::{WelchResult, welch_t_test};
pub use pipeline::{AttReport, PipelineConfig, run_pipeline};
pub use propensity::{
    OverlapSummary, PropensityConfig, PropensityScores, SeparationPolicy, fit_propensity,
};
pub use sensitivity::{RosenbaumResult, rosenbaum_bounds};
pub use units::{Covariates, Population, Unit};

/// Arithmetic mean (NaN for an empty slice).
pub(crate) fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return f64::NAN;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance with `n - 1` denominator (0 for fewer than two values).
pub(crate) fn sample_variance(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64
}
