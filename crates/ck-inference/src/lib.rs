//! # ck-inference
//!
//! Observational causal inference for causalkit.
//!
//! This crate provides:
//! - Logistic regression by penalized Newton–Raphson
//! - Propensity-score fitting with separation detection
//! - Greedy 1:1 caliper matching, balance diagnostics and the matched ATT
//! - Naive Welch comparison, Rosenbaum bounds and 2×2 difference-in-differences
//! - A seeded synthetic engagement generator for feature-launch analyses

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Propensity matching, balance, effect estimation and DiD.
pub mod causal;
/// Engagement covariates, record ingestion and synthetic data.
pub mod engagement;
/// Logistic regression (penalized IRLS).
pub mod regression;

pub use causal::{
    AttEstimate, AttReport, BalanceTable, Caliper, Covariates, DidResult, EstimatorConfig,
    IntervalMethod, MatchingConfig, MatchingResult, PipelineConfig, Population, PropensityConfig,
    PropensityScores, RosenbaumResult, SeparationPolicy, Unit, WelchResult, balance_table,
    did_two_by_two, estimate_att, fit_propensity, match_units, rosenbaum_bounds, run_pipeline,
    welch_t_test,
};
pub use engagement::{
    EngagementCovariates, EngagementDataConfig, EngagementRecord, generate_engagement_population,
    generate_engagement_records, ingest_engagement_records,
};
pub use regression::{LogisticFitConfig, LogisticRegressionModel};
