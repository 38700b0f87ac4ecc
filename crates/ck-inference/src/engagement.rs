//! Feature-exposure engagement data: covariates, record ingestion, and a
//! seeded synthetic generator.
//!
//! The generator mimics a product launch where engaged, high-quality, long-tenure
//! users are more likely to be exposed to the new feature, so the naive
//! exposed-vs-unexposed gap is confounded. The true data-generating process is:
//!
//! ```text
//! high_quality ~ Bernoulli(p_high_quality)
//! baseline     ~ max(0.1, Normal(3 + high_quality, 1))
//! tenure_days  ~ Uniform(0, max_tenure_days)
//! logit P(exposed) = exposure_intercept
//!                  + confounding * (0.8·(baseline − 3) + 0.7·high_quality + 0.002·(tenure − max_tenure/2))
//! outcome = baseline + 0.5·high_quality + 0.001·tenure + true_effect·exposed + Normal(0, noise_sd)
//! ```

use ck_core::{Error, Result};
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::causal::units::{Covariates, Population, Unit};

/// Pre-exposure covariates of one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementCovariates {
    /// Engaged sessions per active day before the launch.
    pub baseline_engagement: f64,
    /// Signup cohort rated high quality.
    pub high_quality_cohort: bool,
    /// Days since signup at launch.
    pub tenure_days: f64,
}

impl Covariates for EngagementCovariates {
    fn names() -> &'static [&'static str] {
        &["baseline_engagement", "high_quality_cohort", "tenure_days"]
    }

    fn values(&self) -> Vec<f64> {
        vec![self.baseline_engagement, f64::from(u8::from(self.high_quality_cohort)), self.tenure_days]
    }
}

/// One user row as read from or written to JSON; any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngagementRecord {
    /// User identifier.
    pub user_id: u64,
    /// See [`EngagementCovariates::baseline_engagement`].
    #[serde(default)]
    pub baseline_engagement: Option<f64>,
    /// See [`EngagementCovariates::high_quality_cohort`].
    #[serde(default)]
    pub high_quality_cohort: Option<bool>,
    /// See [`EngagementCovariates::tenure_days`].
    #[serde(default)]
    pub tenure_days: Option<f64>,
    /// Exposed to the feature.
    #[serde(default)]
    pub exposed: Option<bool>,
    /// Post-launch engagement.
    #[serde(default)]
    pub outcome: Option<f64>,
}

fn require<T>(value: Option<T>, unit_id: u64, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::IncompleteRecord { unit_id, field: field.to_string() })
}

impl EngagementRecord {
    /// Convert to a validated unit; a missing field names the user and the field.
    pub fn into_unit(self) -> Result<Unit<EngagementCovariates>> {
        let id = self.user_id;
        let covariates = EngagementCovariates {
            baseline_engagement: require(self.baseline_engagement, id, "baseline_engagement")?,
            high_quality_cohort: require(self.high_quality_cohort, id, "high_quality_cohort")?,
            tenure_days: require(self.tenure_days, id, "tenure_days")?,
        };
        let exposed = require(self.exposed, id, "exposed")?;
        let outcome = require(self.outcome, id, "outcome")?;
        Unit::new(id, covariates, exposed, outcome)
    }
}

/// Build a population from raw records, rejecting the first incomplete one.
pub fn ingest_engagement_records(
    records: Vec<EngagementRecord>,
) -> Result<Population<EngagementCovariates>> {
    let units = records.into_iter().map(EngagementRecord::into_unit).collect::<Result<Vec<_>>>()?;
    Population::new(units)
}

/// Configuration for the synthetic engagement generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementDataConfig {
    /// Number of users.
    pub n_units: usize,
    /// Share of high-quality cohorts.
    pub p_high_quality: f64,
    /// Upper bound of the tenure distribution (days).
    pub max_tenure_days: f64,
    /// Exposure log-odds at average covariates.
    pub exposure_intercept: f64,
    /// Scales every covariate's effect on exposure (0 = randomized exposure).
    pub confounding: f64,
    /// True effect of exposure on the outcome.
    pub true_effect: f64,
    /// Outcome noise SD.
    pub noise_sd: f64,
    /// Random seed.
    pub seed: u64,
}

impl Default for EngagementDataConfig {
    fn default() -> Self {
        Self {
            n_units: 2000,
            p_high_quality: 0.5,
            max_tenure_days: 730.0,
            exposure_intercept: -0.5,
            confounding: 1.0,
            true_effect: -0.3,
            noise_sd: 0.5,
            seed: 42,
        }
    }
}

/// Generate complete engagement records.
pub fn generate_engagement_records(config: &EngagementDataConfig) -> Result<Vec<EngagementRecord>> {
    if config.n_units == 0 {
        return Err(Error::Validation("n_units must be > 0".into()));
    }
    if !(0.0..=1.0).contains(&config.p_high_quality) {
        return Err(Error::Validation("p_high_quality must be in [0, 1]".into()));
    }
    if !(config.max_tenure_days > 0.0 && config.max_tenure_days.is_finite()) {
        return Err(Error::Validation("max_tenure_days must be finite and > 0".into()));
    }
    if ![config.exposure_intercept, config.confounding, config.true_effect].iter().all(|v| v.is_finite()) {
        return Err(Error::Validation("generator coefficients must be finite".into()));
    }
    let noise = Normal::new(0.0, config.noise_sd)
        .map_err(|e| Error::Validation(format!("noise_sd: {e}")))?;
    let unit_normal = Normal::new(0.0, 1.0).map_err(|e| Error::Computation(e.to_string()))?;

    let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);
    let half_tenure = config.max_tenure_days / 2.0;

    let records = (0..config.n_units as u64)
        .map(|user_id| {
            let high_quality = rng.random_bool(config.p_high_quality);
            let hq = f64::from(u8::from(high_quality));
            let baseline = (3.0 + hq + unit_normal.sample(&mut rng)).max(0.1);
            let tenure = rng.random::<f64>() * config.max_tenure_days;

            let eta = config.exposure_intercept
                + config.confounding
                    * (0.8 * (baseline - 3.0) + 0.7 * hq + 0.002 * (tenure - half_tenure));
            let exposed = rng.random::<f64>() < ck_prob::math::sigmoid(eta);

            let outcome = baseline
                + 0.5 * hq
                + 0.001 * tenure
                + if exposed { config.true_effect } else { 0.0 }
                + noise.sample(&mut rng);

            EngagementRecord {
                user_id,
                baseline_engagement: Some(baseline),
                high_quality_cohort: Some(high_quality),
                tenure_days: Some(tenure),
                exposed: Some(exposed),
                outcome: Some(outcome),
            }
        })
        .collect();
    Ok(records)
}

/// Generate a synthetic engagement population.
pub fn generate_engagement_population(
    config: &EngagementDataConfig,
) -> Result<Population<EngagementCovariates>> {
    ingest_engagement_records(generate_engagement_records(config)?)
}
