//! Error types for causalkit

use thiserror::Error;

/// causalkit error type
#[derive(Error, Debug)]
pub enum Error {
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// One treatment arm is empty.
    #[error("Degenerate treatment: {n_treated} treated and {n_control} control units")]
    DegenerateTreatment {
        /// Number of treated units in the population.
        n_treated: usize,
        /// Number of control units in the population.
        n_control: usize,
    },

    /// Covariates (quasi-)perfectly separate the treatment arms.
    #[error(
        "Separation: {n_saturated} of {n_units} propensity scores saturate at 0/1 \
         (strongest covariate: {covariate}); regularize the fit or drop the covariate"
    )]
    Separation {
        /// Number of units whose fitted score is numerically 0 or 1.
        n_saturated: usize,
        /// Population size.
        n_units: usize,
        /// Covariate with the largest standardized coefficient.
        covariate: String,
    },

    /// No treated unit found a control within the caliper.
    #[error("Insufficient overlap: none of {n_treated} treated units matched within caliper {caliper}")]
    InsufficientOverlap {
        /// Number of treated units that were offered for matching.
        n_treated: usize,
        /// Caliper width on the propensity scale.
        caliper: f64,
    },

    /// A record is missing a covariate, treatment flag, or outcome.
    #[error("Incomplete record for unit {unit_id}: missing or non-finite `{field}`")]
    IncompleteRecord {
        /// Offending unit identifier.
        unit_id: u64,
        /// Offending field name.
        field: String,
    },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_record_names_unit() {
        let e = Error::IncompleteRecord { unit_id: 42, field: "outcome".into() };
        let msg = e.to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("outcome"));
    }

    #[test]
    fn test_separation_mentions_remedy() {
        let e = Error::Separation { n_saturated: 3, n_units: 20, covariate: "tenure".into() };
        assert!(e.to_string().contains("regularize"));
    }
}
