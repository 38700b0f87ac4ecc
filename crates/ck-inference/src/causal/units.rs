//! Observed units and validated populations.
//!
//! Covariates are a statically declared structure per analysis: each analysis
//! defines a struct implementing [`Covariates`], which fixes the column names
//! and their numeric encoding once for the propensity fit and the balance
//! diagnostics alike.

use std::collections::HashMap;

use ck_core::{Error, Result};

/// A statically declared set of pre-treatment covariates.
///
/// Categorical covariates are encoded by the implementor (typically as 0/1
/// indicator columns). Every value written by [`Covariates::values`] must be
/// measured before treatment assignment.
pub trait Covariates: Clone + std::fmt::Debug {
    /// Column names, in the order [`Covariates::values`] emits them.
    fn names() -> &'static [&'static str];

    /// Numeric encoding of this unit's covariates.
    fn values(&self) -> Vec<f64>;
}

/// One observed individual.
#[derive(Debug, Clone)]
pub struct Unit<C: Covariates> {
    id: u64,
    covariates: C,
    row: Vec<f64>,
    treated: bool,
    outcome: f64,
}

impl<C: Covariates> Unit<C> {
    /// Build a unit, rejecting missing (non-finite) covariates or outcome.
    pub fn new(id: u64, covariates: C, treated: bool, outcome: f64) -> Result<Self> {
        let names = C::names();
        let row = covariates.values();
        if row.len() != names.len() {
            return Err(Error::Validation(format!(
                "covariate encoding for unit {id} has {} values, expected {}",
                row.len(),
                names.len()
            )));
        }
        if let Some(j) = row.iter().position(|v| !v.is_finite()) {
            return Err(Error::IncompleteRecord { unit_id: id, field: names[j].to_string() });
        }
        if !outcome.is_finite() {
            return Err(Error::IncompleteRecord { unit_id: id, field: "outcome".to_string() });
        }
        Ok(Self { id, covariates, row, treated, outcome })
    }

    /// Unit identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Typed covariates.
    pub fn covariates(&self) -> &C {
        &self.covariates
    }

    /// Encoded covariate row.
    pub fn row(&self) -> &[f64] {
        &self.row
    }

    /// Treatment indicator.
    pub fn treated(&self) -> bool {
        self.treated
    }

    /// Observed outcome.
    pub fn outcome(&self) -> f64 {
        self.outcome
    }
}

/// An ordered, validated snapshot of units.
#[derive(Debug, Clone)]
pub struct Population<C: Covariates> {
    units: Vec<Unit<C>>,
    index: HashMap<u64, usize>,
}

impl<C: Covariates> Population<C> {
    /// Validate a non-empty set of units with unique identifiers.
    pub fn new(units: Vec<Unit<C>>) -> Result<Self> {
        if units.is_empty() {
            return Err(Error::Validation("population must be non-empty".into()));
        }
        if C::names().is_empty() {
            return Err(Error::Validation("covariate set must declare at least one column".into()));
        }
        let mut index = HashMap::with_capacity(units.len());
        for (i, u) in units.iter().enumerate() {
            if index.insert(u.id, i).is_some() {
                return Err(Error::Validation(format!("duplicate unit id {}", u.id)));
            }
        }
        Ok(Self { units, index })
    }

    /// All units, in input order.
    pub fn units(&self) -> &[Unit<C>] {
        &self.units
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Always false for a constructed population.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Look up a unit by identifier.
    pub fn get(&self, id: u64) -> Option<&Unit<C>> {
        self.index.get(&id).map(|&i| &self.units[i])
    }

    /// Covariate column names.
    pub fn covariate_names(&self) -> &'static [&'static str] {
        C::names()
    }

    /// Number of covariate columns.
    pub fn n_covariates(&self) -> usize {
        C::names().len()
    }

    /// `(n_treated, n_control)`.
    pub fn arm_sizes(&self) -> (usize, usize) {
        let n_treated = self.units.iter().filter(|u| u.treated).count();
        (n_treated, self.units.len() - n_treated)
    }

    /// Fail with [`Error::DegenerateTreatment`] unless both arms are populated.
    pub fn require_both_arms(&self) -> Result<()> {
        let (n_treated, n_control) = self.arm_sizes();
        if n_treated == 0 || n_control == 0 {
            return Err(Error::DegenerateTreatment { n_treated, n_control });
        }
        Ok(())
    }

    /// Outcomes of one arm, in input order.
    pub fn outcomes(&self, treated: bool) -> Vec<f64> {
        self.units.iter().filter(|u| u.treated == treated).map(|u| u.outcome).collect()
    }
}
