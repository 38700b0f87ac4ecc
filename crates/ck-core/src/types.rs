//! Common data types for causalkit

use serde::{Deserialize, Serialize};

/// Fit result containing parameter estimates and uncertainties
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    /// Parameter names, in the same order as `parameters`.
    pub names: Vec<String>,

    /// Best-fit parameter values
    pub parameters: Vec<f64>,

    /// Parameter uncertainties (sqrt of covariance diagonal)
    pub uncertainties: Vec<f64>,

    /// Covariance matrix (row-major, N×N). `None` if Hessian inversion failed.
    pub covariance: Option<Vec<f64>>,

    /// Negative log-likelihood at the optimum (including any penalty term)
    pub nll: f64,

    /// Convergence status
    pub converged: bool,

    /// Number of solver iterations
    pub n_iter: usize,
}

impl FitResult {
    /// Create a new fit result
    pub fn new(
        names: Vec<String>,
        parameters: Vec<f64>,
        uncertainties: Vec<f64>,
        nll: f64,
        converged: bool,
        n_iter: usize,
    ) -> Self {
        Self { names, parameters, uncertainties, covariance: None, nll, converged, n_iter }
    }

    /// Attach a covariance matrix (row-major).
    pub fn with_covariance(mut self, covariance: Vec<f64>) -> Self {
        self.covariance = Some(covariance);
        self
    }

    /// Index of the largest-magnitude parameter, skipping the first `skip` entries.
    pub fn argmax_abs(&self, skip: usize) -> Option<usize> {
        self.parameters
            .iter()
            .enumerate()
            .skip(skip)
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
    }
}
