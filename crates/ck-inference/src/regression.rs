//! Logistic regression fitted by penalized Newton–Raphson (IRLS).
//!
//! Model:
//! `y_i ~ Bernoulli(sigmoid(eta_i))`, `eta_i = intercept + X_i * beta`
//!
//! Objective (penalized NLL):
//! `sum_i [log(1 + exp(eta_i)) - y_i * eta_i] + 0.5 * l2 * ||beta||^2`
//!
//! The intercept is never penalized.

use ck_core::{Error, FitResult, Result};
use ck_prob::math::{log1pexp, log1pexp_and_sigmoid};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Diagonal floor added to the Hessian so constant columns and saturated
/// fits cannot make it singular.
const RIDGE_FLOOR: f64 = 1e-10;

/// Maximum number of step halvings per Newton iteration.
const MAX_HALVINGS: usize = 30;

#[inline]
fn validate_xy_dims(n: usize, p: usize, x_len: usize, y_len: usize) -> Result<()> {
    if n == 0 {
        return Err(Error::Validation("X/y must be non-empty".to_string()));
    }
    if p == 0 {
        return Err(Error::Validation("X must have at least 1 feature column".to_string()));
    }
    if x_len != n * p {
        return Err(Error::Validation(format!(
            "X has wrong length: expected n*p={}, got {}",
            n * p,
            x_len
        )));
    }
    if y_len != n {
        return Err(Error::Validation(format!(
            "y has wrong length: expected n={}, got {}",
            n, y_len
        )));
    }
    Ok(())
}

#[inline]
fn row_dot(x_row: &[f64], beta: &[f64]) -> f64 {
    debug_assert_eq!(x_row.len(), beta.len());
    x_row.iter().zip(beta).map(|(&x, &b)| x * b).sum()
}

/// Dense row-major design matrix.
#[derive(Debug, Clone)]
struct DenseX {
    n: usize,
    p: usize,
    data: Vec<f64>, // length n*p, row-major
}

impl DenseX {
    fn from_rows(x: Vec<Vec<f64>>) -> Result<Self> {
        let n = x.len();
        let p = x.first().map(|r| r.len()).unwrap_or(0);
        if n == 0 || p == 0 {
            return Err(Error::Validation("X must be non-empty (n>0, p>0)".to_string()));
        }
        let mut data = Vec::with_capacity(n * p);
        for (i, row) in x.into_iter().enumerate() {
            if row.len() != p {
                return Err(Error::Validation(format!(
                    "X must be rectangular: row {} has len {}, expected {}",
                    i,
                    row.len(),
                    p
                )));
            }
            for v in row {
                if !v.is_finite() {
                    return Err(Error::Validation("X must contain only finite values".to_string()));
                }
                data.push(v);
            }
        }
        Ok(Self { n, p, data })
    }

    #[inline]
    fn row(&self, i: usize) -> &[f64] {
        let start = i * self.p;
        &self.data[start..start + self.p]
    }
}

/// Solver settings for [`LogisticRegressionModel::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticFitConfig {
    /// Ridge penalty on the slope coefficients (0 = plain MLE).
    pub l2_penalty: f64,
    /// Maximum Newton iterations.
    pub max_iter: usize,
    /// Convergence threshold on the largest absolute Newton step.
    pub tol: f64,
}

impl Default for LogisticFitConfig {
    fn default() -> Self {
        Self { l2_penalty: 0.0, max_iter: 100, tol: 1e-8 }
    }
}

impl LogisticFitConfig {
    fn validate(&self) -> Result<()> {
        if !self.l2_penalty.is_finite() || self.l2_penalty < 0.0 {
            return Err(Error::Validation(format!(
                "l2_penalty must be finite and >= 0, got {}",
                self.l2_penalty
            )));
        }
        if self.max_iter == 0 {
            return Err(Error::Validation("max_iter must be > 0".into()));
        }
        if !self.tol.is_finite() || self.tol <= 0.0 {
            return Err(Error::Validation(format!("tol must be finite and > 0, got {}", self.tol)));
        }
        Ok(())
    }
}

/// Logistic regression (Bernoulli) with logit link.
#[derive(Debug, Clone)]
pub struct LogisticRegressionModel {
    x: DenseX,
    y: Vec<u8>, // 0/1
    include_intercept: bool,
}

impl LogisticRegressionModel {
    /// Create a new logistic regression model from row-wise `X` and binary `y`.
    pub fn new(x: Vec<Vec<f64>>, y: Vec<u8>, include_intercept: bool) -> Result<Self> {
        let x = DenseX::from_rows(x)?;
        validate_xy_dims(x.n, x.p, x.data.len(), y.len())?;
        if y.iter().any(|&v| v != 0 && v != 1) {
            return Err(Error::Validation("y must contain only 0/1 values".to_string()));
        }
        Ok(Self { x, y, include_intercept })
    }

    /// Number of parameters (slopes plus the optional intercept).
    pub fn dim(&self) -> usize {
        self.x.p + usize::from(self.include_intercept)
    }

    /// Parameter names: `intercept`, `beta1`, `beta2`, ...
    pub fn parameter_names(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.dim());
        if self.include_intercept {
            out.push("intercept".to_string());
        }
        for j in 0..self.x.p {
            out.push(format!("beta{}", j + 1));
        }
        out
    }

    #[inline]
    fn offset(&self) -> usize {
        usize::from(self.include_intercept)
    }

    #[inline]
    fn eta(&self, i: usize, params: &[f64]) -> f64 {
        let row = self.x.row(i);
        if self.include_intercept {
            params[0] + row_dot(row, &params[1..])
        } else {
            row_dot(row, params)
        }
    }

    fn check_params(&self, params: &[f64]) -> Result<()> {
        if params.len() != self.dim() {
            return Err(Error::Validation(format!(
                "expected {} parameters, got {}",
                self.dim(),
                params.len()
            )));
        }
        if params.iter().any(|v| !v.is_finite()) {
            return Err(Error::Validation("params must contain only finite values".to_string()));
        }
        Ok(())
    }

    fn penalty(&self, params: &[f64], l2: f64) -> f64 {
        0.5 * l2 * params[self.offset()..].iter().map(|b| b * b).sum::<f64>()
    }

    /// Penalized negative log-likelihood.
    pub fn nll(&self, params: &[f64], l2: f64) -> Result<f64> {
        self.check_params(params)?;
        let mut nll = 0.0;
        for i in 0..self.x.n {
            let eta = self.eta(i, params);
            nll += log1pexp(eta) - f64::from(self.y[i]) * eta;
        }
        Ok(nll + self.penalty(params, l2))
    }

    /// Gradient of the penalized NLL.
    pub fn grad_nll(&self, params: &[f64], l2: f64) -> Result<Vec<f64>> {
        self.check_params(params)?;
        let off = self.offset();
        let mut grad = vec![0.0; self.dim()];
        for i in 0..self.x.n {
            let (_, mu) = log1pexp_and_sigmoid(self.eta(i, params));
            let err = mu - f64::from(self.y[i]);
            if self.include_intercept {
                grad[0] += err;
            }
            for (g, &xj) in grad[off..].iter_mut().zip(self.x.row(i)) {
                *g += err * xj;
            }
        }
        for (g, &b) in grad[off..].iter_mut().zip(&params[off..]) {
            *g += l2 * b;
        }
        Ok(grad)
    }

    /// Gradient and Hessian of the penalized NLL in one pass.
    fn grad_hess(&self, params: &[f64], l2: f64) -> (DVector<f64>, DMatrix<f64>) {
        let d = self.dim();
        let off = self.offset();
        let mut grad = DVector::zeros(d);
        let mut hess = DMatrix::zeros(d, d);
        let mut z = vec![0.0; d];
        for i in 0..self.x.n {
            let (_, mu) = log1pexp_and_sigmoid(self.eta(i, params));
            let err = mu - f64::from(self.y[i]);
            let w = mu * (1.0 - mu);
            if self.include_intercept {
                z[0] = 1.0;
            }
            z[off..].copy_from_slice(self.x.row(i));
            for a in 0..d {
                grad[a] += err * z[a];
                for b in a..d {
                    hess[(a, b)] += w * z[a] * z[b];
                }
            }
        }
        for a in 0..d {
            for b in 0..a {
                hess[(a, b)] = hess[(b, a)];
            }
        }
        for j in 0..d {
            if j >= off {
                grad[j] += l2 * params[j];
                hess[(j, j)] += l2;
            }
            hess[(j, j)] += RIDGE_FLOOR;
        }
        (grad, hess)
    }

    /// Fit by damped Newton–Raphson starting from zero.
    ///
    /// Returns a [`FitResult`] whose `converged` flag is `false` when the
    /// iteration budget ran out; callers decide whether that is fatal.
    pub fn fit(&self, config: &LogisticFitConfig) -> Result<FitResult> {
        config.validate()?;
        let l2 = config.l2_penalty;
        let d = self.dim();
        let mut beta = vec![0.0; d];
        let mut nll = self.nll(&beta, l2)?;
        let mut converged = false;
        let mut n_iter = 0;

        while n_iter < config.max_iter {
            n_iter += 1;
            let (grad, hess) = self.grad_hess(&beta, l2);
            let step = match hess.clone().cholesky() {
                Some(ch) => ch.solve(&grad),
                None => hess.lu().solve(&grad).ok_or_else(|| {
                    Error::Computation("logistic Hessian is singular".to_string())
                })?,
            };

            let max_step = step.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
            if !max_step.is_finite() {
                log::debug!("logistic fit: non-finite Newton step at iteration {n_iter}");
                break;
            }

            // Step halving keeps the objective monotone.
            let mut scale = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_HALVINGS {
                let cand: Vec<f64> = beta.iter().zip(step.iter()).map(|(b, s)| b - scale * s).collect();
                if cand.iter().all(|v| v.is_finite()) {
                    let cand_nll = self.nll(&cand, l2)?;
                    if cand_nll <= nll + 1e-12 * nll.abs().max(1.0) {
                        accepted = Some((cand, cand_nll));
                        break;
                    }
                }
                scale *= 0.5;
            }
            let Some((next, next_nll)) = accepted else {
                log::debug!("logistic fit: line search stalled at iteration {n_iter}");
                converged = max_step * scale < config.tol;
                break;
            };
            beta = next;
            nll = next_nll;

            if max_step * scale < config.tol {
                converged = true;
                break;
            }
        }

        let (_, hess) = self.grad_hess(&beta, l2);
        let mut result = FitResult::new(self.parameter_names(), beta, vec![f64::NAN; d], nll, converged, n_iter);
        match hess.try_inverse() {
            Some(cov) => {
                let diag: Vec<f64> = (0..d).map(|j| cov[(j, j)]).collect();
                if diag.iter().all(|v| v.is_finite() && *v >= 0.0) {
                    result.uncertainties = diag.iter().map(|v| v.sqrt()).collect();
                    let mut flat = Vec::with_capacity(d * d);
                    for a in 0..d {
                        for b in 0..d {
                            flat.push(cov[(a, b)]);
                        }
                    }
                    result = result.with_covariance(flat);
                } else {
                    log::warn!("Invalid covariance diagonal; omitting covariance matrix");
                }
            }
            None => log::warn!("Hessian inversion failed; omitting covariance matrix"),
        }
        Ok(result)
    }

    /// Fitted probabilities `sigmoid(eta_i)` for the training rows.
    pub fn predict_proba(&self, params: &[f64]) -> Result<Vec<f64>> {
        self.check_params(params)?;
        Ok((0..self.x.n).map(|i| log1pexp_and_sigmoid(self.eta(i, params)).1).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::{Rng, SeedableRng};

    fn simulate(n: usize, b0: f64, b1: f64, seed: u64) -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for _ in 0..n {
            let xi: f64 = rng.random_range(-2.0..2.0);
            let p = ck_prob::math::sigmoid(b0 + b1 * xi);
            y.push(u8::from(rng.random::<f64>() < p));
            x.push(vec![xi]);
        }
        (x, y)
    }

    #[test]
    fn test_fit_recovers_coefficients() {
        let (x, y) = simulate(4000, -0.5, 1.5, 11);
        let m = LogisticRegressionModel::new(x, y, true).unwrap();
        let r = m.fit(&LogisticFitConfig::default()).unwrap();
        assert!(r.converged);
        assert!((r.parameters[0] + 0.5).abs() < 0.15, "b0={}", r.parameters[0]);
        assert!((r.parameters[1] - 1.5).abs() < 0.2, "b1={}", r.parameters[1]);
        assert!(r.uncertainties.iter().all(|s| *s > 0.0 && s.is_finite()));
    }

    #[test]
    fn test_gradient_vanishes_at_optimum() {
        let (x, y) = simulate(300, 0.2, -1.0, 3);
        let m = LogisticRegressionModel::new(x, y, true).unwrap();
        let cfg = LogisticFitConfig { l2_penalty: 0.5, ..Default::default() };
        let r = m.fit(&cfg).unwrap();
        let g = m.grad_nll(&r.parameters, 0.5).unwrap();
        for gj in g {
            assert_abs_diff_eq!(gj, 0.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_penalty_shrinks_slope() {
        let (x, y) = simulate(200, 0.0, 2.0, 5);
        let m = LogisticRegressionModel::new(x, y, true).unwrap();
        let plain = m.fit(&LogisticFitConfig::default()).unwrap();
        let ridge = m.fit(&LogisticFitConfig { l2_penalty: 20.0, ..Default::default() }).unwrap();
        assert!(ridge.parameters[1].abs() < plain.parameters[1].abs());
    }

    #[test]
    fn test_separated_data_does_not_converge() {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64]).collect();
        let y: Vec<u8> = (0..20).map(|i| u8::from(i >= 10)).collect();
        let m = LogisticRegressionModel::new(x, y, true).unwrap();
        let r = m.fit(&LogisticFitConfig { max_iter: 60, ..Default::default() }).unwrap();
        let p = m.predict_proba(&r.parameters).unwrap();
        assert!(p.iter().any(|&v| v < 1e-10 || v > 1.0 - 1e-10));
    }

    #[test]
    fn test_validation() {
        assert!(LogisticRegressionModel::new(vec![], vec![], true).is_err());
        assert!(LogisticRegressionModel::new(vec![vec![1.0]], vec![2], true).is_err());
        assert!(LogisticRegressionModel::new(vec![vec![f64::NAN]], vec![1], true).is_err());
        let m = LogisticRegressionModel::new(vec![vec![1.0], vec![2.0]], vec![0, 1], true).unwrap();
        assert!(m.fit(&LogisticFitConfig { l2_penalty: -1.0, ..Default::default() }).is_err());
        assert!(m.nll(&[0.0], 0.0).is_err());
    }
}
