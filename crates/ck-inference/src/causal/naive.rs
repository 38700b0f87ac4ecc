//! Naive two-arm comparison (Welch's unequal-variance t-test).
//!
//! This is the unadjusted exposed-vs-unexposed contrast; next to the matched
//! ATT it shows how much of the raw gap is confounding.

use ck_core::{Error, Result};
use serde::Serialize;

use super::{mean, sample_variance};

/// Welch two-sample comparison of means.
#[derive(Debug, Clone, Serialize)]
pub struct WelchResult {
    /// Treated-arm mean.
    pub mean_treated: f64,
    /// Control-arm mean.
    pub mean_control: f64,
    /// `mean_treated - mean_control`.
    pub difference: f64,
    /// Standard error of the difference.
    pub se: f64,
    /// t statistic.
    pub t_stat: f64,
    /// Welch–Satterthwaite degrees of freedom.
    pub df: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// Lower interval bound at level `1 - alpha`.
    pub ci_lower: f64,
    /// Upper interval bound at level `1 - alpha`.
    pub ci_upper: f64,
    /// Treated sample size.
    pub n_treated: usize,
    /// Control sample size.
    pub n_control: usize,
}

/// Welch t-test of `treated` against `control`.
pub fn welch_t_test(treated: &[f64], control: &[f64], alpha: f64) -> Result<WelchResult> {
    let (n1, n0) = (treated.len(), control.len());
    if n1 < 2 || n0 < 2 {
        return Err(Error::Validation(format!(
            "Welch test needs at least 2 observations per arm, got {n1} treated and {n0} control"
        )));
    }
    if treated.iter().chain(control).any(|v| !v.is_finite()) {
        return Err(Error::Validation("outcomes must be finite".into()));
    }

    let (m1, m0) = (mean(treated), mean(control));
    let (a, b) = (sample_variance(treated) / n1 as f64, sample_variance(control) / n0 as f64);
    let se = (a + b).sqrt();
    if se == 0.0 {
        return Err(Error::Computation("both arms have zero variance".into()));
    }

    let df = (a + b).powi(2) / (a * a / (n1 - 1) as f64 + b * b / (n0 - 1) as f64);
    let difference = m1 - m0;
    let t_stat = difference / se;
    let p_value = ck_prob::student_t::two_sided_p(t_stat, df)?;
    let crit = ck_prob::student_t::critical_value(alpha, df)?;

    Ok(WelchResult {
        mean_treated: m1,
        mean_control: m0,
        difference,
        se,
        t_stat,
        df,
        p_value,
        ci_lower: difference - crit * se,
        ci_upper: difference + crit * se,
        n_treated: n1,
        n_control: n0,
    })
}
