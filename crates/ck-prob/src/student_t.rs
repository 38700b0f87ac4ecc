//! Student-t tail probabilities and critical values.

use ck_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};

fn standard_t(df: f64) -> Result<StudentsT> {
    if !df.is_finite() || df <= 0.0 {
        return Err(Error::Validation(format!("df must be finite and > 0, got {df}")));
    }
    StudentsT::new(0.0, 1.0, df).map_err(|e| Error::Computation(format!("student t: {e}")))
}

/// Two-sided critical value `t_{1-alpha/2, df}`.
pub fn critical_value(alpha: f64, df: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::Validation(format!("alpha must be in (0, 1), got {alpha}")));
    }
    Ok(standard_t(df)?.inverse_cdf(1.0 - 0.5 * alpha))
}

/// Two-sided p-value `2 * P(T > |t|)`.
pub fn two_sided_p(t: f64, df: f64) -> Result<f64> {
    if t.is_nan() {
        return Err(Error::Validation("t statistic is NaN".into()));
    }
    let dist = standard_t(df)?;
    Ok((2.0 * dist.sf(t.abs())).min(1.0))
}
