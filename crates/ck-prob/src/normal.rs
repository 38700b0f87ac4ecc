//! Standard normal tail probabilities and critical values.

use ck_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, Normal};

const PROB_EPS: f64 = 1e-15;

#[inline]
fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| Error::Computation(format!("standard normal: {e}")))
}

/// CDF of the standard normal at `z`.
pub fn cdf(z: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(z))
}

/// Upper tail `P(Z > z)`.
pub fn sf(z: f64) -> Result<f64> {
    Ok(standard_normal()?.sf(z))
}

/// Two-sided critical value `z_{1-alpha/2}`.
pub fn critical_value(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::Validation(format!("alpha must be in (0, 1), got {alpha}")));
    }
    let p = (1.0 - 0.5 * alpha).clamp(PROB_EPS, 1.0 - PROB_EPS);
    Ok(standard_normal()?.inverse_cdf(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_critical_value_95() {
        assert_abs_diff_eq!(critical_value(0.05).unwrap(), 1.959_964, epsilon = 1e-5);
    }

    #[test]
    fn test_cdf_and_sf_are_complements() {
        for z in [-2.0, -0.3, 0.0, 1.1, 3.0] {
            assert_abs_diff_eq!(cdf(z).unwrap() + sf(z).unwrap(), 1.0, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(sf(1.96).unwrap(), 0.025, epsilon = 1e-3);
    }

    #[test]
    fn test_invalid_alpha() {
        assert!(critical_value(0.0).is_err());
        assert!(critical_value(1.0).is_err());
        assert!(critical_value(f64::NAN).is_err());
    }
}
