//! Small numerically-stable math utilities used by the logistic model.

/// Stable `log(1 + exp(x))`.
///
/// Branchless: `log(1+exp(x)) = max(x,0) + log(1+exp(-|x|))`.
#[inline]
pub fn log1pexp(x: f64) -> f64 {
    let abs_x = x.abs();
    let e = (-abs_x).exp(); // always in (0, 1], no overflow
    x.max(0.0) + e.ln_1p()
}

/// Stable sigmoid: `1 / (1 + exp(-x))`.
#[inline]
pub fn sigmoid(x: f64) -> f64 {
    let abs_x = x.abs();
    let e = (-abs_x).exp();
    let recip = 1.0 / (1.0 + e);
    // x >= 0: sigmoid = 1/(1+exp(-x)) = recip
    // x <  0: sigmoid = exp(x)/(1+exp(x)) = e/(1+e) = e*recip
    if x >= 0.0 { recip } else { e * recip }
}

/// Fused `(log(1+exp(x)), sigmoid(x))` with a single `exp()` call.
///
/// Used in the IRLS inner loop, where both the Bernoulli NLL term and the
/// fitted probability are needed for every row.
#[inline(always)]
pub fn log1pexp_and_sigmoid(x: f64) -> (f64, f64) {
    let abs_x = x.abs();
    let e = (-abs_x).exp();
    let log_term = x.max(0.0) + e.ln_1p();
    let recip = 1.0 / (1.0 + e);
    let sigma = if x >= 0.0 { recip } else { e * recip };
    (log_term, sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log1pexp_matches_naive_moderate_values() {
        let xs: [f64; 7] = [-10.0, -2.0, -0.1, 0.0, 0.1, 2.0, 10.0];
        for x in xs {
            let naive = (1.0 + x.exp()).ln();
            let stable = log1pexp(x);
            assert!((naive - stable).abs() < 1e-12, "x={}: {} vs {}", x, naive, stable);
        }
    }

    #[test]
    fn test_log1pexp_is_finite_extremes() {
        for x in [-1e6, -100.0, 100.0, 1e6] {
            let y = log1pexp(x);
            assert!(y.is_finite(), "x={} produced {}", x, y);
        }
        assert!((log1pexp(1e6) - 1e6).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_bounds_and_symmetry() {
        for x in [-50.0, -10.0, -1.0, 0.0, 1.0, 10.0, 50.0] {
            let s = sigmoid(x);
            assert!((0.0..=1.0).contains(&s), "sigmoid({})={}", x, s);
            let t = sigmoid(-x);
            assert!((s + t - 1.0).abs() < 1e-15, "sigmoid symmetry failed at {}", x);
        }
    }

    #[test]
    fn test_log1pexp_and_sigmoid_matches_separate() {
        for x in [-50.0, -2.0, -0.1, 0.0, 0.1, 2.0, 50.0] {
            let (l, s) = log1pexp_and_sigmoid(x);
            assert!((l - log1pexp(x)).abs() < 1e-15);
            assert!((s - sigmoid(x)).abs() < 1e-15);
        }
    }
}
