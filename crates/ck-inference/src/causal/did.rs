//! Canonical two-period, two-group difference-in-differences.
//!
//! `y = α + β₁·treat + β₂·post + δ·(treat×post) + ε` by OLS; δ equals the
//! cell-mean contrast `(Ȳ_tp − Ȳ_t0) − (Ȳ_cp − Ȳ_c0)`.

use std::collections::HashMap;

use ck_core::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

/// Result of the 2×2 DiD estimator.
#[derive(Debug, Clone, Serialize)]
pub struct DidResult {
    /// DiD estimate (coefficient on `treat×post`).
    pub att: f64,
    /// Homoskedastic OLS standard error of `att`.
    pub se: f64,
    /// Cluster-robust standard error, when cluster ids were given.
    pub se_cluster: Option<f64>,
    /// `att` over the cluster SE when present, else over the OLS SE.
    pub t_stat: f64,
    /// Two-sided p-value of `t_stat`.
    pub p_value: f64,
    /// `att` as a percentage of the treated-pre mean (`None` if that mean is not positive).
    pub pct_change: Option<f64>,
    /// Mean outcome, treated group, post period.
    pub mean_treated_post: f64,
    /// Mean outcome, treated group, pre period.
    pub mean_treated_pre: f64,
    /// Mean outcome, control group, post period.
    pub mean_control_post: f64,
    /// Mean outcome, control group, pre period.
    pub mean_control_pre: f64,
    /// Number of observations.
    pub n_obs: usize,
}

/// Liang–Zeger sandwich SEs with the `G/(G-1) · (N-1)/(N-K)` correction.
fn cluster_robust_se(
    x: &DMatrix<f64>,
    residuals: &DVector<f64>,
    xtx_inv: &DMatrix<f64>,
    cluster_ids: &[u64],
) -> (Vec<f64>, usize) {
    let (n, p) = (x.nrows(), x.ncols());
    let mut scores: HashMap<u64, DVector<f64>> = HashMap::new();
    for (i, &cid) in cluster_ids.iter().enumerate() {
        let s = scores.entry(cid).or_insert_with(|| DVector::zeros(p));
        *s += x.row(i).transpose() * residuals[i];
    }
    let mut meat = DMatrix::<f64>::zeros(p, p);
    for s in scores.values() {
        meat += s * s.transpose();
    }

    let (g, n_f, p_f) = (scores.len() as f64, n as f64, p as f64);
    let correction =
        if g > 1.0 && n_f > p_f { (g / (g - 1.0)) * ((n_f - 1.0) / (n_f - p_f)) } else { 1.0 };
    let vcov = (xtx_inv * meat) * xtx_inv * correction;
    ((0..p).map(|j| vcov[(j, j)].max(0.0).sqrt()).collect(), scores.len())
}

/// 2×2 DiD on long-format observations.
///
/// `treat` and `post` are 0/1 indicators; every one of the four cells needs at
/// least one observation. `cluster_ids` (typically the unit id) switches on
/// cluster-robust inference.
pub fn did_two_by_two(
    y: &[f64],
    treat: &[u8],
    post: &[u8],
    cluster_ids: Option<&[u64]>,
) -> Result<DidResult> {
    let n = y.len();
    if n == 0 {
        return Err(Error::Validation("y must be non-empty".into()));
    }
    if treat.len() != n || post.len() != n || cluster_ids.is_some_and(|c| c.len() != n) {
        return Err(Error::Validation("treat, post and cluster_ids must have the same length as y".into()));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(Error::Validation("y must be finite".into()));
    }

    // [treated-post, treated-pre, control-post, control-pre]
    let mut sums = [0.0_f64; 4];
    let mut counts = [0usize; 4];
    for i in 0..n {
        let cell = match (treat[i], post[i]) {
            (1, 1) => 0,
            (1, 0) => 1,
            (0, 1) => 2,
            (0, 0) => 3,
            _ => return Err(Error::Validation("treat and post must be 0 or 1".into())),
        };
        sums[cell] += y[i];
        counts[cell] += 1;
    }
    if counts.contains(&0) {
        return Err(Error::Validation("all four treat×post cells must have observations".into()));
    }
    let means: Vec<f64> = sums.iter().zip(&counts).map(|(s, &c)| s / c as f64).collect();

    let k = 4usize;
    let x = DMatrix::from_fn(n, k, |i, j| {
        let d = f64::from(treat[i]);
        let p = f64::from(post[i]);
        match j {
            0 => 1.0,
            1 => d,
            2 => p,
            _ => d * p,
        }
    });
    let yv = DVector::from_column_slice(y);
    let xtx_inv = (x.transpose() * &x)
        .try_inverse()
        .ok_or_else(|| Error::Computation("X'X singular in DiD regression".into()))?;
    let beta = &xtx_inv * (x.transpose() * &yv);
    let att = beta[3];

    let resid = &yv - &x * &beta;
    let rss: f64 = resid.iter().map(|r| r * r).sum();
    let dof = n as f64 - k as f64;
    let se = if dof > 0.0 { (rss / dof * xtx_inv[(3, 3)]).sqrt() } else { f64::NAN };

    let (se_cluster, df) = match cluster_ids {
        Some(ids) => {
            let (ses, g) = cluster_robust_se(&x, &resid, &xtx_inv, ids);
            (Some(ses[3]), (g as f64 - 1.0).max(1.0))
        }
        None => (None, dof.max(1.0)),
    };
    let se_used = se_cluster.unwrap_or(se);
    let t_stat = if se_used > 0.0 { att / se_used } else { f64::NAN };
    let p_value =
        if t_stat.is_finite() { ck_prob::student_t::two_sided_p(t_stat, df)? } else { f64::NAN };

    let pct_change = (means[1] > 0.0).then(|| att / means[1] * 100.0);
    log::debug!("did: att={att:.4} se={se_used:.4} over {n} observations");

    Ok(DidResult {
        att,
        se,
        se_cluster,
        t_stat,
        p_value,
        pct_change,
        mean_treated_post: means[0],
        mean_treated_pre: means[1],
        mean_control_post: means[2],
        mean_control_pre: means[3],
        n_obs: n,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn panel() -> (Vec<f64>, Vec<u8>, Vec<u8>, Vec<u64>) {
        // Four units per group, observed pre and post. Treated drop by 3 more than controls.
        let mut y = Vec::new();
        let mut treat = Vec::new();
        let mut post = Vec::new();
        let mut ids = Vec::new();
        for u in 0..8u64 {
            let d = u8::from(u < 4);
            let base = 10.0 + u as f64 * 0.5;
            let noise = if u % 2 == 0 { 0.1 } else { -0.1 };
            for p in 0..2u8 {
                let shift = if p == 1 { -1.0 - 3.0 * f64::from(d) + noise } else { 0.0 };
                y.push(base + shift);
                treat.push(d);
                post.push(p);
                ids.push(u);
            }
        }
        (y, treat, post, ids)
    }

    #[test]
    fn test_matches_cell_mean_contrast() {
        let (y, treat, post, ids) = panel();
        let r = did_two_by_two(&y, &treat, &post, Some(&ids)).unwrap();
        let contrast = (r.mean_treated_post - r.mean_treated_pre)
            - (r.mean_control_post - r.mean_control_pre);
        assert_abs_diff_eq!(r.att, contrast, epsilon = 1e-10);
        assert_abs_diff_eq!(r.att, -3.0, epsilon = 1e-10);
        assert!(r.se > 0.0);
        assert!(r.se_cluster.unwrap() > 0.0);
        assert!(r.p_value < 0.01);
        assert_eq!(r.n_obs, 16);
    }

    #[test]
    fn test_pct_change_relative_to_treated_pre() {
        let (y, treat, post, _) = panel();
        let r = did_two_by_two(&y, &treat, &post, None).unwrap();
        assert!(r.se_cluster.is_none());
        assert_abs_diff_eq!(r.pct_change.unwrap(), -3.0 / r.mean_treated_pre * 100.0, epsilon = 1e-10);
    }

    #[test]
    fn test_validation() {
        assert!(did_two_by_two(&[], &[], &[], None).is_err());
        assert!(did_two_by_two(&[1.0, 2.0], &[1, 0], &[1], None).is_err());
        assert!(did_two_by_two(&[1.0, 2.0], &[1, 2], &[0, 1], None).is_err());
        // missing control-pre cell
        assert!(did_two_by_two(&[1.0, 2.0, 3.0], &[1, 1, 0], &[0, 1, 1], None).is_err());
    }
}
