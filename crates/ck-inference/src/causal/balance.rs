//! Covariate balance before and after matching.
//!
//! SMD = `(mean_treated - mean_control) / pooled_sd`, where
//! `pooled_sd = sqrt((var_treated + var_control) / 2)` is taken from the
//! pre-match arms and reused for the post-match column, so the two columns
//! differ only through the means. Under replacement a control counts once per
//! pair it appears in.

use ck_core::{Error, Result};
use serde::Serialize;

use super::matching::MatchingResult;
use super::units::{Covariates, Population};
use super::{mean, sample_variance};

/// Balance of one covariate.
#[derive(Debug, Clone, Serialize)]
pub struct CovariateBalance {
    /// Covariate name.
    pub name: String,
    /// Treated mean before matching.
    pub mean_treated_pre: f64,
    /// Control mean before matching.
    pub mean_control_pre: f64,
    /// SMD before matching.
    pub smd_pre: f64,
    /// Treated mean over matched pairs.
    pub mean_treated_post: f64,
    /// Control mean over matched pairs.
    pub mean_control_post: f64,
    /// SMD over matched pairs.
    pub smd_post: f64,
    /// `var_treated / var_control` over matched pairs (NaN when undefined).
    pub variance_ratio_post: f64,
}

/// Per-covariate balance table.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceTable {
    /// One row per covariate, in declaration order.
    pub rows: Vec<CovariateBalance>,
    /// Pairs the post-match columns are computed from.
    pub n_pairs: usize,
}

impl BalanceTable {
    /// Largest `|smd_pre|`.
    pub fn max_abs_smd_pre(&self) -> f64 {
        self.rows.iter().map(|r| r.smd_pre.abs()).fold(0.0, f64::max)
    }

    /// Largest `|smd_post|`.
    pub fn max_abs_smd_post(&self) -> f64 {
        self.rows.iter().map(|r| r.smd_post.abs()).fold(0.0, f64::max)
    }

    /// Row for a covariate.
    pub fn row(&self, name: &str) -> Option<&CovariateBalance> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Covariates whose post-match `|SMD|` is at or above `threshold`.
    pub fn imbalanced(&self, threshold: f64) -> Vec<&str> {
        self.rows.iter().filter(|r| r.smd_post.abs() >= threshold).map(|r| r.name.as_str()).collect()
    }
}

/// Standardized mean difference with a fixed denominator.
///
/// A zero denominator gives 0 for equal means and a signed infinity otherwise.
pub fn smd(mean_treated: f64, mean_control: f64, pooled_sd: f64) -> f64 {
    let diff = mean_treated - mean_control;
    if pooled_sd > 0.0 {
        diff / pooled_sd
    } else if diff == 0.0 {
        0.0
    } else {
        diff.signum() * f64::INFINITY
    }
}

fn column(rows: &[&[f64]], j: usize) -> Vec<f64> {
    rows.iter().map(|r| r[j]).collect()
}

/// Compute the pre/post balance table.
pub fn balance_table<C: Covariates>(
    population: &Population<C>,
    matching: &MatchingResult,
) -> Result<BalanceTable> {
    population.require_both_arms()?;

    let pre_t: Vec<&[f64]> = population.units().iter().filter(|u| u.treated()).map(|u| u.row()).collect();
    let pre_c: Vec<&[f64]> = population.units().iter().filter(|u| !u.treated()).map(|u| u.row()).collect();

    let mut post_t = Vec::with_capacity(matching.pairs.len());
    let mut post_c = Vec::with_capacity(matching.pairs.len());
    for p in &matching.pairs {
        let t = population
            .get(p.treated_id)
            .ok_or_else(|| Error::Validation(format!("treated unit {} not in population", p.treated_id)))?;
        let c = population
            .get(p.control_id)
            .ok_or_else(|| Error::Validation(format!("control unit {} not in population", p.control_id)))?;
        post_t.push(t.row());
        post_c.push(c.row());
    }

    let rows = population
        .covariate_names()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let (xt, xc) = (column(&pre_t, j), column(&pre_c, j));
            let pooled_sd = (0.5 * (sample_variance(&xt) + sample_variance(&xc))).sqrt();
            let (mt, mc) = (mean(&xt), mean(&xc));

            let (yt, yc) = (column(&post_t, j), column(&post_c, j));
            let (mt_post, mc_post) = (mean(&yt), mean(&yc));
            let (vt, vc) = (sample_variance(&yt), sample_variance(&yc));
            let variance_ratio_post = if vc > 0.0 { vt / vc } else { f64::NAN };

            CovariateBalance {
                name: name.to_string(),
                mean_treated_pre: mt,
                mean_control_pre: mc,
                smd_pre: smd(mt, mc, pooled_sd),
                mean_treated_post: mt_post,
                mean_control_post: mc_post,
                smd_post: if post_t.is_empty() { f64::NAN } else { smd(mt_post, mc_post, pooled_sd) },
                variance_ratio_post,
            }
        })
        .collect();

    Ok(BalanceTable { rows, n_pairs: matching.pairs.len() })
}
