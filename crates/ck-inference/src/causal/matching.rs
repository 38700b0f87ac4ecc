//! Greedy nearest-available 1:1 propensity matching under a caliper.
//!
//! Treated units are visited in ascending score order (ties by lower id).
//! Each takes the control with the smallest absolute score distance; among
//! equidistant controls the lower id wins. A match is accepted only when the
//! distance is within the caliper. Eligible controls live in an ordered set
//! keyed by `(score, id)`, so every lookup is `O(log n)`.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::ops::Bound;

use ck_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::propensity::PropensityScores;

/// Maximum allowed propensity distance for a valid match.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Caliper {
    /// Fixed width on the propensity scale.
    Absolute(f64),
    /// Multiple of the sample SD of all propensity scores.
    StdDevMultiple(f64),
}

impl Default for Caliper {
    fn default() -> Self {
        Caliper::StdDevMultiple(0.2)
    }
}

impl Caliper {
    /// Resolve to an absolute width given the score SD.
    pub fn width(&self, score_sd: f64) -> Result<f64> {
        let w = match *self {
            Caliper::Absolute(w) => w,
            Caliper::StdDevMultiple(k) => {
                if !k.is_finite() || k < 0.0 {
                    return Err(Error::Validation(format!(
                        "caliper multiple must be finite and >= 0, got {k}"
                    )));
                }
                k * score_sd
            }
        };
        if !w.is_finite() || w < 0.0 {
            return Err(Error::Validation(format!("caliper must be finite and >= 0, got {w}")));
        }
        Ok(w)
    }
}

/// Matcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Caliper rule.
    pub caliper: Caliper,
    /// Reuse controls across pairs.
    pub replacement: bool,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { caliper: Caliper::default(), replacement: false }
    }
}

/// One treated unit and its matched control.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    /// Treated unit id.
    pub treated_id: u64,
    /// Control unit id.
    pub control_id: u64,
    /// Treated propensity score.
    pub treated_score: f64,
    /// Control propensity score.
    pub control_score: f64,
    /// `|treated_score - control_score|`.
    pub distance: f64,
}

/// Output of the matcher: accepted pairs plus the treated units left out.
#[derive(Debug, Clone, Serialize)]
pub struct MatchingResult {
    /// Pairs in the order they were formed.
    pub pairs: Vec<MatchedPair>,
    /// Treated ids with no control inside the caliper, in visiting order.
    pub unmatched_treated: Vec<u64>,
    /// Absolute caliper width used.
    pub caliper: f64,
    /// Whether controls could be reused.
    pub replacement: bool,
    /// Number of distinct controls used.
    pub n_controls_used: usize,
}

impl MatchingResult {
    /// Number of treated units offered for matching.
    pub fn n_treated(&self) -> usize {
        self.pairs.len() + self.unmatched_treated.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct ScoreKey(f64);

impl PartialEq for ScoreKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoreKey {}

impl PartialOrd for ScoreKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoreKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Eligible controls ordered by `(score, id)`.
struct ControlPool {
    set: BTreeSet<(ScoreKey, u64)>,
}

impl ControlPool {
    fn new(controls: &[(u64, f64)]) -> Self {
        Self { set: controls.iter().map(|&(id, s)| (ScoreKey(s), id)).collect() }
    }

    /// Lowest id among controls with exactly this score.
    fn lowest_id_at(&self, key: ScoreKey) -> Option<u64> {
        self.set.range((key, 0)..).next().filter(|(k, _)| *k == key).map(|&(_, id)| id)
    }

    /// Nearest control to `score` as `(id, control_score)`.
    fn nearest(&self, score: f64) -> Option<(u64, f64)> {
        let key = ScoreKey(score);
        let below = self.set.range(..=(key, u64::MAX)).next_back().map(|&(k, _)| k);
        let above = self
            .set
            .range((Bound::Excluded((key, u64::MAX)), Bound::Unbounded))
            .next()
            .map(|&(k, _)| k);

        let pick = |k: ScoreKey| self.lowest_id_at(k).map(|id| (id, k.0));
        match (below, above) {
            (None, None) => None,
            (Some(lo), None) => pick(lo),
            (None, Some(hi)) => pick(hi),
            (Some(lo), Some(hi)) => {
                let d_lo = score - lo.0;
                let d_hi = hi.0 - score;
                match d_lo.total_cmp(&d_hi) {
                    Ordering::Less => pick(lo),
                    Ordering::Greater => pick(hi),
                    Ordering::Equal => {
                        let a = pick(lo);
                        let b = pick(hi);
                        match (a, b) {
                            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
                            (a, b) => a.or(b),
                        }
                    }
                }
            }
        }
    }

    fn remove(&mut self, id: u64, score: f64) {
        self.set.remove(&(ScoreKey(score), id));
    }
}

fn validate_scores(label: &str, units: &[(u64, f64)]) -> Result<()> {
    if let Some(&(id, s)) = units.iter().find(|(_, s)| !s.is_finite()) {
        return Err(Error::Validation(format!("{label} unit {id} has non-finite score {s}")));
    }
    Ok(())
}

/// Greedy nearest-available matching of `treated` onto `controls`.
///
/// `caliper` is an absolute width on the score scale.
pub fn match_nearest(
    treated: &[(u64, f64)],
    controls: &[(u64, f64)],
    caliper: f64,
    replacement: bool,
) -> Result<MatchingResult> {
    if !caliper.is_finite() || caliper < 0.0 {
        return Err(Error::Validation(format!("caliper must be finite and >= 0, got {caliper}")));
    }
    validate_scores("treated", treated)?;
    validate_scores("control", controls)?;

    let mut order: Vec<(u64, f64)> = treated.to_vec();
    order.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));

    let mut pool = ControlPool::new(controls);
    let mut used = BTreeSet::new();
    let mut pairs = Vec::with_capacity(order.len());
    let mut unmatched_treated = Vec::new();

    for (t_id, t_score) in order {
        let candidate = pool.nearest(t_score).filter(|&(_, c)| (t_score - c).abs() <= caliper);
        match candidate {
            Some((c_id, c_score)) => {
                if !replacement {
                    pool.remove(c_id, c_score);
                }
                used.insert(c_id);
                pairs.push(MatchedPair {
                    treated_id: t_id,
                    control_id: c_id,
                    treated_score: t_score,
                    control_score: c_score,
                    distance: (t_score - c_score).abs(),
                });
            }
            None => unmatched_treated.push(t_id),
        }
    }

    Ok(MatchingResult { pairs, unmatched_treated, caliper, replacement, n_controls_used: used.len() })
}

/// Match the treated arm of `scores` against its control arm.
pub fn match_units(scores: &PropensityScores, config: &MatchingConfig) -> Result<MatchingResult> {
    let caliper = config.caliper.width(scores.std_dev())?;
    let treated = scores.arm(true);
    let controls = scores.arm(false);
    let result = match_nearest(&treated, &controls, caliper, config.replacement)?;

    let n_unmatched = result.unmatched_treated.len();
    if n_unmatched * 2 > treated.len() {
        log::warn!(
            "matching: {n_unmatched} of {} treated units unmatched (caliper={caliper:.4})",
            treated.len()
        );
    }
    log::debug!(
        "matching: {} pairs, {} unmatched, {} distinct controls",
        result.pairs.len(),
        n_unmatched,
        result.n_controls_used
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_picks_nearest_control() {
        let treated = [(1, 0.50)];
        let controls = [(10, 0.30), (11, 0.52), (12, 0.70)];
        let r = match_nearest(&treated, &controls, 0.1, false).unwrap();
        assert_eq!(r.pairs.len(), 1);
        assert_eq!(r.pairs[0].control_id, 11);
        assert!((r.pairs[0].distance - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_equidistant_tie_breaks_on_lower_id() {
        let treated = [(1, 0.5)];
        let controls = [(20, 0.25), (7, 0.75)];
        let r = match_nearest(&treated, &controls, 1.0, false).unwrap();
        assert_eq!(r.pairs[0].control_id, 7);

        let controls = [(9, 0.4), (3, 0.4), (5, 0.4)];
        let r = match_nearest(&treated, &controls, 1.0, false).unwrap();
        assert_eq!(r.pairs[0].control_id, 3);
    }

    #[test]
    fn test_without_replacement_uses_each_control_once() {
        let treated = [(1, 0.40), (2, 0.41), (3, 0.42)];
        let controls = [(10, 0.40), (11, 0.60)];
        let r = match_nearest(&treated, &controls, 0.5, false).unwrap();
        assert_eq!(r.pairs.len(), 2);
        assert_eq!(r.unmatched_treated, vec![3]);
        let ids: HashSet<u64> = r.pairs.iter().map(|p| p.control_id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(r.n_controls_used, 2);
    }

    #[test]
    fn test_with_replacement_reuses_controls() {
        let treated = [(1, 0.40), (2, 0.41), (3, 0.42)];
        let controls = [(10, 0.40), (11, 0.60)];
        let r = match_nearest(&treated, &controls, 0.05, true).unwrap();
        assert_eq!(r.pairs.len(), 3);
        assert!(r.pairs.iter().all(|p| p.control_id == 10));
        assert_eq!(r.n_controls_used, 1);
    }

    #[test]
    fn test_caliper_rejects_far_controls() {
        let treated = [(1, 0.9), (2, 0.5)];
        let controls = [(10, 0.1), (11, 0.48)];
        let r = match_nearest(&treated, &controls, 0.05, false).unwrap();
        assert_eq!(r.pairs.len(), 1);
        assert_eq!(r.unmatched_treated, vec![1]);
        assert!(r.pairs.iter().all(|p| p.distance <= r.caliper));
        assert_eq!(r.n_treated(), 2);
    }

    #[test]
    fn test_treated_visited_in_ascending_score_order() {
        // Both treated units want control 10; the lower score goes first.
        let treated = [(1, 0.62), (2, 0.58)];
        let controls = [(10, 0.60), (11, 0.70)];
        let r = match_nearest(&treated, &controls, 1.0, false).unwrap();
        assert_eq!(r.pairs[0].treated_id, 2);
        assert_eq!(r.pairs[0].control_id, 10);
        assert_eq!(r.pairs[1].control_id, 11);
    }

    #[test]
    fn test_deterministic() {
        let treated: Vec<(u64, f64)> = (0..50).map(|i| (i, ((i * 37) % 100) as f64 / 100.0)).collect();
        let controls: Vec<(u64, f64)> =
            (100..300).map(|i| (i, ((i * 53) % 97) as f64 / 97.0)).collect();
        let a = match_nearest(&treated, &controls, 0.02, false).unwrap();
        let b = match_nearest(&treated, &controls, 0.02, false).unwrap();
        assert_eq!(a.pairs, b.pairs);
        assert_eq!(a.unmatched_treated, b.unmatched_treated);
    }

    #[test]
    fn test_empty_controls_leave_everyone_unmatched() {
        let r = match_nearest(&[(1, 0.3)], &[], 0.1, false).unwrap();
        assert!(r.pairs.is_empty());
        assert_eq!(r.unmatched_treated, vec![1]);
    }

    #[test]
    fn test_caliper_width() {
        assert!((Caliper::StdDevMultiple(0.2).width(0.5).unwrap() - 0.1).abs() < 1e-15);
        assert_eq!(Caliper::Absolute(0.03).width(10.0).unwrap(), 0.03);
        assert!(Caliper::Absolute(-1.0).width(0.1).is_err());
        assert!(match_nearest(&[(1, f64::NAN)], &[(2, 0.1)], 0.1, false).is_err());
    }
}
