use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use ck_inference::causal::{
    Caliper, IntervalMethod, PipelineConfig, SeparationPolicy, did_two_by_two, run_pipeline,
};
use ck_inference::engagement::{EngagementRecord, ingest_engagement_records};

use crate::IntervalArg;

/// Command-line overrides applied on top of the JSON pipeline config.
pub struct AttOverrides {
    pub caliper_sd: Option<f64>,
    pub caliper_abs: Option<f64>,
    pub replacement: Option<bool>,
    pub alpha: Option<f64>,
    pub interval: Option<IntervalArg>,
    pub separation_l2: Option<f64>,
}

impl AttOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(k) = self.caliper_sd {
            config.matching.caliper = Caliper::StdDevMultiple(k);
        }
        if let Some(w) = self.caliper_abs {
            config.matching.caliper = Caliper::Absolute(w);
        }
        if let Some(r) = self.replacement {
            config.matching.replacement = r;
        }
        if let Some(a) = self.alpha {
            config.estimator.alpha = a;
        }
        if let Some(i) = self.interval {
            config.estimator.interval = match i {
                IntervalArg::StudentT => IntervalMethod::StudentT,
                IntervalArg::Normal => IntervalMethod::Normal,
            };
        }
        if let Some(l2) = self.separation_l2 {
            config.propensity.separation = SeparationPolicy::Regularize { l2_penalty: l2 };
        }
    }
}

// ---------------------------------------------------------------------------
// att
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RecordsInputJson {
    records: Vec<EngagementRecord>,
}

pub fn cmd_att(
    input: &PathBuf,
    config_path: Option<&PathBuf>,
    overrides: AttOverrides,
    output: Option<&PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str::<PipelineConfig>(&raw)
                .with_context(|| format!("invalid pipeline config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);

    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read input {}", input.display()))?;
    let data: RecordsInputJson = serde_json::from_str(&raw)?;
    let population = ingest_engagement_records(data.records)?;
    tracing::info!(n_units = population.len(), "loaded population");

    let report = run_pipeline(&population, &config)?;
    tracing::info!(
        att = report.estimate.att,
        se = report.estimate.se,
        n_pairs = report.estimate.n_pairs,
        "matched ATT"
    );

    let output_json = serde_json::json!({
        "config": config,
        "report": report,
    });
    crate::write_json(output, &output_json)
}

// ---------------------------------------------------------------------------
// did
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DidInputJson {
    y: Vec<f64>,
    treat: Vec<u8>,
    post: Vec<u8>,
    #[serde(default)]
    cluster_ids: Option<Vec<u64>>,
}

pub fn cmd_did(input: &PathBuf, output: Option<&PathBuf>) -> Result<()> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read input {}", input.display()))?;
    let data: DidInputJson = serde_json::from_str(&raw)?;

    let r = did_two_by_two(&data.y, &data.treat, &data.post, data.cluster_ids.as_deref())?;
    crate::write_json(output, &r)
}
