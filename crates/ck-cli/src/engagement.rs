use anyhow::Result;
use std::path::PathBuf;

use ck_inference::causal::Covariates;
use ck_inference::engagement::{
    EngagementCovariates, EngagementDataConfig, generate_engagement_records,
};

// ---------------------------------------------------------------------------
// generate-data
// ---------------------------------------------------------------------------

pub fn cmd_generate_data(
    n_units: usize,
    true_effect: f64,
    confounding: f64,
    seed: u64,
    output: Option<&PathBuf>,
) -> Result<()> {
    let config = EngagementDataConfig { n_units, true_effect, confounding, seed, ..Default::default() };
    let records = generate_engagement_records(&config)?;
    let n_exposed = records.iter().filter(|r| r.exposed == Some(true)).count();
    tracing::info!(n_units, n_exposed, seed, "generated engagement records");

    let output_json = serde_json::json!({
        "n": records.len(),
        "n_exposed": n_exposed,
        "config": config,
        "covariate_names": EngagementCovariates::names(),
        "records": records,
    });
    crate::write_json(output, &output_json)
}
