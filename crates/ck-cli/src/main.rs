//! causalkit CLI

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

mod causal;
mod engagement;

#[derive(Parser)]
#[command(name = "causalkit")]
#[command(about = "causalkit - Propensity-score matching and treatment-effect estimation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

/// Reference distribution for confidence intervals.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum IntervalArg {
    /// Student-t with n_pairs - 1 degrees of freedom.
    StudentT,
    /// Standard normal.
    Normal,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a synthetic feature-exposure engagement dataset (JSON)
    GenerateData {
        /// Number of users.
        #[arg(long, default_value = "2000")]
        n_units: usize,

        /// True effect of exposure on the outcome.
        #[arg(long, default_value = "-0.3")]
        true_effect: f64,

        /// Scale of covariate effects on exposure (0 = randomized).
        #[arg(long, default_value = "1.0")]
        confounding: f64,

        /// Random seed.
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Matched-cohort ATT: propensity fit, caliper matching, balance, effect
    Att {
        /// Input records (JSON with a `records` array).
        #[arg(short, long)]
        input: PathBuf,

        /// Pipeline configuration (JSON). Flags below override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Caliper as a multiple of the propensity-score SD.
        #[arg(long, conflicts_with = "caliper_abs")]
        caliper_sd: Option<f64>,

        /// Caliper as an absolute width on the propensity scale.
        #[arg(long)]
        caliper_abs: Option<f64>,

        /// Match with (`true`) or without (`false`) replacement.
        #[arg(long, value_name = "BOOL")]
        replacement: Option<bool>,

        /// Interval level is 1 - alpha.
        #[arg(long)]
        alpha: Option<f64>,

        /// Interval reference distribution.
        #[arg(long, value_enum)]
        interval: Option<IntervalArg>,

        /// On separation, refit once with this ridge penalty instead of failing.
        #[arg(long)]
        separation_l2: Option<f64>,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 2x2 difference-in-differences on long-format observations
    Did {
        /// Input JSON with `y`, `treat`, `post` and optional `cluster_ids`.
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::GenerateData { n_units, true_effect, confounding, seed, output } => {
            engagement::cmd_generate_data(n_units, true_effect, confounding, seed, output.as_ref())
        }
        Commands::Att {
            input,
            config,
            caliper_sd,
            caliper_abs,
            replacement,
            alpha,
            interval,
            separation_l2,
            output,
        } => causal::cmd_att(
            &input,
            config.as_ref(),
            causal::AttOverrides { caliper_sd, caliper_abs, replacement, alpha, interval, separation_l2 },
            output.as_ref(),
        ),
        Commands::Did { input, output } => causal::cmd_did(&input, output.as_ref()),
        Commands::Version => {
            println!("causalkit {}", ck_core::VERSION);
            Ok(())
        }
    }
}

fn write_json<T: Serialize>(output: Option<&PathBuf>, value: &T) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}
