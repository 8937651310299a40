use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Kalmar diffuse Kalman filter and smoother.
#[derive(Parser)]
#[command(
    name = "kalmar",
    version,
    about = "Exact diffuse Kalman filtering and smoothing of univariate series"
)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Filter and smooth a series, printing the per-step table.
    Smooth(SmoothArgs),
    /// Compute the diffuse log-likelihood of a series.
    Likelihood(LikelihoodArgs),
}

/// Arguments for the `smooth` subcommand.
#[derive(clap::Args)]
pub struct SmoothArgs {
    /// Path to TOML run description.
    #[arg(short, long, default_value = "kalmar.toml")]
    pub config: PathBuf,

    /// Also write the table as CSV to this path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Override the orthogonal transformation from config (givens, householder).
    #[arg(long)]
    pub transformation: Option<String>,
}

/// Arguments for the `likelihood` subcommand.
#[derive(clap::Args)]
pub struct LikelihoodArgs {
    /// Path to TOML run description.
    #[arg(short, long, default_value = "kalmar.toml")]
    pub config: PathBuf,
}
