//! CLI argument parsing for Phoenix

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for comparison results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "phoenix")]
#[command(version)]
#[command(about = "Bootstrap change-point detection for benchmark regressions", long_about = None)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug tracing output to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Output format (text or json)
    #[arg(long = "format", global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare two samples through the ground-truth chain (store, remote, local)
    Compare(CompareArgs),
    /// Compare two samples at the run size chosen by a dimension policy
    Analyze(AnalyzeArgs),
    /// Train mutation thresholds on one sample
    Train(TrainArgs),
    /// Run a control policy over sample pairs, one worker per partition
    Simulate(SimulateArgs),
    /// Estimate how many runs a sample needs
    EstimateRuns(SampleArgs),
    /// Sensitivity table of synthetic regressions for one sample
    Model(SampleArgs),
}

/// Old/new sample documents and the compared column
#[derive(Args, Debug)]
pub struct PairArgs {
    /// Old sample (JSON)
    #[arg(long, value_name = "FILE")]
    pub old: PathBuf,

    /// New sample (JSON)
    #[arg(long, value_name = "FILE")]
    pub new: PathBuf,

    /// Column the runs were extracted from (default: configuration)
    #[arg(long)]
    pub column: Option<String>,

    /// Fixed seed for reproducible resampling
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Skip the external ground truth even when configured
    #[arg(long)]
    pub no_remote: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub pair: PairArgs,

    /// Dimension policy: max, min, fixed,<old>,<new>, mutation,<ratio>, curve-fit
    #[arg(long, value_name = "POLICY")]
    pub dimension: Option<String>,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Sample to train on (JSON)
    #[arg(long, value_name = "FILE")]
    pub sample: PathBuf,

    /// Relative size of the synthetic regression
    #[arg(long, default_value = "0.05")]
    pub delta: f64,

    /// Comparisons per run count
    #[arg(long, default_value = "50")]
    pub epochs: usize,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Sample pairs (JSON array of {old, new})
    #[arg(long, value_name = "FILE")]
    pub pairs: PathBuf,

    /// Control policy: constant, random, mutation,<method>,<value>,<delta>
    #[arg(long, value_name = "POLICY")]
    pub control: Option<String>,

    /// Column the runs were extracted from (default: configuration)
    #[arg(long)]
    pub column: Option<String>,

    /// Worker threads (default: configuration)
    #[arg(short, long)]
    pub workers: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SampleArgs {
    /// Sample (JSON)
    #[arg(long, value_name = "FILE")]
    pub sample: PathBuf,

    /// Fixed seed for reproducible resampling
    #[arg(long)]
    pub seed: Option<u64>,
}
