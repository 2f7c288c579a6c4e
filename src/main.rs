use anyhow::{Context, Result};
use clap::Parser;
use phoenix::cli::{
    AnalyzeArgs, Cli, Command, CompareArgs, OutputFormat, SampleArgs, SimulateArgs, TrainArgs,
};
use phoenix::config::PhoenixConfig;
use phoenix::control::{ControlConfig, ControlDecisions};
use phoenix::detection::{run_means, ChangePointDetector, DetectorConfig, Verdict};
use phoenix::dimension::DimensionConfig;
use phoenix::estimates::{estimate_runs_needed, guess_needed_runs};
use phoenix::ground_truth::{
    Comparer, FileComparisonStore, GroundTruthCache, Provenance, RemoteConfig,
};
use phoenix::mutation_model::mutation_model;
use phoenix::pool::run_partitioned;
use phoenix::sample::{Sample, SamplePair};
use phoenix::training::{MutationTrainer, ThresholdStore, CONTROL_RUN_COUNTS};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber, TRACE everywhere with --debug
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<PhoenixConfig> {
    match path {
        Some(path) => PhoenixConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display())),
        None => Ok(PhoenixConfig::default()),
    }
}

fn load_sample(path: &Path) -> Result<Sample> {
    Sample::from_json_file(path).with_context(|| format!("Failed to read sample: {}", path.display()))
}

fn detector_config(config: &PhoenixConfig, seed: Option<u64>) -> DetectorConfig {
    let mut detector = config.detector.clone();
    if seed.is_some() {
        detector.seed = seed;
    }
    detector
}

fn rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn provenance_name(provenance: Provenance) -> &'static str {
    match provenance {
        Provenance::Store => "store",
        Provenance::External => "external",
        Provenance::Detector => "detector",
    }
}

fn print_verdict(verdict: &Verdict, format: OutputFormat, source: &str) -> Result<()> {
    match format {
        OutputFormat::Text => {
            print!("{}", verdict.to_report_string());
            println!("Answered by: {}", source);
            Ok(())
        }
        OutputFormat::Json => {
            let reason = match verdict {
                Verdict::NotCompared { reason } => Some(reason.as_str()),
                Verdict::Compared(_) => None,
            };
            print_json(&serde_json::json!({
                "answered_by": source,
                "comparison": verdict.comparison(),
                "reason": reason,
            }))
        }
    }
}

#[cfg(feature = "remote")]
fn with_remote(comparer: Comparer, remote: &RemoteConfig) -> Result<Comparer> {
    let source = phoenix::ground_truth::HttpGroundTruth::new(remote)?;
    Ok(comparer.with_source(Box::new(source)))
}

#[cfg(not(feature = "remote"))]
fn with_remote(comparer: Comparer, _remote: &RemoteConfig) -> Result<Comparer> {
    tracing::warn!("built without the remote feature, external ground truth disabled");
    Ok(comparer)
}

fn run_compare(config: &PhoenixConfig, args: &CompareArgs, format: OutputFormat) -> Result<()> {
    let old = load_sample(&args.pair.old)?;
    let new = load_sample(&args.pair.new)?;
    let column = args.pair.column.clone().unwrap_or_else(|| config.column.clone());

    let detector = ChangePointDetector::new(detector_config(config, args.pair.seed))?;
    let mut comparer = Comparer::new(column, detector)
        .with_store(Box::new(FileComparisonStore::new(config.cache_root())));
    if let (false, Some(remote)) = (args.no_remote, &config.remote) {
        comparer = with_remote(comparer, remote)?;
    }

    let (verdict, provenance) = comparer.compare_with_provenance(&old, &new)?;
    print_verdict(&verdict, format, provenance_name(provenance))
}

fn run_analyze(config: &PhoenixConfig, args: &AnalyzeArgs, format: OutputFormat) -> Result<()> {
    let old = load_sample(&args.pair.old)?;
    let new = load_sample(&args.pair.new)?;
    old.check_comparable(&new)?;
    let column = args.pair.column.clone().unwrap_or_else(|| config.column.clone());

    let dimension = match &args.dimension {
        Some(text) => text.parse::<DimensionConfig>()?,
        None => config.dimension.clone(),
    };
    let root = config.cache_root();
    let mut policy = dimension.build(&root)?;
    let run_size = policy.calculate_dimension(&old, &new)?;
    tracing::info!(policy = policy.name(), signature = %run_size.signature(), "run size chosen");

    let cache = GroundTruthCache::new(&root, ChangePointDetector::new(detector_config(config, args.pair.seed))?);
    let verdict = match cache.analyze(&old, &new, &column, &run_size)? {
        Some(comparison) => Verdict::Compared(comparison),
        None => Verdict::NotCompared {
            reason: format!("not computable at run size {}", run_size.signature()),
        },
    };
    print_verdict(&verdict, format, policy.name())
}

fn run_train(config: &PhoenixConfig, args: &TrainArgs, format: OutputFormat) -> Result<()> {
    let sample = load_sample(&args.sample)?;
    let trainer = MutationTrainer::new(
        args.delta,
        args.epochs,
        CONTROL_RUN_COUNTS.to_vec(),
        config.detector.clone(),
    )?;
    let store = ThresholdStore::new(config.cache_root());
    let file = trainer.train_cached(&store, &sample)?;

    match format {
        OutputFormat::Json => print_json(&file),
        OutputFormat::Text => {
            println!("Thresholds for {} ({})", sample.identity, file.date);
            for (runs, threshold) in &file.thresholds {
                println!("  {:>3} runs: p <= {:.6}", runs, threshold);
            }
            println!("Cache: {}", store.path(&sample.identity, args.epochs).display());
            Ok(())
        }
    }
}

/// Sample pairs grouped by benchmark configuration, each group in
/// chronological order
fn group_pairs(pairs: Vec<SamplePair>) -> BTreeMap<String, Vec<SamplePair>> {
    let mut groups: BTreeMap<String, Vec<SamplePair>> = BTreeMap::new();
    for pair in pairs {
        groups.entry(pair.old.group_key()).or_default().push(pair);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| a.old.version.datetime.cmp(&b.old.version.datetime));
    }
    groups
}

fn run_simulate(config: &PhoenixConfig, args: &SimulateArgs, format: OutputFormat) -> Result<()> {
    let content = std::fs::read_to_string(&args.pairs)
        .with_context(|| format!("Failed to read sample pairs: {}", args.pairs.display()))?;
    let pairs: Vec<SamplePair> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse sample pairs: {}", args.pairs.display()))?;

    let control = match &args.control {
        Some(text) => text.parse::<ControlConfig>()?,
        None => config.control.clone(),
    };
    let column = args.column.clone().unwrap_or_else(|| config.column.clone());
    let workers = args.workers.unwrap_or(config.workers);
    let root = config.cache_root();

    // Fail on a bad policy before any worker starts
    let policy_name = control.build(&root)?.name();

    let tasks: Vec<(String, Vec<SamplePair>)> = group_pairs(pairs).into_iter().collect();
    let (results, stats) = run_partitioned(tasks, workers, |group_key, pairs| -> phoenix::Result<ControlDecisions> {
        let mut policy = control.build(&root)?;
        policy.control(group_key, &pairs, &column)
    })?;
    tracing::info!(
        policy = policy_name,
        tasks = stats.tasks,
        workers = stats.workers_used,
        "simulation finished"
    );

    let mut decisions = ControlDecisions::new();
    let mut failed = 0usize;
    for (group_key, result) in results {
        match result {
            Ok(group) => decisions.extend(group),
            Err(e) => {
                tracing::error!(%group_key, "control failed: {}", e);
                failed += 1;
            }
        }
    }

    match format {
        OutputFormat::Json => print_json(&decisions),
        OutputFormat::Text => {
            let training = decisions.values().filter(|d| d.training).count();
            let compared: Vec<_> = decisions.values().filter_map(|d| d.comparison.as_ref()).collect();
            let regressions = compared.iter().filter(|c| c.regression).count();
            let runs: usize = decisions.values().map(|d| d.runs_used).sum();

            println!("=== Simulation ({}) ===", policy_name);
            println!("Configurations: {} ({} failed)", stats.tasks, failed);
            println!("Pairs:          {}", decisions.len());
            println!("Training:       {}", training);
            println!("Compared:       {}", compared.len());
            println!("Regressions:    {}", regressions);
            println!("Runs used:      {}", runs);
            Ok(())
        }
    }
}

fn run_estimate(config: &PhoenixConfig, args: &SampleArgs, format: OutputFormat) -> Result<()> {
    let sample = load_sample(&args.sample)?;
    let history = run_means(&sample.valid_runs());
    let mut rng = rng(args.seed);

    let extra = guess_needed_runs(
        &history,
        history.len(),
        config.estimate.alpha,
        config.estimate.sensitivity,
        &mut rng,
    );
    let mut estimates = estimate_runs_needed(&history, &config.estimate, &mut rng)?;
    estimates.sort_unstable();
    let median = estimates[estimates.len() / 2];

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "sample": sample.meta_key(),
            "runs": history.len(),
            "extra_runs": extra,
            "subset_estimates": estimates,
            "subset_median": median,
        })),
        OutputFormat::Text => {
            println!("Sample:               {}", sample.identity);
            println!("Runs available:       {}", history.len());
            println!("Extra runs needed:    {}", extra);
            println!(
                "Subset estimates:     min={} median={} max={}",
                estimates[0],
                median,
                estimates[estimates.len() - 1]
            );
            Ok(())
        }
    }
}

fn run_model(config: &PhoenixConfig, args: &SampleArgs, format: OutputFormat) -> Result<()> {
    let sample = load_sample(&args.sample)?;
    let means = run_means(&sample.valid_runs());
    let rows = mutation_model(&means, &config.model, &mut rng(args.seed))?;

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Text => {
            println!("{:>7} {:>5} {:>10} {:>10} {:>6}", "delta", "runs", "mean", "median", "tpr");
            println!("─────────────────────────────────────────");
            for row in &rows {
                println!(
                    "{:>7.3} {:>5} {:>10.3} {:>10.3} {:>6.2}",
                    row.delta, row.run, row.neg_log_p_value_mean, row.median, row.true_positive_rate
                );
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = load_config(args.config.as_deref())?;

    match &args.command {
        Command::Compare(cmd) => run_compare(&config, cmd, args.format),
        Command::Analyze(cmd) => run_analyze(&config, cmd, args.format),
        Command::Train(cmd) => run_train(&config, cmd, args.format),
        Command::Simulate(cmd) => run_simulate(&config, cmd, args.format),
        Command::EstimateRuns(cmd) => run_estimate(&config, cmd, args.format),
        Command::Model(cmd) => run_model(&config, cmd, args.format),
    }
}
