// Hierarchical bootstrap of the mean difference between two samples
//
// A sample is a list of runs, each run a list of iteration measurements. One
// replicate draws `count` runs with replacement, takes the mean of every
// drawn run and averages those means. The difference distribution is the
// replicate-wise new-minus-old difference.
//
// Replicates are generated in chunks: one chunk holds at most
// `bootstrap_memory_limit` bytes of drawn run means, laid out as a
// `(chunk_replicates, count)` row-major matrix.

use crate::detection::config::{DetectorConfig, ResampleLevel};
use rand::Rng;

/// Arithmetic mean; NaN for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divide by n)
pub fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Mean of every run
pub fn run_means(runs: &[Vec<f64>]) -> Vec<f64> {
    runs.iter().map(|run| mean(run)).collect()
}

/// Mean of the per-run means
pub fn mean_of_means(runs: &[Vec<f64>]) -> f64 {
    mean(&run_means(runs))
}

/// Relative change `(new - old) / old`
///
/// Zero against a zero baseline; `None` when a non-zero value is measured
/// against a zero baseline or the result is not finite.
pub fn relative_change(old: f64, new: f64) -> Option<f64> {
    if old == 0.0 {
        return (new == 0.0).then_some(0.0);
    }
    Some((new - old) / old).filter(|change| change.is_finite())
}

/// Number of replicates that fit one resampling chunk
pub fn chunk_replicates(count: usize, memory_limit: usize) -> usize {
    let row_bytes = count.max(1) * std::mem::size_of::<f64>();
    (memory_limit / row_bytes).max(1)
}

/// Bootstrap distribution of the mean of `count` resampled runs
///
/// Returns `replicates` values. `runs` must not be empty.
pub fn hierarchical_bootstrap_mean<R: Rng + ?Sized>(
    runs: &[Vec<f64>],
    count: usize,
    replicates: usize,
    level: ResampleLevel,
    memory_limit: usize,
    rng: &mut R,
) -> Vec<f64> {
    assert!(!runs.is_empty(), "bootstrap needs at least one run");
    let count = count.max(1);
    let means = run_means(runs);
    let chunk = chunk_replicates(count, memory_limit).min(replicates.max(1));

    let mut results = Vec::with_capacity(replicates);
    let mut buffer = vec![0.0; chunk * count];

    while results.len() < replicates {
        let rows = chunk.min(replicates - results.len());
        let drawn = &mut buffer[..rows * count];

        for slot in drawn.iter_mut() {
            let index = rng.gen_range(0..runs.len());
            *slot = match level {
                ResampleLevel::Runs => means[index],
                ResampleLevel::RunsAndIterations => resampled_mean(&runs[index], rng),
            };
        }

        results.extend(drawn.chunks_exact(count).map(mean));
    }

    results
}

/// Mean of one run resampled with replacement to its own length
fn resampled_mean<R: Rng + ?Sized>(run: &[f64], rng: &mut R) -> f64 {
    if run.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = (0..run.len()).map(|_| run[rng.gen_range(0..run.len())]).sum();
    sum / run.len() as f64
}

/// Bootstrap distribution of `mean(new) - mean(old)`
///
/// Returns `None` ("insufficient data") when both counts are below
/// `config.min_run_count` or either side has no runs at all.
///
/// # Example
/// ```
/// use phoenix::detection::{mean_difference_distribution, DetectorConfig};
/// use rand::SeedableRng;
/// use rand_xoshiro::Xoshiro256PlusPlus;
///
/// let old = vec![vec![1.0, 2.0]; 3];
/// let new = vec![vec![1.0, 2.0]; 3];
/// let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
/// let config = DetectorConfig::default();
/// assert!(mean_difference_distribution(&old, &new, 3, 3, &config, &mut rng).is_none());
/// ```
pub fn mean_difference_distribution<R: Rng + ?Sized>(
    old: &[Vec<f64>],
    new: &[Vec<f64>],
    count_old: usize,
    count_new: usize,
    config: &DetectorConfig,
    rng: &mut R,
) -> Option<Vec<f64>> {
    if count_old < config.min_run_count && count_new < config.min_run_count {
        tracing::debug!(
            count_old,
            count_new,
            minimum = config.min_run_count,
            "bootstrap skipped: not enough runs"
        );
        return None;
    }

    if old.is_empty() || new.is_empty() {
        tracing::debug!(old = old.len(), new = new.len(), "bootstrap skipped: empty side");
        return None;
    }

    let results_new = hierarchical_bootstrap_mean(
        new,
        count_new,
        config.boots,
        config.resample_level,
        config.bootstrap_memory_limit,
        rng,
    );
    let results_old = hierarchical_bootstrap_mean(
        old,
        count_old,
        config.boots,
        config.resample_level,
        config.bootstrap_memory_limit,
        rng,
    );

    Some(
        results_new
            .iter()
            .zip(&results_old)
            .map(|(n, o)| n - o)
            .collect(),
    )
}
