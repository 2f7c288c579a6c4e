//! Sensitivity table of the bootstrap test on synthetic regressions
//!
//! For a version's run means, draw `run` of them, add `delta` times their
//! mean to build a mutated copy, and bootstrap the difference. Repeating
//! this `samples` times per (delta, run) gives the distribution of
//! `-log10(p)` a regression of size `delta` produces at that run count.

use crate::detection::{
    estimate_likelihood, hierarchical_bootstrap_mean, mean, neg_log10_p, ResampleLevel,
    DEFAULT_MEMORY_LIMIT,
};
use crate::error::{PhoenixError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// `-log10(p)` at or above this counts as a detected regression (p <= 0.01)
pub const DETECTION_NEG_LOG_P: f64 = 2.0;

/// One row of the sensitivity table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRow {
    pub delta: f64,
    pub run: usize,
    /// Run means available for the version
    pub max_runs: usize,
    pub neg_log_p_value_mean: f64,
    pub neg_log_p_value_var: f64,
    pub neg_log_p_value_max: f64,
    pub neg_log_p_value_min: f64,
    pub median: f64,
    /// Share of samples with `-log10(p) >= 2`
    pub true_positive_rate: f64,
    pub neg_log_p_values: Vec<f64>,
}

/// Parameters of [`mutation_model`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub deltas: Vec<f64>,
    pub runs: Vec<usize>,
    pub samples: usize,
    pub boots: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            deltas: vec![0.01, 0.05, 0.1],
            runs: vec![5, 10, 15, 20, 25, 30],
            samples: 50,
            boots: 33_333,
        }
    }
}

/// Build the sensitivity table for one version
pub fn mutation_model<R: Rng + ?Sized>(
    run_means: &[f64],
    config: &ModelConfig,
    rng: &mut R,
) -> Result<Vec<ModelRow>> {
    if run_means.is_empty() {
        return Err(PhoenixError::MissingData {
            run: 0,
            reason: "no run means to model".to_string(),
        });
    }
    if config.samples == 0 || config.boots == 0 || config.runs.contains(&0) {
        return Err(PhoenixError::config(
            "samples, boots and run counts must be positive",
        ));
    }

    let mut rows = Vec::with_capacity(config.deltas.len() * config.runs.len());
    for &delta in &config.deltas {
        for &run in &config.runs {
            let values: Vec<f64> = (0..config.samples)
                .map(|_| sample_neg_log_p(run_means, run, delta, config.boots, rng))
                .collect();
            rows.push(summarize(delta, run, run_means.len(), values));
        }
    }
    Ok(rows)
}

fn sample_neg_log_p<R: Rng + ?Sized>(
    run_means: &[f64],
    run: usize,
    delta: f64,
    boots: usize,
    rng: &mut R,
) -> f64 {
    let actual: Vec<Vec<f64>> = (0..run)
        .map(|_| vec![run_means[rng.gen_range(0..run_means.len())]])
        .collect();
    let shift = delta * mean(&actual.iter().map(|r| r[0]).collect::<Vec<_>>());
    let mutated: Vec<Vec<f64>> = actual.iter().map(|r| vec![r[0] + shift]).collect();

    let a = hierarchical_bootstrap_mean(&actual, run, boots, ResampleLevel::Runs, DEFAULT_MEMORY_LIMIT, rng);
    let b = hierarchical_bootstrap_mean(&mutated, run, boots, ResampleLevel::Runs, DEFAULT_MEMORY_LIMIT, rng);
    let diff: Vec<f64> = a.iter().zip(&b).map(|(x, y)| x - y).collect();

    estimate_likelihood(&diff, 0.0).map_or(0.0, neg_log10_p)
}

fn summarize(delta: f64, run: usize, max_runs: usize, values: Vec<f64>) -> ModelRow {
    let n = values.len() as f64;
    let m = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;

    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);
    let k = sorted.len();
    let median = if k % 2 == 0 {
        (sorted[k / 2 - 1] + sorted[k / 2]) / 2.0
    } else {
        sorted[k / 2]
    };

    ModelRow {
        delta,
        run,
        max_runs,
        neg_log_p_value_mean: m,
        neg_log_p_value_var: var,
        neg_log_p_value_max: sorted[k - 1],
        neg_log_p_value_min: sorted[0],
        median,
        true_positive_rate: values.iter().filter(|v| **v >= DETECTION_NEG_LOG_P).count() as f64 / n,
        neg_log_p_values: values,
    }
}
