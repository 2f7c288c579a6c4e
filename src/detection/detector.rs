// Change-point detector: Dampen -> Resample -> Estimate -> Classify
//
// The detector is a pure function of its inputs plus its configuration. It
// owns no state across comparisons, so a single instance can be shared by
// every worker thread.

use crate::detection::bootstrap::{mean_difference_distribution, mean_of_means, relative_change};
use crate::detection::config::DetectorConfig;
use crate::detection::dampen::hierarchical_dampen;
use crate::detection::likelihood::estimate_likelihood;
use crate::error::Result;
use crate::run_size::RunSizeSpec;
use crate::sample::{comparison_key, validate_runs, Run, Sample};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Outcome of comparing an old sample against a new sample on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    /// Metric column the runs were extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub old_run_count: usize,
    pub new_run_count: usize,
    /// Normal-approximation probability of "no difference", in [0, 1]
    pub p_value: f64,
    /// Relative change `(new - old) / old`
    pub effect_size: f64,
    pub regression: bool,
    /// Stable comparison key (`old meta:new meta:column`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// `true` when computed locally, `false` when fetched from ground truth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<bool>,
}

/// Result of one detector call
///
/// "Could not compare" is a distinct outcome, never a default verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Compared(Comparison),
    NotCompared { reason: String },
}

impl Verdict {
    pub fn comparison(&self) -> Option<&Comparison> {
        match self {
            Verdict::Compared(c) => Some(c),
            Verdict::NotCompared { .. } => None,
        }
    }

    pub fn into_comparison(self) -> Option<Comparison> {
        match self {
            Verdict::Compared(c) => Some(c),
            Verdict::NotCompared { .. } => None,
        }
    }

    pub fn is_regression(&self) -> bool {
        self.comparison().is_some_and(|c| c.regression)
    }

    /// Generate human-readable report
    pub fn to_report_string(&self) -> String {
        let mut report = String::new();
        match self {
            Verdict::Compared(c) => {
                if c.regression {
                    report.push_str("❌ REGRESSION DETECTED\n\n");
                } else {
                    report.push_str("✅ NO REGRESSION DETECTED\n\n");
                }
                if let Some(key) = &c.key {
                    report.push_str(&format!("Comparison: {}\n", key));
                }
                report.push_str(&format!(
                    "Runs: old={} new={}\n",
                    c.old_run_count, c.new_run_count
                ));
                report.push_str(&format!("p-value: {:.6}\n", c.p_value));
                report.push_str(&format!("Effect size: {:+.4}%\n", c.effect_size * 100.0));
                if let Some(generated) = c.generated {
                    let source = if generated { "local bootstrap" } else { "ground truth" };
                    report.push_str(&format!("Source: {}\n", source));
                }
            }
            Verdict::NotCompared { reason } => {
                report.push_str("⚠️  INSUFFICIENT DATA\n\n");
                report.push_str(&format!("Reason: {}\n", reason));
            }
        }
        report
    }
}

/// Bootstrap change-point detector
#[derive(Debug, Clone)]
pub struct ChangePointDetector {
    config: DetectorConfig,
}

impl ChangePointDetector {
    /// Create a detector; invalid configuration fails here, not mid-comparison
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Compare two lists of runs
    ///
    /// Runs that are empty or hold non-finite values are excluded with a
    /// warning. A side without any valid run, or both sides short of the
    /// minimum run count, yields [`Verdict::NotCompared`].
    pub fn compute_difference(&self, old_runs: &[Run], new_runs: &[Run], run_size: &RunSizeSpec) -> Verdict {
        let mut old = prepare_side(old_runs, run_size);
        let mut new = prepare_side(new_runs, run_size);

        hierarchical_dampen(&mut old, self.config.trim_share, self.config.trim_limit);
        hierarchical_dampen(&mut new, self.config.trim_share, self.config.trim_limit);

        if old.is_empty() || new.is_empty() {
            return Verdict::NotCompared {
                reason: format!(
                    "no valid runs (old={}, new={})",
                    old.len(),
                    new.len()
                ),
            };
        }

        let count_old = run_size.effective_old(old.len());
        let count_new = run_size.effective_new(new.len());

        let mean_old = mean_of_means(&old);
        let mean_new = mean_of_means(&new);

        let mut rng = match self.config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let Some(distribution) =
            mean_difference_distribution(&old, &new, count_old, count_new, &self.config, &mut rng)
        else {
            return Verdict::NotCompared {
                reason: format!(
                    "{} old and {} new runs, minimum is {}",
                    count_old, count_new, self.config.min_run_count
                ),
            };
        };

        let Some(p_value) = estimate_likelihood(&distribution, 0.0) else {
            return Verdict::NotCompared {
                reason: "empty bootstrap distribution".to_string(),
            };
        };

        let Some(effect_size) = relative_change(mean_old, mean_new) else {
            return Verdict::NotCompared {
                reason: format!("relative change from old mean {} is undefined", mean_old),
            };
        };
        let regression = p_value < self.config.p_value_threshold;

        tracing::debug!(
            count_old,
            count_new,
            p_value,
            effect_size,
            regression,
            "comparison computed"
        );

        Verdict::Compared(Comparison {
            column: None,
            old_run_count: count_old,
            new_run_count: count_new,
            p_value,
            effect_size,
            regression,
            key: None,
            generated: Some(true),
        })
    }

    /// Compare two samples, tagging the result with its stable key
    pub fn compare_samples(&self, old: &Sample, new: &Sample, column: &str, run_size: &RunSizeSpec) -> Verdict {
        match self.compute_difference(&old.runs, &new.runs, run_size) {
            Verdict::Compared(mut comparison) => {
                comparison.column = Some(column.to_string());
                comparison.key = Some(comparison_key(&old.identity, &new.identity, column));
                Verdict::Compared(comparison)
            }
            not_compared => {
                tracing::info!(
                    old = %old.identity,
                    new = %new.identity,
                    column,
                    "comparison not computed"
                );
                not_compared
            }
        }
    }
}

/// Copy one side's valid runs, cut to the iteration policy
fn prepare_side(runs: &[Run], run_size: &RunSizeSpec) -> Vec<Run> {
    let cut: Vec<Run> = runs
        .iter()
        .map(|run| run_size.iterations_count.apply(run).to_vec())
        .collect();
    validate_runs(&cut)
}
