// Dimension policies: how many runs to use from each sample
//
// Every policy turns an (old, new) sample pair into a RunSizeSpec for the
// detector. Policies are selected by name from configuration through
// `DimensionConfig`, an explicit registry of constructors validated at
// startup.
//
// - `max`: every available run
// - `fixed`: configured counts clipped to availability
// - `min`: a small constant cap (11)
// - `mutation`: learns p-value thresholds on synthetic regressions
// - `curve-fit`: extrapolates the run count from a sensitivity curve

mod curve_fit;
mod fixed;
mod max;
mod min;
mod mutation;

pub use curve_fit::CurveFitDimension;
pub use fixed::FixedDimension;
pub use max::MaxDimension;
pub use min::{MinDimension, DEFAULT_MIN_CAP};
pub use mutation::{MutationDimension, TrainingWindow, DIMENSION_RUN_COUNTS};

use crate::detection::DetectorConfig;
use crate::error::{PhoenixError, Result};
use crate::run_size::RunSizeSpec;
use crate::sample::Sample;
use crate::training::{MutationTrainer, ThresholdStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Strategy producing the run-size specification of a comparison
pub trait DimensionPolicy: Send {
    fn name(&self) -> &'static str;

    /// Run sizes for comparing `old` against `new`
    fn calculate_dimension(&mut self, old: &Sample, new: &Sample) -> Result<RunSizeSpec>;
}

/// Bounds applied to estimated run counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunLimit {
    pub min_run: usize,
    pub max_run: usize,
}

impl Default for RunLimit {
    fn default() -> Self {
        Self {
            min_run: 10,
            max_run: 100,
        }
    }
}

impl RunLimit {
    pub fn validate(&self) -> Result<()> {
        if self.min_run == 0 || self.min_run > self.max_run {
            return Err(PhoenixError::config(format!(
                "run limit must satisfy 0 < min_run <= max_run, got {}..{}",
                self.min_run, self.max_run
            )));
        }
        Ok(())
    }

    pub fn clamp(&self, runs: usize) -> usize {
        runs.clamp(self.min_run, self.max_run)
    }
}

fn default_min_cap() -> usize {
    DEFAULT_MIN_CAP
}

fn default_training_samples() -> usize {
    10
}

fn default_dimension_run_counts() -> Vec<usize> {
    DIMENSION_RUN_COUNTS.to_vec()
}

fn default_training_detector() -> DetectorConfig {
    DetectorConfig::permissive()
}

fn default_alpha() -> f64 {
    0.01
}

/// `[dimension]` section: which policy to build and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DimensionConfig {
    #[default]
    Max,
    Fixed {
        old_count: usize,
        new_count: usize,
    },
    Min {
        #[serde(default = "default_min_cap")]
        cap: usize,
    },
    Mutation {
        /// Relative size of the synthetic regression
        ratio: f64,
        #[serde(default)]
        train_days: i64,
        #[serde(default)]
        train_count: usize,
        /// Comparisons per run count and training sample
        #[serde(default = "default_training_samples")]
        samples: usize,
        #[serde(default = "default_dimension_run_counts")]
        run_counts: Vec<usize>,
        #[serde(default = "default_training_detector")]
        detector: DetectorConfig,
    },
    CurveFit {
        #[serde(default)]
        limit: RunLimit,
        #[serde(default = "default_alpha")]
        alpha: f64,
        #[serde(default = "default_alpha")]
        sensitivity: f64,
        #[serde(default)]
        seed: Option<u64>,
    },
}

impl DimensionConfig {
    /// Construct the configured policy; invalid parameters fail here
    pub fn build(&self, cache_root: &Path) -> Result<Box<dyn DimensionPolicy>> {
        Ok(match self {
            DimensionConfig::Max => Box::new(MaxDimension),
            DimensionConfig::Fixed {
                old_count,
                new_count,
            } => Box::new(FixedDimension::new(*old_count, *new_count)?),
            DimensionConfig::Min { cap } => Box::new(MinDimension::new(*cap)?),
            DimensionConfig::Mutation {
                ratio,
                train_days,
                train_count,
                samples,
                run_counts,
                detector,
            } => {
                if *train_days < 0 {
                    return Err(PhoenixError::config("train_days must not be negative"));
                }
                let trainer = MutationTrainer::new(*ratio, *samples, run_counts.clone(), detector.clone())?;
                Box::new(MutationDimension::new(
                    trainer,
                    ThresholdStore::new(cache_root),
                    TrainingWindow::new(*train_days, *train_count),
                ))
            }
            DimensionConfig::CurveFit {
                limit,
                alpha,
                sensitivity,
                seed,
            } => Box::new(CurveFitDimension::new(*limit, *alpha, *sensitivity, *seed)?),
        })
    }
}

impl FromStr for DimensionConfig {
    type Err = PhoenixError;

    /// Short CLI names: `max`, `min`, `fixed,<old>,<new>`, `mutation,<ratio>`, `curve-fit`
    fn from_str(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        let number = |s: &str| -> Result<usize> {
            s.parse()
                .map_err(|_| PhoenixError::config(format!("'{}' is not a run count", s)))
        };

        match parts.as_slice() {
            ["max"] => Ok(DimensionConfig::Max),
            ["min"] => Ok(DimensionConfig::Min { cap: DEFAULT_MIN_CAP }),
            ["fixed", old, new] => Ok(DimensionConfig::Fixed {
                old_count: number(old)?,
                new_count: number(new)?,
            }),
            ["mutation", ratio] => Ok(DimensionConfig::Mutation {
                ratio: ratio
                    .parse()
                    .map_err(|_| PhoenixError::config(format!("'{}' is not a ratio", ratio)))?,
                train_days: 0,
                train_count: 0,
                samples: default_training_samples(),
                run_counts: default_dimension_run_counts(),
                detector: default_training_detector(),
            }),
            ["curve-fit"] => Ok(DimensionConfig::CurveFit {
                limit: RunLimit::default(),
                alpha: default_alpha(),
                sensitivity: default_alpha(),
                seed: None,
            }),
            _ => Err(PhoenixError::config(format!(
                "unknown dimension policy '{}', choose from max, min, fixed,<old>,<new>, mutation,<ratio>, curve-fit",
                text
            ))),
        }
    }
}
