// Control policies: adaptive stopping over a series of sample pairs
//
// A control policy sees the chronologically ordered sample pairs of one
// benchmark configuration (group key) and decides, per pair, how many runs
// to spend and what comparison to report.
//
// - `constant`: reports nothing, the baseline
// - `random`: compares at a uniformly drawn run count
// - `mutation`: trains thresholds on early pairs, then stops testing pairs
//   as soon as the p-value clears the learned maximum

mod constant;
mod mutation;
mod random;

pub use constant::ConstantControl;
pub use mutation::{MutationControl, ThresholdBounds};
pub use random::RandomControl;

use crate::detection::{Comparison, DetectorConfig};
use crate::error::{PhoenixError, Result};
use crate::sample::SamplePair;
use crate::training::{MutationTrainer, ThresholdStore, TrainingSplit, CONTROL_RUN_COUNTS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Decisions keyed by the stable comparison key of each pair
pub type ControlDecisions = BTreeMap<String, ControlDecision>;

/// Strategy deciding how each pair of a series is compared
pub trait ControlPolicy: Send {
    fn name(&self) -> &'static str;

    /// Decide every pair of `pairs`, which all belong to `group_key`
    fn control(&mut self, group_key: &str, pairs: &[SamplePair], column: &str) -> Result<ControlDecisions>;
}

/// Outcome for one sample pair
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ControlDecision {
    /// `None` when the pair was not compared
    pub comparison: Option<Comparison>,
    /// Runs drawn from each side for the reported comparison
    pub runs_used: usize,
    /// Pair was consumed by training
    pub training: bool,
}

impl ControlDecision {
    pub fn not_computed() -> Self {
        Self::default()
    }

    pub fn training() -> Self {
        Self {
            training: true,
            ..Self::default()
        }
    }

    pub fn compared(comparison: Comparison, runs_used: usize) -> Self {
        Self {
            comparison: Some(comparison),
            runs_used,
            training: false,
        }
    }
}

/// Attach the pair's key and column to a detector result
pub(crate) fn label(mut comparison: Comparison, pair: &SamplePair, column: &str) -> Comparison {
    comparison.key = Some(pair.key(column));
    comparison.column = Some(column.to_string());
    comparison
}

fn default_min_runs() -> usize {
    10
}

fn default_max_runs() -> usize {
    30
}

fn default_epochs() -> usize {
    50
}

fn default_control_detector() -> DetectorConfig {
    DetectorConfig::default().with_boots(3_333)
}

/// `[control]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ControlConfig {
    #[default]
    Constant,
    Random {
        #[serde(default = "default_min_runs")]
        min_runs: usize,
        #[serde(default = "default_max_runs")]
        max_runs: usize,
        #[serde(default)]
        seed: Option<u64>,
        #[serde(default = "default_control_detector")]
        detector: DetectorConfig,
    },
    Mutation {
        split: TrainingSplit,
        /// Relative size of the synthetic regression
        delta: f64,
        #[serde(default = "default_epochs")]
        epochs: usize,
        #[serde(default = "default_control_detector")]
        detector: DetectorConfig,
    },
}

impl ControlConfig {
    /// Construct the configured policy; invalid parameters fail here
    pub fn build(&self, cache_root: &Path) -> Result<Box<dyn ControlPolicy>> {
        Ok(match self {
            ControlConfig::Constant => Box::new(ConstantControl),
            ControlConfig::Random {
                min_runs,
                max_runs,
                seed,
                detector,
            } => Box::new(RandomControl::new(*min_runs, *max_runs, *seed, detector.clone())?),
            ControlConfig::Mutation {
                split,
                delta,
                epochs,
                detector,
            } => {
                let trainer = MutationTrainer::new(*delta, *epochs, CONTROL_RUN_COUNTS.to_vec(), detector.clone())?;
                Box::new(MutationControl::new(*split, trainer, ThresholdStore::new(cache_root)))
            }
        })
    }
}

impl FromStr for ControlConfig {
    type Err = PhoenixError;

    /// Short CLI names: `constant`, `random`, `mutation,<method>,<value>,<delta>`
    fn from_str(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(',').map(str::trim).collect();
        match parts.as_slice() {
            ["constant"] => Ok(ControlConfig::Constant),
            ["random"] => Ok(ControlConfig::Random {
                min_runs: default_min_runs(),
                max_runs: default_max_runs(),
                seed: None,
                detector: default_control_detector(),
            }),
            ["mutation", method, value, delta] => Ok(ControlConfig::Mutation {
                split: format!("{},{}", method, value).parse()?,
                delta: delta
                    .parse()
                    .map_err(|_| PhoenixError::config(format!("'{}' is not a delta", delta)))?,
                epochs: default_epochs(),
                detector: default_control_detector(),
            }),
            _ => Err(PhoenixError::config(format!(
                "unknown control policy '{}', choose from constant, random, mutation,<method>,<value>,<delta>",
                text
            ))),
        }
    }
}

#[cfg(test)]
mod tests;
