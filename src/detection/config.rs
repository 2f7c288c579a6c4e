// Configuration for bootstrap change-point detection
//
// Every knob of the engine lives here and is passed explicitly into the
// detector. There is no process-wide state.

use crate::detection::dampen::validate_trim;
use crate::error::{PhoenixError, Result};
use serde::{Deserialize, Serialize};

/// Minimum number of runs on at least one side before resampling is attempted
pub const MIN_RUN_COUNT: usize = 10;

/// Default number of bootstrap replicates per comparison
pub const DEFAULT_BOOTS: usize = 33_333;

/// Default resampling budget in bytes (1 GB, as in the production deployment)
pub const DEFAULT_MEMORY_LIMIT: usize = 1_000_000_000;

/// How deep the bootstrap resamples the nested run/iteration structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResampleLevel {
    /// Resample runs with replacement and average their (fixed) means
    #[default]
    Runs,
    /// Also resample the iterations inside every drawn run
    RunsAndIterations,
}

/// Configuration for the change-point detector
///
/// # Example
/// ```
/// use phoenix::detection::DetectorConfig;
///
/// let config = DetectorConfig::default();
/// assert_eq!(config.p_value_threshold, 0.01);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Number of bootstrap replicates
    pub boots: usize,

    /// Significance level: `regression = p_value < p_value_threshold`
    pub p_value_threshold: f64,

    /// Share of each run treated as candidate extremes by the dampener, in (0, 1)
    pub trim_share: f64,

    /// Multiplier of the surviving range that defines the normal envelope, in (0, 1)
    pub trim_limit: f64,

    /// Upper bound in bytes for one resampling buffer
    pub bootstrap_memory_limit: usize,

    /// Runs required on at least one side before resampling
    pub min_run_count: usize,

    /// Resampling depth
    pub resample_level: ResampleLevel,

    /// Fixed RNG seed; `None` draws a fresh seed per comparison
    pub seed: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            boots: DEFAULT_BOOTS,
            p_value_threshold: 0.01,
            trim_share: 0.05,
            trim_limit: 0.1,
            bootstrap_memory_limit: DEFAULT_MEMORY_LIMIT,
            min_run_count: MIN_RUN_COUNT,
            resample_level: ResampleLevel::Runs,
            seed: None,
        }
    }
}

impl DetectorConfig {
    /// Stricter significance and more replicates, for ground-truth computation
    pub fn strict() -> Self {
        Self {
            boots: 333_333,
            p_value_threshold: 0.001,
            ..Self::default()
        }
    }

    /// Cheap configuration used when many comparisons are made per sample
    /// (training, adaptive stopping)
    pub fn permissive() -> Self {
        Self {
            boots: 3_333,
            p_value_threshold: 0.05,
            min_run_count: 5,
            ..Self::default()
        }
    }

    /// Builder-style seed override
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder-style replicate count override
    pub fn with_boots(mut self, boots: usize) -> Self {
        self.boots = boots;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_trim(self.trim_share, self.trim_limit)?;

        if !(self.p_value_threshold > 0.0 && self.p_value_threshold <= 1.0) {
            return Err(PhoenixError::config(format!(
                "p_value_threshold must be in (0, 1], got {}",
                self.p_value_threshold
            )));
        }

        if self.boots == 0 {
            return Err(PhoenixError::config("boots must be positive"));
        }

        if self.bootstrap_memory_limit < std::mem::size_of::<f64>() {
            return Err(PhoenixError::config(format!(
                "bootstrap_memory_limit must hold at least one value, got {} bytes",
                self.bootstrap_memory_limit
            )));
        }

        if self.min_run_count == 0 {
            return Err(PhoenixError::config("min_run_count must be positive"));
        }

        Ok(())
    }
}
