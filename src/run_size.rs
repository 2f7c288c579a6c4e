//! Run-size specifications produced by dimension policies
//!
//! A [`RunSizeSpec`] tells the detector how many runs to draw from each side
//! and how many iterations of every run to use. Its signature string
//! (`"<old>-<new>-<iterations>"`) keys cached ground truth.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How many iterations of every run enter the comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterationsCount {
    /// Every iteration
    #[default]
    Max,
    /// The first `n` iterations (whole run when shorter)
    Fixed(usize),
}

impl IterationsCount {
    /// Apply the policy to one run
    pub fn apply<'a>(&self, run: &'a [f64]) -> &'a [f64] {
        match self {
            IterationsCount::Max => run,
            IterationsCount::Fixed(n) => &run[..(*n).min(run.len())],
        }
    }
}

impl fmt::Display for IterationsCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationsCount::Max => write!(f, "max"),
            IterationsCount::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for IterationsCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "max" {
            return Ok(IterationsCount::Max);
        }
        s.parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .map(IterationsCount::Fixed)
            .ok_or_else(|| format!("iterations count must be 'max' or a positive integer, got '{}'", s))
    }
}

impl Serialize for IterationsCount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IterationsCount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Aggregated p-value thresholds learned for one run count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSummary {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub median: f64,
}

impl ThresholdSummary {
    /// Summarise a non-empty list of p-values; `None` when empty
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        Some(Self {
            mean: sorted.iter().sum::<f64>() / n as f64,
            max: sorted[n - 1],
            min: sorted[0],
            median,
        })
    }
}

/// How many runs (and iterations) to use from each sample
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSizeSpec {
    /// Runs drawn from the old sample per replicate (0 = every available run)
    pub old_run_count: usize,
    /// Runs drawn from the new sample per replicate (0 = every available run)
    pub new_run_count: usize,
    #[serde(default)]
    pub iterations_count: IterationsCount,
    /// Learned thresholds per run count, set by mutation-based policies
    /// outside their training window
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<BTreeMap<usize, ThresholdSummary>>,
}

impl RunSizeSpec {
    /// Use every available run and iteration
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(old_run_count: usize, new_run_count: usize) -> Self {
        Self {
            old_run_count,
            new_run_count,
            ..Self::default()
        }
    }

    pub fn with_iterations(mut self, iterations_count: IterationsCount) -> Self {
        self.iterations_count = iterations_count;
        self
    }

    /// Effective old-side count given the number of available runs
    pub fn effective_old(&self, available: usize) -> usize {
        if self.old_run_count > 0 {
            self.old_run_count
        } else {
            available
        }
    }

    /// Effective new-side count given the number of available runs
    pub fn effective_new(&self, available: usize) -> usize {
        if self.new_run_count > 0 {
            self.new_run_count
        } else {
            available
        }
    }

    /// Cache signature `"<old>-<new>-<iterations>"`
    pub fn signature(&self) -> String {
        format!(
            "{}-{}-{}",
            self.old_run_count, self.new_run_count, self.iterations_count
        )
    }
}
