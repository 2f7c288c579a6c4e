//! Samples: the runs of one benchmark on one platform installation
//!
//! The engine never reads measurement files itself. A [`Sample`] holds runs
//! that were already extracted (one numeric column per run) together with
//! the identity needed to key comparisons and caches.

use crate::error::{PhoenixError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// One benchmark execution: iteration measurements in order
pub type Run = Vec<f64>;

/// Identifying tuple shared by every run of a sample
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleIdentity {
    pub machine_type: u64,
    pub configuration: u64,
    pub benchmark_workload: u64,
    pub platform_installation: u64,
}

impl SampleIdentity {
    /// `machine-configuration-benchmark-platform`
    pub fn meta_key(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.machine_type, self.configuration, self.benchmark_workload, self.platform_installation
        )
    }

    /// `machine-configuration-benchmark`: the benchmark configuration shared
    /// by every version that is compared against each other
    pub fn group_key(&self) -> String {
        format!(
            "{}-{}-{}",
            self.machine_type, self.configuration, self.benchmark_workload
        )
    }

    /// Same benchmark configuration, any platform installation
    pub fn is_sibling(&self, other: &SampleIdentity) -> bool {
        self.machine_type == other.machine_type
            && self.configuration == other.configuration
            && self.benchmark_workload == other.benchmark_workload
    }
}

impl fmt::Display for SampleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.meta_key())
    }
}

/// Version of the system under test a sample was measured on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub id: String,
    pub datetime: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl VersionInfo {
    pub fn date(&self) -> NaiveDate {
        self.datetime.date()
    }
}

/// Runs of one (machine, configuration, benchmark, platform installation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub identity: SampleIdentity,
    pub version: VersionInfo,
    pub runs: Vec<Run>,
}

impl Sample {
    pub fn new(identity: SampleIdentity, version: VersionInfo, runs: Vec<Run>) -> Self {
        Self {
            identity,
            version,
            runs,
        }
    }

    /// Load a sample document (JSON)
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    pub fn meta_key(&self) -> String {
        self.identity.meta_key()
    }

    pub fn group_key(&self) -> String {
        self.identity.group_key()
    }

    pub fn is_sibling(&self, other: &Sample) -> bool {
        self.identity.is_sibling(&other.identity)
    }

    /// Strictly older version than `other`
    pub fn is_older(&self, other: &Sample) -> bool {
        self.version.datetime < other.version.datetime
    }

    /// Runs that can enter a comparison
    ///
    /// Empty runs and runs with non-finite values are dropped and logged.
    pub fn valid_runs(&self) -> Vec<Run> {
        validate_runs(&self.runs)
    }

    /// Precondition check for comparing `self` (old) against `new`
    pub fn check_comparable(&self, new: &Sample) -> Result<()> {
        if !self.is_sibling(new) {
            return Err(PhoenixError::IncompatibleSamples(format!(
                "different configuration: {} vs {}",
                self.group_key(),
                new.group_key()
            )));
        }
        if !self.is_older(new) {
            return Err(PhoenixError::IncompatibleSamples(format!(
                "old sample {} ({}) is not older than new sample {} ({})",
                self.meta_key(),
                self.version.datetime,
                new.meta_key(),
                new.version.datetime
            )));
        }
        Ok(())
    }
}

/// Keep the usable runs of a sample, logging every dropped one
pub fn validate_runs(runs: &[Run]) -> Vec<Run> {
    runs.iter()
        .enumerate()
        .filter_map(|(index, run)| match check_run(index, run) {
            Ok(()) => Some(run.clone()),
            Err(e) => {
                tracing::warn!("excluding run: {}", e);
                None
            }
        })
        .collect()
}

fn check_run(index: usize, run: &[f64]) -> Result<()> {
    if run.is_empty() {
        return Err(PhoenixError::MissingData {
            run: index,
            reason: "no rows".to_string(),
        });
    }
    if let Some(bad) = run.iter().find(|v| !v.is_finite()) {
        return Err(PhoenixError::MissingData {
            run: index,
            reason: format!("non-finite value {}", bad),
        });
    }
    Ok(())
}

/// Stable key of a comparison: `"<old meta>:<new meta>:<column>"`
pub fn comparison_key(old: &SampleIdentity, new: &SampleIdentity, column: &str) -> String {
    format!("{}:{}:{}", old.meta_key(), new.meta_key(), column)
}

/// Chronologically ordered pair of samples of one benchmark configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplePair {
    pub old: Sample,
    pub new: Sample,
}

impl SamplePair {
    pub fn key(&self, column: &str) -> String {
        comparison_key(&self.old.identity, &self.new.identity, column)
    }
}
