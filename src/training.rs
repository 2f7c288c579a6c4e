//! Mutation training: calibrate p-value thresholds on synthetic regressions
//!
//! A sample is copied and every iteration shifted by `delta` times the
//! sample's mean of run means. Comparing random subsets of the original
//! against the mutated copy at several run counts shows which p-values a
//! true regression of that size produces. Results are cached per sample in
//! JSON threshold files so training happens once per sample and epoch count.

use crate::detection::{mean_of_means, ChangePointDetector, DetectorConfig};
use crate::error::{PhoenixError, Result};
use crate::persist::{read_json, write_json_atomic};
use crate::run_size::RunSizeSpec;
use crate::sample::{Run, Sample, SampleIdentity};
use chrono::NaiveDate;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Date format used in threshold files and `by-date` splits
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Run counts tried by adaptive stopping
pub const CONTROL_RUN_COUNTS: [usize; 5] = [10, 15, 20, 25, 30];

/// Which sample pairs of a chronological series are used for training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingSplit {
    /// Versions less than `n` days after the first old version
    ByDays(i64),
    /// The first `n` pairs
    ByCount(usize),
    /// Versions dated strictly before the given day
    ByDate(NaiveDate),
}

impl TrainingSplit {
    /// Whether the sample dated `date`, at position `index` of the series,
    /// belongs to the training set
    pub fn is_training(&self, date: NaiveDate, first_date: NaiveDate, index: usize) -> bool {
        match self {
            TrainingSplit::ByDays(days) => (date - first_date).num_days() < *days,
            TrainingSplit::ByCount(count) => index < *count,
            TrainingSplit::ByDate(limit) => date < *limit,
        }
    }
}

impl FromStr for TrainingSplit {
    type Err = PhoenixError;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = |reason: String| PhoenixError::InvalidTrainingSplit {
            text: text.to_string(),
            reason,
        };

        let (method, value) = text
            .split_once(',')
            .ok_or_else(|| invalid("expected <method>,<value>".to_string()))?;

        match method {
            "by-date" => NaiveDate::parse_from_str(value, DATE_FORMAT)
                .map(TrainingSplit::ByDate)
                .map_err(|e| invalid(format!("date must be dd-mm-yyyy: {}", e))),
            "by-days" | "by-count" | "by-commits" => {
                let n: i64 = value
                    .parse()
                    .map_err(|_| invalid(format!("'{}' is not an integer", value)))?;
                if n <= 0 {
                    return Err(invalid(format!("value must be positive, got {}", n)));
                }
                Ok(if method == "by-days" {
                    TrainingSplit::ByDays(n)
                } else {
                    TrainingSplit::ByCount(n as usize)
                })
            }
            other => Err(invalid(format!(
                "unknown method '{}', choose from by-days, by-count, by-date",
                other
            ))),
        }
    }
}

impl fmt::Display for TrainingSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainingSplit::ByDays(n) => write!(f, "by-days,{}", n),
            TrainingSplit::ByCount(n) => write!(f, "by-count,{}", n),
            TrainingSplit::ByDate(d) => write!(f, "by-date,{}", d.format(DATE_FORMAT)),
        }
    }
}

impl Serialize for TrainingSplit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TrainingSplit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Contents of one threshold file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdFile {
    /// Mean p-value per run count
    pub thresholds: BTreeMap<usize, f64>,
    /// Version date of the trained sample, `dd-mm-yyyy`
    pub date: String,
    /// Every p-value collected per run count
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub samples: BTreeMap<usize, Vec<f64>>,
}

/// On-disk cache of threshold files
///
/// Layout: `<root>/mutations/<machine>/<configuration>/<benchmark>/<platform>-thresholds-<epochs>-epochs.json`
#[derive(Debug, Clone)]
pub struct ThresholdStore {
    root: PathBuf,
}

impl ThresholdStore {
    pub fn new<P: Into<PathBuf>>(cache_root: P) -> Self {
        Self {
            root: cache_root.into(),
        }
    }

    pub fn path(&self, identity: &SampleIdentity, epochs: usize) -> PathBuf {
        self.root
            .join("mutations")
            .join(identity.machine_type.to_string())
            .join(identity.configuration.to_string())
            .join(identity.benchmark_workload.to_string())
            .join(format!(
                "{}-thresholds-{}-epochs.json",
                identity.platform_installation, epochs
            ))
    }

    /// Read a cached file; `Ok(None)` when it does not exist yet
    pub fn load(&self, identity: &SampleIdentity, epochs: usize) -> Result<Option<ThresholdFile>> {
        read_json(&self.path(identity, epochs))
    }

    /// Write a file atomically
    pub fn save(&self, identity: &SampleIdentity, epochs: usize, file: &ThresholdFile) -> Result<PathBuf> {
        let path = self.path(identity, epochs);
        write_json_atomic(&path, file)?;
        Ok(path)
    }
}

/// Learns thresholds from synthetic regressions of a given relative size
#[derive(Debug, Clone)]
pub struct MutationTrainer {
    delta: f64,
    epochs: usize,
    run_counts: Vec<usize>,
    detector: ChangePointDetector,
}

impl MutationTrainer {
    pub fn new(delta: f64, epochs: usize, run_counts: Vec<usize>, config: DetectorConfig) -> Result<Self> {
        if !delta.is_finite() || delta == 0.0 {
            return Err(PhoenixError::config(format!(
                "mutation delta must be finite and non-zero, got {}",
                delta
            )));
        }
        if epochs == 0 {
            return Err(PhoenixError::config("training epochs must be positive"));
        }
        if run_counts.is_empty() || run_counts.contains(&0) {
            return Err(PhoenixError::config(
                "training run counts must be a non-empty list of positive counts",
            ));
        }
        Ok(Self {
            delta,
            epochs,
            run_counts,
            detector: ChangePointDetector::new(config)?,
        })
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn run_counts(&self) -> &[usize] {
        &self.run_counts
    }

    pub fn detector(&self) -> &ChangePointDetector {
        &self.detector
    }

    /// Copy of `runs` shifted by `delta` times their mean of means
    pub fn mutate(&self, runs: &[Run]) -> Vec<Run> {
        let shift = self.delta * mean_of_means(runs);
        runs.iter()
            .map(|run| run.iter().map(|v| v + shift).collect())
            .collect()
    }

    /// Train on one sample, without touching the cache
    pub fn train(&self, sample: &Sample) -> ThresholdFile {
        let original = sample.valid_runs();
        let date = sample.version.date().format(DATE_FORMAT).to_string();

        if original.is_empty() {
            tracing::warn!(sample = %sample.identity, "no valid runs to train on");
            return ThresholdFile {
                thresholds: BTreeMap::new(),
                date,
                samples: BTreeMap::new(),
            };
        }

        let mutated = self.mutate(&original);
        let mut rng = match self.detector.config().seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed ^ sample.identity.platform_installation),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut thresholds = BTreeMap::new();
        let mut samples = BTreeMap::new();

        for &runs in &self.run_counts {
            let mut p_values = Vec::with_capacity(self.epochs);
            for _ in 0..self.epochs {
                let old = draw_runs(&original, runs, &mut rng);
                let new = draw_runs(&mutated, runs, &mut rng);
                if let Some(comparison) = self
                    .detector
                    .compute_difference(&old, &new, &RunSizeSpec::all())
                    .into_comparison()
                {
                    p_values.push(comparison.p_value);
                }
            }

            if p_values.is_empty() {
                tracing::debug!(runs, "no comparable draws, run count skipped");
                continue;
            }
            let threshold = p_values.iter().sum::<f64>() / p_values.len() as f64;
            thresholds.insert(runs, threshold);
            samples.insert(runs, p_values);
        }

        tracing::info!(
            sample = %sample.identity,
            delta = self.delta,
            epochs = self.epochs,
            trained = thresholds.len(),
            "mutation training finished"
        );

        ThresholdFile {
            thresholds,
            date,
            samples,
        }
    }

    /// Train on one sample, reusing and filling the threshold cache
    ///
    /// A training that produced no threshold is returned but not written, so
    /// the sample is trained again once it has comparable runs.
    pub fn train_cached(&self, store: &ThresholdStore, sample: &Sample) -> Result<ThresholdFile> {
        if let Some(file) = store.load(&sample.identity, self.epochs)? {
            tracing::debug!(sample = %sample.identity, "threshold cache hit");
            return Ok(file);
        }
        let file = self.train(sample);
        if file.thresholds.is_empty() {
            tracing::debug!(sample = %sample.identity, "no thresholds learned, cache left empty");
            return Ok(file);
        }
        let path = store.save(&sample.identity, self.epochs, &file)?;
        tracing::debug!(path = %path.display(), "threshold file written");
        Ok(file)
    }
}

/// `count` runs drawn with replacement
pub(crate) fn draw_runs<R: Rng + ?Sized>(runs: &[Run], count: usize, rng: &mut R) -> Vec<Run> {
    (0..count)
        .map(|_| runs[rng.gen_range(0..runs.len())].clone())
        .collect()
}
