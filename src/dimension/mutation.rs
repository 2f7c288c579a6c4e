use super::DimensionPolicy;
use crate::error::Result;
use crate::run_size::{RunSizeSpec, ThresholdSummary};
use crate::sample::Sample;
use crate::training::{MutationTrainer, ThresholdFile, ThresholdStore};
use chrono::{Duration, NaiveDateTime};
use std::collections::BTreeMap;

/// Run counts the dimension policy calibrates
pub const DIMENSION_RUN_COUNTS: [usize; 6] = [5, 10, 15, 20, 25, 30];

/// Training window opened by the first sample seen
///
/// A sample is training while it falls within `days` of the first one;
/// afterwards `count` more samples are still accepted.
#[derive(Debug, Clone)]
pub struct TrainingWindow {
    days: i64,
    remaining: usize,
    start: Option<NaiveDateTime>,
}

impl TrainingWindow {
    pub fn new(days: i64, count: usize) -> Self {
        Self {
            days,
            remaining: count,
            start: None,
        }
    }

    pub fn is_training(&mut self, at: NaiveDateTime) -> bool {
        let Some(start) = self.start else {
            self.start = Some(at);
            return true;
        };

        let inside = start <= at && at < start + Duration::days(self.days);
        if inside {
            self.remaining = self.remaining.saturating_sub(1);
            return true;
        }
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Learns p-value thresholds during training, reports them afterwards
pub struct MutationDimension {
    trainer: MutationTrainer,
    store: ThresholdStore,
    window: TrainingWindow,
    train_set: Vec<ThresholdFile>,
}

impl MutationDimension {
    pub fn new(trainer: MutationTrainer, store: ThresholdStore, window: TrainingWindow) -> Self {
        Self {
            trainer,
            store,
            window,
            train_set: Vec::new(),
        }
    }

    pub fn trained_samples(&self) -> usize {
        self.train_set.len()
    }

    fn learn(&mut self, sample: &Sample) -> Result<()> {
        let file = self.trainer.train_cached(&self.store, sample)?;
        self.train_set.push(file);
        Ok(())
    }

    fn gather_thresholds(&self) -> BTreeMap<usize, ThresholdSummary> {
        if self.train_set.is_empty() {
            tracing::warn!("no training sample was collected");
            return BTreeMap::new();
        }

        self.trainer
            .run_counts()
            .iter()
            .filter_map(|&runs| {
                let p_values: Vec<f64> = self
                    .train_set
                    .iter()
                    .flat_map(|file| match file.samples.get(&runs) {
                        Some(all) => all.clone(),
                        None => file.thresholds.get(&runs).copied().into_iter().collect(),
                    })
                    .collect();
                ThresholdSummary::from_values(&p_values).map(|summary| (runs, summary))
            })
            .collect()
    }
}

impl DimensionPolicy for MutationDimension {
    fn name(&self) -> &'static str {
        "mutation"
    }

    fn calculate_dimension(&mut self, old: &Sample, new: &Sample) -> Result<RunSizeSpec> {
        let mut spec = RunSizeSpec::new(old.run_count(), new.run_count());
        if self.window.is_training(old.version.datetime) {
            self.learn(old)?;
        } else {
            spec.thresholds = Some(self.gather_thresholds());
        }
        Ok(spec)
    }
}
