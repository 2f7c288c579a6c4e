use super::{label, ControlDecision, ControlDecisions, ControlPolicy};
use crate::detection::{ChangePointDetector, Comparison};
use crate::error::Result;
use crate::run_size::RunSizeSpec;
use crate::sample::{Sample, SamplePair};
use crate::training::{draw_runs, MutationTrainer, ThresholdStore, TrainingSplit, CONTROL_RUN_COUNTS};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;
use std::collections::BTreeMap;

/// Range of thresholds learned for one run count
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdBounds {
    pub min: f64,
    pub max: f64,
}

impl ThresholdBounds {
    fn widen(&mut self, threshold: f64) {
        self.min = self.min.min(threshold);
        self.max = self.max.max(threshold);
    }
}

/// Adaptive stopping calibrated by mutation training
///
/// Pairs inside the training split train their samples and report nothing.
/// Testing pairs are compared at 10, 15, 20, 25 and 30 runs; the first
/// p-value above the largest threshold learned for that run count ends the
/// pair with "no regression". A pair that never stops reports the comparison
/// at the largest tried count.
pub struct MutationControl {
    split: TrainingSplit,
    trainer: MutationTrainer,
    store: ThresholdStore,
    detector: ChangePointDetector,
    rng: Xoshiro256PlusPlus,
    bounds: BTreeMap<String, BTreeMap<usize, ThresholdBounds>>,
}

impl MutationControl {
    pub fn new(split: TrainingSplit, trainer: MutationTrainer, store: ThresholdStore) -> Self {
        let detector = trainer.detector().clone();
        let rng = match detector.config().seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Self {
            split,
            trainer,
            store,
            detector,
            rng,
            bounds: BTreeMap::new(),
        }
    }

    /// Thresholds accumulated so far for a benchmark configuration
    pub fn bounds(&self, group_key: &str) -> Option<&BTreeMap<usize, ThresholdBounds>> {
        self.bounds.get(group_key)
    }

    fn train(&mut self, group_key: &str, sample: &Sample) -> Result<()> {
        let file = self.trainer.train_cached(&self.store, sample)?;
        let bounds = self.bounds.entry(group_key.to_string()).or_default();
        for (&runs, &threshold) in &file.thresholds {
            bounds
                .entry(runs)
                .and_modify(|b| b.widen(threshold))
                .or_insert(ThresholdBounds {
                    min: threshold,
                    max: threshold,
                });
        }
        Ok(())
    }

    fn test(&mut self, group_key: &str, pair: &SamplePair, column: &str) -> ControlDecision {
        let Some(bounds) = self.bounds.get(group_key) else {
            tracing::warn!(group_key, "no training happened for this configuration");
            return ControlDecision::not_computed();
        };

        let old = pair.old.valid_runs();
        let new = pair.new.valid_runs();
        if old.is_empty() || new.is_empty() {
            return ControlDecision::not_computed();
        }

        let mut last: Option<(Comparison, usize)> = None;
        for runs in CONTROL_RUN_COUNTS {
            let Some(threshold) = bounds.get(&runs) else {
                continue;
            };

            let old_draw = draw_runs(&old, runs, &mut self.rng);
            let new_draw = draw_runs(&new, runs, &mut self.rng);
            let Some(mut comparison) = self
                .detector
                .compute_difference(&old_draw, &new_draw, &RunSizeSpec::all())
                .into_comparison()
            else {
                continue;
            };

            if comparison.p_value > threshold.max {
                tracing::debug!(
                    runs,
                    p_value = comparison.p_value,
                    max_threshold = threshold.max,
                    "stopped early, no regression"
                );
                comparison.regression = false;
                return ControlDecision::compared(label(comparison, pair, column), runs);
            }
            last = Some((comparison, runs));
        }

        match last {
            Some((comparison, runs)) => ControlDecision::compared(label(comparison, pair, column), runs),
            None => ControlDecision::not_computed(),
        }
    }
}

impl ControlPolicy for MutationControl {
    fn name(&self) -> &'static str {
        "mutation"
    }

    fn control(&mut self, group_key: &str, pairs: &[SamplePair], column: &str) -> Result<ControlDecisions> {
        let mut decisions = ControlDecisions::new();
        let Some(first) = pairs.first() else {
            tracing::warn!(group_key, "empty sample pairs");
            return Ok(decisions);
        };
        let first_date = first.old.version.date();

        for (index, pair) in pairs.iter().enumerate() {
            let decision = if self.split.is_training(pair.old.version.date(), first_date, index) {
                self.train(group_key, &pair.old)?;
                if self.split.is_training(pair.new.version.date(), first_date, index + 1) {
                    self.train(group_key, &pair.new)?;
                }
                ControlDecision::training()
            } else {
                self.test(group_key, pair, column)
            };
            decisions.insert(pair.key(column), decision);
        }

        tracing::info!(
            group_key,
            pairs = pairs.len(),
            training = decisions.values().filter(|d| d.training).count(),
            "control finished"
        );
        Ok(decisions)
    }
}
