use super::{label, ControlDecision, ControlDecisions, ControlPolicy};
use crate::detection::{ChangePointDetector, DetectorConfig};
use crate::error::{PhoenixError, Result};
use crate::run_size::RunSizeSpec;
use crate::sample::SamplePair;
use crate::training::draw_runs;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Compares every pair on a uniformly drawn number of runs
#[derive(Debug)]
pub struct RandomControl {
    min_runs: usize,
    max_runs: usize,
    detector: ChangePointDetector,
    rng: Xoshiro256PlusPlus,
}

impl RandomControl {
    pub fn new(min_runs: usize, max_runs: usize, seed: Option<u64>, config: DetectorConfig) -> Result<Self> {
        if min_runs == 0 || min_runs > max_runs {
            return Err(PhoenixError::config(format!(
                "random control needs 0 < min_runs <= max_runs, got {}..{}",
                min_runs, max_runs
            )));
        }
        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Ok(Self {
            min_runs,
            max_runs,
            detector: ChangePointDetector::new(config)?,
            rng,
        })
    }
}

impl ControlPolicy for RandomControl {
    fn name(&self) -> &'static str {
        "random"
    }

    fn control(&mut self, group_key: &str, pairs: &[SamplePair], column: &str) -> Result<ControlDecisions> {
        if pairs.is_empty() {
            tracing::warn!(group_key, "empty sample pairs");
        }

        let mut decisions = ControlDecisions::new();
        for pair in pairs {
            let old = pair.old.valid_runs();
            let new = pair.new.valid_runs();
            if old.is_empty() || new.is_empty() {
                decisions.insert(pair.key(column), ControlDecision::not_computed());
                continue;
            }

            let runs = self.rng.gen_range(self.min_runs..=self.max_runs);
            let old_draw = draw_runs(&old, runs, &mut self.rng);
            let new_draw = draw_runs(&new, runs, &mut self.rng);

            let decision = match self
                .detector
                .compute_difference(&old_draw, &new_draw, &RunSizeSpec::all())
                .into_comparison()
            {
                Some(comparison) => ControlDecision::compared(label(comparison, pair, column), runs),
                None => ControlDecision::not_computed(),
            };
            decisions.insert(pair.key(column), decision);
        }
        Ok(decisions)
    }
}
