use super::{DimensionPolicy, RunLimit};
use crate::detection::run_means;
use crate::error::Result;
use crate::estimates::guess_needed_runs;
use crate::run_size::RunSizeSpec;
use crate::sample::Sample;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Run count extrapolated from the old sample's sensitivity curve
#[derive(Debug)]
pub struct CurveFitDimension {
    limit: RunLimit,
    alpha: f64,
    sensitivity: f64,
    rng: Xoshiro256PlusPlus,
}

impl CurveFitDimension {
    pub fn new(limit: RunLimit, alpha: f64, sensitivity: f64, seed: Option<u64>) -> Result<Self> {
        limit.validate()?;
        crate::estimates::EstimateConfig {
            alpha,
            sensitivity,
            ..Default::default()
        }
        .validate()?;
        let rng = match seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };
        Ok(Self {
            limit,
            alpha,
            sensitivity,
            rng,
        })
    }
}

impl DimensionPolicy for CurveFitDimension {
    fn name(&self) -> &'static str {
        "curve-fit"
    }

    fn calculate_dimension(&mut self, old: &Sample, new: &Sample) -> Result<RunSizeSpec> {
        let history = run_means(&old.valid_runs());
        let extra = guess_needed_runs(
            &history,
            history.len(),
            self.alpha,
            self.sensitivity,
            &mut self.rng,
        );
        let runs = self.limit.clamp(history.len() + extra);
        tracing::debug!(history = history.len(), extra, runs, "curve fit run estimate");

        Ok(RunSizeSpec::new(
            runs.min(old.run_count()),
            runs.min(new.run_count()),
        ))
    }
}
