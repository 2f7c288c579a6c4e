use super::DimensionPolicy;
use crate::error::{PhoenixError, Result};
use crate::run_size::RunSizeSpec;
use crate::sample::Sample;

/// Run cap of the cost-minimal policy
pub const DEFAULT_MIN_CAP: usize = 11;

/// Small constant cap on both sides
#[derive(Debug, Clone, Copy)]
pub struct MinDimension {
    cap: usize,
}

impl MinDimension {
    pub fn new(cap: usize) -> Result<Self> {
        if cap == 0 {
            return Err(PhoenixError::config("min dimension cap must be positive"));
        }
        Ok(Self { cap })
    }
}

impl Default for MinDimension {
    fn default() -> Self {
        Self {
            cap: DEFAULT_MIN_CAP,
        }
    }
}

impl DimensionPolicy for MinDimension {
    fn name(&self) -> &'static str {
        "min"
    }

    fn calculate_dimension(&mut self, old: &Sample, new: &Sample) -> Result<RunSizeSpec> {
        Ok(RunSizeSpec::new(
            self.cap.min(old.run_count()),
            self.cap.min(new.run_count()),
        ))
    }
}
