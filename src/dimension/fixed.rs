use super::DimensionPolicy;
use crate::error::{PhoenixError, Result};
use crate::run_size::RunSizeSpec;
use crate::sample::Sample;

/// Configured run counts, clipped to what each sample has
#[derive(Debug, Clone, Copy)]
pub struct FixedDimension {
    old_count: usize,
    new_count: usize,
}

impl FixedDimension {
    pub fn new(old_count: usize, new_count: usize) -> Result<Self> {
        if old_count == 0 || new_count == 0 {
            return Err(PhoenixError::config(format!(
                "fixed run counts must be positive, got {}/{}",
                old_count, new_count
            )));
        }
        Ok(Self {
            old_count,
            new_count,
        })
    }
}

impl DimensionPolicy for FixedDimension {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn calculate_dimension(&mut self, old: &Sample, new: &Sample) -> Result<RunSizeSpec> {
        Ok(RunSizeSpec::new(
            self.old_count.min(old.run_count()),
            self.new_count.min(new.run_count()),
        ))
    }
}
