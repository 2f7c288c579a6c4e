use super::DimensionPolicy;
use crate::error::Result;
use crate::run_size::RunSizeSpec;
use crate::sample::Sample;

/// Every available run on both sides
#[derive(Debug, Clone, Copy, Default)]
pub struct MaxDimension;

impl DimensionPolicy for MaxDimension {
    fn name(&self) -> &'static str {
        "max"
    }

    fn calculate_dimension(&mut self, old: &Sample, new: &Sample) -> Result<RunSizeSpec> {
        Ok(RunSizeSpec::new(old.run_count(), new.run_count()))
    }
}
