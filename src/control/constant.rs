use super::{ControlDecision, ControlDecisions, ControlPolicy};
use crate::error::Result;
use crate::sample::SamplePair;

/// Baseline that never compares anything
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantControl;

impl ControlPolicy for ConstantControl {
    fn name(&self) -> &'static str {
        "constant"
    }

    fn control(&mut self, group_key: &str, pairs: &[SamplePair], column: &str) -> Result<ControlDecisions> {
        if pairs.is_empty() {
            tracing::warn!(group_key, "empty sample pairs");
        }
        Ok(pairs
            .iter()
            .map(|pair| (pair.key(column), ControlDecision::not_computed()))
            .collect())
    }
}
