// Comparer: store -> external ground truth -> local detector
//
// The first source with an answer wins. Whatever the external source does
// (timeouts, error status, malformed payload) the comparer logs it and moves
// on to the local detector; only precondition violations are returned as
// errors.

use crate::detection::{ChangePointDetector, Verdict};
use crate::error::Result;
use crate::ground_truth::remote::GroundTruthSource;
use crate::ground_truth::store::{ComparisonStore, MemoryComparisonStore};
use crate::run_size::RunSizeSpec;
use crate::sample::{comparison_key, Sample};

/// Where a comparison came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Store,
    External,
    Detector,
}

/// Fallback chain producing one comparison per sample pair and column
pub struct Comparer {
    column: String,
    detector: ChangePointDetector,
    run_size: RunSizeSpec,
    store: Box<dyn ComparisonStore>,
    source: Option<Box<dyn GroundTruthSource>>,
}

impl Comparer {
    /// Comparer backed by an in-memory store and no external source
    pub fn new(column: impl Into<String>, detector: ChangePointDetector) -> Self {
        Self {
            column: column.into(),
            detector,
            run_size: RunSizeSpec::all(),
            store: Box::new(MemoryComparisonStore::new()),
            source: None,
        }
    }

    pub fn with_store(mut self, store: Box<dyn ComparisonStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_source(mut self, source: Box<dyn GroundTruthSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_run_size(mut self, run_size: RunSizeSpec) -> Self {
        self.run_size = run_size;
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    /// Compare `old` against `new`
    ///
    /// # Errors
    /// `IncompatibleSamples` when the samples are not siblings or `old` is
    /// not strictly older than `new`.
    pub fn compare(&self, old: &Sample, new: &Sample) -> Result<Verdict> {
        self.compare_with_provenance(old, new).map(|(verdict, _)| verdict)
    }

    /// Like [`Comparer::compare`], also reporting which source answered
    pub fn compare_with_provenance(&self, old: &Sample, new: &Sample) -> Result<(Verdict, Provenance)> {
        old.check_comparable(new)?;
        let key = comparison_key(&old.identity, &new.identity, &self.column);

        match self.store.get(&key) {
            Ok(Some(stored)) => {
                tracing::debug!(%key, "comparison found in store");
                return Ok((Verdict::Compared(stored), Provenance::Store));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(%key, "comparison store read failed: {}", e),
        }

        if let Some(source) = &self.source {
            match source.fetch(old, new, &self.column) {
                Ok(Some(mut fetched)) => {
                    fetched.key = Some(key.clone());
                    fetched.column = Some(self.column.clone());
                    fetched.generated = Some(false);
                    self.save(&key, &fetched);
                    return Ok((Verdict::Compared(fetched), Provenance::External));
                }
                Ok(None) => tracing::debug!(%key, "no external ground truth"),
                Err(e) => tracing::warn!(%key, "external ground truth unavailable, computing locally: {}", e),
            }
        }

        let verdict = self.detector.compare_samples(old, new, &self.column, &self.run_size);
        if let Verdict::Compared(comparison) = &verdict {
            self.save(&key, comparison);
        }
        Ok((verdict, Provenance::Detector))
    }

    fn save(&self, key: &str, comparison: &crate::detection::Comparison) {
        if let Err(e) = self.store.put(key, comparison) {
            tracing::warn!(%key, "comparison store write failed: {}", e);
        }
    }
}
