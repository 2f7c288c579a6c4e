// Run-size keyed ground truth
//
// One file per (benchmark configuration, old version, new version, column)
// maps a run-size signature ("<old>-<new>-<iterations>") to the Comparison
// computed at that size, or null when it could not be computed. Simulations
// replay the same pairs at many sizes, so every entry is computed once.

use crate::detection::{ChangePointDetector, Comparison};
use crate::error::Result;
use crate::persist::{read_json, write_json_atomic};
use crate::run_size::RunSizeSpec;
use crate::sample::Sample;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Contents of one ground-truth file
pub type GroundTruthEntries = BTreeMap<String, Option<Comparison>>;

/// Cache of detector results keyed by run size
#[derive(Debug, Clone)]
pub struct GroundTruthCache {
    root: PathBuf,
    detector: ChangePointDetector,
}

impl GroundTruthCache {
    pub fn new<P: Into<PathBuf>>(cache_root: P, detector: ChangePointDetector) -> Self {
        Self {
            root: cache_root.into(),
            detector,
        }
    }

    /// `<root>/comparisons/<machine>/<configuration>/<benchmark>/<old version>-<new version>-<column>.json`
    pub fn path(&self, old: &Sample, new: &Sample, column: &str) -> PathBuf {
        let mut dir = self.root.join("comparisons");
        for part in old.group_key().split('-') {
            dir.push(part);
        }
        dir.join(format!("{}-{}-{}.json", old.version.id, new.version.id, column))
    }

    /// Every cached entry for a pair
    pub fn entries(&self, old: &Sample, new: &Sample, column: &str) -> Result<GroundTruthEntries> {
        Ok(read_json(&self.path(old, new, column))?.unwrap_or_default())
    }

    /// Cached comparison at `run_size`, computing and storing it on a miss
    ///
    /// `Ok(None)` means the detector could not compare the pair at this size;
    /// that outcome is cached too.
    pub fn analyze(
        &self,
        old: &Sample,
        new: &Sample,
        column: &str,
        run_size: &RunSizeSpec,
    ) -> Result<Option<Comparison>> {
        let path = self.path(old, new, column);
        let signature = run_size.signature();
        let mut entries: GroundTruthEntries = read_json(&path)?.unwrap_or_default();

        if let Some(entry) = entries.get(&signature) {
            tracing::debug!(%signature, path = %path.display(), "ground truth cache hit");
            return Ok(entry.clone());
        }

        let computed = self
            .detector
            .compare_samples(old, new, column, run_size)
            .into_comparison();
        tracing::debug!(
            %signature,
            computed = computed.is_some(),
            "ground truth cache miss"
        );

        entries.insert(signature, computed.clone());
        write_json_atomic(&path, &entries)?;
        Ok(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::DetectorConfig;
    use crate::sample::fixtures;

    fn cache(root: &std::path::Path) -> GroundTruthCache {
        let detector = ChangePointDetector::new(DetectorConfig::default().with_boots(300).with_seed(5)).unwrap();
        GroundTruthCache::new(root, detector)
    }

    #[test]
    fn test_path_layout() {
        let old = fixtures::sample(1, 1, vec![]);
        let new = fixtures::sample(2, 2, vec![]);
        let c = cache(std::path::Path::new("/cache"));
        assert_eq!(
            c.path(&old, &new, "iteration_time_ns"),
            PathBuf::from("/cache/comparisons/5/43/7/v1-v2-iteration_time_ns.json")
        );
    }

    #[test]
    fn test_analyze_computes_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let c = cache(dir.path());
        let old = fixtures::sample(1, 1, fixtures::runs(12, 10, 100.0));
        let new = fixtures::sample(2, 2, fixtures::runs(12, 10, 100.0));

        let first = c.analyze(&old, &new, "iteration_time_ns", &RunSizeSpec::all()).unwrap();
        assert!(first.is_some());

        // The cached entry is returned even when the data changes
        let changed = fixtures::sample(2, 2, fixtures::runs(12, 10, 500.0));
        let second = c.analyze(&old, &changed, "iteration_time_ns", &RunSizeSpec::all()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_not_compared_is_cached_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let c = cache(dir.path());
        let old = fixtures::sample(1, 1, fixtures::runs(3, 10, 100.0));
        let new = fixtures::sample(2, 2, fixtures::runs(3, 10, 100.0));

        let result = c.analyze(&old, &new, "iteration_time_ns", &RunSizeSpec::new(3, 3)).unwrap();
        assert!(result.is_none());

        let entries = c.entries(&old, &new, "iteration_time_ns").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get("3-3-max"), Some(&None));
    }

    #[test]
    fn test_zero_baseline_entry_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let c = cache(dir.path());
        let old = fixtures::sample(1, 1, fixtures::runs(12, 10, 0.0));
        let new = fixtures::sample(2, 2, fixtures::runs(12, 10, 3.0));

        let first = c.analyze(&old, &new, "gc_count", &RunSizeSpec::all()).unwrap();
        assert!(first.is_none());

        let second = c.analyze(&old, &new, "gc_count", &RunSizeSpec::all()).unwrap();
        assert!(second.is_none());
        let other_size = c.analyze(&old, &new, "gc_count", &RunSizeSpec::new(11, 11)).unwrap();
        assert!(other_size.is_none());
        assert_eq!(c.entries(&old, &new, "gc_count").unwrap().len(), 2);

        let same = fixtures::sample(2, 2, fixtures::runs(12, 10, 0.0));
        let zero = c.analyze(&old, &same, "allocations", &RunSizeSpec::all()).unwrap().unwrap();
        assert_eq!(zero.effect_size, 0.0);
        let cached = c.analyze(&old, &same, "allocations", &RunSizeSpec::all()).unwrap();
        assert_eq!(cached, Some(zero));
    }

    #[test]
    fn test_entries_accumulate_per_signature() {
        let dir = tempfile::tempdir().unwrap();
        let c = cache(dir.path());
        let old = fixtures::sample(1, 1, fixtures::runs(15, 10, 100.0));
        let new = fixtures::sample(2, 2, fixtures::runs(15, 10, 101.0));

        c.analyze(&old, &new, "iteration_time_ns", &RunSizeSpec::new(10, 10)).unwrap();
        c.analyze(&old, &new, "iteration_time_ns", &RunSizeSpec::new(15, 15)).unwrap();

        let entries = c.entries(&old, &new, "iteration_time_ns").unwrap();
        assert_eq!(entries.keys().cloned().collect::<Vec<_>>(), vec!["10-10-max", "15-15-max"]);
    }
}
