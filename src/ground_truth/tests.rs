// Fallback chain tests for the comparer

use super::*;
use crate::detection::{ChangePointDetector, Comparison, DetectorConfig, Verdict};
use crate::error::{PhoenixError, Result};
use crate::sample::{fixtures, Sample};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const COLUMN: &str = "iteration_time_ns";

fn detector() -> ChangePointDetector {
    ChangePointDetector::new(DetectorConfig::default().with_boots(500).with_seed(17)).unwrap()
}

fn pair() -> (Sample, Sample) {
    (
        fixtures::sample(100, 1, fixtures::runs(12, 20, 100.0)),
        fixtures::sample(101, 2, fixtures::runs(12, 20, 130.0)),
    )
}

/// Source answering with a fixed result and counting calls
struct FixedSource {
    answer: fn() -> Result<Option<Comparison>>,
    calls: Arc<AtomicUsize>,
}

impl GroundTruthSource for FixedSource {
    fn fetch(&self, _old: &Sample, _new: &Sample, _column: &str) -> Result<Option<Comparison>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)()
    }
}

fn external() -> Result<Option<Comparison>> {
    Ok(Some(Comparison {
        column: None,
        old_run_count: 31,
        new_run_count: 31,
        p_value: 0.5,
        effect_size: 0.0,
        regression: false,
        key: None,
        generated: None,
    }))
}

fn broken() -> Result<Option<Comparison>> {
    Err(PhoenixError::ExternalLookup("HTTP 503".to_string()))
}

fn source(answer: fn() -> Result<Option<Comparison>>) -> (Box<FixedSource>, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Box::new(FixedSource {
            answer,
            calls: calls.clone(),
        }),
        calls,
    )
}

#[test]
fn test_detector_fallback_without_source() {
    let (old, new) = pair();
    let comparer = Comparer::new(COLUMN, detector());
    let (verdict, provenance) = comparer.compare_with_provenance(&old, &new).unwrap();

    assert_eq!(provenance, Provenance::Detector);
    let c = verdict.into_comparison().unwrap();
    assert!(c.regression);
    assert_eq!(c.generated, Some(true));
    assert_eq!(c.key.as_deref(), Some("5-43-7-100:5-43-7-101:iteration_time_ns"));
}

#[test]
fn test_external_answer_wins_and_is_stored() {
    let (old, new) = pair();
    let (src, calls) = source(external);
    let comparer = Comparer::new(COLUMN, detector()).with_source(src);

    let (verdict, provenance) = comparer.compare_with_provenance(&old, &new).unwrap();
    assert_eq!(provenance, Provenance::External);
    let c = verdict.into_comparison().unwrap();
    assert!(!c.regression);
    assert_eq!(c.generated, Some(false));
    assert_eq!(c.column.as_deref(), Some(COLUMN));

    // Second call is served by the store
    let (again, provenance) = comparer.compare_with_provenance(&old, &new).unwrap();
    assert_eq!(provenance, Provenance::Store);
    assert_eq!(again.into_comparison().unwrap().p_value, 0.5);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_external_failure_falls_back_to_detector() {
    let (old, new) = pair();
    let (src, calls) = source(broken);
    let comparer = Comparer::new(COLUMN, detector()).with_source(src);

    let (verdict, provenance) = comparer.compare_with_provenance(&old, &new).unwrap();
    assert_eq!(provenance, Provenance::Detector);
    assert!(verdict.is_regression());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_not_compared_is_not_stored() {
    let old = fixtures::sample(100, 1, fixtures::runs(3, 20, 100.0));
    let new = fixtures::sample(101, 2, fixtures::runs(3, 20, 100.0));
    let store = Arc::new(MemoryComparisonStore::new());
    let comparer = Comparer::new(COLUMN, detector()).with_store(Box::new(store.clone()));

    let verdict = comparer.compare(&old, &new).unwrap();
    assert!(matches!(verdict, Verdict::NotCompared { .. }));
    assert!(store.is_empty());
}

#[test]
fn test_preconditions_are_errors() {
    let (old, new) = pair();
    let comparer = Comparer::new(COLUMN, detector());
    let err = comparer.compare(&new, &old).unwrap_err();
    assert!(matches!(err, PhoenixError::IncompatibleSamples(_)));
}

#[test]
fn test_file_store_survives_new_comparer() {
    let dir = tempfile::tempdir().unwrap();
    let (old, new) = pair();

    let first = Comparer::new(COLUMN, detector())
        .with_store(Box::new(FileComparisonStore::new(dir.path())))
        .compare(&old, &new)
        .unwrap();

    let (second, provenance) = Comparer::new(COLUMN, detector())
        .with_store(Box::new(FileComparisonStore::new(dir.path())))
        .compare_with_provenance(&old, &new)
        .unwrap();

    assert_eq!(provenance, Provenance::Store);
    assert_eq!(first, second);
}

#[test]
fn test_file_store_zero_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let old = fixtures::sample(100, 1, fixtures::runs(12, 20, 0.0));
    let unchanged = fixtures::sample(101, 2, fixtures::runs(12, 20, 0.0));
    let comparer = Comparer::new("gc_count", detector()).with_store(Box::new(FileComparisonStore::new(dir.path())));

    let first = comparer.compare(&old, &unchanged).unwrap();
    assert_eq!(first.comparison().map(|c| c.effect_size), Some(0.0));
    let (second, provenance) = comparer.compare_with_provenance(&old, &unchanged).unwrap();
    assert_eq!(provenance, Provenance::Store);
    assert_eq!(first, second);

    let grown = fixtures::sample(102, 3, fixtures::runs(12, 20, 3.0));
    let (verdict, provenance) = comparer.compare_with_provenance(&old, &grown).unwrap();
    assert!(matches!(verdict, Verdict::NotCompared { .. }));
    assert_eq!(provenance, Provenance::Detector);
}
