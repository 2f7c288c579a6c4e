// Control policy tests

use super::*;
use crate::sample::{fixtures, Run, Sample};

const COLUMN: &str = "iteration_time_ns";

fn series(levels: &[f64]) -> Vec<SamplePair> {
    let samples: Vec<Sample> = levels
        .iter()
        .enumerate()
        .map(|(i, &level)| fixtures::sample(100 + i as u64, 1 + i as u32, fixtures::runs(12, 10, level)))
        .collect();
    samples
        .windows(2)
        .map(|w| SamplePair {
            old: w[0].clone(),
            new: w[1].clone(),
        })
        .collect()
}

fn detector() -> DetectorConfig {
    DetectorConfig::default().with_boots(400).with_seed(21)
}

#[test]
fn test_constant_reports_nothing() {
    let pairs = series(&[100.0, 100.0, 100.0]);
    let decisions = ConstantControl.control("5-43-7", &pairs, COLUMN).unwrap();
    assert_eq!(decisions.len(), 2);
    assert!(decisions.contains_key("5-43-7-100:5-43-7-101:iteration_time_ns"));
    assert!(decisions.values().all(|d| d.comparison.is_none() && !d.training));
}

#[test]
fn test_random_draws_within_bounds() {
    let pairs = series(&[100.0, 100.0, 150.0]);
    let mut control = RandomControl::new(10, 14, Some(4), detector()).unwrap();
    let decisions = control.control("5-43-7", &pairs, COLUMN).unwrap();

    for decision in decisions.values() {
        assert!((10..=14).contains(&decision.runs_used));
        assert!(decision.comparison.is_some());
    }
    let shifted = &decisions["5-43-7-101:5-43-7-102:iteration_time_ns"];
    let comparison = shifted.comparison.as_ref().unwrap();
    assert!(comparison.regression);
    assert_eq!(comparison.column.as_deref(), Some(COLUMN));
}

#[test]
fn test_random_rejects_inverted_bounds() {
    assert!(RandomControl::new(20, 10, None, detector()).is_err());
    assert!(RandomControl::new(0, 10, None, detector()).is_err());
}

#[test]
fn test_random_skips_pairs_without_valid_runs() {
    let mut pairs = series(&[100.0, 100.0]);
    pairs[0].new.runs = vec![Run::new(); 3];
    let mut control = RandomControl::new(10, 10, Some(1), detector()).unwrap();
    let decisions = control.control("5-43-7", &pairs, COLUMN).unwrap();
    assert_eq!(decisions.values().next().unwrap(), &ControlDecision::not_computed());
}

fn mutation_control(dir: &std::path::Path, split: &str) -> MutationControl {
    let trainer = MutationTrainer::new(0.2, 3, CONTROL_RUN_COUNTS.to_vec(), detector()).unwrap();
    MutationControl::new(split.parse().unwrap(), trainer, ThresholdStore::new(dir))
}

#[test]
fn test_mutation_trains_then_stops_early() {
    let dir = tempfile::tempdir().unwrap();
    let mut control = mutation_control(dir.path(), "by-count,1");
    let pairs = series(&[100.0, 100.0, 100.0]);

    let decisions = control.control("5-43-7", &pairs, COLUMN).unwrap();
    let training = &decisions["5-43-7-100:5-43-7-101:iteration_time_ns"];
    assert!(training.training);
    assert!(training.comparison.is_none());

    let bounds = control.bounds("5-43-7").unwrap();
    assert_eq!(bounds.len(), CONTROL_RUN_COUNTS.len());
    assert!(bounds.values().all(|b| b.min <= b.max));

    let testing = &decisions["5-43-7-101:5-43-7-102:iteration_time_ns"];
    assert!(!testing.training);
    assert_eq!(testing.runs_used, 10);
    assert!(!testing.comparison.as_ref().unwrap().regression);
}

#[test]
fn test_mutation_regression_uses_every_run_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut control = mutation_control(dir.path(), "by-count,1");
    let pairs = series(&[100.0, 100.0, 200.0]);

    let decisions = control.control("5-43-7", &pairs, COLUMN).unwrap();
    let testing = &decisions["5-43-7-101:5-43-7-102:iteration_time_ns"];
    assert_eq!(testing.runs_used, 30);
    assert!(testing.comparison.as_ref().unwrap().regression);
}

#[test]
fn test_mutation_trains_new_sample_inside_split() {
    let dir = tempfile::tempdir().unwrap();
    let mut control = mutation_control(dir.path(), "by-days,30");
    let pairs = series(&[100.0, 100.0]);

    let decisions = control.control("5-43-7", &pairs, COLUMN).unwrap();
    assert!(decisions.values().all(|d| d.training));

    let store = ThresholdStore::new(dir.path());
    assert!(store.path(&pairs[0].old.identity, 3).exists());
    assert!(store.path(&pairs[0].new.identity, 3).exists());
}

#[test]
fn test_mutation_without_training_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut control = mutation_control(dir.path(), "by-date,01-01-2020");
    let pairs = series(&[100.0, 100.0, 100.0]);

    let decisions = control.control("5-43-7", &pairs, COLUMN).unwrap();
    assert_eq!(decisions.len(), 2);
    assert!(decisions.values().all(|d| *d == ControlDecision::not_computed()));
    assert!(control.bounds("5-43-7").is_none());
}

#[test]
fn test_empty_series() {
    let dir = tempfile::tempdir().unwrap();
    let mut control = mutation_control(dir.path(), "by-count,1");
    assert!(control.control("5-43-7", &[], COLUMN).unwrap().is_empty());
}

#[test]
fn test_parse_control_names() {
    assert_eq!("constant".parse::<ControlConfig>().unwrap(), ControlConfig::Constant);
    assert!(matches!(
        "random".parse::<ControlConfig>().unwrap(),
        ControlConfig::Random { min_runs: 10, max_runs: 30, .. }
    ));
    match "mutation,by-days,14,0.05".parse::<ControlConfig>().unwrap() {
        ControlConfig::Mutation { split, delta, epochs, .. } => {
            assert_eq!(split, TrainingSplit::ByDays(14));
            assert_eq!(delta, 0.05);
            assert_eq!(epochs, 50);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!("mutation,by-week,1,0.05".parse::<ControlConfig>().is_err());
    assert!("peass".parse::<ControlConfig>().is_err());
}

#[test]
fn test_toml_section() {
    let config: ControlConfig = toml::from_str(
        r#"
        kind = "mutation"
        split = "by-count,5"
        delta = 0.1
        epochs = 20
        "#,
    )
    .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let policy = config.build(dir.path()).unwrap();
    assert_eq!(policy.name(), "mutation");
}
