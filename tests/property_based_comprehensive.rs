//! Comprehensive property-based tests for the detection engine
//!
//! Properties checked with proptest:
//! 1. Dampening preserves length, never widens the range, and repeated
//!    passes settle on a fixed point
//! 2. Likelihood estimates stay within [0, 1]
//! 3. The minimum-run guard never yields a fabricated p-value
//! 4. Swapping old and new flips the sign of the effect size
//! 5. Run-size policies never ask for more runs than available

use phoenix::detection::{
    dampen_extremes, estimate_likelihood, hierarchical_bootstrap_mean, neg_log10_p,
    ChangePointDetector, DetectorConfig, ResampleLevel, Verdict, DEFAULT_MEMORY_LIMIT,
    MAX_NEG_LOG_P,
};
use phoenix::dimension::{CurveFitDimension, DimensionPolicy, FixedDimension, MaxDimension, MinDimension, RunLimit};
use phoenix::run_size::RunSizeSpec;
use phoenix::sample::{Sample, SampleIdentity, VersionInfo};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

fn runs_strategy(min_runs: usize, max_runs: usize) -> impl Strategy<Value = Vec<Vec<f64>>> {
    prop::collection::vec(prop::collection::vec(50.0f64..150.0, 1..20), min_runs..max_runs)
}

fn sample(platform_installation: u64, day: u32, runs: Vec<Vec<f64>>) -> Sample {
    let identity = SampleIdentity {
        machine_type: 2,
        configuration: 9,
        benchmark_workload: 31,
        platform_installation,
    };
    let version = VersionInfo {
        id: format!("v{}", platform_installation),
        datetime: chrono::NaiveDate::from_ymd_opt(2022, 6, day)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap(),
        commit: None,
    };
    Sample::new(identity, version, runs)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_dampen_preserves_length(
        mut values in prop::collection::vec(-1e6f64..1e6, 0..300),
        trim_share in 0.01f64..0.5,
        trim_limit in 0.01f64..0.99,
    ) {
        let len = values.len();
        dampen_extremes(&mut values, trim_share, trim_limit).unwrap();
        prop_assert_eq!(values.len(), len);
    }

    #[test]
    fn prop_dampen_keeps_values_within_original_range(
        values in prop::collection::vec(-1e3f64..1e3, 1..200),
    ) {
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut dampened = values.clone();
        dampen_extremes(&mut dampened, 0.05, 0.1).unwrap();
        prop_assert!(dampened.iter().all(|v| *v >= lo && *v <= hi));
    }

    #[test]
    fn prop_repeated_dampening_reaches_fixed_point(
        values in prop::collection::vec(-1e4f64..1e4, 0..120),
        trim_share in 0.01f64..0.99,
        trim_limit in 0.01f64..0.99,
    ) {
        // Every pass that changes the array merges at least one distinct
        // value into its neighbour, so `len` passes are always enough.
        let mut current = values.clone();
        let mut settled = false;
        for _ in 0..=values.len() {
            let mut next = current.clone();
            dampen_extremes(&mut next, trim_share, trim_limit).unwrap();
            let lo = |v: &[f64]| v.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = |v: &[f64]| v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(lo(&next) >= lo(&current) && hi(&next) <= hi(&current));

            if next == current {
                settled = true;
                break;
            }
            current = next;
        }
        prop_assert!(settled);

        let mut again = current.clone();
        let report = dampen_extremes(&mut again, trim_share, trim_limit).unwrap();
        prop_assert_eq!(report.replaced(), 0);
        prop_assert_eq!(again, current);
    }

    #[test]
    fn prop_likelihood_bounds(
        distribution in prop::collection::vec(-100.0f64..100.0, 1..500),
        point in -200.0f64..200.0,
    ) {
        let p = estimate_likelihood(&distribution, point).unwrap();
        prop_assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn prop_neg_log_is_capped(p in 0.0f64..=1.0) {
        let v = neg_log10_p(p);
        prop_assert!((0.0..=MAX_NEG_LOG_P).contains(&v));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(30))]

    #[test]
    fn prop_short_samples_are_never_compared(
        old in runs_strategy(1, 10),
        new in runs_strategy(1, 10),
    ) {
        let detector = ChangePointDetector::new(DetectorConfig::default().with_boots(50).with_seed(1)).unwrap();
        let verdict = detector.compute_difference(&old, &new, &RunSizeSpec::all());
        let is_not_compared = matches!(verdict, Verdict::NotCompared { .. });
        prop_assert!(is_not_compared);
    }

    #[test]
    fn prop_swap_flips_effect_sign(
        old in runs_strategy(10, 16),
        new in runs_strategy(10, 16),
    ) {
        let detector = ChangePointDetector::new(DetectorConfig::default().with_boots(100).with_seed(2)).unwrap();
        let forward = detector.compute_difference(&old, &new, &RunSizeSpec::all()).into_comparison().unwrap();
        let backward = detector.compute_difference(&new, &old, &RunSizeSpec::all()).into_comparison().unwrap();

        prop_assert!((0.0..=1.0).contains(&forward.p_value));
        if forward.effect_size.abs() > 1e-9 {
            prop_assert!(forward.effect_size.signum() != backward.effect_size.signum());
            // (1 + e) (1 + e') == 1 for relative changes
            let product = (1.0 + forward.effect_size) * (1.0 + backward.effect_size);
            prop_assert!((product - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn prop_bootstrap_means_stay_within_run_means(
        runs in runs_strategy(1, 20),
        count in 1usize..30,
        seed in any::<u64>(),
    ) {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let means: Vec<f64> = runs.iter().map(|r| r.iter().sum::<f64>() / r.len() as f64).collect();
        let lo = means.iter().copied().fold(f64::INFINITY, f64::min) - 1e-9;
        let hi = means.iter().copied().fold(f64::NEG_INFINITY, f64::max) + 1e-9;

        let replicates = hierarchical_bootstrap_mean(&runs, count, 64, ResampleLevel::Runs, DEFAULT_MEMORY_LIMIT, &mut rng);
        prop_assert_eq!(replicates.len(), 64);
        prop_assert!(replicates.iter().all(|m| *m >= lo && *m <= hi));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    #[test]
    fn prop_run_size_policies_stay_within_available_runs(
        old_runs in runs_strategy(0, 40),
        new_runs in runs_strategy(0, 40),
        fixed_old in 1usize..60,
        fixed_new in 1usize..60,
        cap in 1usize..60,
        min_run in 1usize..30,
        extra_range in 0usize..60,
        seed in any::<u64>(),
    ) {
        let old = sample(1, 1, old_runs);
        let new = sample(2, 2, new_runs);
        let limit = RunLimit { min_run, max_run: min_run + extra_range };

        let mut policies: Vec<Box<dyn DimensionPolicy>> = vec![
            Box::new(MaxDimension),
            Box::new(FixedDimension::new(fixed_old, fixed_new).unwrap()),
            Box::new(MinDimension::new(cap).unwrap()),
            Box::new(CurveFitDimension::new(limit, 0.01, 0.01, Some(seed)).unwrap()),
        ];
        for policy in policies.iter_mut() {
            let spec = policy.calculate_dimension(&old, &new).unwrap();
            prop_assert!(spec.old_run_count <= old.run_count(), "{}: {:?}", policy.name(), spec);
            prop_assert!(spec.new_run_count <= new.run_count(), "{}: {:?}", policy.name(), spec);
        }
    }
}
