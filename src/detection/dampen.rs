// Extreme value dampening
//
// Replaces the most extreme values of a sample with the nearest surviving
// value instead of dropping them, so the sample keeps its length and the
// resampling step downstream still sees N observations per run.
//
// The distance to the median is measured additively (not as a ratio) so that
// samples straddling zero behave.

use crate::error::{PhoenixError, Result};

/// Outcome of dampening one array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DampenReport {
    /// Values clamped up to the lowest in-envelope tail value
    pub replaced_low: usize,
    /// Values clamped down to the highest in-envelope tail value
    pub replaced_high: usize,
}

impl DampenReport {
    pub fn replaced(&self) -> usize {
        self.replaced_low + self.replaced_high
    }
}

/// Replace extreme values by the nearest remaining element, in place
///
/// The array is sorted as a side effect (the order of iterations inside a run
/// carries no meaning for the bootstrap). Length is always preserved.
///
/// * `trim_share` - share of the values considered as extreme candidates
/// * `trim_limit` - envelope around the surviving range, as a multiple of it
///
/// # Errors
/// `Configuration` when `trim_share` or `trim_limit` is outside (0, 1),
/// `MissingData` when the array contains NaN or infinite values.
///
/// # Example
/// ```
/// use phoenix::detection::dampen_extremes;
///
/// let mut values = vec![10.0, 11.0, 10.5, 10.2, 1000.0, 10.1, 10.3, 10.4, 10.6, 10.7,
///                       10.8, 10.9, 10.0, 10.1, 10.2, 10.3, 10.4, 10.5, 10.6, 10.7];
/// let report = dampen_extremes(&mut values, 0.05, 0.1).unwrap();
/// assert_eq!(values.len(), 20);
/// assert_eq!(report.replaced_high, 1);
/// assert!(values.iter().all(|v| *v <= 11.0));
/// ```
pub fn dampen_extremes(numbers: &mut [f64], trim_share: f64, trim_limit: f64) -> Result<DampenReport> {
    validate_trim(trim_share, trim_limit)?;

    let count = numbers.len();
    let replace = (count as f64 * trim_share).floor() as usize;
    if replace == 0 {
        return Ok(DampenReport::default());
    }

    if let Some(position) = numbers.iter().position(|v| !v.is_finite()) {
        return Err(PhoenixError::MissingData {
            run: position,
            reason: format!("non-finite value {} at iteration {}", numbers[position], position),
        });
    }

    numbers.sort_by(f64::total_cmp);

    let median = (numbers[(count - 1) / 2] + numbers[count / 2]) / 2.0;

    // Consume the more distant tail first; on a tie the high tail goes.
    let mut survivor_index_lo = 0;
    let mut survivor_index_hi = count - 1;
    for _ in 0..replace {
        let distance_lo = median - numbers[survivor_index_lo];
        let distance_hi = numbers[survivor_index_hi] - median;
        if distance_lo > distance_hi {
            survivor_index_lo += 1;
        } else {
            survivor_index_hi -= 1;
        }
    }

    let survivor_lo = numbers[survivor_index_lo];
    let survivor_hi = numbers[survivor_index_hi];
    let survivor_range = survivor_hi - survivor_lo;
    let limit_lo = survivor_lo - survivor_range * trim_limit;
    let limit_hi = survivor_hi + survivor_range * trim_limit;

    // The survivor itself is always inside the envelope, so both searches
    // stay within the tail they scan.
    let first_inside_lo = numbers[..=survivor_index_lo]
        .iter()
        .position(|v| *v >= limit_lo)
        .unwrap_or(survivor_index_lo);
    let replace_lo = numbers[first_inside_lo];
    numbers[..first_inside_lo].fill(replace_lo);

    let last_inside_hi = survivor_index_hi
        + numbers[survivor_index_hi..]
            .iter()
            .rposition(|v| *v <= limit_hi)
            .unwrap_or(0);
    let replace_hi = numbers[last_inside_hi];
    numbers[last_inside_hi + 1..].fill(replace_hi);

    Ok(DampenReport {
        replaced_low: first_inside_lo,
        replaced_high: count - 1 - last_inside_hi,
    })
}

/// Both trim parameters must lie in the open interval (0, 1)
pub(crate) fn validate_trim(trim_share: f64, trim_limit: f64) -> Result<()> {
    if !(trim_share > 0.0 && trim_share < 1.0) {
        return Err(PhoenixError::config(format!(
            "trim_share must be in (0, 1), got {}",
            trim_share
        )));
    }
    if !(trim_limit > 0.0 && trim_limit < 1.0) {
        return Err(PhoenixError::config(format!(
            "trim_limit must be in (0, 1), got {}",
            trim_limit
        )));
    }
    Ok(())
}

/// Dampen every run independently
///
/// A run that cannot be dampened is logged and left untouched; it never
/// aborts the whole sample. Returns the number of runs that failed.
pub fn hierarchical_dampen(runs: &mut [Vec<f64>], trim_share: f64, trim_limit: f64) -> usize {
    let mut failed = 0;
    for (index, run) in runs.iter_mut().enumerate() {
        match dampen_extremes(run, trim_share, trim_limit) {
            Ok(report) if report.replaced() > 0 => {
                tracing::trace!(
                    run = index,
                    low = report.replaced_low,
                    high = report.replaced_high,
                    "dampened extremes"
                );
            }
            Ok(_) => {}
            Err(e) => {
                failed += 1;
                tracing::warn!(run = index, length = run.len(), "dampening skipped: {}", e);
            }
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_short_is_noop() {
        let mut values = vec![3.0, 1.0, 1000.0];
        let report = dampen_extremes(&mut values, 0.05, 0.1).unwrap();
        assert_eq!(report, DampenReport::default());
        // not even sorted
        assert_eq!(values, vec![3.0, 1.0, 1000.0]);
    }

    #[test]
    fn test_high_outlier_clamped_to_tail_survivor() {
        let mut values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        values[7] = 10_000.0;
        let report = dampen_extremes(&mut values, 0.05, 0.1).unwrap();

        assert_eq!(values.len(), 20);
        assert_eq!(report.replaced_high, 1);
        assert_eq!(report.replaced_low, 0);
        // 119 was the highest untouched value, it is the replacement
        assert_eq!(values[19], 119.0);
        assert_eq!(values[18], 119.0);
    }

    #[test]
    fn test_low_outlier_clamped() {
        let mut values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        values[3] = -5_000.0;
        let report = dampen_extremes(&mut values, 0.05, 0.1).unwrap();

        assert_eq!(report.replaced_low, 1);
        assert_eq!(values[0], 100.0);
    }

    #[test]
    fn test_constant_array_unchanged() {
        let mut values = vec![42.0; 40];
        let report = dampen_extremes(&mut values, 0.05, 0.1).unwrap();
        assert_eq!(report.replaced(), 0);
        assert!(values.iter().all(|v| *v == 42.0));
    }

    #[test]
    fn test_zero_range_survivors_clamp_both_tails() {
        let mut values = vec![5.0; 20];
        values[0] = 1.0;
        values[19] = 100.0;
        // replace = 2, one from each side since distances are 4 and 95
        let report = dampen_extremes(&mut values, 0.1, 0.1).unwrap();
        assert_eq!(report.replaced(), 2);
        assert!(values.iter().all(|v| *v == 5.0));
    }

    #[test]
    fn test_values_within_envelope_are_kept() {
        // Mild tails inside the envelope stay as they are (only reordered)
        let mut values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let report = dampen_extremes(&mut values, 0.1, 0.5).unwrap();
        assert_eq!(report.replaced(), 0);
        assert_eq!(values, (0..20).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_straddling_zero() {
        let mut values: Vec<f64> = (-10..10).map(|i| i as f64).collect();
        values[0] = -1e6;
        dampen_extremes(&mut values, 0.05, 0.1).unwrap();
        assert_eq!(values[0], -9.0);
    }

    #[test]
    fn test_second_pass_is_fixed_point() {
        let mut values: Vec<f64> = (0..40).map(|i| 50.0 + (i % 7) as f64).collect();
        values[5] = 9_999.0;
        values[6] = -9_999.0;
        dampen_extremes(&mut values, 0.05, 0.1).unwrap();
        let once = values.clone();
        dampen_extremes(&mut values, 0.05, 0.1).unwrap();
        assert_eq!(values, once);
    }

    #[test]
    fn test_second_pass_can_tighten_envelope() {
        // First pass consumes the high tail (9.5 vs 8.5 from the median) and
        // clamps 18 to 15; on the second pass the low tail is farther, the
        // survivor range shrinks to 3..15 and 0 falls outside it.
        let mut values = vec![10.0, 7.0, 6.0, 13.0, 0.0, 15.0, 5.0, 3.0, 15.0, 18.0];
        dampen_extremes(&mut values, 0.1, 0.1).unwrap();
        assert_eq!(values, vec![0.0, 3.0, 5.0, 6.0, 7.0, 10.0, 13.0, 15.0, 15.0, 15.0]);

        let report = dampen_extremes(&mut values, 0.1, 0.1).unwrap();
        assert_eq!(report.replaced_low, 1);
        assert_eq!(values[0], 3.0);

        let settled = values.clone();
        assert_eq!(dampen_extremes(&mut values, 0.1, 0.1).unwrap().replaced(), 0);
        assert_eq!(values, settled);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut values = vec![1.0; 30];
        values[4] = f64::NAN;
        let err = dampen_extremes(&mut values, 0.05, 0.1).unwrap_err();
        assert!(matches!(err, PhoenixError::MissingData { run: 4, .. }));
    }

    #[test]
    fn test_trim_parameters_validated() {
        for (share, limit) in [(1.0, 0.1), (1.5, 0.1), (0.0, 0.1), (f64::NAN, 0.1), (0.05, 1.0), (0.05, -0.1)] {
            let mut values: Vec<f64> = (0..20).map(|i| i as f64).collect();
            let err = dampen_extremes(&mut values, share, limit).unwrap_err();
            assert!(matches!(err, PhoenixError::Configuration(_)), "{} {}: {:?}", share, limit, err);
            assert_eq!(values, (0..20).map(|i| i as f64).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_hierarchical_tolerates_bad_run() {
        let mut runs = vec![vec![1.0; 40], vec![f64::INFINITY; 40], vec![2.0; 40]];
        runs[0][3] = 500.0;
        let failed = hierarchical_dampen(&mut runs, 0.05, 0.1);
        assert_eq!(failed, 1);
        assert!(runs[0].iter().all(|v| *v == 1.0));
        assert_eq!(runs[2], vec![2.0; 40]);
    }
}
