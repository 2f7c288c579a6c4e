//! Run-count estimation from historical measurements
//!
//! The width of a bootstrap confidence interval of the mean shrinks roughly
//! as `1 / sqrt(n)`. Fitting `a / sqrt(x)` to the widths observed on small
//! subsets of the history extrapolates how many runs are needed before the
//! interval is narrower than the requested relative sensitivity.

use crate::detection::{mean, probit, std_dev};
use crate::error::{PhoenixError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Returned when the history is too short to fit anything
pub const TOO_FEW_RUNS: usize = 100;

/// Returned when the sensitivity curve is not finite
pub const UNSTABLE_CURVE: usize = 101;

/// Smallest subset size the sensitivity curve is sampled at
const FIRST_SENSITIVITY_POINT: usize = 3;

/// Bootstrap replicates per point of the sensitivity curve
const SENSITIVITY_REPLICATES: usize = 100;

/// Single-level bootstrap of `mean(one) - mean(two)`
pub fn bootstrap_difference<R: Rng + ?Sized>(
    data_one: &[f64],
    data_two: &[f64],
    count_one: usize,
    count_two: usize,
    replicates: usize,
    rng: &mut R,
) -> Vec<f64> {
    let mut draw = |data: &[f64], count: usize| -> f64 {
        (0..count).map(|_| data[rng.gen_range(0..data.len())]).sum::<f64>() / count as f64
    };
    (0..replicates)
        .map(|_| draw(data_one, count_one) - draw(data_two, count_two))
        .collect()
}

/// Two-sided normal confidence interval of the distribution in `data`
pub fn confidence_interval_normal(data: &[f64], level: f64) -> (f64, f64) {
    let m = mean(data);
    let s = std_dev(data);
    let z = probit((1.0 + level) / 2.0);
    (m - z * s, m + z * s)
}

/// Relative width of the `1 - alpha` interval of the mean difference when
/// `current_size` runs are compared against the whole history
pub fn sensitivity_from_history<R: Rng + ?Sized>(
    history: &[f64],
    current_size: usize,
    alpha: f64,
    replicates: usize,
    rng: &mut R,
) -> f64 {
    let differences = bootstrap_difference(history, history, history.len(), current_size, replicates, rng);
    let (lo, hi) = confidence_interval_normal(&differences, 1.0 - alpha);
    (hi - lo) / mean(history)
}

/// Least-squares fit of `y = a / sqrt(|x|)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityFit {
    pub a: f64,
}

impl SensitivityFit {
    /// Closed-form fit; `None` for empty or mismatched input
    pub fn fit(xs: &[f64], ys: &[f64]) -> Option<Self> {
        if xs.is_empty() || xs.len() != ys.len() {
            return None;
        }
        let (num, den) = xs.iter().zip(ys).fold((0.0, 0.0), |(num, den), (x, y)| {
            let basis = 1.0 / x.abs().sqrt();
            (num + y * basis, den + basis * basis)
        });
        let a = num / den;
        a.is_finite().then_some(Self { a })
    }

    pub fn value(&self, x: f64) -> f64 {
        self.a / x.abs().sqrt()
    }
}

/// Additional runs needed before the interval width drops below
/// `sensitivity`
///
/// Returns [`TOO_FEW_RUNS`] when fewer than four runs are available and
/// [`UNSTABLE_CURVE`] when the sampled curve is not finite.
pub fn guess_needed_runs<R: Rng + ?Sized>(
    history: &[f64],
    current_size: usize,
    alpha: f64,
    sensitivity: f64,
    rng: &mut R,
) -> usize {
    let xs: Vec<f64> = (FIRST_SENSITIVITY_POINT..current_size).map(|x| x as f64).collect();
    if xs.is_empty() {
        return TOO_FEW_RUNS;
    }

    let ys: Vec<f64> = (FIRST_SENSITIVITY_POINT..current_size)
        .map(|x| sensitivity_from_history(history, x, alpha, SENSITIVITY_REPLICATES, &mut *rng))
        .collect();
    tracing::debug!(?ys, "sensitivities");

    if ys.iter().any(|y| !y.is_finite()) {
        tracing::error!("sensitivity curve is not finite, not estimating needed runs");
        return UNSTABLE_CURVE;
    }

    let Some(fit) = SensitivityFit::fit(&xs, &ys) else {
        return UNSTABLE_CURVE;
    };
    tracing::debug!(a = fit.a, "sensitivity curve fit");

    let max_runs_ever = current_size * 1000;
    (current_size..max_runs_ever)
        .find(|&i| fit.value(i as f64) < sensitivity)
        .map(|i| i - current_size)
        .unwrap_or(max_runs_ever)
}

/// Parameters of [`estimate_runs_needed`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateConfig {
    pub retries: usize,
    pub subset_size: usize,
    pub alpha: f64,
    pub sensitivity: f64,
}

impl Default for EstimateConfig {
    fn default() -> Self {
        Self {
            retries: 100,
            subset_size: 4,
            alpha: 0.01,
            sensitivity: 0.01,
        }
    }
}

impl EstimateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.retries == 0 {
            return Err(PhoenixError::config("retries must be positive"));
        }
        if self.subset_size == 0 {
            return Err(PhoenixError::config("subset_size must be positive"));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(PhoenixError::config(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if !(self.sensitivity > 0.0 && self.sensitivity.is_finite()) {
            return Err(PhoenixError::config(format!(
                "sensitivity must be positive, got {}",
                self.sensitivity
            )));
        }
        Ok(())
    }
}

/// Total run estimates (subset size + extra runs) from `retries` random
/// subsets of the history
pub fn estimate_runs_needed<R: Rng + ?Sized>(
    history: &[f64],
    config: &EstimateConfig,
    rng: &mut R,
) -> Result<Vec<usize>> {
    config.validate()?;
    if history.len() < config.subset_size {
        return Err(PhoenixError::InsufficientSample {
            old: history.len(),
            new: 0,
            minimum: config.subset_size,
        });
    }

    let estimates = (0..config.retries)
        .map(|_| {
            let subset: Vec<f64> = history
                .choose_multiple(&mut *rng, config.subset_size)
                .copied()
                .collect();
            guess_needed_runs(&subset, config.subset_size, config.alpha, config.sensitivity, &mut *rng)
                + config.subset_size
        })
        .collect();
    Ok(estimates)
}
