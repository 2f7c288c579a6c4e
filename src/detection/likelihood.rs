// Likelihood estimation under a normal approximation
//
// The bootstrap difference distribution is summarised by its mean and
// (population) standard deviation; the p-value is the normal tail mass beyond
// the tested point on the side away from the bulk of the distribution.

use crate::detection::bootstrap::{mean, std_dev};

/// Cap for `-log10(p)` when `p == 0`
pub const MAX_NEG_LOG_P: f64 = 310.0;

/// Normal CDF parameterised by mean and standard deviation
///
/// Uses `erfc` so that tails far from the mean keep their precision.
pub fn normal_cdf(x: f64, mean: f64, std: f64) -> f64 {
    0.5 * libm::erfc(-(x - mean) / (std * std::f64::consts::SQRT_2))
}

/// Probability of a draw at least as far out as `point`, on the side of
/// `point` opposite the distribution mean
///
/// * `None` for an empty distribution (unknown likelihood)
/// * `1.0` / `0.0` for a constant distribution, depending on whether `point`
///   equals the constant
///
/// # Example
/// ```
/// use phoenix::detection::estimate_likelihood;
///
/// assert_eq!(estimate_likelihood(&[5.0, 5.0, 5.0, 5.0], 5.0), Some(1.0));
/// assert_eq!(estimate_likelihood(&[5.0, 5.0, 5.0, 5.0], 3.0), Some(0.0));
/// assert_eq!(estimate_likelihood(&[], 0.0), None);
/// ```
pub fn estimate_likelihood(distribution: &[f64], point: f64) -> Option<f64> {
    if distribution.is_empty() {
        tracing::warn!("unknown likelihood for missing input data");
        return None;
    }

    let mean = mean(distribution);
    let std = std_dev(distribution);

    if std == 0.0 {
        return Some(if point == mean { 1.0 } else { 0.0 });
    }

    let p = if point < mean {
        normal_cdf(point, mean, std)
    } else {
        // 1 - CDF(point), computed directly on the upper tail
        normal_cdf(2.0 * mean - point, mean, std)
    };

    Some(p.clamp(0.0, 1.0))
}

/// Presentation form `-log10(p)`, with `p == 0` mapped to [`MAX_NEG_LOG_P`]
pub fn neg_log10_p(p: f64) -> f64 {
    if p > 0.0 {
        (-p.log10()).min(MAX_NEG_LOG_P)
    } else {
        MAX_NEG_LOG_P
    }
}

/// Inverse standard normal CDF (probit)
///
/// Abramowitz & Stegun 26.2.23 rational approximation, accurate to ~4.5e-4,
/// which is enough for confidence-interval widths.
pub fn probit(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    let (sign, q) = if p < 0.5 { (-1.0, 1.0 - p) } else { (1.0, p) };

    const C0: f64 = 2.515517;
    const C1: f64 = 0.802853;
    const C2: f64 = 0.010328;
    const D1: f64 = 1.432788;
    const D2: f64 = 0.189269;
    const D3: f64 = 0.001308;

    let t = (-2.0 * (1.0 - q).ln()).sqrt();
    let z = t - (C0 + C1 * t + C2 * t * t) / (1.0 + D1 * t + D2 * t * t + D3 * t * t * t);

    sign * z
}
