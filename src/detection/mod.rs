// Bootstrap change-point detection
//
// Decides whether a new version of a benchmarked system is slower than an
// old one from two samples of runs:
// - Extreme dampening: clamp outlier iterations inside every run
// - Hierarchical bootstrap: resample runs to build the distribution of the
//   mean-of-means difference (new - old)
// - Likelihood: normal-approximation tail probability of "no difference"
// - Classification: `regression = p_value < p_value_threshold`
//
// The detector is stateless across comparisons. Configuration is passed in
// explicitly through `DetectorConfig`.

mod bootstrap;
mod config;
mod dampen;
mod detector;
mod likelihood;

pub use bootstrap::{
    chunk_replicates, hierarchical_bootstrap_mean, mean, mean_difference_distribution,
    mean_of_means, relative_change, run_means, std_dev,
};
pub use config::{DetectorConfig, ResampleLevel, DEFAULT_BOOTS, DEFAULT_MEMORY_LIMIT, MIN_RUN_COUNT};
pub use dampen::{dampen_extremes, hierarchical_dampen, DampenReport};
pub use detector::{ChangePointDetector, Comparison, Verdict};
pub use likelihood::{estimate_likelihood, neg_log10_p, normal_cdf, probit, MAX_NEG_LOG_P};
