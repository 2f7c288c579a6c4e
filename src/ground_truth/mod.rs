// Ground truth: where comparisons come from and where they are kept
//
// - `store`: comparisons keyed by "old meta:new meta:column"
// - `remote`: pre-computed comparisons from the results service
// - `cache`: detector results keyed by run-size signature
// - `comparer`: store -> external source -> local detector fallback chain
//
// Network lookups happen here, never inside the detector.

mod cache;
mod comparer;
mod remote;
mod store;

pub use cache::{GroundTruthCache, GroundTruthEntries};
pub use comparer::{Comparer, Provenance};
#[cfg(feature = "remote")]
pub use remote::HttpGroundTruth;
pub use remote::{
    column_matcher, parse_bootstrap_diff, GroundTruthSource, RemoteConfig, DEFAULT_REMOTE_URL,
    REMOTE_P_VALUE_THRESHOLD,
};
pub use store::{ComparisonStore, FileComparisonStore, MemoryComparisonStore};

#[cfg(test)]
mod tests;
