//! Error taxonomy for the detection engine and its policies
//!
//! Data-quality problems (missing runs, short samples) are recovered close to
//! where they happen and only surface here when a caller asks for them
//! explicitly. Structural misconfiguration fails fast at construction time.
//! External lookup failures never escape the comparer; they are logged and
//! the local detector takes over.

use thiserror::Error;

/// Errors produced by the `phoenix` library
#[derive(Error, Debug)]
pub enum PhoenixError {
    /// A run could not be used (empty, non-finite values, unreadable source)
    #[error("Missing data in run {run}: {reason}")]
    MissingData { run: usize, reason: String },

    /// Both sides have fewer runs than the bootstrap minimum
    #[error("Insufficient sample: old={old} new={new} runs (minimum {minimum})")]
    InsufficientSample {
        old: usize,
        new: usize,
        minimum: usize,
    },

    /// External ground truth payload absent or malformed
    #[error("External lookup failed: {0}")]
    ExternalLookup(String),

    /// Invalid structural parameter (trim share, thresholds, budgets, ...)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Samples that cannot be compared with each other
    #[error("Samples cannot be compared: {0}")]
    IncompatibleSamples(String),

    /// Training split text that does not parse as `<method>,<value>`
    #[error("Invalid training split '{text}': {reason}")]
    InvalidTrainingSplit { text: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type for `phoenix` operations
pub type Result<T> = std::result::Result<T, PhoenixError>;

impl PhoenixError {
    /// Shorthand for configuration errors built from format strings
    pub fn config(message: impl Into<String>) -> Self {
        PhoenixError::Configuration(message.into())
    }

    /// True for errors that describe the input data rather than the setup
    pub fn is_data_quality(&self) -> bool {
        matches!(
            self,
            PhoenixError::MissingData { .. } | PhoenixError::InsufficientSample { .. }
        )
    }
}
