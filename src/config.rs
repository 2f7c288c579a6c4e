//! Configuration file for the `phoenix` tool
//!
//! Every section is optional; missing sections take their defaults.
//!
//! ```toml
//! workers = 8
//! column = "iteration_time_ns"
//!
//! [detector]
//! boots = 33333
//! p_value_threshold = 0.01
//!
//! [dimension]
//! kind = "fixed"
//! old_count = 10
//! new_count = 10
//!
//! [control]
//! kind = "mutation"
//! split = "by-days,30"
//! delta = 0.05
//!
//! [cache]
//! root = "/var/cache/phoenix"
//!
//! [remote]
//! timeout_secs = 5
//! ```

use crate::control::ControlConfig;
use crate::detection::DetectorConfig;
use crate::dimension::DimensionConfig;
use crate::error::{PhoenixError, Result};
use crate::estimates::EstimateConfig;
use crate::ground_truth::RemoteConfig;
use crate::mutation_model::ModelConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming the installation directory
pub const PHOENIX_HOME: &str = "PHOENIX_HOME";

/// Default measurement column
pub const DEFAULT_COLUMN: &str = "iteration_time_ns";

/// `[cache]` section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Explicit cache directory; see [`PhoenixConfig::cache_root`]
    pub root: Option<PathBuf>,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoenixConfig {
    /// Measurement column compared by default
    pub column: String,
    /// Worker threads used by simulations
    pub workers: usize,
    pub detector: DetectorConfig,
    pub dimension: DimensionConfig,
    pub control: ControlConfig,
    pub estimate: EstimateConfig,
    pub model: ModelConfig,
    pub cache: CacheConfig,
    /// External ground truth; local computation only when absent
    pub remote: Option<RemoteConfig>,
}

impl Default for PhoenixConfig {
    fn default() -> Self {
        Self {
            column: DEFAULT_COLUMN.to_string(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            detector: DetectorConfig::default(),
            dimension: DimensionConfig::default(),
            control: ControlConfig::default(),
            estimate: EstimateConfig::default(),
            model: ModelConfig::default(),
            cache: CacheConfig::default(),
            remote: None,
        }
    }
}

impl PhoenixConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PhoenixConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// I/O errors reading the file, TOML syntax errors, and any
    /// `Configuration` error reported by [`PhoenixConfig::validate`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Validate every section that can be checked without building policies
    pub fn validate(&self) -> Result<()> {
        if self.column.is_empty() {
            return Err(PhoenixError::config("column must not be empty"));
        }
        if self.workers == 0 {
            return Err(PhoenixError::config("workers must be positive"));
        }
        self.detector.validate()?;
        self.estimate.validate()?;
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }

    /// Cache directory: `cache.root`, else `$PHOENIX_HOME/_cache`, else `./_cache`
    pub fn cache_root(&self) -> PathBuf {
        if let Some(root) = &self.cache.root {
            return root.clone();
        }
        match std::env::var_os(PHOENIX_HOME) {
            Some(home) if !home.is_empty() => PathBuf::from(home).join("_cache"),
            _ => PathBuf::from("_cache"),
        }
    }
}
