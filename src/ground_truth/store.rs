// Comparison stores keyed by the stable comparison key
//
// A store persists every Comparison the comparer produces, whether fetched
// from the external ground truth or computed locally. Entries are immutable
// once written.

use crate::detection::Comparison;
use crate::error::{PhoenixError, Result};
use crate::persist::{read_json, write_json_atomic};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Persistence seam for computed comparisons
pub trait ComparisonStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Comparison>>;
    fn put(&self, key: &str, comparison: &Comparison) -> Result<()>;
}

impl<S: ComparisonStore + ?Sized> ComparisonStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Comparison>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, comparison: &Comparison) -> Result<()> {
        (**self).put(key, comparison)
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryComparisonStore {
    entries: Mutex<HashMap<String, Comparison>>,
}

impl MemoryComparisonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ComparisonStore for MemoryComparisonStore {
    fn get(&self, key: &str) -> Result<Option<Comparison>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| PhoenixError::config("comparison store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, comparison: &Comparison) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PhoenixError::config("comparison store lock poisoned"))?;
        entries
            .entry(key.to_string())
            .or_insert_with(|| comparison.clone());
        Ok(())
    }
}

/// One JSON file per comparison under `<root>/comparisons/by-key/`
#[derive(Debug, Clone)]
pub struct FileComparisonStore {
    dir: PathBuf,
}

impl FileComparisonStore {
    pub fn new<P: Into<PathBuf>>(cache_root: P) -> Self {
        Self {
            dir: cache_root.into().join("comparisons").join("by-key"),
        }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file_name))
    }
}

impl ComparisonStore for FileComparisonStore {
    fn get(&self, key: &str) -> Result<Option<Comparison>> {
        read_json(&self.path(key))
    }

    fn put(&self, key: &str, comparison: &Comparison) -> Result<()> {
        let path = self.path(key);
        if path.exists() {
            return Ok(());
        }
        write_json_atomic(&path, comparison)
    }
}
