//! In-memory code-map cache.
//!
//! Entries are keyed by file path and invalidated by content
//! fingerprint, never by time. Lookups return shared references so a
//! cached map is handed to every file-data entry without copying.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xxhash_rust::xxh64::xxh64;

use crate::core::CodeMap;

/// xxh64 fingerprint of source text.
pub fn fingerprint(source: &str) -> u64 {
    xxh64(source.as_bytes(), 0)
}

#[derive(Debug, Default)]
pub struct CodeMapCache {
    entries: HashMap<PathBuf, Arc<CodeMap>>,
    hits: u64,
    misses: u64,
}

impl CodeMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached map; a fingerprint mismatch counts as a miss and
    /// evicts the stale entry.
    pub fn get(&mut self, path: &Path, fingerprint: u64) -> Option<Arc<CodeMap>> {
        match self.entries.get(path) {
            Some(entry) if entry.fingerprint == fingerprint && !entry.is_pending() => {
                self.hits += 1;
                Some(Arc::clone(entry))
            }
            Some(_) => {
                self.misses += 1;
                self.entries.remove(path);
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, map: Arc<CodeMap>) {
        self.entries.insert(path.into(), map);
    }

    pub fn invalidate(&mut self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
