//! Index of the stored cache entries.
//!
//! The manifest is stored as `manifest.json` in the cache directory. It maps
//! entry keys to what the entry was stored for, so entries can be listed and
//! collected without opening them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Name of the manifest file within the cache directory.
const MANIFEST_FILE: &str = "manifest.json";

/// All cache entries of a cache directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    /// Tessera version that produced this cache. Invalidate on version change.
    pub tessera_version: String,

    /// Stored entries by key.
    pub entries: BTreeMap<String, EntryRecord>,
}

/// What a cache entry was stored for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Root directory of the build.
    pub build_root: PathBuf,

    /// Tasks requested on the command line, in order.
    pub requested_tasks: Vec<String>,

    /// When the entry was stored, in milliseconds since the epoch.
    pub stored_at: u64,
}

impl CacheManifest {
    /// Creates an empty manifest for the given Tessera version.
    pub fn new(tessera_version: &str) -> Self {
        Self {
            tessera_version: tessera_version.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// Loads the manifest from the cache directory.
    ///
    /// Returns `None` if the file doesn't exist or can't be parsed; the
    /// cache then starts empty.
    pub fn load(cache_dir: &Path) -> Option<Self> {
        let path = cache_dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Parses a manifest, reporting why it is invalid.
    pub fn parse(content: &str) -> CacheResult<Self> {
        serde_json::from_str(content).map_err(|e| CacheError::ManifestParse {
            reason: e.to_string(),
        })
    }

    /// Saves the manifest to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> CacheResult<()> {
        std::fs::create_dir_all(cache_dir).map_err(|e| CacheError::io(cache_dir, e))?;
        let path = cache_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        std::fs::write(&path, json).map_err(|e| CacheError::io(path, e))
    }

    /// Returns `true` if this manifest was produced by a compatible version.
    pub fn is_compatible(&self, current_version: &str) -> bool {
        self.tessera_version == current_version
    }
}
