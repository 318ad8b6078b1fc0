//! The configuration cache of a build.
//!
//! `ConfigurationCacheRepository` ties together the manifest and the entry
//! store. An entry is keyed by the build root and the requested tasks, and
//! holds the two fingerprint streams and the encoded work graph. Reads are
//! fail-safe: a missing, corrupt or incompatible entry is a cache miss.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tessera_common::{ContentHash, ProjectPath};
use tessera_config::CacheOptions;
use tessera_diagnostics::ProblemReporter;
use tessera_fingerprint::{
    group_by_project, read_fingerprint_stream, FingerprintEntry, FingerprintEntryCodec,
    ProjectEntryCodec, ProjectFingerprints,
};
use tessera_graph::{Bindings, CodecSettings, ReadContext, SharedBuffer, Value};
use tracing::{debug, info};

use crate::capture::CapturedFingerprint;
use crate::error::CacheResult;
use crate::manifest::{CacheManifest, EntryRecord};
use crate::store::EntryStore;

/// File name of the build-wide fingerprint stream.
const BUILD_FINGERPRINT: &str = "build.fingerprint";

/// File name of the project fingerprint stream.
const PROJECT_FINGERPRINT: &str = "projects.fingerprint";

/// File name of the encoded work graph.
const WORK_GRAPH: &str = "work.graph";

/// Stored configuration cache entries of one build.
#[derive(Debug)]
pub struct ConfigurationCacheRepository {
    cache_dir: PathBuf,
    manifest: CacheManifest,
    store: EntryStore,
    tessera_version: String,
}

/// A loaded cache entry whose files passed validation.
#[derive(Debug, Clone)]
pub struct CachedEntry {
    /// What the entry was stored for.
    pub record: EntryRecord,
    build: Vec<u8>,
    project: Vec<u8>,
    graph: Vec<u8>,
}

impl ConfigurationCacheRepository {
    /// Opens the cache of the build rooted at `build_root`.
    ///
    /// The cache directory comes from `options.store`, relative to the build
    /// root unless absolute. A manifest written by another version is
    /// discarded and the cache starts empty.
    pub fn open(build_root: &Path, options: &CacheOptions, tessera_version: &str) -> Self {
        let cache_dir = build_root.join(&options.store.directory);
        let manifest = match CacheManifest::load(&cache_dir) {
            Some(manifest) if manifest.is_compatible(tessera_version) => manifest,
            Some(manifest) => {
                info!(
                    stored = %manifest.tessera_version,
                    current = tessera_version,
                    "discarding configuration cache of another version"
                );
                CacheManifest::new(tessera_version)
            }
            None => CacheManifest::new(tessera_version),
        };
        Self {
            store: EntryStore::new(&cache_dir),
            cache_dir,
            manifest,
            tessera_version: tessera_version.to_string(),
        }
    }

    /// Key of the entry for running `tasks` in the build at `build_root`.
    pub fn entry_key(build_root: &Path, tasks: &[String]) -> String {
        let root = build_root.to_string_lossy();
        ContentHash::from_parts(std::iter::once(root.as_ref()).chain(tasks.iter().map(String::as_str)))
            .to_string()
    }

    /// Directory holding the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Stores an entry, replacing any entry with the same key.
    ///
    /// The manifest is updated in memory; call [`save`](Self::save) to
    /// persist it.
    pub fn store(
        &mut self,
        key: &str,
        record: EntryRecord,
        fingerprint: &CapturedFingerprint,
        graph: &[u8],
    ) -> CacheResult<()> {
        self.store.remove(key)?;
        let version = &self.tessera_version;
        self.store
            .write_file(key, BUILD_FINGERPRINT, &fingerprint.build, version)?;
        self.store
            .write_file(key, PROJECT_FINGERPRINT, &fingerprint.project, version)?;
        self.store.write_file(key, WORK_GRAPH, graph, version)?;
        debug!(key, tasks = ?record.requested_tasks, "stored configuration cache entry");
        self.manifest.entries.insert(key.to_string(), record);
        Ok(())
    }

    /// Loads the entry `key`.
    ///
    /// Returns `None` if the entry is unknown or any of its files is missing
    /// or fails validation.
    pub fn load(&self, key: &str) -> Option<CachedEntry> {
        let Some(record) = self.manifest.entries.get(key) else {
            debug!(key, "no configuration cache entry");
            return None;
        };
        match self.read_files(key, record) {
            Some(entry) => Some(entry),
            None => {
                debug!(key, "configuration cache entry is incomplete");
                None
            }
        }
    }

    fn read_files(&self, key: &str, record: &EntryRecord) -> Option<CachedEntry> {
        Some(CachedEntry {
            record: record.clone(),
            build: self.store.read_file(key, BUILD_FINGERPRINT)?,
            project: self.store.read_file(key, PROJECT_FINGERPRINT)?,
            graph: self.store.read_file(key, WORK_GRAPH)?,
        })
    }

    /// Deletes the entry `key`, e.g. after its fingerprint went stale.
    pub fn remove(&mut self, key: &str) -> CacheResult<()> {
        self.manifest.entries.remove(key);
        self.store.remove(key)
    }

    /// Persists the current manifest to disk.
    pub fn save(&self) -> CacheResult<()> {
        self.manifest.save(&self.cache_dir)
    }

    /// Returns a reference to the current cache manifest.
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Removes entry directories not referenced by the manifest.
    ///
    /// Returns the number of entries removed.
    pub fn gc(&self) -> CacheResult<usize> {
        let live_keys: Vec<&str> = self.manifest.entries.keys().map(String::as_str).collect();
        let removed = self.store.gc(&live_keys)?;
        if removed > 0 {
            info!(removed, "collected stale configuration cache entries");
        }
        Ok(removed)
    }
}

impl CachedEntry {
    /// Replays the build-wide fingerprint stream.
    pub fn read_build_fingerprint(
        &self,
        settings: &CodecSettings,
        bindings: Arc<Bindings>,
        reporter: Arc<dyn ProblemReporter>,
    ) -> CacheResult<Vec<FingerprintEntry>> {
        let mut ctx = reader(&self.build, settings, bindings, reporter);
        Ok(read_fingerprint_stream(&mut ctx, &FingerprintEntryCodec)?)
    }

    /// Replays the project fingerprint stream, grouped by project.
    pub fn read_project_fingerprints(
        &self,
        settings: &CodecSettings,
        bindings: Arc<Bindings>,
        reporter: Arc<dyn ProblemReporter>,
    ) -> CacheResult<BTreeMap<ProjectPath, ProjectFingerprints>> {
        let mut ctx = reader(&self.project, settings, bindings, reporter);
        let records = read_fingerprint_stream(&mut ctx, &ProjectEntryCodec)?;
        Ok(group_by_project(records))
    }

    /// Decodes the stored work graph.
    ///
    /// `bindings` must bind the types of the graph to codecs of the loading
    /// build, so live services are looked up rather than restored.
    pub fn read_work_graph(
        &self,
        settings: &CodecSettings,
        bindings: Arc<Bindings>,
        reporter: Arc<dyn ProblemReporter>,
    ) -> CacheResult<Value> {
        let mut ctx = reader(&self.graph, settings, bindings, reporter);
        Ok(ctx.read_value()?)
    }
}

/// Encodes the work graph `graph` for [`ConfigurationCacheRepository::store`].
pub fn encode_work_graph(
    graph: &Value,
    settings: &CodecSettings,
    bindings: Arc<Bindings>,
    reporter: Arc<dyn ProblemReporter>,
) -> CacheResult<Vec<u8>> {
    let buffer = SharedBuffer::new();
    let mut ctx = settings.writer(buffer.clone(), bindings, reporter);
    ctx.write_value(graph)?;
    ctx.flush()?;
    drop(ctx);
    Ok(buffer.bytes())
}

fn reader(
    bytes: &[u8],
    settings: &CodecSettings,
    bindings: Arc<Bindings>,
    reporter: Arc<dyn ProblemReporter>,
) -> ReadContext {
    settings.reader(Cursor::new(bytes.to_vec()), bindings, reporter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(tasks: &[&str]) -> EntryRecord {
        EntryRecord {
            build_root: PathBuf::from("/work/app"),
            requested_tasks: tasks.iter().map(|t| t.to_string()).collect(),
            stored_at: 0,
        }
    }

    fn fingerprint() -> CapturedFingerprint {
        CapturedFingerprint {
            build: b"build".to_vec(),
            project: b"project".to_vec(),
        }
    }

    #[test]
    fn cache_dir_is_relative_to_the_build_root() {
        let dir = tempfile::tempdir().unwrap();
        let repo = ConfigurationCacheRepository::open(dir.path(), &CacheOptions::default(), "0.1.0");
        assert_eq!(repo.cache_dir(), dir.path().join(".tessera/configuration-cache"));
        assert!(repo.manifest().entries.is_empty());
    }

    #[test]
    fn entry_key_depends_on_task_order() {
        let root = Path::new("/work/app");
        let a = ConfigurationCacheRepository::entry_key(root, &["clean".into(), "build".into()]);
        let b = ConfigurationCacheRepository::entry_key(root, &["build".into(), "clean".into()]);
        assert_ne!(a, b);
        assert_eq!(
            a,
            ConfigurationCacheRepository::entry_key(root, &["clean".into(), "build".into()])
        );
    }

    #[test]
    fn unsaved_entries_are_lost_on_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let options = CacheOptions::default();
        {
            let mut repo = ConfigurationCacheRepository::open(dir.path(), &options, "0.1.0");
            repo.store("k", record(&["build"]), &fingerprint(), b"graph").unwrap();
            assert!(repo.load("k").is_some());
        }
        let repo = ConfigurationCacheRepository::open(dir.path(), &options, "0.1.0");
        assert!(repo.load("k").is_none());
        assert_eq!(repo.gc().unwrap(), 1);
    }

    #[test]
    fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo =
            ConfigurationCacheRepository::open(dir.path(), &CacheOptions::default(), "0.1.0");
        repo.store("k", record(&["build"]), &fingerprint(), b"graph").unwrap();
        std::fs::remove_file(repo.cache_dir().join("k").join(WORK_GRAPH)).unwrap();
        assert!(repo.load("k").is_none());
    }

    #[test]
    fn remove_forgets_the_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut repo =
            ConfigurationCacheRepository::open(dir.path(), &CacheOptions::default(), "0.1.0");
        repo.store("k", record(&["build"]), &fingerprint(), b"graph").unwrap();
        repo.remove("k").unwrap();
        assert!(repo.load("k").is_none());
        assert!(!repo.cache_dir().join("k").exists());
    }
}
