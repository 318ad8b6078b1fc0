//! Binary file storage for cache entries.
//!
//! Each cache entry is a directory named after its key, holding one file per
//! stream (the two fingerprint streams and the work graph). Every file starts
//! with a header carrying magic bytes, the format version and a checksum of
//! the payload.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_common::ContentHash;
use tracing::debug;

use crate::error::{CacheError, CacheResult};

/// Magic bytes identifying a Tessera cache file.
const ENTRY_MAGIC: [u8; 4] = *b"TSRA";

/// Current file format version. Increment on breaking changes to the header
/// or to any stream format.
const ENTRY_FORMAT_VERSION: u32 = 1;

/// Header prepended to every cache file for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryHeader {
    /// Magic bytes: must be `b"TSRA"`.
    pub magic: [u8; 4],

    /// File format version.
    pub format_version: u32,

    /// Tessera version that produced this file.
    pub tessera_version: String,

    /// Content hash of the payload.
    pub checksum: ContentHash,
}

/// Reads and writes the files of cache entries.
///
/// A file is stored at `<cache_dir>/<key>/<name>` with a validated header.
#[derive(Debug, Clone)]
pub struct EntryStore {
    cache_dir: PathBuf,
}

impl EntryStore {
    /// Creates a store rooted at `cache_dir`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    /// Directory of the entry `key`.
    pub fn entry_dir(&self, key: &str) -> PathBuf {
        self.cache_dir.join(key)
    }

    /// Path of the file `name` of entry `key`.
    pub fn file_path(&self, key: &str, name: &str) -> PathBuf {
        self.entry_dir(key).join(name)
    }

    /// Writes `data` as the file `name` of entry `key`.
    ///
    /// The file is written next to its final location and renamed, so a
    /// reader never sees a partially written file.
    pub fn write_file(
        &self,
        key: &str,
        name: &str,
        data: &[u8],
        tessera_version: &str,
    ) -> CacheResult<()> {
        let dir = self.entry_dir(key);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::io(&dir, e))?;

        let header = EntryHeader {
            magic: ENTRY_MAGIC,
            format_version: ENTRY_FORMAT_VERSION,
            tessera_version: tessera_version.to_string(),
            checksum: ContentHash::from_bytes(data),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + data.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(data);

        let path = self.file_path(key, name);
        let partial = dir.join(format!("{name}.partial"));
        std::fs::write(&partial, &output).map_err(|e| CacheError::io(&partial, e))?;
        std::fs::rename(&partial, &path).map_err(|e| CacheError::io(&path, e))
    }

    /// Reads the file `name` of entry `key`, validating its header.
    ///
    /// Returns `None` if the file doesn't exist, the header is invalid, the
    /// format version doesn't match, or the checksum doesn't verify.
    pub fn read_file(&self, key: &str, name: &str) -> Option<Vec<u8>> {
        let path = self.file_path(key, name);
        let raw = std::fs::read(&path).ok()?;
        let payload = validate(&raw);
        if payload.is_none() {
            debug!(path = %path.display(), "discarding invalid cache file");
        }
        payload.map(<[u8]>::to_vec)
    }

    /// Deletes entry `key`. Deleting a missing entry succeeds.
    pub fn remove(&self, key: &str) -> CacheResult<()> {
        let dir = self.entry_dir(key);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::io(dir, e)),
        }
    }

    /// Deletes every entry directory whose name is not in `live_keys`.
    ///
    /// Returns the number of entries removed. Files directly in the cache
    /// directory, such as the manifest, are left alone.
    pub fn gc(&self, live_keys: &[&str]) -> CacheResult<usize> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let entries =
            std::fs::read_dir(&self.cache_dir).map_err(|e| CacheError::io(&self.cache_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| CacheError::io(&self.cache_dir, e))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                if !live_keys.contains(&name) {
                    std::fs::remove_dir_all(&path).map_err(|e| CacheError::io(&path, e))?;
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

fn validate(raw: &[u8]) -> Option<&[u8]> {
    if raw.len() < 4 {
        return None;
    }
    let header_len = u32::from_le_bytes(raw[..4].try_into().ok()?) as usize;
    let body = raw.get(4..)?;
    if body.len() < header_len {
        return None;
    }
    let (header, _): (EntryHeader, usize) =
        bincode::serde::decode_from_slice(&body[..header_len], bincode::config::standard())
            .ok()?;
    if header.magic != ENTRY_MAGIC || header.format_version != ENTRY_FORMAT_VERSION {
        return None;
    }
    let payload = &body[header_len..];
    (ContentHash::from_bytes(payload) == header.checksum).then_some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_store() -> (tempfile::TempDir, EntryStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(dir.path());
        (dir, store)
    }

    fn write_raw(store: &EntryStore, key: &str, name: &str, header: &EntryHeader, payload: &[u8]) {
        let header_bytes =
            bincode::serde::encode_to_vec(header, bincode::config::standard()).unwrap();
        let mut output = Vec::new();
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(payload);
        std::fs::create_dir_all(store.entry_dir(key)).unwrap();
        std::fs::write(store.file_path(key, name), output).unwrap();
    }

    #[test]
    fn written_file_reads_back() {
        let (_dir, store) = make_store();
        store.write_file("k1", "work.graph", b"graph bytes", "0.1.0").unwrap();
        assert_eq!(store.read_file("k1", "work.graph").unwrap(), b"graph bytes");
        assert!(!store.file_path("k1", "work.graph.partial").exists());
    }

    #[test]
    fn read_missing_returns_none() {
        let (_dir, store) = make_store();
        assert!(store.read_file("k1", "work.graph").is_none());
    }

    #[test]
    fn read_truncated_header_returns_none() {
        let (_dir, store) = make_store();
        std::fs::create_dir_all(store.entry_dir("k1")).unwrap();
        std::fs::write(store.file_path("k1", "work.graph"), b"AB").unwrap();
        assert!(store.read_file("k1", "work.graph").is_none());

        std::fs::write(store.file_path("k1", "work.graph"), [200, 0, 0, 0, 1]).unwrap();
        assert!(store.read_file("k1", "work.graph").is_none());
    }

    #[test]
    fn read_wrong_magic_returns_none() {
        let (_dir, store) = make_store();
        let header = EntryHeader {
            magic: *b"BAAD",
            format_version: ENTRY_FORMAT_VERSION,
            tessera_version: "0.1.0".to_string(),
            checksum: ContentHash::from_bytes(b"data"),
        };
        write_raw(&store, "k1", "work.graph", &header, b"data");
        assert!(store.read_file("k1", "work.graph").is_none());
    }

    #[test]
    fn read_wrong_version_returns_none() {
        let (_dir, store) = make_store();
        let header = EntryHeader {
            magic: ENTRY_MAGIC,
            format_version: 999,
            tessera_version: "0.1.0".to_string(),
            checksum: ContentHash::from_bytes(b"data"),
        };
        write_raw(&store, "k1", "work.graph", &header, b"data");
        assert!(store.read_file("k1", "work.graph").is_none());
    }

    #[test]
    fn read_checksum_mismatch_returns_none() {
        let (_dir, store) = make_store();
        let header = EntryHeader {
            magic: ENTRY_MAGIC,
            format_version: ENTRY_FORMAT_VERSION,
            tessera_version: "0.1.0".to_string(),
            checksum: ContentHash::from_bytes(b"data"),
        };
        write_raw(&store, "k1", "work.graph", &header, b"tampered");
        assert!(store.read_file("k1", "work.graph").is_none());
    }

    #[test]
    fn gc_removes_unlisted_entries_only() {
        let (dir, store) = make_store();
        store.write_file("live", "work.graph", b"a", "0.1.0").unwrap();
        store.write_file("stale", "work.graph", b"b", "0.1.0").unwrap();
        std::fs::write(dir.path().join("manifest.json"), "{}").unwrap();

        assert_eq!(store.gc(&["live"]).unwrap(), 1);
        assert!(store.read_file("live", "work.graph").is_some());
        assert!(!store.entry_dir("stale").exists());
        assert!(dir.path().join("manifest.json").exists());
    }

    #[test]
    fn gc_nonexistent_dir_returns_zero() {
        let dir = tempfile::tempdir().unwrap();
        let store = EntryStore::new(&dir.path().join("missing"));
        assert_eq!(store.gc(&[]).unwrap(), 0);
    }

    #[test]
    fn remove_is_idempotent() {
        let (_dir, store) = make_store();
        store.write_file("k1", "work.graph", b"a", "0.1.0").unwrap();
        store.remove("k1").unwrap();
        store.remove("k1").unwrap();
        assert!(!store.entry_dir("k1").exists());
    }
}
