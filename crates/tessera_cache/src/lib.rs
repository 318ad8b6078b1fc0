//! On-disk configuration cache.
//!
//! This crate stores what configuring a build produced, so a later
//! invocation of the same tasks can skip configuration. An entry holds the
//! two fingerprint streams captured by a [`FingerprintCapture`] and the
//! encoded work graph. A loaded entry replays both streams, grouping the
//! project records by project, and decodes the work graph against the
//! bindings of the loading build.
//!
//! All reads are fail-safe: corrupt files, version mismatches and missing
//! entries are cache misses rather than errors.

#![warn(missing_docs)]

pub mod capture;
pub mod error;
pub mod hasher;
pub mod host;
pub mod manifest;
pub mod repository;
pub mod store;

pub use capture::{CapturedFingerprint, FingerprintCapture};
pub use error::{CacheError, CacheResult};
pub use hasher::FileSystemHasher;
pub use host::LocalFileSystemHost;
pub use manifest::{CacheManifest, EntryRecord};
pub use repository::{encode_work_graph, CachedEntry, ConfigurationCacheRepository};
pub use store::EntryStore;
