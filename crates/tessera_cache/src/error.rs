//! Error types for cache operations.

use std::path::PathBuf;
use tessera_fingerprint::FingerprintError;
use tessera_graph::CodecError;

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// Reading a cache entry is fail-safe: a missing, corrupt or incompatible
/// entry is a cache miss, not an error. These errors come from storing
/// entries and from decoding entries that passed validation.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The cache manifest could not be parsed as valid JSON.
    #[error("failed to parse cache manifest: {reason}")]
    ManifestParse {
        /// Description of the parse failure.
        reason: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// Capturing or replaying a fingerprint failed.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// Encoding or decoding the work graph failed.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = CacheError::io(
            "/tmp/cache/manifest.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        let msg = err.to_string();
        assert!(msg.contains("cache I/O error"));
        assert!(msg.contains("manifest.json"));
    }

    #[test]
    fn truncated_fingerprint_is_transparent() {
        let err: CacheError = FingerprintError::Truncated { records: 4 }.into();
        assert_eq!(err.to_string(), "fingerprint stream is truncated after 4 records");
    }
}
