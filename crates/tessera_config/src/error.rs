//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// Errors that can occur when loading or validating a `tessera.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// An option has a value outside its allowed range.
    #[error("invalid value for `configuration-cache.{key}`: {reason}")]
    InvalidOption {
        /// Key of the option, relative to the `configuration-cache` table.
        key: &'static str,
        /// What the value must satisfy.
        reason: &'static str,
    },
}
