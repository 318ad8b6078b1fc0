//! Parsing and validation of `tessera.toml` configuration cache options.
//!
//! This crate reads the `[configuration-cache]` table of the build
//! configuration file and produces strongly-typed [`CacheOptions`] consumed by
//! the fingerprint writer, the graph codecs and the on-disk cache store.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use types::*;
