//! Configuration types deserialized from `tessera.toml`.

use serde::Deserialize;
use std::path::PathBuf;

/// The top-level configuration file.
///
/// Only the `[configuration-cache]` table is read here; other tables belong
/// to other parts of the build tool and are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct TesseraConfig {
    /// Configuration cache settings.
    #[serde(default, rename = "configuration-cache")]
    pub configuration_cache: CacheOptions,
}

/// Settings controlling what the configuration cache captures and how it
/// encodes the work graph.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheOptions {
    /// Record each build property read individually instead of fingerprinting
    /// the whole property set.
    pub fine_grained_property_tracking: bool,
    /// Store per-project intermediate models and the couplings between projects.
    pub cache_intermediate_models: bool,
    /// Treat tooling model requests between projects as project dependencies.
    pub model_as_project_dependency: bool,
    /// Store the entry even though some inputs are ignored.
    pub ignore_inputs_during_store: bool,
    /// File system paths whose checks are excluded from the fingerprint.
    pub ignored_file_system_check_inputs: Option<String>,
    /// Number of problems kept in full before only counting them.
    pub max_problems: usize,
    /// Bean nesting depth after which payloads are written iteratively.
    pub max_nesting_depth: usize,
    /// Write repeated strings once per stream.
    pub deduplicate_strings: bool,
    /// Where cache entries live.
    pub store: StoreOptions,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            fine_grained_property_tracking: true,
            cache_intermediate_models: false,
            model_as_project_dependency: false,
            ignore_inputs_during_store: false,
            ignored_file_system_check_inputs: None,
            max_problems: 512,
            max_nesting_depth: 64,
            deduplicate_strings: true,
            store: StoreOptions::default(),
        }
    }
}

/// Location of the on-disk cache.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreOptions {
    /// Cache directory, relative to the build root unless absolute.
    pub directory: PathBuf,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(".tessera/configuration-cache"),
        }
    }
}
