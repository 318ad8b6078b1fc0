//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::{CacheOptions, TesseraConfig};
use std::path::Path;

/// Name of the configuration file looked up in the build root.
pub const CONFIG_FILE: &str = "tessera.toml";

/// Loads and validates the cache options from a build root directory.
///
/// A missing `tessera.toml` yields the default options.
pub fn load_config(build_root: &Path) -> Result<CacheOptions, ConfigError> {
    let config_path = build_root.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(CacheOptions::default());
    }
    let content = std::fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
        path: config_path.clone(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates cache options from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<CacheOptions, ConfigError> {
    let config: TesseraConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_options(&config.configuration_cache)?;
    Ok(config.configuration_cache)
}

/// Validates that configuration values are consistent.
fn validate_options(options: &CacheOptions) -> Result<(), ConfigError> {
    let invalid = |key, reason| Err(ConfigError::InvalidOption { key, reason });
    if options.max_problems == 0 {
        return invalid("max-problems", "must be greater than zero");
    }
    if options.max_nesting_depth == 0 {
        return invalid("max-nesting-depth", "must be greater than zero");
    }
    if options.store.directory.as_os_str().is_empty() {
        return invalid("store.directory", "must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_file_uses_defaults() {
        let options = load_config_from_str("").unwrap();
        assert_eq!(options, CacheOptions::default());
        assert!(options.fine_grained_property_tracking);
        assert_eq!(options.max_problems, 512);
        assert_eq!(options.max_nesting_depth, 64);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[project]
name = "ignored by the cache"

[configuration-cache]
fine-grained-property-tracking = false
cache-intermediate-models = true
model-as-project-dependency = true
ignore-inputs-during-store = true
ignored-file-system-check-inputs = "/tmp/**"
max-problems = 10
max-nesting-depth = 16
deduplicate-strings = false

[configuration-cache.store]
directory = "/var/cache/tessera"
"#;
        let options = load_config_from_str(toml).unwrap();
        assert!(!options.fine_grained_property_tracking);
        assert!(options.cache_intermediate_models);
        assert!(options.model_as_project_dependency);
        assert!(options.ignore_inputs_during_store);
        assert_eq!(
            options.ignored_file_system_check_inputs.as_deref(),
            Some("/tmp/**")
        );
        assert_eq!(options.max_problems, 10);
        assert_eq!(options.max_nesting_depth, 16);
        assert!(!options.deduplicate_strings);
        assert_eq!(options.store.directory, PathBuf::from("/var/cache/tessera"));
    }

    #[test]
    fn zero_max_problems_rejected() {
        let toml = "[configuration-cache]\nmax-problems = 0\n";
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn zero_nesting_depth_rejected() {
        let toml = "[configuration-cache]\nmax-nesting-depth = 0\n";
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            load_config_from_str("[configuration-cache\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let toml = "[configuration-cache]\nmax-problems = \"many\"\n";
        assert!(matches!(
            load_config_from_str(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), CacheOptions::default());

        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[configuration-cache]\ncache-intermediate-models = true\n",
        )
        .unwrap();
        assert!(load_config(dir.path()).unwrap().cache_intermediate_models);
    }
}
