//! Links from problems to the user manual.

use serde::{Deserialize, Serialize};

const USER_MANUAL: &str = "https://docs.tessera.build/current/configuration_cache.html";

/// A section of the configuration cache chapter of the user manual.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum DocumentationSection {
    /// Types that cannot be stored in the cache.
    RequirementsDisallowedTypes,
    /// Reading system properties and environment variables at configuration time.
    RequirementsSysPropEnvVarRead,
    /// Running external processes at configuration time.
    RequirementsExternalProcess,
    /// Legacy serialization protocol features that are not emulated.
    NotYetImplementedJavaSerialization,
}

impl DocumentationSection {
    /// Returns the anchor of this section within the chapter.
    pub fn anchor(self) -> &'static str {
        match self {
            Self::RequirementsDisallowedTypes => "config_cache:requirements:disallowed_types",
            Self::RequirementsSysPropEnvVarRead => {
                "config_cache:requirements:reading_sys_props_and_env_vars"
            }
            Self::RequirementsExternalProcess => "config_cache:requirements:external_processes",
            Self::NotYetImplementedJavaSerialization => {
                "config_cache:not_yet_implemented:java_serialization"
            }
        }
    }

    /// Returns the full URL of this section.
    pub fn url(self) -> String {
        format!("{USER_MANUAL}#{}", self.anchor())
    }
}
