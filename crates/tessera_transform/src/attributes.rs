//! Variant attributes and capabilities.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// An immutable set of named attribute values describing an artifact
/// variant, such as `artifactType=jar`.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeContainer {
    attributes: BTreeMap<String, String>,
}

impl AttributeContainer {
    /// Creates an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Returns the value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Returns `true` if every attribute of `requested` has the same value
    /// here.
    pub fn matches(&self, requested: &AttributeContainer) -> bool {
        requested
            .attributes
            .iter()
            .all(|(name, value)| self.get(name) == Some(value.as_str()))
    }

    /// Returns this container with every attribute of `other` applied on top.
    pub fn merged_with(&self, other: &AttributeContainer) -> AttributeContainer {
        let mut attributes = self.attributes.clone();
        attributes.extend(other.attributes.clone());
        AttributeContainer { attributes }
    }

    /// Returns `true` if no attribute is set.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl fmt::Display for AttributeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.attributes.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for AttributeContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeContainer{self}")
    }
}

/// A capability provided by a component variant.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Capability {
    /// Group of the capability.
    pub group: String,
    /// Name of the capability.
    pub name: String,
    /// Version, if declared.
    pub version: Option<String>,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)?;
        if let Some(version) = &self.version {
            write!(f, ":{version}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_ignores_extra_attributes() {
        let variant = AttributeContainer::new()
            .with("artifactType", "jar")
            .with("usage", "runtime");
        assert!(variant.matches(&AttributeContainer::new().with("artifactType", "jar")));
        assert!(!variant.matches(&AttributeContainer::new().with("artifactType", "classes")));
        assert!(variant.matches(&AttributeContainer::new()));
    }

    #[test]
    fn merge_overrides() {
        let source = AttributeContainer::new()
            .with("artifactType", "jar")
            .with("usage", "runtime");
        let merged = source.merged_with(&AttributeContainer::new().with("artifactType", "classes"));
        assert_eq!(merged.to_string(), "{artifactType=classes, usage=runtime}");
    }

    #[test]
    fn capability_display() {
        let capability = Capability {
            group: "org.example".into(),
            name: "lib".into(),
            version: Some("1.0".into()),
        };
        assert_eq!(capability.to_string(), "org.example:lib:1.0");
    }
}
