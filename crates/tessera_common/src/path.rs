//! Hierarchical project identity paths such as `:`, `:app` or `:libs:core`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const SEPARATOR: char = ':';

/// An absolute, colon-separated path identifying a build or project.
///
/// The root path is `:`. Every other path starts with `:` and has one or more
/// non-empty segments. Cloning is cheap: the text is shared.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectPath(Arc<str>);

/// Error returned when a string is not a valid [`ProjectPath`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePathError {
    /// The path did not start with `:`.
    #[error("project path '{0}' must start with ':'")]
    NotAbsolute(String),
    /// The path contained an empty segment, e.g. `:a::b` or `:a:`.
    #[error("project path '{0}' contains an empty segment")]
    EmptySegment(String),
}

impl ProjectPath {
    /// Returns the root path `:`.
    pub fn root() -> Self {
        Self(Arc::from(":"))
    }

    /// Parses a path, validating its shape.
    pub fn parse(text: &str) -> Result<Self, ParsePathError> {
        let Some(rest) = text.strip_prefix(SEPARATOR) else {
            return Err(ParsePathError::NotAbsolute(text.to_string()));
        };
        if !rest.is_empty() && rest.split(SEPARATOR).any(str::is_empty) {
            return Err(ParsePathError::EmptySegment(text.to_string()));
        }
        Ok(Self(Arc::from(text)))
    }

    /// Returns the path of a direct child named `name`.
    pub fn child(&self, name: &str) -> Self {
        if self.is_root() {
            Self(Arc::from(format!(":{name}")))
        } else {
            Self(Arc::from(format!("{}:{name}", self.0)))
        }
    }

    /// Returns the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(SEPARATOR) {
            Some(0) | None => Some(Self::root()),
            Some(index) => Some(Self(Arc::from(&self.0[..index]))),
        }
    }

    /// Returns the last segment, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Iterates over the segments from outermost to innermost.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0[1..].split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Returns `true` if this is the root path `:`.
    pub fn is_root(&self) -> bool {
        &*self.0 == ":"
    }

    /// Returns the textual form of the path.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProjectPath({})", self.0)
    }
}

impl TryFrom<String> for ProjectPath {
    type Error = ParsePathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectPath> for String {
    fn from(path: ProjectPath) -> Self {
        path.0.to_string()
    }
}

impl std::str::FromStr for ProjectPath {
    type Err = ParsePathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_paths() {
        assert!(ProjectPath::parse(":").unwrap().is_root());
        let p = ProjectPath::parse(":libs:core").unwrap();
        assert_eq!(p.segments().collect::<Vec<_>>(), vec!["libs", "core"]);
        assert_eq!(p.name(), Some("core"));
    }

    #[test]
    fn parse_rejects_relative_and_empty_segments() {
        assert_eq!(
            ProjectPath::parse("app"),
            Err(ParsePathError::NotAbsolute("app".to_string()))
        );
        assert!(matches!(
            ProjectPath::parse(":a::b"),
            Err(ParsePathError::EmptySegment(_))
        ));
        assert!(matches!(
            ProjectPath::parse(":a:"),
            Err(ParsePathError::EmptySegment(_))
        ));
    }

    #[test]
    fn child_and_parent() {
        let root = ProjectPath::root();
        let app = root.child("app");
        assert_eq!(app.as_str(), ":app");
        let nested = app.child("feature");
        assert_eq!(nested.as_str(), ":app:feature");
        assert_eq!(nested.parent(), Some(app.clone()));
        assert_eq!(app.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
        assert_eq!(root.name(), None);
    }

    #[test]
    fn display_and_ordering() {
        let a = ProjectPath::parse(":a").unwrap();
        let b = ProjectPath::parse(":b").unwrap();
        assert!(a < b);
        assert_eq!(format!("{a}"), ":a");
        assert_eq!(format!("{a:?}"), "ProjectPath(:a)");
    }

    #[test]
    fn serde_roundtrip_validates() {
        let p = ProjectPath::parse(":a:b").unwrap();
        let json = serde_json::to_string(&p).unwrap();
        assert_eq!(json, "\":a:b\"");
        let back: ProjectPath = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
        assert!(serde_json::from_str::<ProjectPath>("\"a:b\"").is_err());
    }
}
