//! Property traces locating a value within the build or the object graph.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of member a [`PropertyTrace::Property`] names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum PropertyKind {
    /// A field of a serialized object.
    Field,
    /// A declared input of a unit of work.
    InputProperty,
    /// A declared output of a unit of work.
    OutputProperty,
    /// An entry of a collection or map.
    Element,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKind::Field => write!(f, "field"),
            PropertyKind::InputProperty => write!(f, "input property"),
            PropertyKind::OutputProperty => write!(f, "output property"),
            PropertyKind::Element => write!(f, "element"),
        }
    }
}

/// A chain of locations, innermost first, describing where a value was reached.
///
/// Traces are cheap to extend: codecs push a new innermost link while they
/// descend into a value and drop it on the way out.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum PropertyTrace {
    /// Nothing is known about the location.
    #[default]
    Unknown,
    /// Internal machinery rather than user build logic.
    Runtime,
    /// A build script or plugin, described by its display name.
    BuildLogic(String),
    /// A project, identified by its identity path.
    Project(String),
    /// A task of the given type.
    Task {
        /// Fully qualified task type name.
        type_name: String,
        /// Identity path of the task.
        path: String,
    },
    /// An object of the given type, reached from `owner`.
    Bean {
        /// Runtime type name of the object.
        type_name: String,
        /// Where the object was reached from.
        owner: Box<PropertyTrace>,
    },
    /// A named member of `owner`.
    Property {
        /// Kind of member.
        kind: PropertyKind,
        /// Member name.
        name: String,
        /// The object the member belongs to.
        owner: Box<PropertyTrace>,
    },
    /// A system property accessed from `owner`.
    SystemProperty {
        /// Property key.
        name: String,
        /// Where the property was accessed from.
        owner: Box<PropertyTrace>,
    },
}

impl PropertyTrace {
    /// Returns a trace for a bean of type `type_name` reached from `self`.
    pub fn bean(&self, type_name: impl Into<String>) -> Self {
        PropertyTrace::Bean {
            type_name: type_name.into(),
            owner: Box::new(self.clone()),
        }
    }

    /// Returns a trace for the member `name` of `self`.
    pub fn property(&self, kind: PropertyKind, name: impl Into<String>) -> Self {
        PropertyTrace::Property {
            kind,
            name: name.into(),
            owner: Box::new(self.clone()),
        }
    }

    /// Shorthand for `property(PropertyKind::Field, name)`.
    pub fn field(&self, name: impl Into<String>) -> Self {
        self.property(PropertyKind::Field, name)
    }

    /// Returns the next outer link, if any.
    pub fn owner(&self) -> Option<&PropertyTrace> {
        match self {
            PropertyTrace::Bean { owner, .. }
            | PropertyTrace::Property { owner, .. }
            | PropertyTrace::SystemProperty { owner, .. } => Some(owner),
            _ => None,
        }
    }

    /// Iterates over the chain from innermost to outermost.
    pub fn sequence(&self) -> impl Iterator<Item = &PropertyTrace> {
        std::iter::successors(Some(self), |trace| trace.owner())
    }

    /// Returns the outermost link of the chain.
    pub fn root(&self) -> &PropertyTrace {
        self.sequence().last().unwrap_or(self)
    }
}

impl fmt::Display for PropertyTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyTrace::Unknown => write!(f, "unknown location"),
            PropertyTrace::Runtime => write!(f, "Tessera runtime"),
            PropertyTrace::BuildLogic(source) => write!(f, "{source}"),
            PropertyTrace::Project(path) => write!(f, "project `{path}`"),
            PropertyTrace::Task { type_name, path } => {
                write!(f, "task `{path}` of type `{type_name}`")
            }
            PropertyTrace::Bean { type_name, owner } => {
                write!(f, "`{type_name}` bean found in {owner}")
            }
            PropertyTrace::Property { kind, name, owner } => match owner.as_ref() {
                PropertyTrace::Bean { type_name, owner } => {
                    write!(f, "{kind} `{name}` of `{type_name}` bean found in {owner}")
                }
                owner => write!(f, "{kind} `{name}` of {owner}"),
            },
            PropertyTrace::SystemProperty { name, owner } => {
                write!(f, "system property `{name}` of {owner}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> PropertyTrace {
        PropertyTrace::Task {
            type_name: "CompileTask".to_string(),
            path: ":app:compile".to_string(),
        }
    }

    #[test]
    fn display_nested_field() {
        let trace = task().field("options").bean("Options").field("value");
        assert_eq!(
            trace.to_string(),
            "field `value` of `Options` bean found in field `options` of task `:app:compile` of type `CompileTask`"
        );
    }

    #[test]
    fn sequence_walks_to_root() {
        let trace = task().field("options").bean("Options");
        assert_eq!(trace.sequence().count(), 3);
        assert_eq!(trace.root(), &task());
    }

    #[test]
    fn unknown_is_default() {
        assert_eq!(PropertyTrace::default(), PropertyTrace::Unknown);
        assert!(PropertyTrace::Unknown.owner().is_none());
        assert_eq!(PropertyTrace::Runtime.to_string(), "Tessera runtime");
    }
}
