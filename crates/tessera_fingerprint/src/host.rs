//! The build services the fingerprint writer consults.

use crate::entry::{FileSystemEntryKind, SimplifiedFileInput};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tessera_common::ContentHash;
use tessera_diagnostics::PropertyTrace;
use tessera_graph::Value;

/// Environment, file system and location services of the running build.
///
/// Implementations must be safe to call from any configuring thread.
pub trait FingerprintHost: Send + Sync {
    /// The user home directory of the build.
    fn user_home(&self) -> PathBuf;

    /// All init scripts applied to the build, in application order.
    fn init_scripts(&self) -> Vec<PathBuf>;

    /// Start of the build in milliseconds since the epoch.
    fn build_start_time(&self) -> u64;

    /// Project properties given on the command line.
    fn start_parameter_properties(&self) -> BTreeMap<String, String>;

    /// Fingerprint of the runtime executing the build.
    fn runtime_fingerprint(&self) -> ContentHash;

    /// Whether an instrumentation agent is attached to the runtime.
    fn instrumentation_agent_used(&self) -> bool {
        false
    }

    /// Root directories of every build in the build tree.
    fn build_root_dirs(&self) -> Vec<PathBuf>;

    /// Content hash of `file`, or `None` if it does not exist.
    fn hash_of(&self, file: &Path) -> Option<ContentHash>;

    /// Hash of the sorted child names of `dir`, or `None` if it is not a
    /// directory.
    fn hash_of_directory_children(&self, dir: &Path) -> Option<ContentHash>;

    /// Kind of the entry at `path`.
    fn entry_kind(&self, path: &Path) -> FileSystemEntryKind;

    /// Name of `file` as shown in reports, usually relative to the root.
    fn display_name_of(&self, file: &Path) -> String;

    /// Fingerprint of a simplified file collection.
    fn fingerprint_of(&self, inputs: &[SimplifiedFileInput]) -> ContentHash;

    /// Location of the build logic currently configuring, optionally
    /// narrowed to `consumer`.
    fn location(&self, consumer: Option<&str>) -> PropertyTrace;

    /// Whether the calling thread is executing a task action or transform.
    fn is_executing_work(&self) -> bool;

    /// Current value of the system property `key`.
    fn system_property(&self, key: &str) -> Option<String>;

    /// Whether build logic changed `key` before it was read.
    fn is_system_property_mutated(&self, _key: &str) -> bool {
        false
    }

    /// Whether `key` was loaded from a properties file and never changed.
    fn is_system_property_loaded(&self, _key: &str) -> bool {
        false
    }

    /// The value `key` had before it was loaded from a properties file.
    fn loaded_property_old_value(&self, key: &str) -> Option<String> {
        self.system_property(key)
    }

    /// Whether `dir` holds a `buildSrc` build.
    fn is_valid_build_src(&self, dir: &Path) -> bool {
        dir.is_dir()
    }
}

/// An input kind whose capture the work filter can suppress.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum InputKind {
    /// A file opened for reading.
    FileOpened,
    /// A file collection resolved by build logic.
    FileCollection,
    /// A directory listing.
    DirectoryChildren,
    /// An existence or kind check.
    FileSystemEntry,
    /// A system property read.
    SystemProperty,
    /// An environment variable read.
    EnvironmentVariable,
}

impl InputKind {
    /// The kinds ignored while work executes by default.
    ///
    /// Files touched by task actions are temporary or outputs; they belong in
    /// the declared inputs of the task, not in the fingerprint.
    pub fn ignored_during_work(self) -> bool {
        matches!(
            self,
            InputKind::FileOpened
                | InputKind::FileCollection
                | InputKind::DirectoryChildren
                | InputKind::FileSystemEntry
        )
    }
}

/// One element of an observed file collection.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FileCollectionElement {
    /// A plain file.
    File(PathBuf),
    /// A directory tree with include patterns.
    Tree {
        /// Root directory.
        root: PathBuf,
        /// Include patterns.
        patterns: Vec<String>,
    },
    /// A tree mirroring the contents of an archive file.
    ArchiveTree {
        /// The archive.
        archive: PathBuf,
    },
}

impl FileCollectionElement {
    /// Removes dynamic behavior, keeping only files and plain trees.
    pub fn simplify(&self) -> SimplifiedFileInput {
        match self {
            FileCollectionElement::File(file) => SimplifiedFileInput::File(file.clone()),
            FileCollectionElement::Tree { root, patterns } => SimplifiedFileInput::Tree {
                root: root.clone(),
                patterns: patterns.clone(),
            },
            FileCollectionElement::ArchiveTree { archive } => {
                SimplifiedFileInput::File(archive.clone())
            }
        }
    }
}

/// How a unit of work treats an input property.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum InputBehavior {
    /// Changes cause a full rebuild.
    NonIncremental,
    /// Changes are processed incrementally.
    Incremental,
    /// Primary input of an artifact transform.
    Primary,
}

/// A file input property of a unit of work.
#[derive(Clone, Debug)]
pub struct WorkInputProperty {
    /// Property name.
    pub name: String,
    /// How the work treats the property.
    pub behavior: InputBehavior,
    /// Files of the property.
    pub files: Vec<FileCollectionElement>,
}

/// Parameters of an obtained value source, by source kind.
#[derive(Clone, Debug)]
pub enum ValueSourceParameters {
    /// Contents of a file.
    FileContent {
        /// The file, if one was configured.
        file: Option<PathBuf>,
    },
    /// A build property. Build properties are already an input.
    BuildProperty {
        /// Property name.
        name: String,
    },
    /// A single system property.
    SystemProperty {
        /// Property key.
        key: String,
    },
    /// All system properties with a prefix.
    SystemPropertiesPrefixedBy {
        /// The prefix.
        prefix: String,
    },
    /// A single environment variable.
    EnvironmentVariable {
        /// Variable name.
        name: String,
    },
    /// All environment variables with a prefix.
    EnvironmentVariablesPrefixedBy {
        /// The prefix.
        prefix: String,
    },
    /// Output of an external process.
    ProcessOutput {
        /// The executable.
        executable: String,
        /// Its arguments.
        arguments: Vec<String>,
    },
    /// A user-defined source with arbitrary parameters.
    Custom(Value),
}

/// What a value source computation produced, as reported to the writer.
#[derive(Clone, Debug)]
pub struct ObtainedValue {
    /// Fully qualified type of the source.
    pub source_type: String,
    /// Display name of the source, if it has one.
    pub display_name: Option<String>,
    /// The parameters it was computed with.
    pub parameters: ValueSourceParameters,
    /// The computed value, or the failure message.
    pub value: Result<Value, String>,
}

impl ObtainedValue {
    /// Simple name of the source type.
    pub fn simple_type_name(&self) -> &str {
        self.source_type
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(&self.source_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_work_filter() {
        assert!(InputKind::FileOpened.ignored_during_work());
        assert!(InputKind::DirectoryChildren.ignored_during_work());
        assert!(!InputKind::SystemProperty.ignored_during_work());
        assert!(!InputKind::EnvironmentVariable.ignored_during_work());
    }

    #[test]
    fn archive_trees_simplify_to_files() {
        let element = FileCollectionElement::ArchiveTree {
            archive: PathBuf::from("libs/a.zip"),
        };
        assert_eq!(
            element.simplify(),
            SimplifiedFileInput::File(PathBuf::from("libs/a.zip"))
        );
    }

    #[test]
    fn simple_type_name() {
        let value = ObtainedValue {
            source_type: "org.example.GitVersion".into(),
            display_name: None,
            parameters: ValueSourceParameters::Custom(None),
            value: Ok(None),
        };
        assert_eq!(value.simple_type_name(), "GitVersion");
    }
}
