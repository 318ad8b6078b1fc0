//! Fingerprint records.
//!
//! Every external input consulted while configuring becomes one immutable
//! [`FingerprintEntry`]. Records that only concern a single project are
//! wrapped in a [`ProjectSpecificEntry`] carrying the owning identity path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tessera_common::{ContentHash, ProjectPath};
use tessera_graph::Value;

/// Kind of a file-system entry at the time it was checked.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum FileSystemEntryKind {
    /// Nothing exists at the path.
    Missing,
    /// A regular file.
    File,
    /// A directory.
    Directory,
    /// Anything else, e.g. a socket or a broken link.
    Other,
}

impl FileSystemEntryKind {
    pub(crate) fn tag(self) -> u8 {
        match self {
            FileSystemEntryKind::Missing => 0,
            FileSystemEntryKind::File => 1,
            FileSystemEntryKind::Directory => 2,
            FileSystemEntryKind::Other => 3,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(FileSystemEntryKind::Missing),
            1 => Some(FileSystemEntryKind::File),
            2 => Some(FileSystemEntryKind::Directory),
            3 => Some(FileSystemEntryKind::Other),
            _ => None,
        }
    }
}

/// Outcome of a value source computation.
#[derive(Clone, Debug)]
pub enum ValueOutcome {
    /// The source produced a value.
    Success(Value),
    /// The source failed with the given message.
    Failure(String),
}

/// A value obtained from a value source during configuration.
#[derive(Clone, Debug)]
pub struct ValueSourceRecord {
    /// Fully qualified type of the value source.
    pub source_type: String,
    /// Human readable name of the source, used in reports.
    pub display_name: String,
    /// The parameters the source was computed with.
    pub parameters: Value,
    /// What the source produced.
    pub outcome: ValueOutcome,
}

/// An init script and the content hash it had when the build started.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InitScript {
    /// Path of the script.
    pub file: PathBuf,
    /// Content hash, or `None` if the script did not exist.
    pub hash: Option<ContentHash>,
}

/// Settings of the build environment that invalidate every cache entry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BuildEnvironment {
    /// The user home directory in effect.
    pub user_home: PathBuf,
    /// Fingerprint of the runtime executing the build.
    pub runtime_fingerprint: ContentHash,
    /// Whether inputs are ignored while storing.
    pub ignore_inputs_during_store: bool,
    /// Whether an instrumentation agent is attached.
    pub instrumentation_agent_used: bool,
    /// File system locations excluded from file system checks.
    pub ignored_file_system_check_inputs: Option<String>,
}

/// Which kind of changing dependency resolution produced a value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChangingValueKind {
    /// A dynamic version like `1.+` was resolved.
    DynamicDependencyVersion,
    /// A module marked as changing was resolved.
    ChangingModule,
}

/// A dependency resolution result that expires.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChangingValue {
    /// What kind of resolution it was.
    pub kind: ChangingValueKind,
    /// Display name of the resolved configuration or module.
    pub display_name: String,
    /// Expiry as milliseconds since the epoch.
    pub expire_at: u64,
}

/// A file input of a unit of work, reduced to plain files and file trees.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum SimplifiedFileInput {
    /// A single file, or an archive standing in for its contents.
    File(PathBuf),
    /// A directory tree filtered by include patterns.
    Tree {
        /// Root directory of the tree.
        root: PathBuf,
        /// Include patterns; empty means everything.
        patterns: Vec<String>,
    },
}

/// Where a build property was read.
#[derive(Clone, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub enum PropertyScope {
    /// Properties of the build with the given identity path.
    Build(String),
    /// Properties of a single project.
    Project(ProjectPath),
}

impl fmt::Display for PropertyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyScope::Build(path) => write!(f, "build `{path}`"),
            PropertyScope::Project(path) => write!(f, "project `{path}`"),
        }
    }
}

/// Identity of a project as written at the head of its records.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ProjectIdentity {
    /// Identity path, unique across the whole build tree.
    pub identity_path: ProjectPath,
    /// Identity path of the build the project belongs to.
    pub build_path: ProjectPath,
    /// Path of the project within its build.
    pub project_path: ProjectPath,
}

/// One captured input.
#[derive(Clone, Debug)]
pub enum FingerprintEntry {
    /// A file whose contents were read.
    InputFile {
        /// The file.
        file: PathBuf,
        /// Content hash, or `None` if the file did not exist.
        hash: Option<ContentHash>,
    },
    /// A path whose existence or kind was checked.
    InputFileSystemEntry {
        /// The path.
        file: PathBuf,
        /// Kind found at the path.
        kind: FileSystemEntryKind,
    },
    /// A directory whose children were listed.
    DirectoryChildren {
        /// The directory.
        file: PathBuf,
        /// Hash of the sorted child names, or `None` if missing.
        hash: Option<ContentHash>,
    },
    /// A value obtained from a value source.
    ValueSource(ValueSourceRecord),
    /// Init scripts of the build.
    InitScripts(Vec<InitScript>),
    /// A system property read without declaring it as an input.
    UndeclaredSystemProperty {
        /// Property key.
        key: String,
        /// Value at read time.
        value: Option<String>,
    },
    /// A system property set by build logic.
    SystemPropertyChanged {
        /// Property key.
        key: String,
        /// New value.
        value: Value,
    },
    /// A system property removed by build logic.
    SystemPropertyRemoved {
        /// Property key.
        key: String,
    },
    /// All system properties were cleared by build logic.
    SystemPropertiesCleared,
    /// An environment variable read without declaring it as an input.
    UndeclaredEnvironmentVariable {
        /// Variable name.
        key: String,
        /// Value at read time.
        value: Option<String>,
    },
    /// All system properties starting with a prefix were queried.
    SystemPropertiesPrefixedBy {
        /// The queried prefix.
        prefix: String,
        /// Matching keys and values. Keys changed by the build map to `None`.
        snapshot: BTreeMap<String, Option<String>>,
    },
    /// All environment variables starting with a prefix were queried.
    EnvironmentVariablesPrefixedBy {
        /// The queried prefix.
        prefix: String,
        /// Matching names and values.
        snapshot: BTreeMap<String, Option<String>>,
    },
    /// A dynamic or changing dependency resolution result.
    ChangingDependencyResolutionValue(ChangingValue),
    /// A script fetched over the network.
    RemoteScript {
        /// Location of the script.
        uri: String,
    },
    /// The build environment.
    BuildEnvironment(BuildEnvironment),
    /// A unit of work executed while configuring.
    WorkInputs {
        /// Display name of the work.
        work_display_name: String,
        /// The file inputs of the work.
        inputs: Vec<SimplifiedFileInput>,
        /// Fingerprint of the input files.
        fingerprint: ContentHash,
    },
    /// Project properties passed on the command line.
    StartParameterProjectProperties {
        /// Property names and values.
        snapshot: BTreeMap<String, String>,
    },
    /// A single build property read with fine-grained tracking.
    BuildProperty {
        /// Where the property was read.
        scope: PropertyScope,
        /// Property name.
        name: String,
        /// Value at read time.
        value: Option<String>,
    },
    /// Build properties starting with a prefix were queried.
    BuildPropertiesPrefixedBy {
        /// Where the properties were read.
        scope: PropertyScope,
        /// The queried prefix.
        prefix: String,
        /// Matching names and values.
        snapshot: BTreeMap<String, String>,
    },
    /// A properties file was loaded into a build or project.
    BuildPropertiesLoaded {
        /// What the properties were loaded for.
        scope: PropertyScope,
        /// Directory the properties were loaded from.
        directory: PathBuf,
    },
    /// A build root without a usable `buildSrc` directory.
    MissingBuildSrcDir {
        /// The expected `buildSrc` path.
        path: PathBuf,
    },
}

impl FingerprintEntry {
    /// Short name of the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FingerprintEntry::InputFile { .. } => "input-file",
            FingerprintEntry::InputFileSystemEntry { .. } => "input-file-system-entry",
            FingerprintEntry::DirectoryChildren { .. } => "directory-children",
            FingerprintEntry::ValueSource(_) => "value-source",
            FingerprintEntry::InitScripts(_) => "init-scripts",
            FingerprintEntry::UndeclaredSystemProperty { .. } => "undeclared-system-property",
            FingerprintEntry::SystemPropertyChanged { .. } => "system-property-changed",
            FingerprintEntry::SystemPropertyRemoved { .. } => "system-property-removed",
            FingerprintEntry::SystemPropertiesCleared => "system-properties-cleared",
            FingerprintEntry::UndeclaredEnvironmentVariable { .. } => {
                "undeclared-environment-variable"
            }
            FingerprintEntry::SystemPropertiesPrefixedBy { .. } => "system-properties-prefixed-by",
            FingerprintEntry::EnvironmentVariablesPrefixedBy { .. } => {
                "environment-variables-prefixed-by"
            }
            FingerprintEntry::ChangingDependencyResolutionValue(_) => "changing-value",
            FingerprintEntry::RemoteScript { .. } => "remote-script",
            FingerprintEntry::BuildEnvironment(_) => "build-environment",
            FingerprintEntry::WorkInputs { .. } => "work-inputs",
            FingerprintEntry::StartParameterProjectProperties { .. } => {
                "start-parameter-project-properties"
            }
            FingerprintEntry::BuildProperty { .. } => "build-property",
            FingerprintEntry::BuildPropertiesPrefixedBy { .. } => "build-properties-prefixed-by",
            FingerprintEntry::BuildPropertiesLoaded { .. } => "build-properties-loaded",
            FingerprintEntry::MissingBuildSrcDir { .. } => "missing-build-src-dir",
        }
    }
}

/// A record of the project stream.
#[derive(Clone, Debug)]
pub enum ProjectSpecificEntry {
    /// Written once when the sink of a project is created.
    ProjectIdentity(ProjectIdentity),
    /// An input captured while configuring `identity_path`.
    ProjectFingerprint {
        /// The owning project.
        identity_path: ProjectPath,
        /// The captured input.
        entry: FingerprintEntry,
    },
    /// `consumer` depends on the configured state of `target`.
    ProjectDependency {
        /// The depending project.
        consumer: ProjectPath,
        /// The project depended upon.
        target: ProjectPath,
    },
    /// `referrer` reached into the mutable model of `target`.
    CoupledProjects {
        /// The project holding the reference.
        referrer: ProjectPath,
        /// The referenced project.
        target: ProjectPath,
    },
}

impl ProjectSpecificEntry {
    /// The project whose record this is.
    pub fn owner(&self) -> &ProjectPath {
        match self {
            ProjectSpecificEntry::ProjectIdentity(identity) => &identity.identity_path,
            ProjectSpecificEntry::ProjectFingerprint { identity_path, .. } => identity_path,
            ProjectSpecificEntry::ProjectDependency { consumer, .. } => consumer,
            ProjectSpecificEntry::CoupledProjects { referrer, .. } => referrer,
        }
    }
}
