//! Stream codecs for fingerprint records.
//!
//! Each record starts with a one byte kind tag. Nested graph values
//! (value source parameters and results, changed system property values)
//! go through the bindings of the surrounding context.

use crate::entry::{
    BuildEnvironment, ChangingValue, ChangingValueKind, FileSystemEntryKind, FingerprintEntry,
    InitScript, ProjectIdentity, ProjectSpecificEntry, PropertyScope, ValueOutcome,
    ValueSourceRecord,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tessera_common::{ContentHash, ProjectPath};
use tessera_graph::{Codec, CodecError, CodecResult, ReadContext, WriteContext};

const INPUT_FILE: u8 = 1;
const INPUT_FILE_SYSTEM_ENTRY: u8 = 2;
const DIRECTORY_CHILDREN: u8 = 3;
const VALUE_SOURCE: u8 = 4;
const INIT_SCRIPTS: u8 = 5;
const UNDECLARED_SYSTEM_PROPERTY: u8 = 6;
const SYSTEM_PROPERTY_CHANGED: u8 = 7;
const SYSTEM_PROPERTY_REMOVED: u8 = 8;
const SYSTEM_PROPERTIES_CLEARED: u8 = 9;
const UNDECLARED_ENVIRONMENT_VARIABLE: u8 = 10;
const SYSTEM_PROPERTIES_PREFIXED_BY: u8 = 11;
const ENVIRONMENT_VARIABLES_PREFIXED_BY: u8 = 12;
const CHANGING_VALUE: u8 = 13;
const REMOTE_SCRIPT: u8 = 14;
const BUILD_ENVIRONMENT: u8 = 15;
const WORK_INPUTS: u8 = 16;
const START_PARAMETER_PROJECT_PROPERTIES: u8 = 17;
const BUILD_PROPERTY: u8 = 18;
const BUILD_PROPERTIES_PREFIXED_BY: u8 = 19;
const BUILD_PROPERTIES_LOADED: u8 = 20;
const MISSING_BUILD_SRC_DIR: u8 = 21;

const PROJECT_IDENTITY: u8 = 1;
const PROJECT_FINGERPRINT: u8 = 2;
const PROJECT_DEPENDENCY: u8 = 3;
const COUPLED_PROJECTS: u8 = 4;

/// Codec for records of the build-wide stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct FingerprintEntryCodec;

/// Codec for records of the project stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectEntryCodec;

impl Codec<FingerprintEntry> for FingerprintEntryCodec {
    fn encode(&self, ctx: &mut WriteContext, entry: &FingerprintEntry) -> CodecResult<()> {
        match entry {
            FingerprintEntry::InputFile { file, hash } => {
                ctx.write_u8(INPUT_FILE)?;
                write_path(ctx, file)?;
                write_optional_hash(ctx, hash.as_ref())
            }
            FingerprintEntry::InputFileSystemEntry { file, kind } => {
                ctx.write_u8(INPUT_FILE_SYSTEM_ENTRY)?;
                write_path(ctx, file)?;
                ctx.write_u8(kind.tag())
            }
            FingerprintEntry::DirectoryChildren { file, hash } => {
                ctx.write_u8(DIRECTORY_CHILDREN)?;
                write_path(ctx, file)?;
                write_optional_hash(ctx, hash.as_ref())
            }
            FingerprintEntry::ValueSource(record) => {
                ctx.write_u8(VALUE_SOURCE)?;
                write_value_source(ctx, record)
            }
            FingerprintEntry::InitScripts(scripts) => {
                ctx.write_u8(INIT_SCRIPTS)?;
                ctx.write_len(scripts.len())?;
                for script in scripts {
                    write_path(ctx, &script.file)?;
                    write_optional_hash(ctx, script.hash.as_ref())?;
                }
                Ok(())
            }
            FingerprintEntry::UndeclaredSystemProperty { key, value } => {
                ctx.write_u8(UNDECLARED_SYSTEM_PROPERTY)?;
                ctx.write_string(key)?;
                ctx.write_optional_string(value.as_deref())
            }
            FingerprintEntry::SystemPropertyChanged { key, value } => {
                ctx.write_u8(SYSTEM_PROPERTY_CHANGED)?;
                ctx.write_string(key)?;
                ctx.write_value(value)
            }
            FingerprintEntry::SystemPropertyRemoved { key } => {
                ctx.write_u8(SYSTEM_PROPERTY_REMOVED)?;
                ctx.write_string(key)
            }
            FingerprintEntry::SystemPropertiesCleared => ctx.write_u8(SYSTEM_PROPERTIES_CLEARED),
            FingerprintEntry::UndeclaredEnvironmentVariable { key, value } => {
                ctx.write_u8(UNDECLARED_ENVIRONMENT_VARIABLE)?;
                ctx.write_string(key)?;
                ctx.write_optional_string(value.as_deref())
            }
            FingerprintEntry::SystemPropertiesPrefixedBy { prefix, snapshot } => {
                ctx.write_u8(SYSTEM_PROPERTIES_PREFIXED_BY)?;
                ctx.write_string(prefix)?;
                write_optional_snapshot(ctx, snapshot)
            }
            FingerprintEntry::EnvironmentVariablesPrefixedBy { prefix, snapshot } => {
                ctx.write_u8(ENVIRONMENT_VARIABLES_PREFIXED_BY)?;
                ctx.write_string(prefix)?;
                write_optional_snapshot(ctx, snapshot)
            }
            FingerprintEntry::ChangingDependencyResolutionValue(value) => {
                ctx.write_u8(CHANGING_VALUE)?;
                ctx.write_u8(match value.kind {
                    ChangingValueKind::DynamicDependencyVersion => 0,
                    ChangingValueKind::ChangingModule => 1,
                })?;
                ctx.write_string(&value.display_name)?;
                ctx.write_u64(value.expire_at)
            }
            FingerprintEntry::RemoteScript { uri } => {
                ctx.write_u8(REMOTE_SCRIPT)?;
                ctx.write_string(uri)
            }
            FingerprintEntry::BuildEnvironment(env) => {
                ctx.write_u8(BUILD_ENVIRONMENT)?;
                write_path(ctx, &env.user_home)?;
                ctx.write_hash(&env.runtime_fingerprint)?;
                ctx.write_bool(env.ignore_inputs_during_store)?;
                ctx.write_bool(env.instrumentation_agent_used)?;
                ctx.write_optional_string(env.ignored_file_system_check_inputs.as_deref())
            }
            FingerprintEntry::WorkInputs {
                work_display_name,
                inputs,
                fingerprint,
            } => {
                ctx.write_u8(WORK_INPUTS)?;
                ctx.write_string(work_display_name)?;
                ctx.write_serde(inputs)?;
                ctx.write_hash(fingerprint)
            }
            FingerprintEntry::StartParameterProjectProperties { snapshot } => {
                ctx.write_u8(START_PARAMETER_PROJECT_PROPERTIES)?;
                write_snapshot(ctx, snapshot)
            }
            FingerprintEntry::BuildProperty { scope, name, value } => {
                ctx.write_u8(BUILD_PROPERTY)?;
                write_scope(ctx, scope)?;
                ctx.write_string(name)?;
                ctx.write_optional_string(value.as_deref())
            }
            FingerprintEntry::BuildPropertiesPrefixedBy {
                scope,
                prefix,
                snapshot,
            } => {
                ctx.write_u8(BUILD_PROPERTIES_PREFIXED_BY)?;
                write_scope(ctx, scope)?;
                ctx.write_string(prefix)?;
                write_snapshot(ctx, snapshot)
            }
            FingerprintEntry::BuildPropertiesLoaded { scope, directory } => {
                ctx.write_u8(BUILD_PROPERTIES_LOADED)?;
                write_scope(ctx, scope)?;
                write_path(ctx, directory)
            }
            FingerprintEntry::MissingBuildSrcDir { path } => {
                ctx.write_u8(MISSING_BUILD_SRC_DIR)?;
                write_path(ctx, path)
            }
        }
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<FingerprintEntry> {
        let tag = ctx.read_u8()?;
        let entry = match tag {
            INPUT_FILE => FingerprintEntry::InputFile {
                file: read_path(ctx)?,
                hash: read_optional_hash(ctx)?,
            },
            INPUT_FILE_SYSTEM_ENTRY => {
                let file = read_path(ctx)?;
                let kind_tag = ctx.read_u8()?;
                let kind = FileSystemEntryKind::from_tag(kind_tag)
                    .ok_or_else(|| malformed(format!("invalid file system entry kind {kind_tag}")))?;
                FingerprintEntry::InputFileSystemEntry { file, kind }
            }
            DIRECTORY_CHILDREN => FingerprintEntry::DirectoryChildren {
                file: read_path(ctx)?,
                hash: read_optional_hash(ctx)?,
            },
            VALUE_SOURCE => FingerprintEntry::ValueSource(read_value_source(ctx)?),
            INIT_SCRIPTS => {
                let len = ctx.read_len()?;
                let mut scripts = Vec::with_capacity(len.min(1024));
                for _ in 0..len {
                    scripts.push(InitScript {
                        file: read_path(ctx)?,
                        hash: read_optional_hash(ctx)?,
                    });
                }
                FingerprintEntry::InitScripts(scripts)
            }
            UNDECLARED_SYSTEM_PROPERTY => FingerprintEntry::UndeclaredSystemProperty {
                key: ctx.read_string()?,
                value: ctx.read_optional_string()?,
            },
            SYSTEM_PROPERTY_CHANGED => FingerprintEntry::SystemPropertyChanged {
                key: ctx.read_string()?,
                value: ctx.read_value()?,
            },
            SYSTEM_PROPERTY_REMOVED => FingerprintEntry::SystemPropertyRemoved {
                key: ctx.read_string()?,
            },
            SYSTEM_PROPERTIES_CLEARED => FingerprintEntry::SystemPropertiesCleared,
            UNDECLARED_ENVIRONMENT_VARIABLE => FingerprintEntry::UndeclaredEnvironmentVariable {
                key: ctx.read_string()?,
                value: ctx.read_optional_string()?,
            },
            SYSTEM_PROPERTIES_PREFIXED_BY => FingerprintEntry::SystemPropertiesPrefixedBy {
                prefix: ctx.read_string()?,
                snapshot: read_optional_snapshot(ctx)?,
            },
            ENVIRONMENT_VARIABLES_PREFIXED_BY => FingerprintEntry::EnvironmentVariablesPrefixedBy {
                prefix: ctx.read_string()?,
                snapshot: read_optional_snapshot(ctx)?,
            },
            CHANGING_VALUE => {
                let kind = match ctx.read_u8()? {
                    0 => ChangingValueKind::DynamicDependencyVersion,
                    1 => ChangingValueKind::ChangingModule,
                    other => return Err(malformed(format!("invalid changing value kind {other}"))),
                };
                FingerprintEntry::ChangingDependencyResolutionValue(ChangingValue {
                    kind,
                    display_name: ctx.read_string()?,
                    expire_at: ctx.read_u64()?,
                })
            }
            REMOTE_SCRIPT => FingerprintEntry::RemoteScript {
                uri: ctx.read_string()?,
            },
            BUILD_ENVIRONMENT => FingerprintEntry::BuildEnvironment(BuildEnvironment {
                user_home: read_path(ctx)?,
                runtime_fingerprint: ctx.read_hash()?,
                ignore_inputs_during_store: ctx.read_bool()?,
                instrumentation_agent_used: ctx.read_bool()?,
                ignored_file_system_check_inputs: ctx.read_optional_string()?,
            }),
            WORK_INPUTS => FingerprintEntry::WorkInputs {
                work_display_name: ctx.read_string()?,
                inputs: ctx.read_serde()?,
                fingerprint: ctx.read_hash()?,
            },
            START_PARAMETER_PROJECT_PROPERTIES => {
                FingerprintEntry::StartParameterProjectProperties {
                    snapshot: read_snapshot(ctx)?,
                }
            }
            BUILD_PROPERTY => FingerprintEntry::BuildProperty {
                scope: read_scope(ctx)?,
                name: ctx.read_string()?,
                value: ctx.read_optional_string()?,
            },
            BUILD_PROPERTIES_PREFIXED_BY => FingerprintEntry::BuildPropertiesPrefixedBy {
                scope: read_scope(ctx)?,
                prefix: ctx.read_string()?,
                snapshot: read_snapshot(ctx)?,
            },
            BUILD_PROPERTIES_LOADED => FingerprintEntry::BuildPropertiesLoaded {
                scope: read_scope(ctx)?,
                directory: read_path(ctx)?,
            },
            MISSING_BUILD_SRC_DIR => FingerprintEntry::MissingBuildSrcDir {
                path: read_path(ctx)?,
            },
            other => return Err(malformed(format!("unknown fingerprint entry tag {other}"))),
        };
        Ok(entry)
    }
}

impl Codec<ProjectSpecificEntry> for ProjectEntryCodec {
    fn encode(&self, ctx: &mut WriteContext, entry: &ProjectSpecificEntry) -> CodecResult<()> {
        match entry {
            ProjectSpecificEntry::ProjectIdentity(identity) => {
                ctx.write_u8(PROJECT_IDENTITY)?;
                write_project_path(ctx, &identity.identity_path)?;
                write_project_path(ctx, &identity.build_path)?;
                write_project_path(ctx, &identity.project_path)
            }
            ProjectSpecificEntry::ProjectFingerprint {
                identity_path,
                entry,
            } => {
                ctx.write_u8(PROJECT_FINGERPRINT)?;
                write_project_path(ctx, identity_path)?;
                FingerprintEntryCodec.encode(ctx, entry)
            }
            ProjectSpecificEntry::ProjectDependency { consumer, target } => {
                ctx.write_u8(PROJECT_DEPENDENCY)?;
                write_project_path(ctx, consumer)?;
                write_project_path(ctx, target)
            }
            ProjectSpecificEntry::CoupledProjects { referrer, target } => {
                ctx.write_u8(COUPLED_PROJECTS)?;
                write_project_path(ctx, referrer)?;
                write_project_path(ctx, target)
            }
        }
    }

    fn decode(&self, ctx: &mut ReadContext) -> CodecResult<ProjectSpecificEntry> {
        let entry = match ctx.read_u8()? {
            PROJECT_IDENTITY => ProjectSpecificEntry::ProjectIdentity(ProjectIdentity {
                identity_path: read_project_path(ctx)?,
                build_path: read_project_path(ctx)?,
                project_path: read_project_path(ctx)?,
            }),
            PROJECT_FINGERPRINT => ProjectSpecificEntry::ProjectFingerprint {
                identity_path: read_project_path(ctx)?,
                entry: FingerprintEntryCodec.decode(ctx)?,
            },
            PROJECT_DEPENDENCY => ProjectSpecificEntry::ProjectDependency {
                consumer: read_project_path(ctx)?,
                target: read_project_path(ctx)?,
            },
            COUPLED_PROJECTS => ProjectSpecificEntry::CoupledProjects {
                referrer: read_project_path(ctx)?,
                target: read_project_path(ctx)?,
            },
            other => return Err(malformed(format!("unknown project entry tag {other}"))),
        };
        Ok(entry)
    }
}

fn malformed(reason: String) -> CodecError {
    CodecError::Malformed { reason }
}

fn write_value_source(ctx: &mut WriteContext, record: &ValueSourceRecord) -> CodecResult<()> {
    ctx.write_string(&record.source_type)?;
    ctx.write_string(&record.display_name)?;
    let trace = ctx.trace().bean(record.source_type.as_str());
    ctx.with_property_trace(trace, |ctx| {
        ctx.write_value(&record.parameters)?;
        match &record.outcome {
            ValueOutcome::Success(value) => {
                ctx.write_bool(true)?;
                ctx.write_value(value)
            }
            ValueOutcome::Failure(message) => {
                ctx.write_bool(false)?;
                ctx.write_string(message)
            }
        }
    })
}

fn read_value_source(ctx: &mut ReadContext) -> CodecResult<ValueSourceRecord> {
    let source_type = ctx.read_string()?;
    let display_name = ctx.read_string()?;
    let trace = ctx.trace().bean(source_type.as_str());
    let (parameters, outcome) = ctx.with_property_trace(trace, |ctx| {
        let parameters = ctx.read_value()?;
        let outcome = if ctx.read_bool()? {
            ValueOutcome::Success(ctx.read_value()?)
        } else {
            ValueOutcome::Failure(ctx.read_string()?)
        };
        Ok::<_, CodecError>((parameters, outcome))
    })?;
    Ok(ValueSourceRecord {
        source_type,
        display_name,
        parameters,
        outcome,
    })
}

fn write_path(ctx: &mut WriteContext, path: &Path) -> CodecResult<()> {
    ctx.write_string(&path.to_string_lossy())
}

fn read_path(ctx: &mut ReadContext) -> CodecResult<PathBuf> {
    Ok(PathBuf::from(ctx.read_string()?))
}

fn write_project_path(ctx: &mut WriteContext, path: &ProjectPath) -> CodecResult<()> {
    ctx.write_string(path.as_str())
}

fn read_project_path(ctx: &mut ReadContext) -> CodecResult<ProjectPath> {
    let text = ctx.read_string()?;
    ProjectPath::parse(&text).map_err(|err| malformed(err.to_string()))
}

fn write_optional_hash(ctx: &mut WriteContext, hash: Option<&ContentHash>) -> CodecResult<()> {
    match hash {
        Some(hash) => {
            ctx.write_bool(true)?;
            ctx.write_hash(hash)
        }
        None => ctx.write_bool(false),
    }
}

fn read_optional_hash(ctx: &mut ReadContext) -> CodecResult<Option<ContentHash>> {
    if ctx.read_bool()? {
        Ok(Some(ctx.read_hash()?))
    } else {
        Ok(None)
    }
}

fn write_scope(ctx: &mut WriteContext, scope: &PropertyScope) -> CodecResult<()> {
    match scope {
        PropertyScope::Build(path) => {
            ctx.write_u8(0)?;
            ctx.write_string(path)
        }
        PropertyScope::Project(path) => {
            ctx.write_u8(1)?;
            write_project_path(ctx, path)
        }
    }
}

fn read_scope(ctx: &mut ReadContext) -> CodecResult<PropertyScope> {
    match ctx.read_u8()? {
        0 => Ok(PropertyScope::Build(ctx.read_string()?)),
        1 => Ok(PropertyScope::Project(read_project_path(ctx)?)),
        other => Err(malformed(format!("invalid property scope {other}"))),
    }
}

fn write_snapshot(ctx: &mut WriteContext, snapshot: &BTreeMap<String, String>) -> CodecResult<()> {
    ctx.write_len(snapshot.len())?;
    for (key, value) in snapshot {
        ctx.write_string(key)?;
        ctx.write_string(value)?;
    }
    Ok(())
}

fn read_snapshot(ctx: &mut ReadContext) -> CodecResult<BTreeMap<String, String>> {
    let len = ctx.read_len()?;
    let mut snapshot = BTreeMap::new();
    for _ in 0..len {
        let key = ctx.read_string()?;
        snapshot.insert(key, ctx.read_string()?);
    }
    Ok(snapshot)
}

fn write_optional_snapshot(
    ctx: &mut WriteContext,
    snapshot: &BTreeMap<String, Option<String>>,
) -> CodecResult<()> {
    ctx.write_len(snapshot.len())?;
    for (key, value) in snapshot {
        ctx.write_string(key)?;
        ctx.write_optional_string(value.as_deref())?;
    }
    Ok(())
}

fn read_optional_snapshot(ctx: &mut ReadContext) -> CodecResult<BTreeMap<String, Option<String>>> {
    let len = ctx.read_len()?;
    let mut snapshot = BTreeMap::new();
    for _ in 0..len {
        let key = ctx.read_string()?;
        snapshot.insert(key, ctx.read_optional_string()?);
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tessera_diagnostics::ProblemSink;
    use tessera_graph::{Bindings, CodecSettings, SharedBuffer};

    fn round_trip<T, C: Codec<T>>(codec: &C, value: &T) -> T {
        let bindings = Bindings::builder().build();
        let reporter = Arc::new(ProblemSink::new());
        let settings = CodecSettings::default();
        let buffer = SharedBuffer::new();
        let mut writer = settings.writer(buffer.clone(), Arc::clone(&bindings), reporter.clone());
        codec.encode(&mut writer, value).unwrap();
        writer.flush().unwrap();
        let mut reader = settings.reader(std::io::Cursor::new(buffer.bytes()), bindings, reporter);
        codec.decode(&mut reader).unwrap()
    }

    #[test]
    fn prefixed_snapshot_keeps_missing_values() {
        let mut snapshot = BTreeMap::new();
        snapshot.insert("app.mode".to_string(), Some("fast".to_string()));
        snapshot.insert("app.mutated".to_string(), None);
        let entry = FingerprintEntry::SystemPropertiesPrefixedBy {
            prefix: "app.".into(),
            snapshot: snapshot.clone(),
        };
        match round_trip(&FingerprintEntryCodec, &entry) {
            FingerprintEntry::SystemPropertiesPrefixedBy { prefix, snapshot: read } => {
                assert_eq!(prefix, "app.");
                assert_eq!(read, snapshot);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn project_fingerprint_wraps_entry() {
        let entry = ProjectSpecificEntry::ProjectFingerprint {
            identity_path: ProjectPath::parse(":app").unwrap(),
            entry: FingerprintEntry::BuildProperty {
                scope: PropertyScope::Project(ProjectPath::parse(":app").unwrap()),
                name: "version".into(),
                value: None,
            },
        };
        match round_trip(&ProjectEntryCodec, &entry) {
            ProjectSpecificEntry::ProjectFingerprint {
                identity_path,
                entry: FingerprintEntry::BuildProperty { scope, name, value },
            } => {
                assert_eq!(identity_path.as_str(), ":app");
                assert!(matches!(scope, PropertyScope::Project(path) if path.as_str() == ":app"));
                assert_eq!(name, "version");
                assert_eq!(value, None);
            }
            other => panic!("unexpected entry {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_malformed() {
        let bindings = Bindings::builder().build();
        let reporter = Arc::new(ProblemSink::new());
        let mut reader =
            CodecSettings::default().reader(std::io::Cursor::new(vec![99u8]), bindings, reporter);
        let err = FingerprintEntryCodec.decode(&mut reader).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }
}
