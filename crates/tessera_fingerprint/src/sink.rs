//! Per-scope deduplication of captured inputs.

use crate::entry::{FingerprintEntry, InitScript, ProjectSpecificEntry};
use crate::error::FingerprintResult;
use crate::host::FingerprintHost;
use crate::scoped::ScopedFingerprintWriter;
use dashmap::DashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_common::ProjectPath;
use tessera_diagnostics::PropertyTrace;
use tessera_graph::Value;

pub(crate) enum SinkOutput {
    Build(Arc<ScopedFingerprintWriter<FingerprintEntry>>),
    Project {
        identity_path: ProjectPath,
        writer: Arc<ScopedFingerprintWriter<ProjectSpecificEntry>>,
    },
}

/// Captures each input at most once and forwards it to one stream.
pub(crate) struct Sink {
    output: SinkOutput,
    host: Arc<dyn FingerprintHost>,
    files: DashSet<PathBuf>,
    directories: DashSet<PathBuf>,
    file_system_entries: DashSet<PathBuf>,
    system_properties: DashSet<String>,
    environment_variables: DashSet<String>,
    remote_scripts: DashSet<String>,
}

impl Sink {
    pub(crate) fn new(output: SinkOutput, host: Arc<dyn FingerprintHost>) -> Self {
        Self {
            output,
            host,
            files: DashSet::new(),
            directories: DashSet::new(),
            file_system_entries: DashSet::new(),
            system_properties: DashSet::new(),
            environment_variables: DashSet::new(),
            remote_scripts: DashSet::new(),
        }
    }

    pub(crate) fn project(&self) -> Option<&ProjectPath> {
        match &self.output {
            SinkOutput::Build(_) => None,
            SinkOutput::Project { identity_path, .. } => Some(identity_path),
        }
    }

    pub(crate) fn capture_file(&self, file: &Path) -> FingerprintResult<()> {
        if !self.files.insert(file.to_path_buf()) {
            return Ok(());
        }
        let entry = FingerprintEntry::InputFile {
            file: file.to_path_buf(),
            hash: self.host.hash_of(file),
        };
        self.write(entry, None)
    }

    pub(crate) fn capture_directory_children(&self, dir: &Path) -> FingerprintResult<()> {
        if !self.directories.insert(dir.to_path_buf()) {
            return Ok(());
        }
        let entry = FingerprintEntry::DirectoryChildren {
            file: dir.to_path_buf(),
            hash: self.host.hash_of_directory_children(dir),
        };
        self.write(entry, None)
    }

    pub(crate) fn capture_file_system_entry(&self, path: &Path) -> FingerprintResult<()> {
        if !self.file_system_entries.insert(path.to_path_buf()) {
            return Ok(());
        }
        let entry = FingerprintEntry::InputFileSystemEntry {
            file: path.to_path_buf(),
            kind: self.host.entry_kind(path),
        };
        self.write(entry, None)
    }

    pub(crate) fn capture_remote_script(&self, uri: &str) -> FingerprintResult<()> {
        if !self.remote_scripts.insert(uri.to_string()) {
            return Ok(());
        }
        self.write(FingerprintEntry::RemoteScript { uri: uri.to_string() }, None)
    }

    pub(crate) fn system_property_read(
        &self,
        key: &str,
        value: Option<String>,
    ) -> FingerprintResult<()> {
        if !self.system_properties.insert(key.to_string()) {
            return Ok(());
        }
        let entry = FingerprintEntry::UndeclaredSystemProperty {
            key: key.to_string(),
            value,
        };
        self.write(entry, None)
    }

    /// A changed property is no longer an input: reads after the change see
    /// the value the build set, which is replayed from the record.
    pub(crate) fn system_property_changed(
        &self,
        key: &str,
        value: Value,
        trace: PropertyTrace,
    ) -> FingerprintResult<()> {
        self.system_properties.insert(key.to_string());
        let entry = FingerprintEntry::SystemPropertyChanged {
            key: key.to_string(),
            value,
        };
        self.write(entry, Some(trace))
    }

    pub(crate) fn env_variable_read(&self, key: &str, value: Option<String>) -> FingerprintResult<()> {
        if !self.environment_variables.insert(key.to_string()) {
            return Ok(());
        }
        let entry = FingerprintEntry::UndeclaredEnvironmentVariable {
            key: key.to_string(),
            value,
        };
        self.write(entry, None)
    }

    pub(crate) fn init_scripts(&self, scripts: &[PathBuf]) -> FingerprintResult<()> {
        let scripts = scripts
            .iter()
            .map(|file| {
                self.files.insert(file.clone());
                InitScript {
                    file: file.clone(),
                    hash: self.host.hash_of(file),
                }
            })
            .collect();
        self.write(FingerprintEntry::InitScripts(scripts), None)
    }

    pub(crate) fn write(
        &self,
        entry: FingerprintEntry,
        trace: Option<PropertyTrace>,
    ) -> FingerprintResult<()> {
        match &self.output {
            SinkOutput::Build(writer) => writer.write(&entry, trace),
            SinkOutput::Project {
                identity_path,
                writer,
            } => {
                let record = ProjectSpecificEntry::ProjectFingerprint {
                    identity_path: identity_path.clone(),
                    entry,
                };
                writer.write(&record, trace)
            }
        }
    }
}
