//! The fingerprint writer: entry point for every configuration input.

use crate::codec::{FingerprintEntryCodec, ProjectEntryCodec};
use crate::entry::{
    BuildEnvironment, ChangingValue, ChangingValueKind, FingerprintEntry, ProjectIdentity,
    ProjectSpecificEntry, PropertyScope, SimplifiedFileInput, ValueOutcome, ValueSourceRecord,
};
use crate::error::FingerprintResult;
use crate::host::{
    FileCollectionElement, FingerprintHost, InputBehavior, InputKind, ObtainedValue,
    ValueSourceParameters, WorkInputProperty,
};
use crate::scope::CaptureScope;
use crate::scoped::ScopedFingerprintWriter;
use crate::sink::{Sink, SinkOutput};
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera_common::ProjectPath;
use tessera_config::CacheOptions;
use tessera_diagnostics::{
    DiagnosticCode, DocumentationSection, Problem, ProblemReporter, PropertyTrace,
    StructuredMessage,
};
use tessera_graph::object::downcast_ref;
use tessera_graph::{value, Value, WriteContext};
use tracing::{debug, info, warn};

/// Name of the properties file loaded from build and project directories.
pub const PROPERTIES_FILE: &str = "tessera.properties";

/// Prefix of properties owned by the build tool itself.
const INTERNAL_PROPERTY_PREFIX: &str = "tessera.";

/// Directory name of the implicit build of every build root.
const BUILD_SRC: &str = "buildSrc";

type WorkFilter = Box<dyn Fn(InputKind) -> bool + Send + Sync>;

#[derive(Clone, PartialEq, Eq, Hash)]
enum ProjectRelation {
    Dependency(ProjectPath, ProjectPath),
    Coupled(ProjectPath, ProjectPath),
}

/// Records every configuration input of a build into two fingerprint streams.
///
/// Observations are routed through a [`CaptureScope`]: the build scope
/// records into the build-wide stream, project scopes into the project
/// stream. Each input is recorded once per scope and reported once per
/// writer.
///
/// [`close`](Self::close) must be called once configuration is complete.
/// A writer dropped without being closed closes itself and logs a warning.
pub struct FingerprintWriter {
    host: Arc<dyn FingerprintHost>,
    reporter: Arc<dyn ProblemReporter>,
    options: CacheOptions,
    build_writer: Arc<ScopedFingerprintWriter<FingerprintEntry>>,
    project_writer: Arc<ScopedFingerprintWriter<ProjectSpecificEntry>>,
    build_sink: Arc<Sink>,
    project_sinks: DashMap<ProjectPath, Arc<Sink>>,
    project_relations: DashSet<ProjectRelation>,
    reported_files: DashSet<PathBuf>,
    reported_directories: DashSet<PathBuf>,
    reported_file_system_entries: DashSet<PathBuf>,
    reported_system_properties: DashSet<String>,
    reported_system_property_prefixes: DashSet<String>,
    reported_environment_variables: DashSet<String>,
    reported_environment_variable_prefixes: DashSet<String>,
    reported_value_sources: DashSet<String>,
    build_properties: DashSet<(PropertyScope, String)>,
    build_property_prefixes: DashSet<(PropertyScope, String)>,
    start_parameter_properties_written: AtomicBool,
    closest_changing_value: Mutex<Option<ChangingValue>>,
    ignored_during_work: WorkFilter,
    closed: AtomicBool,
}

impl FingerprintWriter {
    /// Creates a writer over the build-wide and project stream contexts.
    ///
    /// Records the init scripts and the build environment right away.
    pub fn new(
        host: Arc<dyn FingerprintHost>,
        options: CacheOptions,
        reporter: Arc<dyn ProblemReporter>,
        build_stream: WriteContext,
        project_stream: WriteContext,
    ) -> FingerprintResult<Self> {
        let build_writer = Arc::new(ScopedFingerprintWriter::new(
            build_stream,
            FingerprintEntryCodec,
        ));
        let project_writer = Arc::new(ScopedFingerprintWriter::new(
            project_stream,
            ProjectEntryCodec,
        ));
        let build_sink = Arc::new(Sink::new(
            SinkOutput::Build(Arc::clone(&build_writer)),
            Arc::clone(&host),
        ));
        let writer = Self {
            host,
            reporter,
            options,
            build_writer,
            project_writer,
            build_sink,
            project_sinks: DashMap::new(),
            project_relations: DashSet::new(),
            reported_files: DashSet::new(),
            reported_directories: DashSet::new(),
            reported_file_system_entries: DashSet::new(),
            reported_system_properties: DashSet::new(),
            reported_system_property_prefixes: DashSet::new(),
            reported_environment_variables: DashSet::new(),
            reported_environment_variable_prefixes: DashSet::new(),
            reported_value_sources: DashSet::new(),
            build_properties: DashSet::new(),
            build_property_prefixes: DashSet::new(),
            start_parameter_properties_written: AtomicBool::new(false),
            closest_changing_value: Mutex::new(None),
            ignored_during_work: Box::new(InputKind::ignored_during_work),
            closed: AtomicBool::new(false),
        };
        writer.build_sink.init_scripts(&writer.host.init_scripts())?;
        writer.build_sink.write(
            FingerprintEntry::BuildEnvironment(BuildEnvironment {
                user_home: writer.host.user_home(),
                runtime_fingerprint: writer.host.runtime_fingerprint(),
                ignore_inputs_during_store: writer.options.ignore_inputs_during_store,
                instrumentation_agent_used: writer.host.instrumentation_agent_used(),
                ignored_file_system_check_inputs: writer
                    .options
                    .ignored_file_system_check_inputs
                    .clone(),
            }),
            None,
        )?;
        if !writer.options.fine_grained_property_tracking {
            info!("fine-grained property tracking is disabled, all command line project properties are inputs");
            writer.write_start_parameter_properties()?;
        }
        Ok(writer)
    }

    /// Replaces the predicate deciding which inputs are ignored while the
    /// host reports that work is executing.
    pub fn with_work_filter(
        mut self,
        ignored: impl Fn(InputKind) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.ignored_during_work = Box::new(ignored);
        self
    }

    /// Returns a scope recording into the build-wide stream.
    pub fn build_scope(&self) -> CaptureScope {
        CaptureScope::new(Arc::clone(&self.build_sink))
    }

    /// Runs `f` with a scope recording into the stream of `identity`.
    ///
    /// The project sink is created on first use, which writes the identity
    /// record. It is discarded when `f` returns unless `keep_alive` is set.
    pub fn for_project<R>(
        &self,
        parent: &CaptureScope,
        identity: &ProjectIdentity,
        keep_alive: bool,
        f: impl FnOnce(&CaptureScope) -> R,
    ) -> FingerprintResult<R> {
        let sink = self.project_sink(identity)?;
        let scope = parent.nested(sink);
        let result = f(&scope);
        if !keep_alive {
            self.project_sinks.remove(&identity.identity_path);
        }
        Ok(result)
    }

    fn project_sink(&self, identity: &ProjectIdentity) -> FingerprintResult<Arc<Sink>> {
        match self.project_sinks.entry(identity.identity_path.clone()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                debug!(project = %identity.identity_path, "creating project fingerprint sink");
                self.project_writer
                    .write(&ProjectSpecificEntry::ProjectIdentity(identity.clone()), None)?;
                let sink = Arc::new(Sink::new(
                    SinkOutput::Project {
                        identity_path: identity.identity_path.clone(),
                        writer: Arc::clone(&self.project_writer),
                    },
                    Arc::clone(&self.host),
                ));
                entry.insert(Arc::clone(&sink));
                Ok(sink)
            }
        }
    }

    fn ignored_while_executing(&self, kind: InputKind) -> bool {
        (self.ignored_during_work)(kind) && self.host.is_executing_work()
    }

    /// A file was read by the build tool on behalf of build logic.
    ///
    /// The file is captured but not listed in the report.
    pub fn file_observed(&self, scope: &CaptureScope, file: &Path) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() {
            return Ok(());
        }
        scope.sink.capture_file(file)
    }

    /// Build logic opened `file` for reading.
    pub fn file_opened(
        &self,
        scope: &CaptureScope,
        file: &Path,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() || self.ignored_while_executing(InputKind::FileOpened) {
            return Ok(());
        }
        scope.sink.capture_file(file)?;
        self.report_unique_file(file, consumer);
        Ok(())
    }

    /// Build logic listed the children of `dir`.
    pub fn directory_children_observed(
        &self,
        scope: &CaptureScope,
        dir: &Path,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled()
            || self.ignored_while_executing(InputKind::DirectoryChildren)
        {
            return Ok(());
        }
        scope.sink.capture_directory_children(dir)?;
        if self.reported_directories.insert(dir.to_path_buf()) {
            self.report_input(
                self.host.location(consumer),
                DiagnosticCode::INPUT_DIRECTORY_CONTENT,
                None,
                StructuredMessage::new()
                    .text("directory content ")
                    .reference(self.host.display_name_of(dir)),
            );
        }
        Ok(())
    }

    /// Build logic checked whether `path` exists or what kind it is.
    pub fn file_system_entry_observed(
        &self,
        scope: &CaptureScope,
        path: &Path,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() || self.ignored_while_executing(InputKind::FileSystemEntry)
        {
            return Ok(());
        }
        scope.sink.capture_file_system_entry(path)?;
        if self.reported_file_system_entries.insert(path.to_path_buf()) {
            self.report_input(
                self.host.location(consumer),
                DiagnosticCode::INPUT_FILE_SYSTEM_ENTRY,
                None,
                StructuredMessage::new()
                    .text("file system entry ")
                    .reference(self.host.display_name_of(path)),
            );
        }
        Ok(())
    }

    /// Build logic read the system property `key`.
    pub fn system_property_read(
        &self,
        scope: &CaptureScope,
        key: &str,
        value: Option<&str>,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() || self.ignored_while_executing(InputKind::SystemProperty)
        {
            return Ok(());
        }
        self.add_system_property(scope, key, value.map(str::to_string), consumer)
    }

    fn add_system_property(
        &self,
        scope: &CaptureScope,
        key: &str,
        value: Option<String>,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        // A value set by the build is fixed at configuration time and is not
        // an input; a loaded value is an input through its old value.
        if self.host.is_system_property_mutated(key) {
            return Ok(());
        }
        let value = if self.host.is_system_property_loaded(key) {
            self.host.loaded_property_old_value(key)
        } else {
            value
        };
        scope.sink.system_property_read(key, value)?;
        if self.reported_system_properties.insert(key.to_string()) {
            self.report_input(
                self.host.location(consumer),
                DiagnosticCode::INPUT_SYSTEM_PROPERTY,
                Some(DocumentationSection::RequirementsSysPropEnvVarRead),
                StructuredMessage::new().text("system property ").reference(key),
            );
        }
        Ok(())
    }

    /// Build logic set the system property `key` to `value`.
    pub fn system_property_changed(
        &self,
        scope: &CaptureScope,
        key: &str,
        value: Value,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        scope
            .sink
            .system_property_changed(key, value, self.host.location(consumer))
    }

    /// Build logic removed the system property `key`.
    pub fn system_property_removed(
        &self,
        scope: &CaptureScope,
        key: &str,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        scope.sink.write(
            FingerprintEntry::SystemPropertyRemoved { key: key.to_string() },
            Some(self.host.location(consumer)),
        )
    }

    /// Build logic cleared all system properties.
    pub fn system_properties_cleared(
        &self,
        scope: &CaptureScope,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        scope.sink.write(
            FingerprintEntry::SystemPropertiesCleared,
            Some(self.host.location(consumer)),
        )
    }

    /// Build logic read the environment variable `key`.
    pub fn env_variable_read(
        &self,
        scope: &CaptureScope,
        key: &str,
        value: Option<&str>,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled()
            || self.ignored_while_executing(InputKind::EnvironmentVariable)
        {
            return Ok(());
        }
        self.add_env_variable(scope, key, value.map(str::to_string), consumer)
    }

    fn add_env_variable(
        &self,
        scope: &CaptureScope,
        key: &str,
        value: Option<String>,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        scope.sink.env_variable_read(key, value)?;
        if self.reported_environment_variables.insert(key.to_string()) {
            self.report_input(
                self.host.location(consumer),
                DiagnosticCode::INPUT_ENVIRONMENT_VARIABLE,
                Some(DocumentationSection::RequirementsSysPropEnvVarRead),
                StructuredMessage::new().text("environment variable ").reference(key),
            );
        }
        Ok(())
    }

    /// Build logic queried all system properties starting with `prefix`.
    ///
    /// Always recorded in the build-wide stream.
    pub fn system_properties_prefixed_by(
        &self,
        scope: &CaptureScope,
        prefix: &str,
        snapshot: BTreeMap<String, Option<String>>,
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() {
            return Ok(());
        }
        self.add_system_properties_prefixed_by(prefix, snapshot)
    }

    fn add_system_properties_prefixed_by(
        &self,
        prefix: &str,
        snapshot: BTreeMap<String, Option<String>>,
    ) -> FingerprintResult<()> {
        let snapshot = snapshot
            .into_iter()
            .map(|(key, value)| {
                let value = if self.host.is_system_property_mutated(&key) {
                    None
                } else {
                    value
                };
                (key, value)
            })
            .collect();
        self.build_sink.write(
            FingerprintEntry::SystemPropertiesPrefixedBy {
                prefix: prefix.to_string(),
                snapshot,
            },
            None,
        )
    }

    /// Build logic queried all environment variables starting with `prefix`.
    ///
    /// Always recorded in the build-wide stream.
    pub fn env_variables_prefixed_by(
        &self,
        scope: &CaptureScope,
        prefix: &str,
        snapshot: BTreeMap<String, Option<String>>,
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() {
            return Ok(());
        }
        self.build_sink.write(
            FingerprintEntry::EnvironmentVariablesPrefixedBy {
                prefix: prefix.to_string(),
                snapshot,
            },
            None,
        )
    }

    /// A value source produced a value, or failed to.
    ///
    /// Sources that read a single kind of input are recorded as that input.
    /// Other sources are recorded as a value source entry; a failed
    /// computation is reported as a problem and still recorded.
    pub fn value_obtained(
        &self,
        scope: &CaptureScope,
        obtained: ObtainedValue,
    ) -> FingerprintResult<()> {
        if let Err(failure) = &obtained.value {
            self.report_value_source_failure(&obtained, failure);
        }
        match &obtained.parameters {
            ValueSourceParameters::FileContent { file } => {
                if let Some(file) = file {
                    scope.sink.capture_file(file)?;
                    self.report_unique_file(file, None);
                }
                Ok(())
            }
            ValueSourceParameters::BuildProperty { .. } => Ok(()),
            ValueSourceParameters::SystemProperty { key } => {
                self.add_system_property(scope, key, string_value(&obtained.value), None)
            }
            ValueSourceParameters::SystemPropertiesPrefixedBy { prefix } => {
                self.add_system_properties_prefixed_by(prefix, snapshot_value(&obtained.value))?;
                if self.reported_system_property_prefixes.insert(prefix.clone()) {
                    self.report_prefixed_input(
                        DiagnosticCode::INPUT_SYSTEM_PROPERTY,
                        "system properties",
                        prefix,
                    );
                }
                Ok(())
            }
            ValueSourceParameters::EnvironmentVariable { name } => {
                self.add_env_variable(scope, name, string_value(&obtained.value), None)
            }
            ValueSourceParameters::EnvironmentVariablesPrefixedBy { prefix } => {
                self.build_sink.write(
                    FingerprintEntry::EnvironmentVariablesPrefixedBy {
                        prefix: prefix.clone(),
                        snapshot: snapshot_value(&obtained.value),
                    },
                    None,
                )?;
                if self.reported_environment_variable_prefixes.insert(prefix.clone()) {
                    self.report_prefixed_input(
                        DiagnosticCode::INPUT_ENVIRONMENT_VARIABLE,
                        "environment variables",
                        prefix,
                    );
                }
                Ok(())
            }
            ValueSourceParameters::ProcessOutput {
                executable,
                arguments,
            } => {
                let mut command = vec![value(executable.clone())];
                command.extend(arguments.iter().map(|arg| value(arg.clone())));
                scope
                    .sink
                    .write(value_source_entry(&obtained, value(command)), None)?;
                self.report_input(
                    self.host.location(None),
                    DiagnosticCode::INPUT_EXTERNAL_PROCESS,
                    Some(DocumentationSection::RequirementsExternalProcess),
                    StructuredMessage::new()
                        .text("output of external process ")
                        .reference(executable.as_str()),
                );
                Ok(())
            }
            ValueSourceParameters::Custom(parameters) => {
                // Custom parameters may fail to encode; the explicit trace
                // attributes such problems to the build logic.
                let trace = self.host.location(None);
                scope.sink.write(
                    value_source_entry(&obtained, parameters.clone()),
                    Some(trace.clone()),
                )?;
                let key = obtained
                    .display_name
                    .clone()
                    .unwrap_or_else(|| obtained.source_type.clone());
                if self.reported_value_sources.insert(key) {
                    let mut message = StructuredMessage::new()
                        .text("value from custom source ")
                        .reference(obtained.simple_type_name());
                    if let Some(display_name) = &obtained.display_name {
                        message = message.text(", ").text(display_name.as_str());
                    }
                    self.report_input(trace, DiagnosticCode::INPUT_VALUE_SOURCE, None, message);
                }
                Ok(())
            }
        }
    }

    fn report_value_source_failure(&self, obtained: &ObtainedValue, failure: &str) {
        let mut message = StructuredMessage::new()
            .text("failed to compute value with custom source ")
            .reference(obtained.source_type.as_str());
        if let Some(display_name) = &obtained.display_name {
            message = message.text(format!(" ({display_name})"));
        }
        message = message.text(" with ").text(failure);
        self.reporter.report_problem(
            Problem::error(
                DiagnosticCode::VALUE_SOURCE_FAILURE,
                self.host.location(None),
                message,
            )
            .with_exception(failure),
        );
    }

    /// A script was applied. Only remote scripts are inputs here; local
    /// scripts are captured through [`script_file_resolved`](Self::script_file_resolved).
    pub fn script_source_observed(&self, scope: &CaptureScope, uri: &str) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() {
            return Ok(());
        }
        match uri.split_once(':') {
            Some((scheme, _)) if scheme.to_ascii_lowercase().starts_with("http") => {
                scope.sink.capture_remote_script(uri)
            }
            _ => Ok(()),
        }
    }

    /// A script location was resolved to `file`.
    pub fn script_file_resolved(&self, scope: &CaptureScope, file: &Path) -> FingerprintResult<()> {
        self.file_observed(scope, file)
    }

    /// The script at `file` was compiled and loaded.
    pub fn script_loaded(&self, scope: &CaptureScope, file: &Path) -> FingerprintResult<()> {
        scope.sink.capture_file(file)
    }

    /// Build logic resolved a file collection.
    pub fn file_collection_observed(
        &self,
        scope: &CaptureScope,
        elements: &[FileCollectionElement],
    ) -> FingerprintResult<()> {
        if !scope.is_tracking_enabled() || self.ignored_while_executing(InputKind::FileCollection) {
            return Ok(());
        }
        let inputs = elements.iter().map(FileCollectionElement::simplify).collect();
        let display_name = self.host.location(None).to_string();
        self.capture_work_inputs(scope, display_name, inputs)
    }

    /// A unit of work ran at configuration time.
    ///
    /// The file inputs with one of the `relevant` behaviors are recorded.
    pub fn work_executed(
        &self,
        scope: &CaptureScope,
        display_name: &str,
        properties: &[WorkInputProperty],
        relevant: &[InputBehavior],
    ) -> FingerprintResult<()> {
        let inputs = properties
            .iter()
            .filter(|property| relevant.contains(&property.behavior))
            .flat_map(|property| property.files.iter().map(FileCollectionElement::simplify))
            .collect();
        self.capture_work_inputs(scope, display_name.to_string(), inputs)
    }

    fn capture_work_inputs(
        &self,
        scope: &CaptureScope,
        work_display_name: String,
        inputs: Vec<SimplifiedFileInput>,
    ) -> FingerprintResult<()> {
        let fingerprint = self.host.fingerprint_of(&inputs);
        scope.sink.write(
            FingerprintEntry::WorkInputs {
                work_display_name,
                inputs,
                fingerprint,
            },
            None,
        )
    }

    /// A dynamic version was selected for `requested`.
    ///
    /// Only repositories serving at least one version count; a selection
    /// from no versions would expire the entry on every missing module.
    pub fn dynamic_version_selected(
        &self,
        requested: &str,
        keep_for: Duration,
        versions: &[String],
    ) {
        if versions.is_empty() {
            return;
        }
        self.on_changing_value(ChangingValueKind::DynamicDependencyVersion, requested, keep_for);
    }

    /// A changing module was resolved.
    pub fn changing_module_resolved(&self, module: &str, keep_for: Duration) {
        self.on_changing_value(ChangingValueKind::ChangingModule, module, keep_for);
    }

    fn on_changing_value(&self, kind: ChangingValueKind, display_name: &str, keep_for: Duration) {
        let keep_for = u64::try_from(keep_for.as_millis()).unwrap_or(u64::MAX);
        let candidate = ChangingValue {
            kind,
            display_name: display_name.to_string(),
            expire_at: self.host.build_start_time().saturating_add(keep_for),
        };
        let mut closest = self.closest_changing_value.lock();
        match closest.as_ref() {
            Some(current) if current.expire_at <= candidate.expire_at => {}
            _ => *closest = Some(candidate),
        }
    }

    /// Returns the earliest expiring changing value seen so far.
    pub fn closest_changing_value(&self) -> Option<ChangingValue> {
        self.closest_changing_value.lock().clone()
    }

    /// A project accessed the configured state of `target`.
    pub fn project_observed(
        &self,
        consumer: Option<&ProjectPath>,
        target: &ProjectPath,
    ) -> FingerprintResult<()> {
        match consumer {
            Some(consumer) => self.on_project_dependency(consumer, target),
            None => Ok(()),
        }
    }

    /// `referrer` obtained a reference to the mutable model of `target`.
    pub fn project_reference(
        &self,
        referrer: &ProjectPath,
        target: &ProjectPath,
    ) -> FingerprintResult<()> {
        if referrer == target || !self.options.cache_intermediate_models {
            return Ok(());
        }
        let relation = ProjectRelation::Coupled(referrer.clone(), target.clone());
        if self.project_relations.insert(relation) {
            self.project_writer.write(
                &ProjectSpecificEntry::CoupledProjects {
                    referrer: referrer.clone(),
                    target: target.clone(),
                },
                None,
            )?;
        }
        Ok(())
    }

    /// A tooling model built for `consumer` used the model of `target`.
    pub fn tooling_model_dependency(
        &self,
        consumer: &ProjectPath,
        target: &ProjectPath,
    ) -> FingerprintResult<()> {
        if !self.options.model_as_project_dependency {
            return Ok(());
        }
        self.on_project_dependency(consumer, target)
    }

    fn on_project_dependency(
        &self,
        consumer: &ProjectPath,
        target: &ProjectPath,
    ) -> FingerprintResult<()> {
        if !self.options.cache_intermediate_models {
            return Ok(());
        }
        let relation = ProjectRelation::Dependency(consumer.clone(), target.clone());
        if self.project_relations.insert(relation) {
            self.project_writer.write(
                &ProjectSpecificEntry::ProjectDependency {
                    consumer: consumer.clone(),
                    target: target.clone(),
                },
                None,
            )?;
        }
        Ok(())
    }

    /// A feature flag backed by `system_property` was read.
    pub fn feature_flag_read(
        &self,
        scope: &CaptureScope,
        system_property: Option<&str>,
    ) -> FingerprintResult<()> {
        match system_property {
            Some(key) => scope
                .sink
                .system_property_read(key, self.host.system_property(key)),
            None => Ok(()),
        }
    }

    /// Build logic read the full set of command line project properties.
    pub fn start_parameter_project_properties_observed(&self) -> FingerprintResult<()> {
        self.write_start_parameter_properties()
    }

    fn write_start_parameter_properties(&self) -> FingerprintResult<()> {
        if self.start_parameter_properties_written.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.build_sink.write(
            FingerprintEntry::StartParameterProjectProperties {
                snapshot: self.host.start_parameter_properties(),
            },
            None,
        )
    }

    /// Properties were loaded for `property_scope` from `directory`.
    ///
    /// With fine-grained tracking only the load is recorded and individual
    /// reads follow; otherwise the properties file itself is an input.
    pub fn build_properties_loaded(
        &self,
        scope: &CaptureScope,
        property_scope: PropertyScope,
        directory: &Path,
    ) -> FingerprintResult<()> {
        if self.options.fine_grained_property_tracking {
            self.build_sink.write(
                FingerprintEntry::BuildPropertiesLoaded {
                    scope: property_scope,
                    directory: directory.to_path_buf(),
                },
                None,
            )
        } else {
            scope.sink.capture_file(&directory.join(PROPERTIES_FILE))
        }
    }

    /// Build logic read the build property `name`.
    ///
    /// Build properties are shared by all projects, so the record always
    /// goes to the build-wide stream.
    pub fn build_property_read(
        &self,
        scope: &CaptureScope,
        property_scope: PropertyScope,
        name: &str,
        value: Option<&str>,
        consumer: Option<&str>,
    ) -> FingerprintResult<()> {
        if !self.options.fine_grained_property_tracking || !scope.is_tracking_enabled() {
            return Ok(());
        }
        if !self
            .build_properties
            .insert((property_scope.clone(), name.to_string()))
        {
            return Ok(());
        }
        self.build_sink.write(
            FingerprintEntry::BuildProperty {
                scope: property_scope,
                name: name.to_string(),
                value: value.map(str::to_string),
            },
            None,
        )?;
        self.report_build_property(
            name,
            consumer,
            StructuredMessage::new().text("build property ").reference(name),
        );
        Ok(())
    }

    /// Build logic queried all build properties starting with `prefix`.
    pub fn build_properties_prefixed_by(
        &self,
        scope: &CaptureScope,
        property_scope: PropertyScope,
        prefix: &str,
        snapshot: BTreeMap<String, String>,
    ) -> FingerprintResult<()> {
        if !self.options.fine_grained_property_tracking || !scope.is_tracking_enabled() {
            return Ok(());
        }
        if !self
            .build_property_prefixes
            .insert((property_scope.clone(), prefix.to_string()))
        {
            return Ok(());
        }
        self.build_sink.write(
            FingerprintEntry::BuildPropertiesPrefixedBy {
                scope: property_scope,
                prefix: prefix.to_string(),
                snapshot,
            },
            None,
        )?;
        self.report_build_property(
            prefix,
            None,
            StructuredMessage::new()
                .text("build properties prefixed by ")
                .reference(prefix),
        );
        Ok(())
    }

    fn report_build_property(&self, name: &str, consumer: Option<&str>, message: StructuredMessage) {
        if name.starts_with(INTERNAL_PROPERTY_PREFIX) {
            return;
        }
        let trace = self.host.location(consumer);
        if matches!(trace, PropertyTrace::Unknown | PropertyTrace::Runtime) {
            return;
        }
        self.report_input(trace, DiagnosticCode::INPUT_BUILD_PROPERTY, None, message);
    }

    /// Appends a project record produced outside of capture.
    pub fn append(&self, entry: &ProjectSpecificEntry) -> FingerprintResult<()> {
        self.project_writer.write(entry, None)
    }

    /// Returns `true` once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flushes pending records and terminates both streams.
    ///
    /// Build roots without a valid `buildSrc` directory and the earliest
    /// expiring changing value are recorded first. Later calls do nothing.
    pub fn close(&self) -> FingerprintResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let pending = {
            let closest = self.closest_changing_value.lock();
            self.write_missing_build_src().and_then(|()| match closest.as_ref() {
                Some(value) => self.build_sink.write(
                    FingerprintEntry::ChangingDependencyResolutionValue(value.clone()),
                    None,
                ),
                None => Ok(()),
            })
        };
        let build = self.build_writer.close();
        let project = self.project_writer.close();
        debug!(
            build_records = self.build_writer.records(),
            project_records = self.project_writer.records(),
            "fingerprint streams closed"
        );
        pending.and(build).and(project)
    }

    fn write_missing_build_src(&self) -> FingerprintResult<()> {
        for root in self.host.build_root_dirs() {
            let build_src = root.join(BUILD_SRC);
            if !self.host.is_valid_build_src(&build_src) {
                self.build_sink
                    .write(FingerprintEntry::MissingBuildSrcDir { path: build_src }, None)?;
            }
        }
        Ok(())
    }

    fn report_unique_file(&self, file: &Path, consumer: Option<&str>) {
        if self.reported_files.insert(file.to_path_buf()) {
            self.report_input(
                self.host.location(consumer),
                DiagnosticCode::INPUT_FILE,
                None,
                StructuredMessage::new()
                    .text("file ")
                    .reference(self.host.display_name_of(file)),
            );
        }
    }

    fn report_prefixed_input(&self, code: DiagnosticCode, what: &str, prefix: &str) {
        let message = if prefix.is_empty() {
            StructuredMessage::new().text(what)
        } else {
            StructuredMessage::new()
                .text(format!("{what} prefixed by "))
                .reference(prefix)
        };
        self.report_input(
            self.host.location(None),
            code,
            Some(DocumentationSection::RequirementsSysPropEnvVarRead),
            message,
        );
    }

    fn report_input(
        &self,
        trace: PropertyTrace,
        code: DiagnosticCode,
        documentation: Option<DocumentationSection>,
        message: StructuredMessage,
    ) {
        self.reporter.report_input(
            Problem::input(code, trace, message).with_optional_documentation(documentation),
        );
    }
}

impl Drop for FingerprintWriter {
    fn drop(&mut self) {
        if self.is_closed() {
            return;
        }
        warn!("fingerprint writer dropped without being closed, closing it now");
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close fingerprint streams");
        }
    }
}

fn value_source_entry(obtained: &ObtainedValue, parameters: Value) -> FingerprintEntry {
    let outcome = match &obtained.value {
        Ok(value) => ValueOutcome::Success(value.clone()),
        Err(failure) => ValueOutcome::Failure(failure.clone()),
    };
    FingerprintEntry::ValueSource(ValueSourceRecord {
        source_type: obtained.source_type.clone(),
        display_name: obtained
            .display_name
            .clone()
            .unwrap_or_else(|| obtained.simple_type_name().to_string()),
        parameters,
        outcome,
    })
}

fn string_value(obtained: &Result<Value, String>) -> Option<String> {
    match obtained {
        Ok(Some(obj)) => downcast_ref::<String>(obj).cloned(),
        _ => None,
    }
}

fn snapshot_value(obtained: &Result<Value, String>) -> BTreeMap<String, Option<String>> {
    let Ok(Some(obj)) = obtained else {
        return BTreeMap::new();
    };
    let Some(map) = downcast_ref::<BTreeMap<String, Value>>(obj) else {
        return BTreeMap::new();
    };
    map.iter()
        .map(|(key, value)| {
            let value = value
                .as_ref()
                .and_then(|obj| downcast_ref::<String>(obj).cloned());
            (key.clone(), value)
        })
        .collect()
}

impl std::fmt::Debug for FingerprintWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintWriter")
            .field("projects", &self.project_sinks.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
