#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tessera_common::{ContentHash, ProjectPath};
use tessera_config::CacheOptions;
use tessera_diagnostics::{ProblemSink, PropertyTrace};
use tessera_fingerprint::{
    read_fingerprint_stream, FileSystemEntryKind, FingerprintEntry, FingerprintEntryCodec,
    FingerprintHost, FingerprintResult, FingerprintWriter, InputKind, ProjectEntryCodec,
    ProjectIdentity, ProjectSpecificEntry, SimplifiedFileInput,
};
use tessera_graph::{
    default_bindings, Bindings, Codec, CodecSettings, LambdaRegistry, SerializationRegistry, SharedBuffer,
};

pub struct TestHost {
    pub root: PathBuf,
    pub start_time: u64,
    pub init_scripts: Vec<PathBuf>,
    pub start_parameters: BTreeMap<String, String>,
    pub executing_work: AtomicBool,
    pub mutated: Mutex<HashSet<String>>,
    pub system_properties: Mutex<BTreeMap<String, String>>,
}

impl TestHost {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            start_time: 0,
            init_scripts: Vec::new(),
            start_parameters: BTreeMap::new(),
            executing_work: AtomicBool::new(false),
            mutated: Mutex::new(HashSet::new()),
            system_properties: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn set_executing_work(&self, executing: bool) {
        self.executing_work.store(executing, Ordering::SeqCst);
    }
}

impl FingerprintHost for TestHost {
    fn user_home(&self) -> PathBuf {
        self.root.join(".tessera")
    }

    fn init_scripts(&self) -> Vec<PathBuf> {
        self.init_scripts.clone()
    }

    fn build_start_time(&self) -> u64 {
        self.start_time
    }

    fn start_parameter_properties(&self) -> BTreeMap<String, String> {
        self.start_parameters.clone()
    }

    fn runtime_fingerprint(&self) -> ContentHash {
        ContentHash::from_parts(["test-runtime", "1.0"])
    }

    fn build_root_dirs(&self) -> Vec<PathBuf> {
        vec![self.root.clone()]
    }

    fn hash_of(&self, file: &Path) -> Option<ContentHash> {
        std::fs::read(file).ok().map(|bytes| ContentHash::from_bytes(&bytes))
    }

    fn hash_of_directory_children(&self, dir: &Path) -> Option<ContentHash> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Some(ContentHash::from_parts(names))
    }

    fn entry_kind(&self, path: &Path) -> FileSystemEntryKind {
        match std::fs::symlink_metadata(path) {
            Ok(meta) if meta.is_file() => FileSystemEntryKind::File,
            Ok(meta) if meta.is_dir() => FileSystemEntryKind::Directory,
            Ok(_) => FileSystemEntryKind::Other,
            Err(_) => FileSystemEntryKind::Missing,
        }
    }

    fn display_name_of(&self, file: &Path) -> String {
        file.strip_prefix(&self.root)
            .unwrap_or(file)
            .to_string_lossy()
            .into_owned()
    }

    fn fingerprint_of(&self, inputs: &[SimplifiedFileInput]) -> ContentHash {
        ContentHash::from_parts(inputs.iter().map(|input| format!("{input:?}")))
    }

    fn location(&self, consumer: Option<&str>) -> PropertyTrace {
        PropertyTrace::BuildLogic(consumer.unwrap_or("build file 'build.tsr'").to_string())
    }

    fn is_executing_work(&self) -> bool {
        self.executing_work.load(Ordering::SeqCst)
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.system_properties.lock().get(key).cloned()
    }

    fn is_system_property_mutated(&self, key: &str) -> bool {
        self.mutated.lock().contains(key)
    }
}

pub fn bindings() -> Arc<Bindings> {
    default_bindings(
        Arc::new(SerializationRegistry::with_defaults()),
        Arc::new(LambdaRegistry::new()),
    )
    .build()
}

pub struct Harness {
    pub dir: TempDir,
    pub host: Arc<TestHost>,
    pub problems: Arc<ProblemSink>,
    pub writer: FingerprintWriter,
    build: SharedBuffer,
    project: SharedBuffer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(CacheOptions::default(), |_| {})
    }

    pub fn with_options(options: CacheOptions) -> Self {
        Self::with(options, |_| {})
    }

    pub fn with(options: CacheOptions, configure: impl FnOnce(&mut TestHost)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut host = TestHost::new(dir.path());
        configure(&mut host);
        let host = Arc::new(host);
        let problems = Arc::new(ProblemSink::new());
        let build = SharedBuffer::new();
        let project = SharedBuffer::new();
        let settings = CodecSettings::from(&options);
        let writer = FingerprintWriter::new(
            host.clone(),
            options,
            problems.clone(),
            settings.writer(build.clone(), bindings(), problems.clone()),
            settings.writer(project.clone(), bindings(), problems.clone()),
        )
        .unwrap();
        Self {
            dir,
            host,
            problems,
            writer,
            build,
            project,
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn with_work_filter(
        mut self,
        ignored: impl Fn(InputKind) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.writer = self.writer.with_work_filter(ignored);
        self
    }

    pub fn read_build(&self) -> FingerprintResult<Vec<FingerprintEntry>> {
        read_stream(&self.build, &self.problems, &FingerprintEntryCodec)
    }

    pub fn read_project(&self) -> FingerprintResult<Vec<ProjectSpecificEntry>> {
        read_stream(&self.project, &self.problems, &ProjectEntryCodec)
    }

    pub fn close(&self) -> (Vec<FingerprintEntry>, Vec<ProjectSpecificEntry>) {
        self.writer.close().unwrap();
        (self.read_build().unwrap(), self.read_project().unwrap())
    }

    /// Drops the writer without closing it and reads what it left behind.
    pub fn abandon(self) -> (Vec<FingerprintEntry>, Vec<ProjectSpecificEntry>) {
        let Harness {
            writer,
            problems,
            build,
            project,
            ..
        } = self;
        drop(writer);
        (
            read_stream(&build, &problems, &FingerprintEntryCodec).unwrap(),
            read_stream(&project, &problems, &ProjectEntryCodec).unwrap(),
        )
    }
}

fn read_stream<T>(
    buffer: &SharedBuffer,
    problems: &Arc<ProblemSink>,
    codec: &dyn Codec<T>,
) -> FingerprintResult<Vec<T>> {
    let mut ctx =
        CodecSettings::default().reader(Cursor::new(buffer.bytes()), bindings(), problems.clone());
    read_fingerprint_stream(&mut ctx, codec)
}

pub fn identity(path: &str) -> ProjectIdentity {
    let path = ProjectPath::parse(path).unwrap();
    ProjectIdentity {
        identity_path: path.clone(),
        build_path: ProjectPath::root(),
        project_path: path,
    }
}

pub fn input_files(entries: &[FingerprintEntry]) -> Vec<PathBuf> {
    entries
        .iter()
        .filter_map(|entry| match entry {
            FingerprintEntry::InputFile { file, .. } => Some(file.clone()),
            _ => None,
        })
        .collect()
}

pub fn project_entries(records: &[ProjectSpecificEntry], project: &str) -> Vec<FingerprintEntry> {
    records
        .iter()
        .filter_map(|record| match record {
            ProjectSpecificEntry::ProjectFingerprint {
                identity_path,
                entry,
            } if identity_path.as_str() == project => Some(entry.clone()),
            _ => None,
        })
        .collect()
}
