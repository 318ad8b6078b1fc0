//! A [`FingerprintHost`] backed by the local file system.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tessera_common::ContentHash;
use tessera_diagnostics::PropertyTrace;
use tessera_fingerprint::{FileSystemEntryKind, FingerprintHost, SimplifiedFileInput};

use crate::hasher::FileSystemHasher;

/// Build environment and file system of a build running on this machine.
///
/// The configuring location and whether work is executing are tracked per
/// thread, since projects may configure in parallel.
#[derive(Debug)]
pub struct LocalFileSystemHost {
    build_root: PathBuf,
    included_builds: Vec<PathBuf>,
    user_home: PathBuf,
    init_scripts: Vec<PathBuf>,
    start_time: u64,
    start_parameters: BTreeMap<String, String>,
    system_properties: Mutex<BTreeMap<String, String>>,
    mutated_properties: Mutex<HashSet<String>>,
    loaded_properties: Mutex<HashMap<String, Option<String>>>,
    locations: Mutex<HashMap<ThreadId, String>>,
    executing_work: Mutex<HashSet<ThreadId>>,
}

impl LocalFileSystemHost {
    /// Creates a host for the build rooted at `build_root`, started at
    /// `start_time` milliseconds since the epoch.
    pub fn new(build_root: &Path, user_home: &Path, start_time: u64) -> Self {
        Self {
            build_root: build_root.to_path_buf(),
            included_builds: Vec::new(),
            user_home: user_home.to_path_buf(),
            init_scripts: Vec::new(),
            start_time,
            start_parameters: BTreeMap::new(),
            system_properties: Mutex::new(BTreeMap::new()),
            mutated_properties: Mutex::new(HashSet::new()),
            loaded_properties: Mutex::new(HashMap::new()),
            locations: Mutex::new(HashMap::new()),
            executing_work: Mutex::new(HashSet::new()),
        }
    }

    /// Adds the root of an included build.
    pub fn with_included_build(mut self, root: &Path) -> Self {
        self.included_builds.push(root.to_path_buf());
        self
    }

    /// Sets the init scripts, in application order.
    pub fn with_init_scripts(mut self, scripts: Vec<PathBuf>) -> Self {
        self.init_scripts = scripts;
        self
    }

    /// Sets the project properties given on the command line.
    pub fn with_start_parameters(mut self, properties: BTreeMap<String, String>) -> Self {
        self.start_parameters = properties;
        self
    }

    /// Sets the system properties the build starts with.
    pub fn with_system_properties(self, properties: BTreeMap<String, String>) -> Self {
        *self.system_properties.lock() = properties;
        self
    }

    /// Root directory of the build.
    pub fn build_root(&self) -> &Path {
        &self.build_root
    }

    /// Sets `key` on behalf of build logic, marking it as mutated.
    pub fn set_system_property(&self, key: &str, value: &str) {
        self.system_properties
            .lock()
            .insert(key.to_string(), value.to_string());
        self.mutated_properties.lock().insert(key.to_string());
        self.loaded_properties.lock().remove(key);
    }

    /// Applies system properties declared in a properties file.
    ///
    /// Keys keep their previous value for [`loaded_property_old_value`]
    /// until build logic changes them.
    ///
    /// [`loaded_property_old_value`]: FingerprintHost::loaded_property_old_value
    pub fn load_system_properties(&self, properties: &BTreeMap<String, String>) {
        let mut current = self.system_properties.lock();
        let mut loaded = self.loaded_properties.lock();
        for (key, value) in properties {
            let old = current.insert(key.clone(), value.clone());
            loaded.entry(key.clone()).or_insert(old);
        }
    }

    /// Runs `f` with the calling thread configuring the build logic at
    /// `location`, e.g. `build file 'app/build.tsr'`.
    pub fn configuring<R>(&self, location: &str, f: impl FnOnce() -> R) -> R {
        let id = thread::current().id();
        let previous = self.locations.lock().insert(id, location.to_string());
        let result = f();
        let mut locations = self.locations.lock();
        match previous {
            Some(previous) => locations.insert(id, previous),
            None => locations.remove(&id),
        };
        result
    }

    /// Runs `f` with the calling thread marked as executing work.
    pub fn executing_work<R>(&self, f: impl FnOnce() -> R) -> R {
        let id = thread::current().id();
        let nested = !self.executing_work.lock().insert(id);
        let result = f();
        if !nested {
            self.executing_work.lock().remove(&id);
        }
        result
    }
}

impl FingerprintHost for LocalFileSystemHost {
    fn user_home(&self) -> PathBuf {
        self.user_home.clone()
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
        ContentHash::from_parts([
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH,
        ])
    }

    fn build_root_dirs(&self) -> Vec<PathBuf> {
        std::iter::once(self.build_root.clone())
            .chain(self.included_builds.iter().cloned())
            .collect()
    }

    fn hash_of(&self, file: &Path) -> Option<ContentHash> {
        FileSystemHasher::hash_file(file).ok()
    }

    fn hash_of_directory_children(&self, dir: &Path) -> Option<ContentHash> {
        FileSystemHasher::hash_directory_children(dir)
    }

    fn entry_kind(&self, path: &Path) -> FileSystemEntryKind {
        FileSystemHasher::entry_kind(path)
    }

    fn display_name_of(&self, file: &Path) -> String {
        file.strip_prefix(&self.build_root)
            .unwrap_or(file)
            .to_string_lossy()
            .into_owned()
    }

    fn fingerprint_of(&self, inputs: &[SimplifiedFileInput]) -> ContentHash {
        FileSystemHasher::fingerprint_of(inputs)
    }

    fn location(&self, consumer: Option<&str>) -> PropertyTrace {
        if let Some(consumer) = consumer {
            return PropertyTrace::BuildLogic(consumer.to_string());
        }
        match self.locations.lock().get(&thread::current().id()) {
            Some(location) => PropertyTrace::BuildLogic(location.clone()),
            None => PropertyTrace::Unknown,
        }
    }

    fn is_executing_work(&self) -> bool {
        self.executing_work
            .lock()
            .contains(&thread::current().id())
    }

    fn system_property(&self, key: &str) -> Option<String> {
        self.system_properties.lock().get(key).cloned()
    }

    fn is_system_property_mutated(&self, key: &str) -> bool {
        self.mutated_properties.lock().contains(key)
    }

    fn is_system_property_loaded(&self, key: &str) -> bool {
        self.loaded_properties.lock().contains_key(key)
    }

    fn loaded_property_old_value(&self, key: &str) -> Option<String> {
        match self.loaded_properties.lock().get(key) {
            Some(old) => old.clone(),
            None => self.system_property(key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> LocalFileSystemHost {
        LocalFileSystemHost::new(Path::new("/work/app"), Path::new("/home/dev/.tessera"), 42)
    }

    #[test]
    fn location_is_scoped_to_the_configuring_thread() {
        let host = host();
        assert_eq!(host.location(None), PropertyTrace::Unknown);
        host.configuring("build file 'build.tsr'", || {
            assert_eq!(
                host.location(None),
                PropertyTrace::BuildLogic("build file 'build.tsr'".into())
            );
            std::thread::scope(|s| {
                s.spawn(|| assert_eq!(host.location(None), PropertyTrace::Unknown));
            });
            host.configuring("plugin 'org.example'", || {
                assert_eq!(
                    host.location(None),
                    PropertyTrace::BuildLogic("plugin 'org.example'".into())
                );
            });
            assert_eq!(
                host.location(Some("task ':compile'")),
                PropertyTrace::BuildLogic("task ':compile'".into())
            );
            assert_eq!(
                host.location(None),
                PropertyTrace::BuildLogic("build file 'build.tsr'".into())
            );
        });
        assert_eq!(host.location(None), PropertyTrace::Unknown);
    }

    #[test]
    fn executing_work_nests() {
        let host = host();
        host.executing_work(|| {
            host.executing_work(|| assert!(host.is_executing_work()));
            assert!(host.is_executing_work());
        });
        assert!(!host.is_executing_work());
    }

    #[test]
    fn loaded_properties_remember_their_old_value() {
        let host = host().with_system_properties(BTreeMap::from([(
            "http.proxyHost".to_string(),
            "old.example".to_string(),
        )]));
        host.load_system_properties(&BTreeMap::from([
            ("http.proxyHost".to_string(), "proxy.example".to_string()),
            ("org.example.flag".to_string(), "true".to_string()),
        ]));

        assert!(host.is_system_property_loaded("http.proxyHost"));
        assert_eq!(host.system_property("http.proxyHost").as_deref(), Some("proxy.example"));
        assert_eq!(
            host.loaded_property_old_value("http.proxyHost").as_deref(),
            Some("old.example")
        );
        assert_eq!(host.loaded_property_old_value("org.example.flag"), None);

        host.set_system_property("org.example.flag", "false");
        assert!(!host.is_system_property_loaded("org.example.flag"));
        assert!(host.is_system_property_mutated("org.example.flag"));
    }

    #[test]
    fn build_roots_include_included_builds() {
        let host = host().with_included_build(Path::new("/work/plugins"));
        assert_eq!(
            host.build_root_dirs(),
            vec![PathBuf::from("/work/app"), PathBuf::from("/work/plugins")]
        );
        assert_eq!(host.display_name_of(Path::new("/work/app/settings.tsr")), "settings.tsr");
    }
}
