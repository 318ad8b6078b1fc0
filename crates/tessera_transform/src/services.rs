//! Live services transforms are bound to.
//!
//! None of these are written to the cache. Decoding looks them up again in
//! the build that loads the cache.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tessera_common::ProjectPath;
use tessera_graph::Value;

/// Services of one project in the running build.
#[derive(Debug)]
pub struct ProjectServices {
    identity_path: ProjectPath,
    project_dir: PathBuf,
    build_dir: PathBuf,
}

impl ProjectServices {
    /// Creates the services of the project at `identity_path`.
    pub fn new(identity_path: ProjectPath, project_dir: PathBuf, build_dir: PathBuf) -> Self {
        Self {
            identity_path,
            project_dir,
            build_dir,
        }
    }

    /// Identity path of the project.
    pub fn identity_path(&self) -> &ProjectPath {
        &self.identity_path
    }

    /// Resolves `path` against the project directory.
    pub fn file(&self, path: impl AsRef<Path>) -> PathBuf {
        self.project_dir.join(path)
    }

    /// Directory transform outputs of this project are written to.
    pub fn transform_workspace(&self, transform: &str) -> PathBuf {
        self.build_dir.join("transforms").join(transform)
    }
}

/// Finds the services of a project by identity path.
pub trait ProjectLookup: Send + Sync {
    /// Returns the project at `path`, if it is part of the build.
    fn project(&self, path: &ProjectPath) -> Option<Arc<ProjectServices>>;
}

/// Executes a transform on a single input artifact.
pub trait TransformAction: Send + Sync {
    /// Transforms `input` into zero or more output files.
    ///
    /// `dependencies` is empty unless the transform requires them.
    fn transform(
        &self,
        workspace: &Path,
        input: &Path,
        parameters: &Value,
        dependencies: &[PathBuf],
    ) -> Result<Vec<PathBuf>, String>;
}

impl fmt::Debug for dyn TransformAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<transform action>")
    }
}

/// Build-wide services.
pub trait BuildServices: Send + Sync {
    /// Returns the action registered for `implementation`.
    fn transform_action(&self, implementation: &str) -> Option<Arc<dyn TransformAction>>;

    /// Directory outputs of transforms without an owning project, such as
    /// transforms of external artifacts, are written to.
    fn build_workspace(&self) -> PathBuf;
}
