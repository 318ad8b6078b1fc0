//! Upstream dependencies of a transform step.

use crate::error::{TransformError, TransformResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What a step receives about its upstream dependencies.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum TransformDependencies {
    /// The transform does not consume upstream artifacts.
    NotRequired,
    /// The resolved upstream artifacts.
    FileDependencies {
        /// The artifact files, in resolution order.
        files: Vec<PathBuf>,
    },
}

impl TransformDependencies {
    /// Returns the upstream files, or `None` if the transform does not
    /// consume them.
    pub fn files(&self) -> Option<&[PathBuf]> {
        match self {
            TransformDependencies::NotRequired => None,
            TransformDependencies::FileDependencies { files } => Some(files),
        }
    }
}

/// Resolves the upstream artifacts a step depends on.
pub trait TransformUpstreamDependencies: Send + Sync {
    /// Identity of the configuration whose artifacts are resolved, if any.
    fn configuration_identity(&self) -> Option<&str>;

    /// The selected upstream artifact files.
    ///
    /// Triggers resolution if it has not happened yet.
    fn selected_artifacts(&self) -> TransformResult<Vec<PathBuf>>;

    /// The dependencies to hand to the transform action.
    fn compute_artifacts(&self) -> TransformResult<TransformDependencies>;
}

impl fmt::Debug for dyn TransformUpstreamDependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformUpstreamDependencies")
            .field("configuration", &self.configuration_identity())
            .finish_non_exhaustive()
    }
}

type Resolver = Box<dyn Fn() -> Result<Vec<PathBuf>, String> + Send + Sync>;

/// Resolves upstream artifacts on first use and keeps the result.
///
/// Used while the build is configured; the resolver closure may run
/// dependency resolution.
pub struct ResolvingUpstreamDependencies {
    configuration: String,
    transform: String,
    resolver: Resolver,
    resolved: Mutex<Option<TransformResult<Vec<PathBuf>>>>,
}

impl ResolvingUpstreamDependencies {
    /// Creates a resolver for `configuration`.
    ///
    /// `transform` is the display name used in failures.
    pub fn new(
        configuration: impl Into<String>,
        transform: impl Into<String>,
        resolver: impl Fn() -> Result<Vec<PathBuf>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            configuration: configuration.into(),
            transform: transform.into(),
            resolver: Box::new(resolver),
            resolved: Mutex::new(None),
        }
    }

    /// Returns `true` once resolution ran, successfully or not.
    pub fn is_resolved(&self) -> bool {
        self.resolved.lock().is_some()
    }
}

impl TransformUpstreamDependencies for ResolvingUpstreamDependencies {
    fn configuration_identity(&self) -> Option<&str> {
        Some(&self.configuration)
    }

    fn selected_artifacts(&self) -> TransformResult<Vec<PathBuf>> {
        let mut resolved = self.resolved.lock();
        resolved
            .get_or_insert_with(|| {
                (self.resolver)().map_err(|message| TransformError::UpstreamResolution {
                    transform: self.transform.clone(),
                    message,
                })
            })
            .clone()
    }

    fn compute_artifacts(&self) -> TransformResult<TransformDependencies> {
        let files = self.selected_artifacts()?;
        Ok(TransformDependencies::FileDependencies { files })
    }
}

/// Upstream dependencies restored from the cache.
///
/// Answers from the dependencies that were resolved when the graph was
/// stored; nothing is resolved again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedUpstreamDependencies {
    dependencies: TransformDependencies,
}

impl FixedUpstreamDependencies {
    /// Wraps already resolved dependencies.
    pub fn new(dependencies: TransformDependencies) -> Self {
        Self { dependencies }
    }

    /// Dependencies of a transform that does not consume upstream artifacts.
    pub fn not_required() -> Self {
        Self::new(TransformDependencies::NotRequired)
    }

    /// Returns the wrapped dependencies.
    pub fn dependencies(&self) -> &TransformDependencies {
        &self.dependencies
    }
}

impl TransformUpstreamDependencies for FixedUpstreamDependencies {
    fn configuration_identity(&self) -> Option<&str> {
        None
    }

    fn selected_artifacts(&self) -> TransformResult<Vec<PathBuf>> {
        Ok(self.dependencies.files().map(<[PathBuf]>::to_vec).unwrap_or_default())
    }

    fn compute_artifacts(&self) -> TransformResult<TransformDependencies> {
        Ok(self.dependencies.clone())
    }
}
