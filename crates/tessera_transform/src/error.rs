//! Error types for running transforms.

use std::path::PathBuf;

/// Result alias for transform operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Errors raised while resolving or executing a transform chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// Upstream artifacts of a step could not be resolved.
    #[error("failed to resolve dependencies of {transform}: {message}")]
    UpstreamResolution {
        /// Display name of the transform.
        transform: String,
        /// Why resolution failed.
        message: String,
    },

    /// The transform action failed on an input artifact.
    #[error("{transform} failed on `{}`: {message}", input.display())]
    Action {
        /// Display name of the transform.
        transform: String,
        /// The input artifact.
        input: PathBuf,
        /// Failure reported by the action.
        message: String,
    },
}
