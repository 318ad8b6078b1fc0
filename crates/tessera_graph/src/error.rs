//! Error types for graph encoding and decoding.

use tessera_diagnostics::DocumentationSection;

/// Result alias used by every codec.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while encoding or decoding a graph.
///
/// Values without a codec are not errors: they are reported as problems and
/// encoded as null. Everything here aborts the current pass.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended in the middle of a value.
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// The bytes do not describe a valid value.
    #[error("malformed stream: {reason}")]
    Malformed {
        /// What was wrong.
        reason: String,
    },

    /// A binding tag outside the configured binding list.
    #[error("unknown binding tag {0}")]
    UnknownBinding(u32),

    /// A back reference to an object id that was never assigned.
    #[error("back reference to unassigned object #{0}")]
    UnresolvedReference(u32),

    /// A named entity could not be resolved while decoding.
    #[error("unknown {kind} `{name}`")]
    Unknown {
        /// What kind of entity, e.g. `class` or `function`.
        kind: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// A value of an unexpected type was found.
    #[error("expected a value of type `{expected}` but found `{found}`")]
    TypeMismatch {
        /// The type the codec required.
        expected: &'static str,
        /// The runtime type that was found.
        found: String,
    },

    /// A null was found where a value was required.
    #[error("unexpected null where a value of type `{expected}` was required")]
    UnexpectedNull {
        /// The type the codec required.
        expected: &'static str,
    },

    /// A legacy serialization feature that cannot be emulated.
    #[error("`{feature}` is not supported by the configuration cache (used by `{class}`)")]
    UnsupportedFeature {
        /// The stream method that was called.
        feature: &'static str,
        /// The class whose hook called it.
        class: String,
    },

    /// A legacy serialization hook misused the stream protocol.
    #[error("serialization protocol violation in `{class}`: {reason}")]
    Protocol {
        /// The class whose hook misbehaved.
        class: String,
        /// What went wrong.
        reason: String,
    },

    /// A user serialization hook failed.
    #[error("`{class}.{method}` failed: {source}")]
    Callback {
        /// The class declaring the hook.
        class: String,
        /// The hook that failed.
        method: &'static str,
        /// The error raised by the hook.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CodecError {
    /// Returns the manual section explaining this error, if there is one.
    pub fn documentation(&self) -> Option<DocumentationSection> {
        match self {
            CodecError::UnsupportedFeature { .. } => {
                Some(DocumentationSection::NotYetImplementedJavaSerialization)
            }
            _ => None,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        CodecError::Malformed {
            reason: reason.into(),
        }
    }
}
