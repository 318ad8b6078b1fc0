//! The capture scope threaded through every observation.

use crate::sink::Sink;
use std::cell::Cell;
use std::sync::Arc;
use tessera_common::ProjectPath;

/// Where observations made by the current thread are recorded.
///
/// The build scope is created by [`FingerprintWriter::build_scope`]; project
/// scopes are handed to the closure of [`FingerprintWriter::for_project`]
/// and end when it returns, which restores the enclosing scope.
///
/// A scope also carries whether input tracking is enabled. Tracking is
/// disabled while a value source computes its value, so that the inputs the
/// source reads are not captured on top of the source itself.
///
/// [`FingerprintWriter::build_scope`]: crate::FingerprintWriter::build_scope
/// [`FingerprintWriter::for_project`]: crate::FingerprintWriter::for_project
pub struct CaptureScope {
    pub(crate) sink: Arc<Sink>,
    tracking_disabled: Cell<u32>,
}

impl CaptureScope {
    pub(crate) fn new(sink: Arc<Sink>) -> Self {
        Self {
            sink,
            tracking_disabled: Cell::new(0),
        }
    }

    pub(crate) fn nested(&self, sink: Arc<Sink>) -> Self {
        Self {
            sink,
            tracking_disabled: Cell::new(self.tracking_disabled.get()),
        }
    }

    /// The project whose stream this scope records into, if any.
    pub fn project(&self) -> Option<&ProjectPath> {
        self.sink.project()
    }

    /// Whether observations are currently recorded.
    pub fn is_tracking_enabled(&self) -> bool {
        self.tracking_disabled.get() == 0
    }

    /// Runs `f` with input tracking disabled. Calls nest.
    pub fn without_input_tracking<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore<'a>(&'a Cell<u32>);

        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.0.set(self.0.get() - 1);
            }
        }

        self.tracking_disabled.set(self.tracking_disabled.get() + 1);
        let _restore = Restore(&self.tracking_disabled);
        f()
    }
}
